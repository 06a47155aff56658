//! qscaled — the queuescale daemon.
//!
//! Wires the RabbitMQ sampler, Cloud Foundry client, and observability
//! sinks into one autoscaler loop, and optionally serves its status over
//! HTTP.

pub mod api;
pub mod daemon;

pub use api::build_router;
pub use daemon::{build_autoscaler, run, run_until, supervise};
