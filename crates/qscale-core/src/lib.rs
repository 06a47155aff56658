//! qscale-core — shared vocabulary for the queuescale controller.
//!
//! Holds the per-tick data model (`QueueSample`, `LoadMetric`,
//! `ScaleDecision`, `TickRecord`), the narrow collaborator traits the
//! controller calls through (`QueueBackend`, `PlatformClient`), the error
//! taxonomy, and the TOML configuration loader.

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

pub use backend::{BackendFuture, PlatformClient, QueueBackend};
pub use config::{ConfigOverrides, QscaleConfig};
pub use error::{BackendError, BackendResult, ConfigError, ScaleError};
pub use types::*;
