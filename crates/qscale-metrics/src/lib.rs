//! qscale-metrics — observability for the controller loop.
//!
//! Every tick ends in exactly one `TickRecord`, handed to each
//! registered sink. Sinks are synchronous and infallible so a broken
//! observer can never abort a tick.
//!
//! # Architecture
//!
//! ```text
//! Controller ──TickRecord──▶ FanoutSink
//!                              ├── TracingSink   → structured log line
//!                              └── TickRecorder  → counters + last tick
//!                                                    └── render_prometheus()
//! ```

pub mod prometheus;
pub mod recorder;
pub mod sink;

pub use prometheus::render_prometheus;
pub use recorder::{RecorderSnapshot, TickRecorder};
pub use sink::{FanoutSink, TickSink, TracingSink};
