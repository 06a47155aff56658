//! qscale-autoscale — queue-depth driven scale-out.
//!
//! Samples one queue, divides its backlog by its consumer count, and
//! asks the platform for one more instance of the target application
//! whenever that ratio exceeds the threshold.
//!
//! # Scaling Algorithm
//!
//! ```text
//! sample  = inspect_passive(queue)            // size, consumers
//! metric  = size / consumers                  // floor; 0 if either is 0
//!
//! if metric > threshold:
//!     current = get_application(app).running_instances
//!     scale_application(app, current + 1)
//! ```
//!
//! There is no cool-down, no upper bound, and no scale-down path. Ticks
//! are serialized: a tick that comes due while the previous one is still
//! talking to the platform is skipped rather than run concurrently, so
//! two scale-outs never race on the same instance count.

pub mod controller;
pub mod sampler;
pub mod scaler;

#[cfg(test)]
mod testing;

pub use controller::Controller;
pub use sampler::Sampler;
pub use scaler::Autoscaler;
