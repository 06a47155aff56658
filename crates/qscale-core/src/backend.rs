//! Collaborator traits the controller calls through.
//!
//! Both traits return boxed futures so they can sit behind `Arc<dyn _>`
//! and be swapped for in-memory fakes in tests.

use std::future::Future;
use std::pin::Pin;

use crate::error::BackendResult;
use crate::types::{ApplicationState, QueueSample};

/// Boxed future returned by collaborator calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Read-only access to queue depth and consumer counts.
pub trait QueueBackend: Send + Sync {
    /// Inspect a queue without consuming, acknowledging, or declaring
    /// anything on it.
    fn inspect_passive<'a>(&'a self, queue_name: &'a str) -> BackendFuture<'a, QueueSample>;
}

/// The platform API that owns the target application.
pub trait PlatformClient: Send + Sync {
    /// Fetch the application's current running instance count.
    fn get_application<'a>(&'a self, name: &'a str) -> BackendFuture<'a, ApplicationState>;

    /// Ask the platform to run `target_instances` instances.
    fn scale_application<'a>(
        &'a self,
        name: &'a str,
        target_instances: u32,
    ) -> BackendFuture<'a, ()>;
}
