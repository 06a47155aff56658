//! Sampler — one passive queue inspection per tick.

use std::sync::Arc;

use tracing::debug;

use qscale_core::{QueueBackend, QueueSample, ScaleError};

/// Reads depth and consumer count for a single bound queue.
pub struct Sampler {
    backend: Arc<dyn QueueBackend>,
    queue_name: String,
}

impl Sampler {
    pub fn new(backend: Arc<dyn QueueBackend>, queue_name: impl Into<String>) -> Self {
        Self {
            backend,
            queue_name: queue_name.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Take one sample. Failures are returned as-is; retrying is the
    /// caller's next tick.
    pub async fn poll(&self) -> Result<QueueSample, ScaleError> {
        let sample = self
            .backend
            .inspect_passive(&self.queue_name)
            .await
            .map_err(|source| ScaleError::SampleUnavailable {
                queue: self.queue_name.clone(),
                source,
            })?;

        debug!(
            queue = %sample.queue_name,
            size = sample.size,
            consumers = sample.consumers,
            "queue sampled"
        );
        Ok(sample)
    }
}
