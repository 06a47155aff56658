//! Observability sinks.

use std::sync::Arc;

use tracing::{debug, info, warn};

use qscale_core::{TickOutcome, TickRecord};

/// Receives one record per tick.
///
/// Implementations must not block or panic; the controller does not wait
/// on them and has no way to react to their failure.
pub trait TickSink: Send + Sync {
    fn record(&self, record: &TickRecord);
}

impl<T: TickSink + ?Sized> TickSink for Arc<T> {
    fn record(&self, record: &TickRecord) {
        (**self).record(record)
    }
}

/// Logs each tick through `tracing`.
///
/// Quiet ticks go to `debug`, scale-outs to `info`, failures to `warn`, so
/// a stuck sampler reads differently from an idle queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TickSink for TracingSink {
    fn record(&self, record: &TickRecord) {
        match record.outcome {
            TickOutcome::BelowThreshold => debug!(
                queue = %record.queue_name,
                application = %record.application_name,
                size = record.size,
                consumers = record.consumers,
                metric = record.metric,
                outcome = %record.outcome,
                "tick below threshold"
            ),
            TickOutcome::Scaled => info!(
                queue = %record.queue_name,
                application = %record.application_name,
                size = record.size,
                consumers = record.consumers,
                metric = record.metric,
                from = record.from_instances,
                to = record.to_instances,
                "scaled {}",
                record.application_name
            ),
            TickOutcome::SampleUnavailable
            | TickOutcome::PlatformReadFailure
            | TickOutcome::PlatformWriteFailure => warn!(
                queue = %record.queue_name,
                application = %record.application_name,
                size = record.size,
                consumers = record.consumers,
                metric = record.metric,
                outcome = %record.outcome,
                error = record.error.as_deref().unwrap_or("unknown"),
                "tick failed"
            ),
        }
    }
}

/// Forwards each record to several sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TickSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TickSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TickSink for FanoutSink {
    fn record(&self, record: &TickRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}
