//! Controller — threshold policy and scale-out actuation.
//!
//! Stateless across ticks. Each sample is judged on its own, and a
//! scale-out always reads the platform's instance count first and writes
//! exactly that count plus one.

use std::sync::Arc;

use tracing::debug;

use qscale_core::{
    LoadMetric, PlatformClient, QueueSample, ScaleDecision, ScaleError, TickOutcome, TickRecord,
};
use qscale_metrics::TickSink;

/// Applies the threshold policy to samples and drives the platform.
pub struct Controller {
    platform: Arc<dyn PlatformClient>,
    sink: Arc<dyn TickSink>,
    application_name: String,
    threshold: u64,
}

impl Controller {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        sink: Arc<dyn TickSink>,
        application_name: impl Into<String>,
        threshold: u64,
    ) -> Self {
        Self {
            platform,
            sink,
            application_name: application_name.into(),
            threshold,
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Metric and decision for a sample, without side effects.
    pub fn evaluate(&self, sample: &QueueSample) -> (LoadMetric, ScaleDecision) {
        let metric = sample.load();
        (metric, ScaleDecision::evaluate(metric, self.threshold))
    }

    /// Handle one sample end to end and emit its tick record.
    ///
    /// Platform failures are recorded and returned; the caller decides
    /// how to log them and moves on to the next tick.
    pub async fn handle(&self, sample: &QueueSample) -> Result<TickOutcome, ScaleError> {
        let (metric, decision) = self.evaluate(sample);

        if !decision.should_scale() {
            debug!(
                queue = %sample.queue_name,
                size = sample.size,
                consumers = sample.consumers,
                %metric,
                threshold = self.threshold,
                "load within threshold"
            );
            self.sink.record(&TickRecord::below_threshold(
                sample,
                metric,
                &self.application_name,
            ));
            return Ok(TickOutcome::BelowThreshold);
        }

        match self.scale_out().await {
            Ok((from, to)) => {
                self.sink.record(&TickRecord::scaled(
                    sample,
                    metric,
                    &self.application_name,
                    from,
                    to,
                ));
                Ok(TickOutcome::Scaled)
            }
            Err(err) => {
                let from = match &err {
                    ScaleError::PlatformWriteFailure { target, .. } => Some(target.saturating_sub(1)),
                    _ => None,
                };
                self.sink.record(&TickRecord::platform_failure(
                    sample,
                    metric,
                    &self.application_name,
                    err.outcome(),
                    from,
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }

    /// Record a tick that never produced a sample.
    pub fn report_sample_failure(&self, queue_name: &str, err: &ScaleError) {
        self.sink.record(&TickRecord::sample_unavailable(
            queue_name,
            &self.application_name,
            err.to_string(),
        ));
    }

    /// Read the current instance count, then request one more.
    ///
    /// The write is never issued without a successful read in the same
    /// call. Returns `(from, to)`.
    async fn scale_out(&self) -> Result<(u32, u32), ScaleError> {
        let app = self
            .platform
            .get_application(&self.application_name)
            .await
            .map_err(|source| ScaleError::PlatformReadFailure {
                application: self.application_name.clone(),
                source,
            })?;

        let from = app.running_instances;
        let to = from.saturating_add(1);

        self.platform
            .scale_application(&self.application_name, to)
            .await
            .map_err(|source| ScaleError::PlatformWriteFailure {
                application: self.application_name.clone(),
                target: to,
                source,
            })?;

        debug!(application = %self.application_name, from, to, "scale request completed");
        Ok((from, to))
    }
}
