//! Per-tick data model.
//!
//! Everything here lives for a single tick: a `QueueSample` is taken,
//! reduced to a `LoadMetric`, judged into a `ScaleDecision`, and the
//! result is summarised as a `TickRecord` for the observability sinks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default scale-out threshold for the load metric.
pub const DEFAULT_THRESHOLD: u64 = 5;

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// ── Sample ─────────────────────────────────────────────────────────

/// Snapshot of one queue taken by a passive inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSample {
    pub queue_name: String,
    /// Messages currently waiting in the queue.
    pub size: u64,
    /// Active consumers attached to the queue.
    pub consumers: u64,
}

impl QueueSample {
    pub fn new(queue_name: impl Into<String>, size: u64, consumers: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            size,
            consumers,
        }
    }

    /// Backlog per consumer for this sample.
    pub fn load(&self) -> LoadMetric {
        LoadMetric::from_counts(self.size, self.consumers)
    }
}

// ── Metric ─────────────────────────────────────────────────────────

/// Messages per consumer, floored.
///
/// Zero whenever the queue is empty or nobody is consuming, so the
/// division never sees a zero denominator. Samples with the same ratio
/// at different magnitudes (10/2 and 100/20) produce the same metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadMetric(pub u64);

impl LoadMetric {
    pub fn from_counts(size: u64, consumers: u64) -> Self {
        if size > 0 && consumers > 0 {
            Self(size / consumers)
        } else {
            Self(0)
        }
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoadMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Decision ───────────────────────────────────────────────────────

/// Outcome of the threshold policy for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Add one instance to the target application.
    ScaleOut,
    /// Load is at or under the threshold.
    NoChange,
}

impl ScaleDecision {
    /// Strict comparison: a metric equal to the threshold does not scale.
    pub fn evaluate(metric: LoadMetric, threshold: u64) -> Self {
        if metric.value() > threshold {
            ScaleDecision::ScaleOut
        } else {
            ScaleDecision::NoChange
        }
    }

    pub fn should_scale(self) -> bool {
        self == ScaleDecision::ScaleOut
    }
}

// ── Platform ───────────────────────────────────────────────────────

/// Platform-owned view of the target application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub name: String,
    pub running_instances: u32,
}

// ── Tick record ────────────────────────────────────────────────────

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    BelowThreshold,
    Scaled,
    SampleUnavailable,
    PlatformReadFailure,
    PlatformWriteFailure,
}

impl TickOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TickOutcome::BelowThreshold => "below_threshold",
            TickOutcome::Scaled => "scaled",
            TickOutcome::SampleUnavailable => "sample_unavailable",
            TickOutcome::PlatformReadFailure => "platform_read_failure",
            TickOutcome::PlatformWriteFailure => "platform_write_failure",
        }
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, TickOutcome::BelowThreshold | TickOutcome::Scaled)
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured summary of one tick, handed to every observability sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    pub queue_name: String,
    pub application_name: String,
    /// Absent when the sample could not be taken.
    pub size: Option<u64>,
    pub consumers: Option<u64>,
    pub metric: Option<u64>,
    pub scaled: bool,
    pub outcome: TickOutcome,
    /// Instances observed on the platform before scaling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_instances: Option<u32>,
    /// Instances requested from the platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix timestamp (seconds) when the tick finished.
    pub epoch: u64,
}

impl TickRecord {
    fn base(queue_name: &str, application_name: &str, outcome: TickOutcome) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            application_name: application_name.to_string(),
            size: None,
            consumers: None,
            metric: None,
            scaled: false,
            outcome,
            from_instances: None,
            to_instances: None,
            error: None,
            epoch: epoch_secs(),
        }
    }

    fn with_sample(mut self, sample: &QueueSample, metric: LoadMetric) -> Self {
        self.size = Some(sample.size);
        self.consumers = Some(sample.consumers);
        self.metric = Some(metric.value());
        self
    }

    pub fn below_threshold(sample: &QueueSample, metric: LoadMetric, application_name: &str) -> Self {
        Self::base(&sample.queue_name, application_name, TickOutcome::BelowThreshold)
            .with_sample(sample, metric)
    }

    pub fn scaled(
        sample: &QueueSample,
        metric: LoadMetric,
        application_name: &str,
        from: u32,
        to: u32,
    ) -> Self {
        let mut record = Self::base(&sample.queue_name, application_name, TickOutcome::Scaled)
            .with_sample(sample, metric);
        record.scaled = true;
        record.from_instances = Some(from);
        record.to_instances = Some(to);
        record
    }

    pub fn sample_unavailable(queue_name: &str, application_name: &str, error: String) -> Self {
        let mut record = Self::base(queue_name, application_name, TickOutcome::SampleUnavailable);
        record.error = Some(error);
        record
    }

    /// A platform call failed after the sample was judged over threshold.
    pub fn platform_failure(
        sample: &QueueSample,
        metric: LoadMetric,
        application_name: &str,
        outcome: TickOutcome,
        from: Option<u32>,
        error: String,
    ) -> Self {
        let mut record = Self::base(&sample.queue_name, application_name, outcome)
            .with_sample(sample, metric);
        record.from_instances = from;
        record.to_instances = from.map(|n| n.saturating_add(1));
        record.error = Some(error);
        record
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_is_zero_for_empty_queue() {
        assert_eq!(LoadMetric::from_counts(0, 4), LoadMetric(0));
    }

    #[test]
    fn metric_is_zero_without_consumers() {
        // 5 messages, nobody consuming: guarded, no division.
        assert_eq!(LoadMetric::from_counts(5, 0), LoadMetric(0));
        assert_eq!(LoadMetric::from_counts(0, 0), LoadMetric(0));
    }

    #[test]
    fn metric_floors_the_ratio() {
        assert_eq!(LoadMetric::from_counts(30, 5), LoadMetric(6));
        assert_eq!(LoadMetric::from_counts(11, 2), LoadMetric(5));
        assert_eq!(LoadMetric::from_counts(1, 3), LoadMetric(0));
    }

    #[test]
    fn metric_ignores_magnitude() {
        assert_eq!(
            LoadMetric::from_counts(10, 2),
            LoadMetric::from_counts(100, 20)
        );
    }

    #[test]
    fn decision_is_strictly_greater_than_threshold() {
        assert_eq!(ScaleDecision::evaluate(LoadMetric(6), 5), ScaleDecision::ScaleOut);
        assert_eq!(ScaleDecision::evaluate(LoadMetric(5), 5), ScaleDecision::NoChange);
        assert_eq!(ScaleDecision::evaluate(LoadMetric(0), 5), ScaleDecision::NoChange);
    }

    #[test]
    fn sample_load_matches_counts() {
        let sample = QueueSample::new("work", 10, 5);
        assert_eq!(sample.load(), LoadMetric(2));
        assert!(!ScaleDecision::evaluate(sample.load(), DEFAULT_THRESHOLD).should_scale());
    }

    #[test]
    fn scaled_record_carries_instance_counts() {
        let sample = QueueSample::new("work", 30, 5);
        let record = TickRecord::scaled(&sample, sample.load(), "consumer", 2, 3);

        assert!(record.scaled);
        assert_eq!(record.outcome, TickOutcome::Scaled);
        assert_eq!(record.metric, Some(6));
        assert_eq!(record.from_instances, Some(2));
        assert_eq!(record.to_instances, Some(3));
    }

    #[test]
    fn unavailable_record_has_no_sample_fields() {
        let record = TickRecord::sample_unavailable("work", "consumer", "connection refused".into());
        assert_eq!(record.size, None);
        assert_eq!(record.metric, None);
        assert!(record.outcome.is_failure());
        assert!(!record.scaled);
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&TickOutcome::SampleUnavailable).unwrap();
        assert_eq!(json, "\"sample_unavailable\"");
    }
}
