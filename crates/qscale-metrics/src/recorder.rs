//! Tick recorder — running counters over the controller's ticks.
//!
//! Counters are plain atomics; the last record sits behind a mutex that
//! is only held long enough to clone or replace it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use qscale_core::{TickOutcome, TickRecord};

use crate::sink::TickSink;

/// Point-in-time copy of the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecorderSnapshot {
    pub queue_name: String,
    pub application_name: String,
    pub ticks: u64,
    pub scale_outs: u64,
    pub below_threshold: u64,
    pub sample_failures: u64,
    pub platform_read_failures: u64,
    pub platform_write_failures: u64,
    /// Last successfully sampled values.
    pub last_size: u64,
    pub last_consumers: u64,
    pub last_metric: u64,
    /// Instance count requested by the most recent scale-out.
    pub last_requested_instances: u64,
    pub last_tick: Option<TickRecord>,
}

/// Sink that counts tick outcomes for the status and metrics endpoints.
pub struct TickRecorder {
    queue_name: String,
    application_name: String,
    ticks: AtomicU64,
    scale_outs: AtomicU64,
    below_threshold: AtomicU64,
    sample_failures: AtomicU64,
    platform_read_failures: AtomicU64,
    platform_write_failures: AtomicU64,
    last_size: AtomicU64,
    last_consumers: AtomicU64,
    last_metric: AtomicU64,
    last_requested_instances: AtomicU64,
    last_tick: Mutex<Option<TickRecord>>,
}

impl TickRecorder {
    pub fn new(queue_name: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            application_name: application_name.into(),
            ticks: AtomicU64::new(0),
            scale_outs: AtomicU64::new(0),
            below_threshold: AtomicU64::new(0),
            sample_failures: AtomicU64::new(0),
            platform_read_failures: AtomicU64::new(0),
            platform_write_failures: AtomicU64::new(0),
            last_size: AtomicU64::new(0),
            last_consumers: AtomicU64::new(0),
            last_metric: AtomicU64::new(0),
            last_requested_instances: AtomicU64::new(0),
            last_tick: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        let last_tick = match self.last_tick.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        RecorderSnapshot {
            queue_name: self.queue_name.clone(),
            application_name: self.application_name.clone(),
            ticks: self.ticks.load(Ordering::Relaxed),
            scale_outs: self.scale_outs.load(Ordering::Relaxed),
            below_threshold: self.below_threshold.load(Ordering::Relaxed),
            sample_failures: self.sample_failures.load(Ordering::Relaxed),
            platform_read_failures: self.platform_read_failures.load(Ordering::Relaxed),
            platform_write_failures: self.platform_write_failures.load(Ordering::Relaxed),
            last_size: self.last_size.load(Ordering::Relaxed),
            last_consumers: self.last_consumers.load(Ordering::Relaxed),
            last_metric: self.last_metric.load(Ordering::Relaxed),
            last_requested_instances: self.last_requested_instances.load(Ordering::Relaxed),
            last_tick,
        }
    }
}

impl TickSink for TickRecorder {
    fn record(&self, record: &TickRecord) {
        self.ticks.fetch_add(1, Ordering::Relaxed);

        let counter = match record.outcome {
            TickOutcome::BelowThreshold => &self.below_threshold,
            TickOutcome::Scaled => &self.scale_outs,
            TickOutcome::SampleUnavailable => &self.sample_failures,
            TickOutcome::PlatformReadFailure => &self.platform_read_failures,
            TickOutcome::PlatformWriteFailure => &self.platform_write_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let (Some(size), Some(consumers), Some(metric)) =
            (record.size, record.consumers, record.metric)
        {
            self.last_size.store(size, Ordering::Relaxed);
            self.last_consumers.store(consumers, Ordering::Relaxed);
            self.last_metric.store(metric, Ordering::Relaxed);
        }

        if record.scaled
            && let Some(to) = record.to_instances
        {
            self.last_requested_instances
                .store(u64::from(to), Ordering::Relaxed);
        }

        match self.last_tick.lock() {
            Ok(mut guard) => *guard = Some(record.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(record.clone()),
        }
    }
}
