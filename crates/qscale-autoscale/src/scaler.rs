//! Autoscaler — the periodic sample → decide → act loop.
//!
//! One tokio interval drives ticks. Each tick runs to completion inside
//! the loop before the timer is polled again, so at most one decision is
//! ever in flight. Ticks that come due during a slow tick are skipped
//! (`MissedTickBehavior::Skip`), not queued. A shutdown signal stops the
//! timer but never interrupts a tick that has already started.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use qscale_core::TickOutcome;

use crate::controller::Controller;
use crate::sampler::Sampler;

/// Shortest poll interval the loop will run at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Owns the sampler and controller and runs them on a fixed interval.
pub struct Autoscaler {
    sampler: Sampler,
    controller: Controller,
    interval: Duration,
}

impl Autoscaler {
    /// A zero interval is raised to [`MIN_INTERVAL`]; tokio timers cannot
    /// fire at period zero.
    pub fn new(sampler: Sampler, controller: Controller, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "poll interval below 1 ms, using 1 ms"
            );
        }
        Self {
            sampler,
            controller,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Run a single tick. Never fails: every error ends up in the log
    /// and the sinks.
    pub async fn tick(&self) -> TickOutcome {
        let sample = match self.sampler.poll().await {
            Ok(sample) => sample,
            Err(err) => {
                warn!(
                    queue = %self.sampler.queue_name(),
                    kind = %err.outcome(),
                    error = %err,
                    "sampling failed, skipping tick"
                );
                self.controller
                    .report_sample_failure(self.sampler.queue_name(), &err);
                return err.outcome();
            }
        };

        match self.controller.handle(&sample).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    queue = %sample.queue_name,
                    application = %self.controller.application_name(),
                    kind = %err.outcome(),
                    error = %err,
                    "scale-out failed"
                );
                err.outcome()
            }
        }
    }

    /// Run the autoscaler loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = %self.sampler.queue_name(),
            application = %self.controller.application_name(),
            threshold = self.controller.threshold(),
            interval_ms = self.interval.as_millis() as u64,
            "autoscaler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use qscale_core::BackendError;

    use crate::testing::{CollectSink, FakePlatform, FakeQueue};

    fn autoscaler(
        queue: Arc<FakeQueue>,
        platform: Arc<FakePlatform>,
        sink: Arc<CollectSink>,
    ) -> Autoscaler {
        Autoscaler::new(
            Sampler::new(queue, "work"),
            Controller::new(platform, sink, "consumer", 5),
            Duration::from_millis(1000),
        )
    }

    #[tokio::test]
    async fn tick_scales_overloaded_queue() {
        let platform = Arc::new(FakePlatform::with_instances(2));
        let scaler = autoscaler(
            Arc::new(FakeQueue::steady(30, 5)),
            platform.clone(),
            Arc::new(CollectSink::default()),
        );

        assert_eq!(scaler.tick().await, TickOutcome::Scaled);
        assert_eq!(platform.writes(), vec![3]);
    }

    #[tokio::test]
    async fn sample_failure_never_reaches_platform() {
        let platform = Arc::new(FakePlatform::with_instances(2));
        let sink = Arc::new(CollectSink::default());
        let scaler = autoscaler(
            Arc::new(FakeQueue::scripted(vec![Err(BackendError::NotFound(
                "queue work".into(),
            ))])),
            platform.clone(),
            sink.clone(),
        );

        assert_eq!(scaler.tick().await, TickOutcome::SampleUnavailable);
        assert!(platform.calls().is_empty());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, TickOutcome::SampleUnavailable);
        assert!(records[0].error.as_deref().unwrap().contains("queue work"));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_keeps_ticking_through_failures() {
        let queue = Arc::new(FakeQueue::scripted_then(
            vec![
                Err(BackendError::Connect("connection refused".into())),
                Err(BackendError::Timeout(5000)),
            ],
            Some((30, 5)),
        ));
        let platform = Arc::new(FakePlatform::with_instances(1));
        platform.fail_reads(true);
        let sink = Arc::new(CollectSink::default());
        let scaler = Arc::new(autoscaler(queue.clone(), platform.clone(), sink.clone()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let scaler = scaler.clone();
            tokio::spawn(async move { scaler.run(shutdown_rx).await })
        };

        // Ticks at 0, 1000, 2000, 3000 ms.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        platform.fail_reads(false);
        tokio::time::sleep(Duration::from_millis(1000)).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let outcomes: Vec<_> = sink.records().iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::SampleUnavailable,
                TickOutcome::SampleUnavailable,
                TickOutcome::PlatformReadFailure,
                TickOutcome::PlatformReadFailure,
                TickOutcome::Scaled,
            ]
        );
        assert_eq!(queue.inspections(), 5);
        assert_eq!(platform.writes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_platform_never_overlaps_ticks() {
        let platform =
            Arc::new(FakePlatform::with_instances(1).slow_writes(Duration::from_millis(2500)));
        let sink = Arc::new(CollectSink::default());
        let scaler = Arc::new(autoscaler(
            Arc::new(FakeQueue::steady(100, 2)),
            platform.clone(),
            sink.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let scaler = scaler.clone();
            tokio::spawn(async move { scaler.run(shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(platform.max_in_flight(), 1);
        // Each write saw the count left by the previous one.
        let writes = platform.writes();
        assert!(writes.len() >= 3, "writes: {writes:?}");
        for (i, target) in writes.iter().enumerate() {
            assert_eq!(*target, i as u32 + 2);
        }
        // Far fewer ticks than the ten a non-blocking timer would fire.
        assert!(sink.records().len() < 10);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_in_flight_tick() {
        let platform =
            Arc::new(FakePlatform::with_instances(1).slow_writes(Duration::from_millis(2000)));
        let sink = Arc::new(CollectSink::default());
        let scaler = Arc::new(autoscaler(
            Arc::new(FakeQueue::steady(100, 2)),
            platform.clone(),
            sink.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let scaler = scaler.clone();
            tokio::spawn(async move { scaler.run(shutdown_rx).await })
        };

        // First tick is mid-write at 500 ms.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(platform.writes().is_empty());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(platform.writes(), vec![2]);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, TickOutcome::Scaled);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let queue = Arc::new(FakeQueue::steady(0, 0));
        let scaler = Arc::new(Autoscaler::new(
            Sampler::new(queue.clone(), "work"),
            Controller::new(
                Arc::new(FakePlatform::with_instances(1)),
                Arc::new(CollectSink::default()),
                "consumer",
                5,
            ),
            Duration::ZERO,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let scaler = scaler.clone();
            tokio::spawn(async move { scaler.run(shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // Ticks at 0..=10 ms on a 1 ms period.
        assert!(queue.inspections() >= 5, "inspections: {}", queue.inspections());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_tick_exits_cleanly() {
        let queue = Arc::new(FakeQueue::steady(0, 0));
        let scaler = autoscaler(
            queue.clone(),
            Arc::new(FakePlatform::with_instances(1)),
            Arc::new(CollectSink::default()),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        scaler.run(shutdown_rx).await;

        assert_eq!(queue.inspections(), 0);
    }
}
