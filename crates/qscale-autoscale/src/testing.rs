//! In-memory collaborators for controller and loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use qscale_core::{
    ApplicationState, BackendError, BackendFuture, BackendResult, PlatformClient, QueueBackend,
    QueueSample, TickRecord,
};
use qscale_metrics::TickSink;

/// Queue backend that replays a script, then repeats a fallback sample.
pub struct FakeQueue {
    script: Mutex<VecDeque<BackendResult<(u64, u64)>>>,
    fallback: Option<(u64, u64)>,
    inspections: AtomicUsize,
}

impl FakeQueue {
    pub fn steady(size: u64, consumers: u64) -> Self {
        Self::scripted_then(Vec::new(), Some((size, consumers)))
    }

    pub fn scripted(script: Vec<BackendResult<(u64, u64)>>) -> Self {
        Self::scripted_then(script, None)
    }

    pub fn scripted_then(
        script: Vec<BackendResult<(u64, u64)>>,
        fallback: Option<(u64, u64)>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            inspections: AtomicUsize::new(0),
        }
    }

    pub fn inspections(&self) -> usize {
        self.inspections.load(Ordering::SeqCst)
    }
}

impl QueueBackend for FakeQueue {
    fn inspect_passive<'a>(&'a self, queue_name: &'a str) -> BackendFuture<'a, QueueSample> {
        self.inspections.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let result = match (next, self.fallback) {
            (Some(scripted), _) => scripted,
            (None, Some(sample)) => Ok(sample),
            (None, None) => Err(BackendError::Connect("script exhausted".into())),
        };
        Box::pin(async move {
            result.map(|(size, consumers)| QueueSample::new(queue_name, size, consumers))
        })
    }
}

/// Platform that tracks reads, writes, and write concurrency.
pub struct FakePlatform {
    instances: AtomicU32,
    fail_read: AtomicBool,
    fail_write: AtomicBool,
    write_delay: Duration,
    reads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    writes: Mutex<Vec<u32>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakePlatform {
    pub fn with_instances(instances: u32) -> Self {
        Self {
            instances: AtomicU32::new(instances),
            fail_read: AtomicBool::new(false),
            fail_write: AtomicBool::new(false),
            write_delay: Duration::ZERO,
            reads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn slow_writes(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<u32> {
        self.writes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl PlatformClient for FakePlatform {
    fn get_application<'a>(&'a self, name: &'a str) -> BackendFuture<'a, ApplicationState> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push("read");
            if self.fail_read.load(Ordering::SeqCst) {
                return Err(BackendError::Status {
                    status: 503,
                    body: "platform unavailable".into(),
                });
            }
            Ok(ApplicationState {
                name: name.to_string(),
                running_instances: self.instances.load(Ordering::SeqCst),
            })
        })
    }

    fn scale_application<'a>(
        &'a self,
        _name: &'a str,
        target_instances: u32,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.calls.lock().unwrap().push("write");
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.write_delay.is_zero() {
                tokio::time::sleep(self.write_delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_write.load(Ordering::SeqCst) {
                return Err(BackendError::Status {
                    status: 422,
                    body: "quota exceeded".into(),
                });
            }
            self.writes.lock().unwrap().push(target_instances);
            self.instances.store(target_instances, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Sink that keeps every record.
#[derive(Default)]
pub struct CollectSink {
    records: Mutex<Vec<TickRecord>>,
}

impl CollectSink {
    pub fn records(&self) -> Vec<TickRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TickSink for CollectSink {
    fn record(&self, record: &TickRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}
