//! Concurrent fuzz executor.
//!
//! A feeder thread pushes tasks into a bounded channel whose receiver is
//! shared by N workers. Each worker owns its transport (and so its connection
//! pool), rebuilds one request per task from the shared [`BaseRequest`], and
//! sends the outcome to the collector running on the caller's thread. Results
//! are handed to the caller's sink in completion order as they arrive.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use http_fuzz_transport::{HttpTransport, TransportConfig, UreqTransport};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::plan::{FuzzTask, ParamLocation};
use crate::preview::PreviewConfig;
use crate::report::{millis, send_one, FuzzResult, RunSummary};
use crate::request::{build_fuzz_request, BaseRequest};

/// Extra time the collector waits beyond one request timeout and one delay.
pub const COLLECTOR_GRACE: Duration = Duration::from_secs(5);

/// Total time spent joining workers at the end of a run.
pub const JOIN_BUDGET: Duration = Duration::from_secs(5);

/// Log a progress line every this many results.
pub const PROGRESS_EVERY: usize = 50;

/// Builds one transport per worker.
pub type TransportFactory = Arc<dyn Fn() -> Result<Box<dyn HttpTransport>> + Send + Sync>;

/// Configuration for a fuzz run.
#[derive(Debug, Clone)]
pub struct FuzzConfig {
    /// Worker count. Clamped to `1..=tasks`.
    pub threads: usize,
    /// Pause after each completed task, per worker.
    pub delay: Duration,
    /// Timeout and TLS policy for every worker's transport.
    pub transport: TransportConfig,
    pub preview: PreviewConfig,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            threads: 5,
            delay: Duration::from_millis(1000),
            transport: TransportConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

enum WorkerEvent {
    Done(FuzzResult),
    Failed {
        param: String,
        location: ParamLocation,
        message: String,
    },
}

/// Runs fuzz tasks against a live endpoint.
pub struct FuzzRunner {
    config: FuzzConfig,
    factory: TransportFactory,
}

impl FuzzRunner {
    /// Runner whose workers each get a fresh [`UreqTransport`].
    pub fn new(config: FuzzConfig) -> Self {
        let transport_config = config.transport.clone();
        let factory: TransportFactory = Arc::new(move || -> Result<Box<dyn HttpTransport>> {
            Ok(Box::new(UreqTransport::new(&transport_config)?))
        });
        Self { config, factory }
    }

    pub fn with_transport_factory(config: FuzzConfig, factory: TransportFactory) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// Execute every task once, passing each result to `sink` as it completes.
    ///
    /// Transport failures become results with `error` set. A worker failure
    /// is logged and counted. If no result arrives within one timeout plus
    /// one delay plus [`COLLECTOR_GRACE`], the run stops early and the summary
    /// is marked `stalled`. An error from `sink` stops the run and is
    /// returned.
    pub fn run<F>(&self, base: Arc<BaseRequest>, tasks: Vec<FuzzTask>, mut sink: F) -> Result<RunSummary>
    where
        F: FnMut(&FuzzResult) -> Result<()>,
    {
        let started = Instant::now();
        let total = tasks.len();
        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };
        if total == 0 {
            return Ok(summary);
        }

        let worker_count = self.config.threads.clamp(1, total);
        let transports = (0..worker_count)
            .map(|_| (self.factory)())
            .collect::<Result<Vec<_>>>()
            .context("Failed to create HTTP transport")?;

        let (task_tx, task_rx) = mpsc::sync_channel::<FuzzTask>(worker_count * 2);
        let (result_tx, result_rx) = mpsc::channel::<WorkerEvent>();
        let task_rx = Arc::new(Mutex::new(task_rx));
        let stop = Arc::new(AtomicBool::new(false));

        let feeder = thread::spawn(move || {
            for task in tasks {
                if task_tx.send(task).is_err() {
                    break;
                }
            }
        });

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count + 1);
        handles.push(feeder);
        for (id, transport) in transports.into_iter().enumerate() {
            let worker = Worker {
                id,
                tasks: Arc::clone(&task_rx),
                results: result_tx.clone(),
                stop: Arc::clone(&stop),
                base: Arc::clone(&base),
                transport,
                preview: self.config.preview.clone(),
                delay: self.config.delay,
            };
            handles.push(thread::spawn(move || worker.run()));
        }
        drop(result_tx);

        let wait = self.config.transport.timeout + self.config.delay + COLLECTOR_GRACE;
        let outcome = collect(&result_rx, total, wait, &mut summary, &mut sink);

        stop.store(true, Ordering::SeqCst);
        drop(result_rx);
        drop(task_rx);
        let joined = join_bounded(handles, JOIN_BUDGET);
        summary.worker_failures += joined.panicked;

        summary.elapsed_ms = millis(started.elapsed());
        outcome.map(|_| summary)
    }
}

fn collect<F>(
    results: &mpsc::Receiver<WorkerEvent>,
    total: usize,
    wait: Duration,
    summary: &mut RunSummary,
    sink: &mut F,
) -> Result<()>
where
    F: FnMut(&FuzzResult) -> Result<()>,
{
    let mut completed = 0usize;
    while completed < total {
        match results.recv_timeout(wait) {
            Ok(WorkerEvent::Done(result)) => {
                if result.is_error() {
                    summary.transport_errors += 1;
                }
                sink(&result)?;
                summary.emitted += 1;
            }
            Ok(WorkerEvent::Failed {
                param,
                location,
                message,
            }) => {
                error!(param = %param, location = %location, error = %message, "worker failed on task");
                summary.worker_failures += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    waited_secs = wait.as_secs(),
                    completed, total, "result queue timed out waiting for workers"
                );
                summary.stalled = true;
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(completed, total, "all workers exited before the run completed");
                summary.stalled = true;
                break;
            }
        }
        completed += 1;
        if completed % PROGRESS_EVERY == 0 {
            info!(completed, total, "progress");
        }
    }
    Ok(())
}

struct Worker {
    id: usize,
    tasks: Arc<Mutex<mpsc::Receiver<FuzzTask>>>,
    results: mpsc::Sender<WorkerEvent>,
    stop: Arc<AtomicBool>,
    base: Arc<BaseRequest>,
    transport: Box<dyn HttpTransport>,
    preview: PreviewConfig,
    delay: Duration,
}

impl Worker {
    fn run(self) {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            let task = { self.tasks.lock().recv() };
            let Ok(task) = task else { break };
            let param = task.param_id();
            let location = task.location();

            let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                let request = build_fuzz_request(&self.base, &task.target, &task.value);
                send_one(self.transport.as_ref(), &request, &param, &task.value, &self.preview)
                    .with_location(location)
            }));
            let event = match attempt {
                Ok(result) => WorkerEvent::Done(result),
                Err(payload) => WorkerEvent::Failed {
                    param,
                    location,
                    message: panic_message(payload.as_ref()),
                },
            };
            if self.results.send(event).is_err() {
                break;
            }
            if !self.delay.is_zero() && !self.stop.load(Ordering::SeqCst) {
                thread::sleep(self.delay);
            }
        }
        debug!(worker = self.id, "worker exiting");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// What [`join_bounded`] found at the end of a run.
#[derive(Debug, Default, PartialEq, Eq)]
struct JoinReport {
    panicked: usize,
    detached: usize,
}

/// Join threads that finish within `budget`; leave the rest running.
fn join_bounded(handles: Vec<JoinHandle<()>>, budget: Duration) -> JoinReport {
    let deadline = Instant::now() + budget;
    let mut report = JoinReport::default();
    for handle in handles {
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            if let Err(payload) = handle.join() {
                warn!(error = %panic_message(payload.as_ref()), "worker thread panicked");
                report.panicked += 1;
            }
        } else {
            report.detached += 1;
        }
    }
    if report.detached > 0 {
        warn!(threads = report.detached, "worker threads still busy at exit, not waiting");
    }
    report
}
