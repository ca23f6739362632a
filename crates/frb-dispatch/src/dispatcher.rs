//! Bounded worker lanes.
//!
//! The [`Dispatcher`] hands out one [`Lane`] per producer. A lane is a
//! [`JobSink`] backed by a semaphore with one permit per worker slot:
//!
//! ```text
//! Lane::submit(path)
//!     │ acquire slot (or Closed on cancel)
//!     │ claim path in the in-flight set (or AlreadyInFlight)
//!     ▼
//! job task ── spawn ──► Processor::process ──► ResultCode / fault / panic
//!     │
//!     ▼
//! JobReport { record, slot } ──► result channel ──► collector
//!                                                   append, release path,
//!                                                   drop slot
//! ```
//!
//! The slot travels with the report and is released only after the
//! collector has recorded the result. With one slot per lane, a producer's
//! next `submit` therefore returns only once its previous job's result is in
//! the completion log.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use frb_core::{CompletionRecord, FilePath, FxHashSet, JobSink, Parameters, Submission, WorkItem};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProcessingFault;
use crate::processor::Processor;
use crate::stats::DispatchStats;

/// Which producer a lane serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// The one-shot backlog scan.
    Backlog,
    /// The live directory watch.
    Live,
}

impl LaneKind {
    /// Returns a short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files dispatched but not yet recorded, shared by every lane.
///
/// Consulted before launch so a file found by both producers at once is
/// processed only once.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    paths: Arc<Mutex<FxHashSet<FilePath>>>,
}

impl InFlight {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `path`. Returns `false` if it is already in flight.
    pub fn try_claim(&self, path: &FilePath) -> bool {
        let mut paths = self.paths.lock();
        if paths.contains(path) {
            return false;
        }
        paths.insert(path.clone());
        true
    }

    /// Releases `path`.
    pub fn release(&self, path: &FilePath) {
        self.paths.lock().remove(path);
    }

    /// Returns `true` if `path` is in flight.
    #[must_use]
    pub fn contains(&self, path: &FilePath) -> bool {
        self.paths.lock().contains(path)
    }

    /// Number of files in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    /// Returns `true` if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }
}

/// A finished job on its way to the collector.
#[derive(Debug)]
pub struct JobReport {
    /// The file and its result.
    pub record: CompletionRecord,
    /// The lane that launched the job.
    pub lane: LaneKind,
    /// The lane slot the job occupied. Released when the report is dropped.
    slot: OwnedSemaphorePermit,
}

impl JobReport {
    /// Releases the lane slot.
    pub fn release(self) {
        drop(self.slot);
    }
}

/// State shared by the dispatcher, its lanes, and running jobs.
struct Shared<P> {
    processor: Arc<P>,
    parameters: Arc<Parameters>,
    in_flight: InFlight,
    results: mpsc::UnboundedSender<JobReport>,
    cancel: CancellationToken,
    stats: Arc<DispatchStats>,
}

/// Launches isolated jobs and reports their results.
///
/// The result channel closes once the dispatcher, every lane, and every
/// running job have been dropped.
pub struct Dispatcher<P> {
    shared: Arc<Shared<P>>,
}

impl<P> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.shared.in_flight.len())
            .field("cancelled", &self.shared.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<P: Processor> Dispatcher<P> {
    /// Creates a dispatcher and the receiving end of its result channel.
    #[must_use]
    pub fn new(
        processor: P,
        parameters: Parameters,
        in_flight: InFlight,
        cancel: CancellationToken,
        stats: Arc<DispatchStats>,
    ) -> (Self, mpsc::UnboundedReceiver<JobReport>) {
        let (results, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            processor: Arc::new(processor),
            parameters: Arc::new(parameters),
            in_flight,
            results,
            cancel,
            stats,
        });
        (Self { shared }, rx)
    }

    /// Creates a lane with `workers` concurrent slots (at least one).
    #[must_use]
    pub fn lane(&self, kind: LaneKind, workers: usize) -> Lane<P> {
        let workers = u32::try_from(workers.max(1)).unwrap_or(u32::MAX);
        Lane {
            kind,
            slots: Arc::new(Semaphore::new(workers as usize)),
            workers,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// One producer's bounded pool of worker slots.
pub struct Lane<P> {
    kind: LaneKind,
    slots: Arc<Semaphore>,
    workers: u32,
    shared: Arc<Shared<P>>,
}

impl<P> fmt::Debug for Lane<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lane")
            .field("kind", &self.kind)
            .field("workers", &self.workers)
            .field("free", &self.slots.available_permits())
            .finish_non_exhaustive()
    }
}

impl<P> Lane<P> {
    /// Returns which producer this lane serves.
    #[must_use]
    pub const fn kind(&self) -> LaneKind {
        self.kind
    }

    /// Returns the number of worker slots.
    #[must_use]
    pub const fn workers(&self) -> u32 {
        self.workers
    }
}

impl<P: Processor> JobSink for Lane<P> {
    async fn submit(&mut self, path: FilePath) -> Submission {
        let shared = &self.shared;
        let slot = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => return Submission::Closed,
            slot = Arc::clone(&self.slots).acquire_owned() => match slot {
                Ok(slot) => slot,
                Err(_) => return Submission::Closed,
            },
        };

        if !shared.in_flight.try_claim(&path) {
            debug!(lane = %self.kind, path = %path, "Already in flight, not dispatching");
            shared.stats.record_duplicate();
            return Submission::AlreadyInFlight;
        }

        shared.stats.record_dispatch();
        info!(lane = %self.kind, path = %path, "Dispatching");
        tokio::spawn(run_job(Arc::clone(shared), self.kind, path, slot));
        Submission::Launched
    }

    async fn drain(&mut self) {
        // Every slot is free only once every job's report has been recorded
        if let Ok(all) = self.slots.acquire_many(self.workers).await {
            drop(all);
        }
    }
}

/// Runs one job in its own task and reports the outcome.
async fn run_job<P: Processor>(
    shared: Arc<Shared<P>>,
    lane: LaneKind,
    path: FilePath,
    slot: OwnedSemaphorePermit,
) {
    let item = WorkItem::new(path.clone(), Arc::clone(&shared.parameters));
    let processor = Arc::clone(&shared.processor);
    let started = Instant::now();

    // A panic inside the processor stays inside this inner task
    let outcome = tokio::spawn(async move { processor.process(&item).await })
        .await
        .unwrap_or_else(|join| Err(ProcessingFault::Panicked(join.to_string())));

    let code = match outcome {
        Ok(code) => code,
        Err(fault) => {
            warn!(lane = %lane, path = %path, error = %fault, code = fault.code().get(), "Search fault");
            fault.code()
        }
    };

    debug!(
        lane = %lane,
        path = %path,
        code = code.get(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Search finished"
    );

    let report = JobReport {
        record: CompletionRecord::new(path, code),
        lane,
        slot,
    };
    if let Err(mpsc::error::SendError(report)) = shared.results.send(report) {
        // Collector is gone; nothing will record this result
        warn!(path = %report.record.path, "Result dropped, collector stopped");
        shared.in_flight.release(&report.record.path);
    }
}
