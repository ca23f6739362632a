//! Live directory watcher bridged to an async [`JobSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Blocking Thread (spawn_blocking)                │
//! │  ┌───────────────────┐    ┌────────────────────────────────┐   │
//! │  │ RecommendedWatcher │ -> │ Callback (creation + filter +  │   │
//! │  │ (non-recursive)    │    │ canonicalize)                  │   │
//! │  └───────────────────┘    └───────────────┬────────────────┘   │
//! └───────────────────────────────────────────│────────────────────┘
//!                                             │ blocking_send
//!                                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Async Runtime (tokio)                       │
//! │  ┌────────────────────┐    ┌─────────────────────────────────┐ │
//! │  │ dispatch loop      │ -> │ JobSink::submit (one at a time) │ │
//! │  │ (stop token)       │    └─────────────────────────────────┘ │
//! │  └────────────────────┘                                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatch loop awaits each `submit` before taking the next event, so
//! a sink with one worker slot serializes live processing exactly like the
//! backlog scan.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use frb_core::{FilePath, JobSink, Submission};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::WatchError;
use crate::events::{FileEvent, is_file_creation};
use crate::filter::FileFilter;

/// Default channel capacity for file events.
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Counters for one watch session.
#[derive(Debug, Default)]
pub struct WatchCounters {
    submitted: AtomicU64,
    in_flight: AtomicU64,
}

impl WatchCounters {
    /// Files for which a worker was launched.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Files skipped because they were already being processed.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

/// Watches one directory for newly created files and submits them.
///
/// # Lifecycle
///
/// 1. **Start**: [`DirectoryWatcher::start`] validates the directory, spawns
///    the notify thread and returns once the subscription is active.
/// 2. **Serve**: every matching creation event is submitted to the sink,
///    one at a time.
/// 3. **Stop**: [`DirectoryWatcher::stop`] may be called from any task. It
///    lets the current submission finish, drains the sink, then
///    unsubscribes. Dropping the watcher stops it without waiting.
///
/// # Examples
///
/// ```no_run
/// use frb_watcher::{DirectoryWatcher, PatternFilter};
/// use frb_core::FilenamePattern;
/// use camino::Utf8Path;
///
/// # async fn example<S: frb_core::JobSink + 'static>(lane: S) -> Result<(), frb_watcher::WatchError> {
/// let filter = PatternFilter::new(FilenamePattern::new("*.raw").unwrap());
/// let watcher = DirectoryWatcher::start(Utf8Path::new("/data/guppi"), filter, lane).await?;
///
/// // ... until an operator interrupt ...
///
/// watcher.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct DirectoryWatcher {
    /// Signals the blocking notify thread to unsubscribe.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the blocking notify thread.
    notify_task: Option<JoinHandle<Result<(), WatchError>>>,

    /// Handle to the async dispatch loop.
    dispatch_task: Option<JoinHandle<()>>,

    /// Stops the dispatch loop between events.
    stop: CancellationToken,

    counters: Arc<WatchCounters>,

    /// The canonical directory being watched.
    watch_path: Utf8PathBuf,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("watch_path", &self.watch_path)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Starts watching `path` (non-recursively) and submitting matching
    /// new files to `sink`.
    ///
    /// Returns once the filesystem subscription is active: any file created
    /// after this resolves will be observed.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] or [`WatchError::NotADirectory`]
    /// for an unusable path, and [`WatchError::Subscription`] if the subscription
    /// cannot be established.
    pub async fn start<F, S>(path: &Utf8Path, filter: F, sink: S) -> Result<Self, WatchError>
    where
        F: FileFilter,
        S: JobSink + 'static,
    {
        Self::with_capacity(path, filter, sink, DEFAULT_CHANNEL_CAPACITY).await
    }

    /// Like [`start`](Self::start) with a custom event channel capacity.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn with_capacity<F, S>(
        path: &Utf8Path,
        filter: F,
        sink: S,
        channel_capacity: usize,
    ) -> Result<Self, WatchError>
    where
        F: FileFilter,
        S: JobSink + 'static,
    {
        if !path.exists() {
            return Err(WatchError::path_not_found(path));
        }
        if !path.is_dir() {
            return Err(WatchError::NotADirectory(path.to_owned()));
        }
        let watch_path = path.canonicalize_utf8()?;

        let (event_tx, event_rx) = mpsc::channel(channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let task_path = watch_path.clone();
        let notify_task = tokio::task::spawn_blocking(move || {
            run_watcher_loop(&task_path, event_tx, shutdown_rx, ready_tx, filter)
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = notify_task.await;
                return Err(err);
            }
            Err(_) => {
                return Err(match notify_task.await {
                    Ok(Err(err)) => err,
                    Ok(Ok(())) => WatchError::NotReady,
                    Err(join) => WatchError::TaskFailed(join.to_string()),
                });
            }
        }

        let stop = CancellationToken::new();
        let counters = Arc::new(WatchCounters::default());
        let dispatch_task = tokio::spawn(dispatch_loop(
            event_rx,
            sink,
            stop.clone(),
            Arc::clone(&counters),
        ));

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            notify_task: Some(notify_task),
            dispatch_task: Some(dispatch_task),
            stop,
            counters,
            watch_path,
        })
    }

    /// Returns the canonical path being watched.
    #[must_use]
    pub fn watch_path(&self) -> &Utf8Path {
        &self.watch_path
    }

    /// Returns the session counters.
    #[must_use]
    pub fn counters(&self) -> Arc<WatchCounters> {
        Arc::clone(&self.counters)
    }

    /// Returns `true` while both the subscription and the dispatch loop run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.stop.is_cancelled()
            && self.notify_task.as_ref().is_some_and(|h| !h.is_finished())
            && self.dispatch_task.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops watching.
    ///
    /// No new event is submitted once this is called. A submission already
    /// underway completes, the sink is drained so that job's result has been
    /// collected, and then the subscription is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the notify thread failed or either task panicked.
    pub async fn stop(mut self) -> Result<(), WatchError> {
        self.stop.cancel();

        if let Some(handle) = self.dispatch_task.take() {
            handle
                .await
                .map_err(|e| WatchError::TaskFailed(e.to_string()))?;
        }

        if let Some(tx) = self.shutdown_tx.take() {
            // Receiver is gone only if the thread already exited
            let _ = tx.send(());
        }

        if let Some(handle) = self.notify_task.take() {
            handle
                .await
                .map_err(|e| WatchError::TaskFailed(e.to_string()))??;
        }

        info!(
            path = %self.watch_path,
            submitted = self.counters.submitted(),
            in_flight = self.counters.in_flight(),
            "Directory watcher stopped"
        );
        Ok(())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Submits each received event to the sink until stopped.
async fn dispatch_loop<S: JobSink>(
    mut events: mpsc::Receiver<FileEvent>,
    mut sink: S,
    stop: CancellationToken,
    counters: Arc<WatchCounters>,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        debug!(path = %event.path, "New file detected");
        match sink.submit(event.into_path()).await {
            Submission::Launched => {
                counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Submission::AlreadyInFlight => {
                counters.in_flight.fetch_add(1, Ordering::Relaxed);
            }
            Submission::Closed => {
                debug!("Dispatcher closed, ending live dispatch");
                break;
            }
        }
    }

    // Dropping the receiver makes any pending blocking_send fail fast
    drop(events);
    sink.drain().await;
}

/// Runs the notify subscription in a blocking context until shutdown.
fn run_watcher_loop<F: FileFilter>(
    path: &Utf8Path,
    event_tx: mpsc::Sender<FileEvent>,
    shutdown_rx: oneshot::Receiver<()>,
    ready_tx: oneshot::Sender<Result<(), WatchError>>,
    filter: F,
) -> Result<(), WatchError> {
    let handler = move |res: notify::Result<Event>| match res {
        Ok(event) => forward_event(event, &filter, &event_tx),
        Err(error) => warn!(error = %error, "Watcher error"),
    };

    let mut watcher = match notify::recommended_watcher(handler) {
        Ok(watcher) => watcher,
        Err(err) => {
            let _ = ready_tx.send(Err(err.into()));
            return Ok(());
        }
    };

    if let Err(err) = watcher.watch(path.as_std_path(), RecursiveMode::NonRecursive) {
        let _ = ready_tx.send(Err(err.into()));
        return Ok(());
    }

    info!(path = %path, "Directory watcher started");
    if ready_tx.send(Ok(())).is_err() {
        // The starter was dropped before the subscription became active
        return Ok(());
    }

    let _ = shutdown_rx.blocking_recv();

    unwatch(&mut watcher, path);
    Ok(())
}

fn unwatch(watcher: &mut RecommendedWatcher, path: &Utf8Path) {
    if let Err(error) = watcher.unwatch(path.as_std_path()) {
        // The directory may have been removed while watched
        debug!(path = %path, error = %error, "Unwatch failed");
    }
}

/// Filters one notify event and forwards its created files.
fn forward_event<F: FileFilter>(event: Event, filter: &F, tx: &mpsc::Sender<FileEvent>) {
    if !is_file_creation(&event.kind) {
        return;
    }

    for path in event.paths {
        let utf8_path = match Utf8PathBuf::try_from(path) {
            Ok(p) => p,
            Err(e) => {
                let err = WatchError::non_utf8_path(e.into_path_buf());
                warn!(error = %err, "Skipping file event");
                continue;
            }
        };

        if utf8_path.is_dir() {
            continue;
        }

        if !filter.should_process(&utf8_path) {
            trace!(path = %utf8_path, "Filtered out file event");
            continue;
        }

        let canonical = match FilePath::canonicalize(&utf8_path) {
            Ok(p) => p,
            Err(source) => {
                let err = WatchError::Canonicalize {
                    path: utf8_path,
                    source,
                };
                warn!(error = %err, "Skipping file event");
                continue;
            }
        };

        if !queue_event(tx, FileEvent::new(canonical)) {
            debug!("Event channel closed, dropping file event");
            return;
        }
    }
}

/// Hands one event to the dispatch loop. Returns `false` once the loop is
/// gone.
///
/// While the queue is full this blocks notify's thread, and the kernel keeps
/// buffering events on its own. If that buffer overflows too, creations are
/// lost, so a full queue is reported.
fn queue_event(tx: &mpsc::Sender<FileEvent>, event: FileEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!(
                path = %event.path,
                capacity = tx.max_capacity(),
                "Live queue full, waiting for searches to finish; raise dispatch.live_workers if this persists"
            );
            tx.blocking_send(event).is_ok()
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
