//! One complete dispatcher run.
//!
//! [`Engine::run`] wires the pieces together and owns the result loop:
//!
//! ```text
//!  CompletionLog::load ──► exclusion set
//!                               │
//!  PreexistingScanner ──────────┴──► backlog Lane ─┐
//!  DirectoryWatcher ─────────────► live Lane ──────┤
//!                                                  ▼
//!                                      job tasks (one process each)
//!                                                  │ JobReport
//!                                                  ▼
//!  shutdown ─┐                        ResultCollector::record
//!            └──────► select! loop ◄── scan finished
//! ```
//!
//! The loop ends when the result channel closes, which happens once both
//! producers have stopped and every launched job has been recorded.

use std::future::Future;
use std::sync::Arc;

use frb_core::SearchConfig;
use frb_scanner::{PreexistingScanner, ScanConfig, ScanError, ScanReport};
use frb_watcher::{DirectoryWatcher, PatternFilter, WatchError};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collector::ResultCollector;
use crate::completion::CompletionLog;
use crate::dispatcher::{Dispatcher, InFlight, LaneKind};
use crate::error::EngineError;
use crate::processor::Processor;
use crate::stats::{DispatchSnapshot, DispatchStats};

/// Which producers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Scan the search directory for files that existed at startup.
    pub pre_existing: bool,
    /// Watch the search directory for new files until stopped.
    pub real_time: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pre_existing: true,
            real_time: true,
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Dispatch counters.
    pub stats: DispatchSnapshot,
    /// The backlog scan outcome, if a scan ran to completion.
    pub scan: Option<ScanReport>,
    /// Records appended to the completion log.
    pub appended: u64,
    /// `true` if the run ended because of the shutdown signal.
    pub stopped: bool,
}

/// Runs the backlog scan and live watch against one configuration.
#[derive(Debug)]
pub struct Engine<P> {
    config: SearchConfig,
    processor: P,
    options: RunOptions,
}

impl<P: Processor> Engine<P> {
    /// Creates an engine. `config` should already be
    /// [resolved](SearchConfig::resolve).
    #[must_use]
    pub const fn new(config: SearchConfig, processor: P, options: RunOptions) -> Self {
        Self {
            config,
            processor,
            options,
        }
    }

    /// Runs until the work is done or `shutdown` resolves.
    ///
    /// With real-time watching disabled the run ends by itself once the
    /// backlog scan has finished and its last result is recorded. With it
    /// enabled the run ends only after `shutdown` resolves: no new job is
    /// launched from then on, jobs already running finish and are recorded,
    /// and both producers are joined before this returns.
    ///
    /// # Errors
    ///
    /// Fails before launching anything if the pattern is invalid, the
    /// completion log cannot be loaded, the search directory cannot be
    /// listed, or the watch cannot be established. A failed log append or a
    /// failed backlog listing mid-run stops the run, drains it, and is
    /// returned afterwards.
    pub async fn run<F>(self, shutdown: F) -> Result<RunSummary, EngineError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            config,
            processor,
            options,
        } = self;

        let pattern = config.pattern()?;
        let log = CompletionLog::new(config.log_path());
        let snapshot = log.load()?;
        let exclusions = Arc::new(snapshot.exclusions(config.dispatch.retry_failed));

        info!(
            search_directory = %config.search_directory,
            pattern = pattern.as_str(),
            log = %log.path(),
            logged = snapshot.len(),
            excluded = exclusions.len(),
            pre_existing = options.pre_existing,
            real_time = options.real_time,
            "Starting search dispatcher"
        );

        // Validate before the watch starts so a failure leaves nothing running
        let scanner = if options.pre_existing {
            Some(PreexistingScanner::new(
                ScanConfig::new(&config.search_directory, pattern.clone())
                    .with_exclusions(exclusions),
            )?)
        } else {
            None
        };

        let cancel = CancellationToken::new();
        let stats = Arc::new(DispatchStats::new());
        let in_flight = InFlight::new();
        let (dispatcher, mut results) = Dispatcher::new(
            processor,
            config.parameters(),
            in_flight.clone(),
            cancel.clone(),
            Arc::clone(&stats),
        );

        let watcher = if options.real_time {
            Some(
                DirectoryWatcher::start(
                    &config.search_directory,
                    PatternFilter::new(pattern),
                    dispatcher.lane(LaneKind::Live, config.dispatch.live_workers),
                )
                .await?,
            )
        } else {
            None
        };

        let mut scan = scanner.map(|scanner| {
            tokio::spawn(
                scanner.run(dispatcher.lane(LaneKind::Backlog, config.dispatch.backlog_workers)),
            )
        });

        // Only lanes and jobs may keep the result channel open
        drop(dispatcher);

        let mut collector = ResultCollector::new(
            log,
            in_flight,
            Arc::clone(&stats),
            options.real_time,
            scan.is_some(),
        );
        let mut stop = Stopper::new(cancel, watcher);
        let mut shutdown = std::pin::pin!(shutdown);
        let mut failure: Option<EngineError> = None;
        let mut scan_report = None;

        if collector.should_terminate() {
            info!("Nothing to scan or watch");
            collector.begin_draining();
            stop.trigger();
        }

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown, if !stop.signalled => {
                    info!("Stop requested, finishing in-flight work");
                    stop.signalled = true;
                    collector.begin_draining();
                    stop.trigger();
                }

                joined = join_scan(&mut scan), if scan.is_some() => {
                    scan = None;
                    collector.mark_scan_done();
                    match settle_scan(joined, &stats) {
                        Ok(report) => scan_report = Some(report),
                        Err(err) => {
                            error!(error = %err, "Backlog scan failed, stopping");
                            failure.get_or_insert(err);
                            collector.begin_draining();
                            stop.trigger();
                        }
                    }
                    if collector.should_terminate() && collector.begin_draining() {
                        stop.trigger();
                    }
                }

                report = results.recv() => {
                    let Some(report) = report else { break };
                    if let Err(err) = collector.record(report) {
                        error!(error = %err, "Cannot record result, stopping");
                        failure.get_or_insert(err.into());
                        collector.begin_draining();
                        stop.trigger();
                    }
                    if collector.should_terminate() && collector.begin_draining() {
                        info!("All work complete");
                        stop.trigger();
                    }
                }
            }
        }

        // The channel can close just before the scan task is reported done
        if scan.is_some() {
            match settle_scan(join_scan(&mut scan).await, &stats) {
                Ok(report) => scan_report = Some(report),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        stop.trigger();
        if let Err(err) = stop.join().await {
            failure.get_or_insert(err.into());
        }

        let summary = RunSummary {
            stats: stats.snapshot(),
            scan: scan_report,
            appended: collector.appended(),
            stopped: stop.signalled,
        };
        info!(
            dispatched = summary.stats.dispatched,
            succeeded = summary.stats.succeeded,
            failed = summary.stats.failed,
            faulted = summary.stats.faulted,
            deduplicated = summary.stats.deduplicated,
            skipped_processed = summary.stats.skipped_processed,
            appended = summary.appended,
            "Search dispatcher finished"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

/// Cancels the lanes and stops the watcher, once.
struct Stopper {
    cancel: CancellationToken,
    watcher: Option<DirectoryWatcher>,
    stopping: Option<JoinHandle<Result<(), WatchError>>>,
    signalled: bool,
}

impl Stopper {
    const fn new(cancel: CancellationToken, watcher: Option<DirectoryWatcher>) -> Self {
        Self {
            cancel,
            watcher,
            stopping: None,
            signalled: false,
        }
    }

    /// Stops new launches and starts stopping the watcher in the background.
    ///
    /// The watcher stop runs on its own task because it waits for its lane to
    /// drain, which needs the result loop to keep running.
    fn trigger(&mut self) {
        self.cancel.cancel();
        if let Some(watcher) = self.watcher.take() {
            self.stopping = Some(tokio::spawn(watcher.stop()));
        }
    }

    async fn join(&mut self) -> Result<(), WatchError> {
        match self.stopping.take() {
            Some(handle) => handle
                .await
                .map_err(|e| WatchError::TaskFailed(e.to_string()))?,
            None => Ok(()),
        }
    }
}

async fn join_scan(
    handle: &mut Option<JoinHandle<Result<ScanReport, ScanError>>>,
) -> Result<Result<ScanReport, ScanError>, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn settle_scan(
    joined: Result<Result<ScanReport, ScanError>, JoinError>,
    stats: &DispatchStats,
) -> Result<ScanReport, EngineError> {
    match joined {
        Ok(Ok(report)) => {
            stats.record_skipped(report.stats.already_processed);
            if report.stopped_early {
                warn!(
                    pending = report.stats.pending(),
                    "Backlog scan stopped before every file was submitted"
                );
            }
            Ok(report)
        }
        Ok(Err(err)) => Err(err.into()),
        Err(join) => Err(EngineError::TaskFailed(join.to_string())),
    }
}
