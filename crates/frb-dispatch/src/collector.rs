//! The single consumer of job results.
//!
//! Every result goes through [`ResultCollector::record`], which is the only
//! writer of the completion log. After each result (and when the backlog
//! scan finishes) the engine asks [`ResultCollector::should_terminate`]
//! whether the run is complete.

use std::sync::Arc;

use frb_core::CompletionRecord;
use tracing::{debug, info, warn};

use crate::completion::CompletionLog;
use crate::dispatcher::{InFlight, JobReport};
use crate::error::LogError;
use crate::stats::DispatchStats;

/// Collector lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Accepting work and recording results.
    Running,
    /// No new work is launched; outstanding results are still recorded.
    Draining,
}

/// Records results and decides when a run is finished.
#[derive(Debug)]
pub struct ResultCollector {
    log: CompletionLog,
    in_flight: InFlight,
    stats: Arc<DispatchStats>,
    state: CollectorState,
    real_time: bool,
    scan_done: bool,
}

impl ResultCollector {
    /// Creates a collector in the [`Running`](CollectorState::Running) state.
    ///
    /// `scan_pending` is `false` when no backlog scan will run.
    #[must_use]
    pub fn new(
        log: CompletionLog,
        in_flight: InFlight,
        stats: Arc<DispatchStats>,
        real_time: bool,
        scan_pending: bool,
    ) -> Self {
        Self {
            log,
            in_flight,
            stats,
            state: CollectorState::Running,
            real_time,
            scan_done: !scan_pending,
        }
    }

    /// Appends the report's record to the log, then frees its in-flight
    /// entry and its lane slot.
    ///
    /// The entry and slot are freed even if the append fails.
    ///
    /// # Errors
    ///
    /// Returns the [`LogError`] if the record could not be appended.
    pub fn record(&mut self, report: JobReport) -> Result<(), LogError> {
        let CompletionRecord { path, code } = &report.record;
        let appended = self.log.append(&report.record);

        self.stats.record_result(*code);
        if code.is_success() {
            info!(lane = %report.lane, path = %path, "Search succeeded");
        } else {
            warn!(
                lane = %report.lane,
                path = %path,
                code = code.get(),
                outcome = code.label(),
                "Search did not succeed"
            );
        }

        self.in_flight.release(path);
        report.release();
        appended
    }

    /// Notes that the backlog scan has finished.
    pub fn mark_scan_done(&mut self) {
        self.scan_done = true;
    }

    /// Returns `true` once nothing more can arrive without a live watch:
    /// real-time watching is off, the scan has finished, and no result is
    /// outstanding.
    #[must_use]
    pub fn should_terminate(&self) -> bool {
        !self.real_time && self.scan_done && self.in_flight.is_empty()
    }

    /// Moves to [`Draining`](CollectorState::Draining). Returns `false` if
    /// already draining.
    pub fn begin_draining(&mut self) -> bool {
        if self.state == CollectorState::Draining {
            return false;
        }
        debug!("Collector draining");
        self.state = CollectorState::Draining;
        true
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> CollectorState {
        self.state
    }

    /// Records appended to the log during this run.
    #[must_use]
    pub const fn appended(&self) -> u64 {
        self.log.appended()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, LaneKind};
    use crate::error::ProcessingFault;
    use crate::processor::Processor;
    use camino::{Utf8Path, Utf8PathBuf};
    use frb_core::{FilePath, JobSink, Parameters, ResultCode, WorkItem};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug)]
    struct Fixed(ResultCode);

    impl Processor for Fixed {
        async fn process(&self, _item: &WorkItem) -> Result<ResultCode, ProcessingFault> {
            Ok(self.0)
        }
    }

    fn fp(path: &str) -> FilePath {
        FilePath::from_absolute(Utf8PathBuf::from(path)).expect("absolute")
    }

    fn log_in(dir: &tempfile::TempDir) -> CompletionLog {
        CompletionLog::new(Utf8Path::from_path(dir.path()).expect("utf8").join("frb.log"))
    }

    #[tokio::test]
    async fn test_record_appends_and_releases() {
        let dir = tempfile::tempdir().expect("tempdir");
        let in_flight = InFlight::new();
        let stats = Arc::new(DispatchStats::new());
        let (dispatcher, mut rx) = Dispatcher::new(
            Fixed(ResultCode::new(2)),
            Parameters::default(),
            in_flight.clone(),
            CancellationToken::new(),
            Arc::clone(&stats),
        );
        let mut lane = dispatcher.lane(LaneKind::Backlog, 1);
        let mut collector =
            ResultCollector::new(log_in(&dir), in_flight.clone(), stats, false, true);

        lane.submit(fp("/data/a.raw")).await;
        assert!(in_flight.contains(&fp("/data/a.raw")));

        collector.record(rx.recv().await.expect("report")).expect("append");
        assert!(in_flight.is_empty());
        assert_eq!(collector.appended(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("frb.log")).expect("log"),
            "/data/a.raw: 2\n"
        );

        // The slot is free again
        lane.drain().await;
    }

    #[test]
    fn test_termination_predicate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let in_flight = InFlight::new();
        let mut collector = ResultCollector::new(
            log_in(&dir),
            in_flight.clone(),
            Arc::new(DispatchStats::new()),
            false,
            true,
        );

        assert!(!collector.should_terminate());
        collector.mark_scan_done();
        assert!(collector.should_terminate());

        in_flight.try_claim(&fp("/data/a.raw"));
        assert!(!collector.should_terminate());
    }

    #[test]
    fn test_real_time_never_self_terminates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let collector = ResultCollector::new(
            log_in(&dir),
            InFlight::new(),
            Arc::new(DispatchStats::new()),
            true,
            false,
        );
        assert!(!collector.should_terminate());
    }

    #[test]
    fn test_draining_is_entered_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut collector = ResultCollector::new(
            log_in(&dir),
            InFlight::new(),
            Arc::new(DispatchStats::new()),
            false,
            false,
        );
        assert_eq!(collector.state(), CollectorState::Running);
        assert!(collector.begin_draining());
        assert!(!collector.begin_draining());
        assert_eq!(collector.state(), CollectorState::Draining);
    }
}
