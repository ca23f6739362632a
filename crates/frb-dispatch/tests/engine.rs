//! End-to-end runs of the dispatcher engine against temporary directories.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use frb_core::{ResultCode, SearchConfig, WorkItem};
use frb_dispatch::{Engine, EngineError, LogError, ProcessingFault, Processor, RunOptions};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// One observed search call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    name: String,
    /// Completion log lines present when the call started.
    logged_before: usize,
    dm_max: Option<serde_json::Value>,
}

/// In-process processor that records every call.
#[derive(Debug, Clone)]
struct Recorder {
    log: Utf8PathBuf,
    calls: Arc<Mutex<Vec<Call>>>,
    delay: Duration,
    /// A file that takes longer than the rest.
    slow: Option<(&'static str, Duration)>,
    started: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl Recorder {
    fn new(log: Utf8PathBuf) -> Self {
        Self {
            log,
            calls: Arc::default(),
            delay: Duration::from_millis(10),
            slow: None,
            started: Arc::default(),
        }
    }

    fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.name.clone()).collect()
    }
}

impl Processor for Recorder {
    #[allow(clippy::panic)]
    async fn process(&self, item: &WorkItem) -> Result<ResultCode, ProcessingFault> {
        let logged_before = fs::read_to_string(&self.log).map_or(0, |s| s.lines().count());
        let name = item.path.file_name().unwrap_or_default().to_owned();
        self.calls.lock().push(Call {
            name: name.clone(),
            logged_before,
            dm_max: item.parameters.get("dm_max").cloned(),
        });
        if let Some(tx) = self.started.lock().take() {
            let _ = tx.send(());
        }
        let delay = match self.slow {
            Some((slow, delay)) if slow == name => delay,
            _ => self.delay,
        };
        tokio::time::sleep(delay).await;

        match name.as_str() {
            "fails.raw" => Ok(ResultCode::new(3)),
            "hangs.raw" => Err(ProcessingFault::TimedOut(Duration::from_secs(1))),
            "panics.raw" => panic!("search crashed"),
            _ => Ok(ResultCode::SUCCESS),
        }
    }
}

struct Fixture {
    _data_dir: tempfile::TempDir,
    _out_dir: tempfile::TempDir,
    data: Utf8PathBuf,
    out: Utf8PathBuf,
}

impl Fixture {
    fn new(files: &[&str]) -> Self {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let out_dir = tempfile::tempdir().expect("tempdir");
        let data = canonical(data_dir.path());
        let out = canonical(out_dir.path());
        for name in files {
            fs::write(data.join(name), name.as_bytes()).expect("write data file");
        }
        Self {
            _data_dir: data_dir,
            _out_dir: out_dir,
            data,
            out,
        }
    }

    fn config(&self, extra: &str) -> SearchConfig {
        let yaml = format!(
            "search_directory: {}\n\
             filename_match_pattern: \"*.raw\"\n\
             output_directory: {}\n\
             log_filename: frb_search.log\n\
             dm_max: 2000\n\
             {extra}",
            self.data, self.out
        );
        SearchConfig::from_yaml_str(&yaml)
            .expect("valid yaml")
            .resolve()
            .expect("valid config")
    }

    fn log_path(&self) -> Utf8PathBuf {
        self.out.join("frb_search.log")
    }

    fn log_lines(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .map(|s| s.lines().map(ToOwned::to_owned).collect())
            .unwrap_or_default()
    }

    fn line(&self, name: &str, code: i32) -> String {
        format!("{}: {code}", self.data.join(name))
    }
}

fn canonical(path: &std::path::Path) -> Utf8PathBuf {
    Utf8Path::from_path(path)
        .expect("utf8 tempdir")
        .canonicalize_utf8()
        .expect("canonical tempdir")
}

/// Polls the completion log until it holds at least `count` lines.
async fn wait_for_lines(fx: &Fixture, count: usize) {
    for _ in 0..250 {
        if fx.log_lines().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

const BACKLOG_ONLY: RunOptions = RunOptions {
    pre_existing: true,
    real_time: false,
};

#[tokio::test]
async fn backlog_files_are_searched_one_after_another() {
    let fx = Fixture::new(&["a.raw", "b.raw", "notes.txt"]);
    let recorder = Recorder::new(fx.log_path());

    let summary = Engine::new(fx.config(""), recorder.clone(), BACKLOG_ONLY)
        .run(std::future::pending())
        .await
        .expect("run");

    let calls = recorder.calls.lock().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name, "a.raw");
    assert_eq!(calls[0].logged_before, 0);
    // b starts only after a's result is in the log
    assert_eq!(calls[1].name, "b.raw");
    assert_eq!(calls[1].logged_before, 1);
    assert_eq!(calls[0].dm_max, Some(serde_json::json!(2000)));

    assert_eq!(
        fx.log_lines(),
        vec![fx.line("a.raw", 0), fx.line("b.raw", 0)]
    );
    assert_eq!(summary.appended, 2);
    assert_eq!(summary.stats.succeeded, 2);
    assert!(!summary.stopped);
}

#[tokio::test]
async fn logged_files_are_skipped() {
    let fx = Fixture::new(&["a.raw", "b.raw"]);
    fs::write(fx.log_path(), format!("{}\n", fx.line("a.raw", 0))).expect("seed log");
    let recorder = Recorder::new(fx.log_path());

    let summary = Engine::new(fx.config(""), recorder.clone(), BACKLOG_ONLY)
        .run(std::future::pending())
        .await
        .expect("run");

    assert_eq!(recorder.names(), vec!["b.raw"]);
    assert_eq!(
        fx.log_lines(),
        vec![fx.line("a.raw", 0), fx.line("b.raw", 0)]
    );
    assert_eq!(summary.stats.skipped_processed, 1);
    assert_eq!(summary.scan.map(|s| s.stats.already_processed), Some(1));
}

#[tokio::test]
async fn empty_backlog_exits_without_a_log() {
    let fx = Fixture::new(&["notes.txt"]);
    let recorder = Recorder::new(fx.log_path());

    let summary = Engine::new(fx.config(""), recorder.clone(), BACKLOG_ONLY)
        .run(std::future::pending())
        .await
        .expect("run");

    assert!(recorder.names().is_empty());
    assert!(!fx.log_path().exists());
    assert_eq!(summary.appended, 0);
}

#[tokio::test]
async fn both_producers_disabled_does_nothing() {
    let fx = Fixture::new(&["a.raw"]);
    let recorder = Recorder::new(fx.log_path());
    let options = RunOptions {
        pre_existing: false,
        real_time: false,
    };

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        Engine::new(fx.config(""), recorder.clone(), options).run(std::future::pending()),
    )
    .await
    .expect("exits without a stop signal")
    .expect("run");

    assert!(recorder.names().is_empty());
    assert!(summary.scan.is_none());
    assert!(!fx.log_path().exists());
}

#[tokio::test]
async fn faults_are_recorded_and_do_not_stop_the_scan() {
    let fx = Fixture::new(&["fails.raw", "hangs.raw", "ok.raw", "panics.raw"]);
    let recorder = Recorder::new(fx.log_path());

    let summary = Engine::new(fx.config(""), recorder.clone(), BACKLOG_ONLY)
        .run(std::future::pending())
        .await
        .expect("run");

    assert_eq!(
        fx.log_lines(),
        vec![
            fx.line("fails.raw", 3),
            fx.line("hangs.raw", ResultCode::TIMED_OUT.get()),
            fx.line("ok.raw", 0),
            fx.line("panics.raw", ResultCode::WORKER_PANICKED.get()),
        ]
    );
    assert_eq!(summary.stats.succeeded, 1);
    assert_eq!(summary.stats.failed, 1);
    assert_eq!(summary.stats.faulted, 2);
}

#[tokio::test]
async fn failed_files_are_retried_only_when_configured() {
    let fx = Fixture::new(&["a.raw", "b.raw"]);
    let seeded = format!("{}\n{}\n", fx.line("a.raw", 3), fx.line("b.raw", 0));

    fs::write(fx.log_path(), &seeded).expect("seed log");
    let recorder = Recorder::new(fx.log_path());
    Engine::new(fx.config(""), recorder.clone(), BACKLOG_ONLY)
        .run(std::future::pending())
        .await
        .expect("run");
    assert!(recorder.names().is_empty());

    let recorder = Recorder::new(fx.log_path());
    Engine::new(
        fx.config("dispatch:\n  retry_failed: true\n"),
        recorder.clone(),
        BACKLOG_ONLY,
    )
    .run(std::future::pending())
    .await
    .expect("run");
    assert_eq!(recorder.names(), vec!["a.raw"]);
    assert_eq!(fx.log_lines().last(), Some(&fx.line("a.raw", 0)));
}

#[tokio::test]
async fn corrupt_log_aborts_before_any_search() {
    let fx = Fixture::new(&["a.raw"]);
    fs::write(fx.log_path(), "this is not a record\n").expect("seed log");
    let recorder = Recorder::new(fx.log_path());

    let result = Engine::new(fx.config(""), recorder.clone(), BACKLOG_ONLY)
        .run(std::future::pending())
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Log(LogError::Malformed { line: 1, .. }))
    ));
    assert!(recorder.names().is_empty());
}

#[tokio::test]
async fn stop_signal_finishes_running_job_and_launches_nothing_new() {
    let fx = Fixture::new(&["a.raw", "b.raw", "c.raw"]);
    let mut recorder = Recorder::new(fx.log_path());
    recorder.delay = Duration::from_millis(200);
    let (started_tx, started_rx) = oneshot::channel();
    *recorder.started.lock() = Some(started_tx);

    let summary = Engine::new(fx.config(""), recorder.clone(), BACKLOG_ONLY)
        .run(async {
            let _ = started_rx.await;
        })
        .await
        .expect("run");

    assert_eq!(recorder.names(), vec!["a.raw"]);
    assert_eq!(fx.log_lines(), vec![fx.line("a.raw", 0)]);
    assert!(summary.stopped);
    assert_eq!(summary.scan.map(|s| s.stopped_early), Some(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_file_is_searched_and_run_waits_for_stop() {
    let fx = Fixture::new(&["old.raw"]);
    let recorder = Recorder::new(fx.log_path());
    let options = RunOptions {
        pre_existing: false,
        real_time: true,
    };
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let engine = Engine::new(fx.config(""), recorder.clone(), options);
    let run = tokio::spawn(engine.run(async {
        let _ = stop_rx.await;
    }));

    // Give the subscription time to become active
    tokio::time::sleep(Duration::from_millis(300)).await;
    fs::write(fx.data.join("c.raw"), b"c").expect("write");
    fs::write(fx.data.join("c.txt"), b"c").expect("write");

    for _ in 0..250 {
        if !fx.log_lines().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(fx.log_lines(), vec![fx.line("c.raw", 0)]);
    assert!(!run.is_finished());

    let _ = stop_tx.send(());
    let summary = run.await.expect("join").expect("run");

    assert_eq!(recorder.names(), vec!["c.raw"]);
    assert_eq!(summary.stats.dispatched, 1);
    assert!(summary.stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_file_already_logged_is_searched_again() {
    let fx = Fixture::new(&[]);
    fs::write(fx.log_path(), format!("{}\n", fx.line("c.raw", 0))).expect("seed log");
    let recorder = Recorder::new(fx.log_path());
    let options = RunOptions {
        pre_existing: false,
        real_time: true,
    };
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let engine = Engine::new(fx.config(""), recorder.clone(), options);
    let run = tokio::spawn(engine.run(async {
        let _ = stop_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(300)).await;
    fs::write(fx.data.join("c.raw"), b"c").expect("write");
    wait_for_lines(&fx, 2).await;

    let _ = stop_tx.send(());
    let summary = run.await.expect("join").expect("run");

    assert_eq!(recorder.names(), vec!["c.raw"]);
    assert_eq!(fx.log_lines(), vec![fx.line("c.raw", 0), fx.line("c.raw", 0)]);
    assert_eq!(summary.stats.dispatched, 1);
    assert_eq!(summary.stats.skipped_processed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backlog_and_live_run_together_and_share_in_flight_files() {
    let fx = Fixture::new(&["a.raw"]);
    let mut recorder = Recorder::new(fx.log_path());
    recorder.slow = Some(("a.raw", Duration::from_millis(1500)));
    let (started_tx, started_rx) = oneshot::channel();
    *recorder.started.lock() = Some(started_tx);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let engine = Engine::new(fx.config(""), recorder.clone(), RunOptions::default());
    let run = tokio::spawn(engine.run(async {
        let _ = stop_rx.await;
    }));

    // The watch is active before the backlog scan launches anything
    started_rx.await.expect("backlog job started");
    fs::remove_file(fx.data.join("a.raw")).expect("remove");
    fs::write(fx.data.join("a.raw"), b"a").expect("rewrite");
    fs::write(fx.data.join("b.raw"), b"b").expect("write");

    // b is searched by the live lane while a is still running
    wait_for_lines(&fx, 1).await;
    assert_eq!(fx.log_lines(), vec![fx.line("b.raw", 0)]);

    wait_for_lines(&fx, 2).await;
    let _ = stop_tx.send(());
    let summary = run.await.expect("join").expect("run");

    let calls = recorder.calls.lock().clone();
    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a.raw", "b.raw"]);
    assert_eq!(calls[1].logged_before, 0);
    assert_eq!(
        fx.log_lines(),
        vec![fx.line("b.raw", 0), fx.line("a.raw", 0)]
    );
    assert_eq!(summary.stats.dispatched, 2);
    assert_eq!(summary.stats.deduplicated, 1);
}
