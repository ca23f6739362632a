//! The external search call.
//!
//! A [`Processor`] turns one [`WorkItem`] into a [`ResultCode`]. The
//! production implementation, [`CommandProcessor`], runs every job in its
//! own OS process so a crash or hang in the search cannot reach the
//! dispatcher:
//!
//! ```text
//! <search_command...> <canonical file path>
//!     env FRB_SEARCH_PARAMETERS = {"search_directory": ..., ...}
//!     stdin  = /dev/null
//!     stdout, stderr inherited
//! ```
//!
//! The process exit code is the result code. Dispatcher-observed faults
//! (spawn failure, death by signal, timeout) come back as
//! [`ProcessingFault`]s.

use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use frb_core::{DispatchConfig, ResultCode, WorkItem};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{EngineError, ProcessingFault};

/// Environment variable carrying the forwarded parameters as JSON.
pub const PARAMETERS_ENV: &str = "FRB_SEARCH_PARAMETERS";

/// Hidden command-line flag that runs the built-in search worker.
pub const WORKER_FLAG: &str = "--run-search";

/// Searches one file.
///
/// Implementations are shared by every worker lane, hence `Sync`.
pub trait Processor: Send + Sync + 'static {
    /// Processes `item`, returning its result code.
    ///
    /// Must terminate. Faults are returned, not panicked; a panic is still
    /// caught by the dispatcher and recorded as
    /// [`ResultCode::WORKER_PANICKED`].
    fn process(
        &self,
        item: &WorkItem,
    ) -> impl Future<Output = Result<ResultCode, ProcessingFault>> + Send;
}

/// Runs the search as a child process per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandProcessor {
    /// Creates a processor for `argv`. The file path is appended per job.
    ///
    /// Returns `None` if `argv` is empty.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Option<Self> {
        let mut argv = argv.into_iter();
        let program = argv.next()?;
        Some(Self {
            program,
            args: argv.collect(),
            timeout: None,
        })
    }

    /// Creates a processor that re-invokes the current executable in
    /// built-in worker mode.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the current executable cannot be located or
    /// its path is not valid UTF-8.
    pub fn worker_mode() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        let exe = exe.into_os_string().into_string().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "executable path is not valid UTF-8",
            )
        })?;
        Ok(Self {
            program: exe,
            args: vec![WORKER_FLAG.to_owned()],
            timeout: None,
        })
    }

    /// Builds the processor described by the `dispatch` configuration
    /// section: the configured command, or worker mode when none is given.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SearchCommand`] if worker mode is needed and
    /// the current executable cannot be located.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, EngineError> {
        let processor = match config.search_command.clone().and_then(Self::new) {
            Some(processor) => processor,
            None => Self::worker_mode().map_err(EngineError::SearchCommand)?,
        };
        Ok(processor.with_timeout(config.job_timeout()))
    }

    /// Sets the per-job timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the program that is executed.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the fixed arguments preceding the file path.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the per-job timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, item: &WorkItem) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(item.path.as_str())
            .env(PARAMETERS_ENV, item.parameters.to_json())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Keep a terminal Ctrl-C away from running searches
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

impl Processor for CommandProcessor {
    async fn process(&self, item: &WorkItem) -> Result<ResultCode, ProcessingFault> {
        let mut child = self.command(item).spawn().map_err(ProcessingFault::Spawn)?;
        debug!(path = %item.path, pid = child.id(), "Search process started");

        let status = match self.timeout {
            None => child.wait().await.map_err(ProcessingFault::Wait)?,
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status.map_err(ProcessingFault::Wait)?,
                Err(_) => {
                    if let Err(error) = child.kill().await {
                        warn!(path = %item.path, error = %error, "Failed to kill timed-out search");
                    }
                    return Err(ProcessingFault::TimedOut(limit));
                }
            },
        };

        exit_code(status)
    }
}

/// Maps a process exit status to a result code.
fn exit_code(status: ExitStatus) -> Result<ResultCode, ProcessingFault> {
    match status.code() {
        Some(code) if code >= 0 => Ok(ResultCode::new(code)),
        // Windows reports crashes as negative NTSTATUS values
        Some(code) => Err(ProcessingFault::Signalled { signal: Some(code) }),
        None => Err(ProcessingFault::Signalled {
            signal: terminating_signal(status),
        }),
    }
}

#[cfg(unix)]
fn terminating_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use frb_core::{FilePath, Parameters};
    use std::sync::Arc;

    fn item(path: &str) -> WorkItem {
        let mut map = serde_json::Map::new();
        map.insert("dm_max".to_owned(), serde_json::json!(2000));
        WorkItem::new(
            FilePath::from_absolute(Utf8PathBuf::from(path)).expect("absolute"),
            Arc::new(Parameters::new(map)),
        )
    }

    fn sh(script: &str) -> CommandProcessor {
        CommandProcessor::new(vec![
            "sh".to_owned(),
            "-c".to_owned(),
            script.to_owned(),
            "frb-search".to_owned(),
        ])
        .expect("non-empty argv")
    }

    #[test]
    fn test_empty_argv_is_rejected() {
        assert!(CommandProcessor::new(Vec::new()).is_none());
    }

    #[test]
    fn test_from_config_uses_search_command() {
        let config = DispatchConfig {
            search_command: Some(vec!["search".to_owned(), "--fast".to_owned()]),
            job_timeout_secs: Some(30),
            ..DispatchConfig::default()
        };
        let processor = CommandProcessor::from_config(&config).expect("processor");

        assert_eq!(processor.program(), "search");
        assert_eq!(processor.args(), ["--fast"]);
        assert_eq!(processor.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_config_defaults_to_worker_mode() {
        let processor =
            CommandProcessor::from_config(&DispatchConfig::default()).expect("processor");
        assert_eq!(processor.args(), [WORKER_FLAG]);
        assert!(processor.timeout().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_is_result_code() {
        let code = sh("exit 3").process(&item("/data/a.raw")).await.expect("ran");
        assert_eq!(code, ResultCode::new(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_path_is_last_argument_and_parameters_in_env() {
        let processor = sh(&format!(
            r#"[ "$1" = /data/a.raw ] && case "${PARAMETERS_ENV}" in *'"dm_max":2000'*) exit 0;; esac; exit 9"#
        ));
        let code = processor.process(&item("/data/a.raw")).await.expect("ran");
        assert_eq!(code, ResultCode::SUCCESS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_death_is_a_fault() {
        let fault = sh("kill -9 $$")
            .process(&item("/data/a.raw"))
            .await
            .expect_err("killed");
        assert!(matches!(fault, ProcessingFault::Signalled { signal: Some(9) }));
        assert_eq!(fault.code(), ResultCode::SIGNALLED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_the_job() {
        let processor = sh("sleep 10").with_timeout(Some(Duration::from_millis(100)));
        let fault = processor
            .process(&item("/data/a.raw"))
            .await
            .expect_err("timed out");
        assert_eq!(fault.code(), ResultCode::TIMED_OUT);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_fault() {
        let processor =
            CommandProcessor::new(vec!["/nonexistent/frb/search".to_owned()]).expect("argv");
        let fault = processor
            .process(&item("/data/a.raw"))
            .await
            .expect_err("spawn fails");
        assert_eq!(fault.code(), ResultCode::SPAWN_FAILED);
    }
}
