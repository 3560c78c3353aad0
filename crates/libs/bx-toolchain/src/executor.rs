//! Running a built program as an isolated child process.

use async_trait::async_trait;
use bx_io::runner::{RunEvent, RunExit, Runner};
use tokio::{
    sync::mpsc::{self, UnboundedSender},
    time::Instant,
};
use tracing::{error, info};

use crate::{
    partition::BuildPartition,
    results::{BuildResult, ExecuteFailure, ExecuteResult},
};

/// Arguments that keep an engine player headless and logging to stdout.
pub const PLAYER_ARGS: [&str; 4] = ["-batchmode", "-nographics", "-logFile", "-"];

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the built program once, bounded by the partition's timeout.
    ///
    /// Every output line is forwarded to `events` as it arrives, so structured
    /// result lines can be consumed before the process exits.
    async fn execute(
        &self,
        build: &BuildResult,
        partition: &BuildPartition,
        events: Option<UnboundedSender<RunEvent>>,
    ) -> ExecuteResult;
}

/// Launches the executable directly, with a fixed argument list.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    args: Vec<String>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Executor for players built by an engine editor.
    pub fn player() -> Self {
        Self::with_args(PLAYER_ARGS)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(
        &self,
        build: &BuildResult,
        partition: &BuildPartition,
        events: Option<UnboundedSender<RunEvent>>,
    ) -> ExecuteResult {
        if !build.is_build_success() {
            return ExecuteResult::failed(ExecuteFailure::NotBuilt);
        }
        let paths = build.artifacts_paths();
        let runner = Runner::new(&paths.executable_path, self.args.clone())
            .current_dir(&paths.build_artifacts_directory);
        let timeout = partition.timeout();
        info!("Executing {}", runner.get_full_command());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let collect = async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            while let Some(event) = rx.recv().await {
                match &event {
                    RunEvent::ProcessNewOutputLine(line) => stdout.push(line.clone()),
                    RunEvent::ProcessNewErrorLine(line) => stderr.push(line.clone()),
                    _ => {}
                }
                if let Some(events) = &events {
                    let _ = events.send(event);
                }
            }
            (stdout, stderr)
        };

        let started = Instant::now();
        let (exit, (stdout, stderr)) = tokio::join!(runner.run(tx, started + timeout), collect);
        let elapsed = started.elapsed();

        let mut result = ExecuteResult {
            exit_code: None,
            stdout,
            stderr,
            elapsed,
            failure: None,
        };
        match exit {
            Ok(RunExit::TimedOut) => {
                error!("Execution of {} killed after {timeout:?}", partition.id());
                result.failure = Some(ExecuteFailure::Timeout(timeout));
            }
            Ok(RunExit::Exited(status)) => {
                result.exit_code = status.code();
                if !status.success() {
                    error!("Execution of {} failed: {status}", partition.id());
                    result.failure = Some(ExecuteFailure::Faulted(status.code()));
                } else {
                    info!("Execution of {} finished in {elapsed:?}", partition.id());
                }
            }
            Err(err) => {
                error!("Failed to launch {}: {err}", paths.executable_path.display());
                result.failure = Some(ExecuteFailure::Launch(err.to_string()));
            }
        }
        result
    }
}
