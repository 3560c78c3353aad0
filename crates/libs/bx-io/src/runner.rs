//! High-level process runner with event handling.

use std::{
    path::PathBuf,
    process::ExitStatus,
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
    time::Instant,
};
use tracing::debug;

use crate::process::{ProcessError, spawn_process, wait_child};

/// How long stream readers may keep draining after the child is gone.
/// A grandchild that inherited the pipes can otherwise keep them open forever.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Events emitted during process execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Process creation failed with error message.
    ProcessCreationFailed(String),
    /// Process was successfully created.
    ProcessCreated,
    /// Process ended (true = success, false = failure or killed).
    ProcessEnd(bool),
    /// New line on the process stdout.
    ProcessNewOutputLine(String),
    /// New line on the process stderr.
    ProcessNewErrorLine(String),
}

/// How a supervised process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The deadline passed and the process was killed.
    TimedOut,
}

impl RunExit {
    /// Whether the process exited on its own with a zero status.
    pub fn success(&self) -> bool {
        matches!(self, RunExit::Exited(status) if status.success())
    }

    /// Exit code, if the process exited on its own and was not signalled.
    pub fn code(&self) -> Option<i32> {
        match self {
            RunExit::Exited(status) => status.code(),
            RunExit::TimedOut => None,
        }
    }
}

/// Everything a finished process printed, in arrival order.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// How the process finished.
    pub exit: RunExit,
    /// Stdout lines.
    pub stdout: Vec<String>,
    /// Stderr lines.
    pub stderr: Vec<String>,
    /// Stdout and stderr lines interleaved as they were received.
    pub lines: Vec<String>,
}

/// High-level process runner with event-driven output handling.
#[derive(Debug, Clone)]
pub struct Runner {
    /// Command to execute.
    command: PathBuf,
    /// Command line arguments.
    args: Vec<String>,
    /// Working directory, inherited when unset.
    current_dir: Option<PathBuf>,
    /// Extra environment variables.
    envs: Vec<(String, String)>,
}

impl Runner {
    /// Create a new runner with command and arguments.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bx_io::runner::Runner;
    ///
    /// let runner = Runner::new("ls", vec!["-la", "/tmp"]);
    /// ```
    pub fn new(command: impl Into<PathBuf>, args: Vec<impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(|a| a.into()).collect(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// Create a new runner with just a command (no arguments).
    pub fn new_without_args(command: impl Into<PathBuf>) -> Self {
        Self::new(command, Vec::<String>::new())
    }

    /// Run the process from `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add an environment variable for the process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Get the full command string with arguments.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bx_io::runner::Runner;
    ///
    /// let runner = Runner::new("ls", vec!["-la"]);
    /// assert_eq!(runner.get_full_command(), "ls -la");
    /// ```
    pub fn get_full_command(&self) -> String {
        if self.args.is_empty() {
            return self.command.display().to_string();
        }
        format!("{} {}", self.command.display(), self.args.join(" "))
    }

    async fn read_stream<T>(stream: T, tx: UnboundedSender<RunEvent>, wrap: fn(String) -> RunEvent)
    where
        T: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(stream);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    // Keep draining even if nobody listens so the child never blocks on a full pipe
                    let _ = tx.send(wrap(line));
                }
                Err(err) => {
                    debug!("Stopped reading process stream - {err}");
                    break;
                }
            }
        }
    }

    fn launch_stream_reader<T>(
        stream: T,
        tx: UnboundedSender<RunEvent>,
        wrap: fn(String) -> RunEvent,
    ) -> JoinHandle<()>
    where
        T: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(Runner::read_stream(stream, tx, wrap))
    }

    async fn join_stream_reader(handle: JoinHandle<()>) {
        let abort = handle.abort_handle();
        if tokio::time::timeout(READER_GRACE, handle).await.is_err() {
            abort.abort();
        }
    }

    /// Run the process with event monitoring.
    ///
    /// Starts the process and streams its output line by line through `tx`
    /// until it exits. If it is still running at `deadline` it is killed and
    /// [`RunExit::TimedOut`] is returned.
    pub async fn run(
        &self,
        tx: UnboundedSender<RunEvent>,
        deadline: Instant,
    ) -> Result<RunExit, ProcessError> {
        let mut process = match spawn_process(
            &self.command,
            &self.args,
            self.current_dir.as_deref(),
            &self.envs,
        ) {
            Ok(process) => process,
            Err(err) => {
                let _ = tx.send(RunEvent::ProcessCreationFailed(format!("{err}")));
                return Err(ProcessError::SpawnProcessFail(err));
            }
        };

        let _ = tx.send(RunEvent::ProcessCreated);

        let stdout_reader = process.stdout.take().map(|stdout| {
            Runner::launch_stream_reader(stdout, tx.clone(), RunEvent::ProcessNewOutputLine)
        });
        let stderr_reader = process.stderr.take().map(|stderr| {
            Runner::launch_stream_reader(stderr, tx.clone(), RunEvent::ProcessNewErrorLine)
        });

        let exit = match wait_child(&mut process, deadline).await {
            Ok(status) => Ok(RunExit::Exited(status)),
            Err(ProcessError::Timeout) => Ok(RunExit::TimedOut),
            Err(err) => Err(err),
        };

        if let Some(handle) = stdout_reader {
            Runner::join_stream_reader(handle).await;
        }
        if let Some(handle) = stderr_reader {
            Runner::join_stream_reader(handle).await;
        }

        let success = matches!(&exit, Ok(exit) if exit.success());
        let _ = tx.send(RunEvent::ProcessEnd(success));
        exit
    }

    /// Run the process to completion and collect all of its output.
    pub async fn output(&self, deadline: Instant) -> Result<RunOutput, ProcessError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let exit = self.run(tx, deadline).await?;

        let mut output = RunOutput {
            exit,
            stdout: Vec::new(),
            stderr: Vec::new(),
            lines: Vec::new(),
        };
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::ProcessNewOutputLine(line) => {
                    output.lines.push(line.clone());
                    output.stdout.push(line);
                }
                RunEvent::ProcessNewErrorLine(line) => {
                    output.lines.push(line.clone());
                    output.stderr.push(line);
                }
                _ => {}
            }
        }
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod test {
    use std::future::Future;

    use ntest::timeout;

    use super::*;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Couldn't build runtime")
            .block_on(future)
    }

    fn shell(script: &str) -> Runner {
        Runner::new("sh", vec!["-c", script])
    }

    #[test]
    #[timeout(5000)]
    fn test_output_is_line_oriented() {
        let output = block_on(async {
            shell("echo one; echo two; echo three >&2")
                .output(Instant::now() + Duration::from_secs(5))
                .await
        })
        .expect("Couldn't run process");

        assert!(output.exit.success());
        assert_eq!(output.stdout, vec!["one", "two"]);
        assert_eq!(output.stderr, vec!["three"]);
        assert_eq!(output.lines.len(), 3);
    }

    #[test]
    #[timeout(5000)]
    fn test_infinite_loop_is_killed_at_deadline() {
        let started = std::time::Instant::now();
        let output = block_on(async {
            shell("while true; do :; done")
                .output(Instant::now() + Duration::from_millis(200))
                .await
        })
        .expect("Couldn't run process");

        assert_eq!(output.exit, RunExit::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    #[timeout(5000)]
    fn test_stuck_stdin_sees_eof() {
        let output = block_on(async {
            shell("read line; echo done")
                .output(Instant::now() + Duration::from_secs(3))
                .await
        })
        .expect("Couldn't run process");

        assert_eq!(output.stdout, vec!["done"]);
    }

    #[test]
    #[timeout(5000)]
    fn test_events_arrive_before_exit() {
        block_on(async {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let runner = shell("echo Hello 1; sleep 0.5; echo Hello 2; exit 3");
            let handle = tokio::spawn(async move {
                runner.run(tx, Instant::now() + Duration::from_secs(5)).await
            });

            assert_eq!(rx.recv().await, Some(RunEvent::ProcessCreated));
            assert_eq!(
                rx.recv().await,
                Some(RunEvent::ProcessNewOutputLine(String::from("Hello 1")))
            );
            assert!(!handle.is_finished());
            assert_eq!(
                rx.recv().await,
                Some(RunEvent::ProcessNewOutputLine(String::from("Hello 2")))
            );
            assert_eq!(rx.recv().await, Some(RunEvent::ProcessEnd(false)));

            let exit = handle
                .await
                .expect("Couldn't join task")
                .expect("Couldn't get exit status");
            assert_eq!(exit.code(), Some(3));
        });
    }

    #[test]
    #[timeout(5000)]
    fn test_spawn_failure_is_reported() {
        block_on(async {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let result = Runner::new_without_args("/definitely/not/a/binary")
                .run(tx, Instant::now() + Duration::from_secs(1))
                .await;

            assert!(matches!(result, Err(ProcessError::SpawnProcessFail(_))));
            assert!(matches!(
                rx.recv().await,
                Some(RunEvent::ProcessCreationFailed(_))
            ));
        });
    }

    #[test]
    fn test_full_command() {
        let runner = Runner::new("editor", vec!["-batchmode", "-quit"]);
        assert_eq!(runner.get_full_command(), "editor -batchmode -quit");
        assert_eq!(Runner::new_without_args("pwd").get_full_command(), "pwd");
    }
}
