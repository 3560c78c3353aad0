//! Low-level async process management utilities.

use std::{
    ffi::OsStr,
    io,
    path::Path,
    process::{ExitStatus, Stdio},
};

use tokio::{
    process::{Child, Command},
    time::Instant,
};
use tracing::warn;

/// Errors that can occur during process operations.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// Failed to wait for child process.
    #[error("failed to wait for child process: {0}")]
    WaitChildFail(#[source] io::Error),
    /// Failed to spawn the process.
    #[error("failed to spawn process: {0}")]
    SpawnProcessFail(#[source] io::Error),
    /// The deadline passed and the process was killed.
    #[error("process did not exit before its deadline")]
    Timeout,
}

/// Spawn a new async process with piped stdout and stderr.
///
/// Stdin is closed so a child waiting on input sees EOF instead of hanging.
/// The child is killed if its handle is dropped, which is what lets a caller
/// abandon a future that owns it without leaking the process.
///
/// # Examples
///
/// ```rust,no_run
/// use bx_io::process::spawn_process;
///
/// #[tokio::main]
/// async fn main() {
///     let mut child = spawn_process("echo", &["Hello".to_string()], None, &[]).unwrap();
///     let output = child.stdout.take().unwrap();
/// }
/// ```
pub fn spawn_process(
    cmd: impl AsRef<OsStr>,
    args: &[String],
    current_dir: Option<&Path>,
    envs: &[(String, String)],
) -> Result<Child, io::Error> {
    let mut command = Command::new(cmd);
    command
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = current_dir {
        command.current_dir(dir);
    }
    command.spawn()
}

/// Kill a child process and reap it.
pub async fn stop_child(child: &mut Child) -> Result<(), io::Error> {
    child.kill().await
}

/// Wait for the child process to complete and return its exit status.
pub async fn capture_exit_status(child: &mut Child) -> Result<ExitStatus, io::Error> {
    child.wait().await
}

/// Wait for a child process, killing it once `deadline` passes.
///
/// Returns [`ProcessError::Timeout`] after the child has been killed and
/// reaped, never while it is still running.
///
/// # Examples
///
/// ```rust,no_run
/// use bx_io::process::{spawn_process, wait_child};
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// #[tokio::main]
/// async fn main() {
///     let mut child = spawn_process("sleep", &["1".to_string()], None, &[]).unwrap();
///     let deadline = Instant::now() + Duration::from_secs(5);
///
///     let exit_status = wait_child(&mut child, deadline).await.unwrap();
///     assert!(exit_status.success());
/// }
/// ```
pub async fn wait_child(child: &mut Child, deadline: Instant) -> Result<ExitStatus, ProcessError> {
    match tokio::time::timeout_at(deadline, capture_exit_status(child)).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(err)) => Err(ProcessError::WaitChildFail(err)),
        Err(_) => {
            if let Err(err) = stop_child(child).await {
                warn!("Failed to kill child process after deadline - {err}");
            }
            Err(ProcessError::Timeout)
        }
    }
}
