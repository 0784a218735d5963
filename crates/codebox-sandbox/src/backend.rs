//! The execution backend contract and shared process supervision.
//!
//! A [`Backend`] turns a prepared workspace into captured output. The
//! orchestrator owns everything else: workspace lifecycle, code wrapping,
//! artifact packaging, and the timeout result shape. Backends only report
//! whether the deadline fired; they never fabricate the sentinel result
//! themselves.

use crate::container::{ContainerBackend, ContainerRuntime};
use crate::local::LocalBackend;
use async_trait::async_trait;
use codebox_core::{BackendKind, Error, Language, LanguageSpec, ResourceLimits, Result, Settings};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// How long to wait, after a deadline expiry, for the process to die and
/// its output pipes to drain before giving up on partial output.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Captured output of one backend invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Captured standard output, possibly partial on timeout.
    pub stdout: String,
    /// Captured standard error, possibly partial on timeout.
    pub stderr: String,
    /// Process exit status. Meaningless when `timed_out` is set.
    pub exit_code: i32,
    /// Whether the wall-clock deadline fired before the process exited.
    pub timed_out: bool,
}

/// Executes prepared workspaces.
///
/// Implementations are stateless across runs; all per-run inputs arrive
/// through the arguments.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable identifier for logs.
    fn name(&self) -> &'static str;

    /// Runs the language's configured command against `workdir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] when the invocation itself fails, e.g.
    /// the runtime binary is missing. A non-zero exit status of the
    /// executed code is not an error; it is reported in the outcome.
    async fn run(
        &self,
        workdir: &Path,
        language: Language,
        spec: &LanguageSpec,
        limits: &ResourceLimits,
    ) -> Result<RunOutcome>;
}

/// Builds the backend selected by the settings.
///
/// # Errors
///
/// Returns [`Error::Config`] when the local backend is selected without
/// its explicit opt-in.
pub fn for_settings(settings: &Settings) -> Result<Box<dyn Backend>> {
    match settings.sandbox.backend {
        BackendKind::Docker => Ok(Box::new(ContainerBackend::new(ContainerRuntime::Docker))),
        BackendKind::Podman => Ok(Box::new(ContainerBackend::new(ContainerRuntime::Podman))),
        BackendKind::Local => {
            if !settings.sandbox.allow_local_backend {
                return Err(Error::Config {
                    message: "local backend requires sandbox.allow_local_backend".to_string(),
                });
            }
            Ok(Box::new(LocalBackend::new()))
        }
    }
}

/// Spawns `command`, enforces the deadline, and captures both streams.
///
/// On expiry the child is killed, `cleanup` (if any) gets a bounded
/// chance to run, and whatever output was produced before the kill is
/// salvaged with a bounded drain. The caller receives `timed_out = true`
/// rather than an error.
pub(crate) async fn run_with_deadline(
    mut command: Command,
    deadline: Duration,
    cleanup: Option<Command>,
) -> Result<RunOutcome> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| Error::Backend {
        message: format!("failed to spawn backend process: {e}"),
        source: Some(Box::new(e)),
    })?;

    let (stdout_buf, stdout_task) = spawn_reader(child.stdout.take());
    let (stderr_buf, stderr_task) = spawn_reader(child.stderr.take());

    match tokio::time::timeout(deadline, child.wait()).await {
        Ok(status) => {
            let status = status.map_err(|e| Error::Backend {
                message: format!("failed to wait for backend process: {e}"),
                source: Some(Box::new(e)),
            })?;
            // A grandchild that inherited the pipes can hold them open
            // after the child exits; bound the drain here the same as
            // on the timeout path.
            let _ = tokio::time::timeout(KILL_GRACE, stdout_task).await;
            let _ = tokio::time::timeout(KILL_GRACE, stderr_task).await;
            Ok(RunOutcome {
                stdout: take_text(&stdout_buf),
                stderr: take_text(&stderr_buf),
                exit_code: status.code().unwrap_or(-1),
                timed_out: false,
            })
        }
        Err(_) => {
            tracing::warn!(deadline_secs = deadline.as_secs(), "execution deadline expired");
            // Kill first, then let runtime-specific cleanup (container
            // stop) reap anything the kill cannot reach.
            let _ = child.start_kill();
            if let Some(mut stop) = cleanup {
                // The cleanup runtime must not write to the inherited
                // stdio; stdout carries the protocol stream.
                stop.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
                let _ = tokio::time::timeout(KILL_GRACE, stop.status()).await;
            }
            let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;

            // Orphaned grandchildren can keep the pipes open past the
            // kill, so wait a bounded time for EOF and then take
            // whatever was read.
            let _ = tokio::time::timeout(KILL_GRACE, stdout_task).await;
            let _ = tokio::time::timeout(KILL_GRACE, stderr_task).await;
            Ok(RunOutcome {
                stdout: take_text(&stdout_buf),
                stderr: take_text(&stderr_buf),
                exit_code: -1,
                timed_out: true,
            })
        }
    }
}

type SharedBuf = Arc<Mutex<Vec<u8>>>;

/// Starts a task that streams a pipe into a shared buffer, so partial
/// output is available even when the reader never reaches EOF.
fn spawn_reader<R>(pipe: Option<R>) -> (SharedBuf, tokio::task::JoinHandle<()>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let buf: SharedBuf = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&buf);
    let task = tokio::spawn(async move {
        let Some(mut pipe) = pipe else { return };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut guard) = shared.lock() {
                        guard.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    });
    (buf, task)
}

fn take_text(buf: &SharedBuf) -> String {
    match buf.lock() {
        Ok(mut guard) => String::from_utf8_lossy(&std::mem::take(&mut *guard)).into_owned(),
        Err(_) => String::new(),
    }
}
