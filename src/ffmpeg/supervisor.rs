//! ffmpeg process supervision

use super::codec::DiagnosticLineCodec;
use super::observer::ProcessObserver;
use super::parser::parse_progress_line;
use crate::config::ProcessConfig;
use crate::error::{Error, ProcessFailure, Result};
use crate::utils::remove_partial_output;
use futures::StreamExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Runs ffmpeg to stream-copy a source into a local file
///
/// # Examples
///
/// ```no_run
/// use remux_dl::ffmpeg::{FfmpegSupervisor, NoOpObserver};
/// use std::path::Path;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let supervisor = FfmpegSupervisor::from_path().expect("ffmpeg not found in PATH");
///
/// let mut handle = supervisor.start(
///     "https://example.com/live/playlist.m3u8",
///     Path::new("downloads/live.mp4"),
///     Arc::new(NoOpObserver),
///     CancellationToken::new(),
/// )?;
///
/// // Later: stop it and remove the partial file
/// handle.terminate().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegSupervisor {
    binary_path: PathBuf,
    config: ProcessConfig,
}

impl FfmpegSupervisor {
    /// Create a supervisor for an explicit binary path with default process settings
    pub fn new(binary_path: PathBuf) -> Self {
        Self::with_config(binary_path, ProcessConfig::default())
    }

    /// Create a supervisor with explicit process settings
    pub fn with_config(binary_path: PathBuf, config: ProcessConfig) -> Self {
        Self {
            binary_path,
            config,
        }
    }

    /// Attempt to find ffmpeg in PATH
    ///
    /// Returns `None` if the binary is not found.
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Path of the binary this supervisor runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Process settings used for every run
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Build the argument list for copying `source` into `output` without re-encoding
    pub fn build_args(&self, source: &str, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into()];
        if self.config.overwrite {
            args.push("-y".into());
        }
        args.extend([
            "-i".into(),
            source.into(),
            "-bsf:a".into(),
            self.config.audio_bitstream_filter.clone().into(),
            "-c".into(),
            "copy".into(),
            output.as_os_str().to_owned(),
        ]);
        args
    }

    /// Spawn ffmpeg and start pumping its diagnostic output into `observer`
    ///
    /// Must be called from within a Tokio runtime. The returned handle's token is a
    /// child of `cancel`: cancelling either one stops the process the same way as
    /// [`ProcessHandle::terminate`], including the `on_terminated` callback and the
    /// removal of the partial output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the binary cannot be started.
    pub fn start(
        &self,
        source: &str,
        output: &Path,
        observer: Arc<dyn ProcessObserver>,
        cancel: CancellationToken,
    ) -> Result<ProcessHandle> {
        let args = self.build_args(source, output);

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Launch {
                binary: self.binary_path.clone(),
                source: e,
            })?;

        let pid = child.id();
        let argv: Vec<String> = std::iter::once(self.binary_path.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        tracing::debug!(pid, argv = ?argv, "Spawned ffmpeg");
        observer.on_start(&argv);

        let cancel = cancel.child_token();
        let stderr = child.stderr.take();
        let pump = tokio::spawn(supervise(
            child,
            stderr,
            observer.clone(),
            cancel.clone(),
            output.to_path_buf(),
            self.config.terminate_grace_period,
        ));
        let task = tokio::spawn(watch_pump(pump, observer, pid));

        Ok(ProcessHandle {
            pid,
            output_path: output.to_path_buf(),
            cancel,
            task: Some(task),
        })
    }
}

/// Handle to one running ffmpeg invocation
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    output_path: PathBuf,
    cancel: CancellationToken,
    task: Option<JoinHandle<bool>>,
}

impl ProcessHandle {
    /// OS process id, if it was available at spawn time
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// File ffmpeg writes to
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Token that stops this process when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the supervising task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the process and delete the partial output
    ///
    /// Sends SIGTERM, waits up to the grace period, then kills. The output file is
    /// removed once the process is gone. Returns `true` only if this call stopped a
    /// running process; `false` if it had already finished or was stopped through
    /// its token before.
    pub async fn terminate(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };

        let stopping = !task.is_finished() && !self.cancel.is_cancelled();
        if stopping {
            self.cancel.cancel();
        }
        let stopped = match task.await {
            Ok(stopped) => stopped,
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "ffmpeg supervisor task failed");
                false
            }
        };
        stopping && stopped
    }

    /// Wait until the supervising task has finished
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(pid = self.pid, error = %e, "ffmpeg supervisor task failed");
        }
    }
}

/// Reports a crashed event pump as a failed run
///
/// The child is killed when the pump's future is dropped.
async fn watch_pump(
    pump: JoinHandle<bool>,
    observer: Arc<dyn ProcessObserver>,
    pid: Option<u32>,
) -> bool {
    match pump.await {
        Ok(stopped) => stopped,
        Err(e) => {
            tracing::error!(pid, error = %e, "ffmpeg event pump ended abnormally");
            observer.on_failed(ProcessFailure::Monitor(e.to_string()));
            false
        }
    }
}

/// Event pump: forwards diagnostics, then reports how the run ended
///
/// Returns true if the process was stopped through cancellation.
async fn supervise(
    mut child: Child,
    stderr: Option<tokio::process::ChildStderr>,
    observer: Arc<dyn ProcessObserver>,
    cancel: CancellationToken,
    output_path: PathBuf,
    grace_period: Duration,
) -> bool {
    let pid = child.id();

    if let Some(stderr) = stderr {
        let mut lines = FramedRead::new(stderr, DiagnosticLineCodec::new());
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stop(&mut child, &*observer, &output_path, grace_period).await;
                    return true;
                }
                line = lines.next() => match line {
                    Some(Ok(line)) => {
                        observer.on_diagnostic_line(&line);
                        if let Some(sample) = parse_progress_line(&line) {
                            observer.on_progress(&sample);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(pid, error = %e, "Failed to read ffmpeg diagnostics");
                        break;
                    }
                    None => break,
                },
            }
        }
    }

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            stop(&mut child, &*observer, &output_path, grace_period).await;
            return true;
        }
        status = child.wait() => status,
    };

    match status {
        Ok(status) if status.success() => {
            tracing::debug!(pid, "ffmpeg exited successfully");
            observer.on_completed();
        }
        Ok(status) => observer.on_failed(ProcessFailure::from_exit_status(status)),
        Err(e) => observer.on_failed(ProcessFailure::Wait(e)),
    }
    false
}

/// Shared path for explicit termination and cooperative cancellation
async fn stop(
    child: &mut Child,
    observer: &dyn ProcessObserver,
    output_path: &Path,
    grace_period: Duration,
) {
    let pid = child.id();
    signal_terminate(child);
    observer.on_terminated();

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(Ok(status)) => tracing::debug!(pid, %status, "ffmpeg stopped"),
        Ok(Err(e)) => tracing::warn!(pid, error = %e, "Failed to wait for ffmpeg to stop"),
        Err(_) => {
            tracing::warn!(
                pid,
                grace_secs = grace_period.as_secs(),
                "ffmpeg ignored SIGTERM, killing"
            );
            if let Err(e) = child.kill().await {
                tracing::warn!(pid, error = %e, "Failed to kill ffmpeg");
            }
        }
    }

    remove_partial_output(output_path).await;
}

/// Ask the process to exit, letting ffmpeg finalize what it can
#[cfg(unix)]
fn signal_terminate(child: &mut Child) {
    let Some(pid) = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        // Already reaped
        return;
    };

    // SAFETY: `pid` is our own unreaped child, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        let e = std::io::Error::last_os_error();
        tracing::warn!(pid, error = %e, "Failed to send SIGTERM, killing");
        if let Err(e) = child.start_kill() {
            tracing::warn!(pid, error = %e, "Failed to kill ffmpeg");
        }
    }
}

#[cfg(not(unix))]
fn signal_terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to kill ffmpeg");
    }
}
