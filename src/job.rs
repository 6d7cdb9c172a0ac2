//! A single supervised download

use crate::error::{Error, Result};
use crate::ffmpeg::{FfmpegSupervisor, ProcessHandle, ProcessObserver};
use crate::progress::{ProgressStream, StatusTracker};
use crate::types::{DownloadStatus, Event, JobId, JobInfo, StatusUpdate};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

/// One download: a source, an output path, a poll interval and exactly one status
///
/// A job runs at most once. Create a new job to retry.
///
/// # Examples
///
/// ```no_run
/// use remux_dl::DownloadJob;
/// use remux_dl::ffmpeg::FfmpegSupervisor;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> remux_dl::Result<()> {
/// let supervisor = FfmpegSupervisor::from_path().expect("ffmpeg not found");
/// let job = DownloadJob::new(
///     supervisor,
///     "https://example.com/stream.m3u8",
///     PathBuf::from("downloads/stream.mp4"),
///     Duration::from_secs(3),
/// );
///
/// let mut progress = job.start().await?;
/// while let Some(status) = progress.next().await {
///     println!("{status}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct DownloadJob {
    id: JobId,
    name: String,
    source: String,
    output_path: PathBuf,
    poll_interval: Duration,
    created_at: DateTime<Utc>,
    supervisor: FfmpegSupervisor,
    tracker: Arc<StatusTracker>,
    cancel: CancellationToken,
    handle: Mutex<Option<ProcessHandle>>,
    started: AtomicBool,
}

impl DownloadJob {
    /// Create a job; nothing runs until [`start`](Self::start)
    ///
    /// The job's name is the file name of `output_path`.
    pub fn new(
        supervisor: FfmpegSupervisor,
        source: impl Into<String>,
        output_path: PathBuf,
        poll_interval: Duration,
    ) -> Self {
        let name = output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| output_path.display().to_string());
        let tracker = StatusTracker::new(
            name.clone(),
            supervisor.config().max_diagnostic_bytes,
            None,
        );

        Self {
            id: JobId::next(),
            name,
            source: source.into(),
            output_path,
            poll_interval,
            created_at: Utc::now(),
            supervisor,
            tracker: Arc::new(tracker),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Stop the job whenever `parent` is cancelled
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Publish lifecycle events on `events`
    pub(crate) fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.tracker = Arc::new(StatusTracker::new(
            self.name.clone(),
            self.supervisor.config().max_diagnostic_bytes,
            Some(events),
        ));
        self
    }

    /// Process-unique id
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Job name (output file name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source URL or path
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Output file path
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Interval between progress snapshots
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Token that stops this job when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Owned copy of the current status
    pub fn status(&self) -> DownloadStatus {
        self.tracker.snapshot()
    }

    /// Captured diagnostic output so far
    pub fn diagnostics(&self) -> String {
        self.tracker.diagnostics()
    }

    /// Whether [`start`](Self::start) was called
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Overview of this job
    pub fn info(&self) -> JobInfo {
        JobInfo {
            id: self.id,
            name: self.name.clone(),
            source: self.source.clone(),
            output_path: self.output_path.clone(),
            created_at: self.created_at,
            status: self.status(),
        }
    }

    /// Spawn ffmpeg and return the progress stream
    ///
    /// Dropping the returned stream before it ended cancels the job.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] on a second call
    /// - [`Error::Launch`] if ffmpeg cannot be spawned; the status is then `Failed`
    /// - [`Error::Io`] if the output directory cannot be created
    pub async fn start(&self) -> Result<ProgressStream> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted(self.name.clone()));
        }

        let mut slot = self.handle.lock().await;

        if self.cancel.is_cancelled() {
            tracing::debug!(job = %self.name, "Job cancelled before start");
            self.tracker.update(StatusUpdate::Terminated);
            return Ok(self.progress());
        }

        if let Some(parent) = self.output_path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            let e = Error::Io(e);
            self.tracker.fail_launch(&e);
            return Err(e);
        }

        let observer: Arc<dyn ProcessObserver> = self.tracker.clone();
        match self
            .supervisor
            .start(&self.source, &self.output_path, observer, self.cancel.clone())
        {
            Ok(handle) => {
                tracing::debug!(job = %self.name, pid = handle.pid(), "Job started");
                *slot = Some(handle);
            }
            Err(e) => {
                self.tracker.fail_launch(&e);
                return Err(e);
            }
        }

        Ok(self.progress().cancel_on_drop())
    }

    /// An additional reader of this job's status
    ///
    /// Unlike the stream returned by [`start`](Self::start), dropping it has no
    /// effect on the job.
    pub fn progress(&self) -> ProgressStream {
        ProgressStream::new(
            self.tracker.subscribe(),
            self.poll_interval,
            self.cancel.clone(),
        )
    }

    /// Stop the process and remove the partial output
    ///
    /// Returns `true` if a running process was stopped, `false` if there was nothing
    /// to cancel (not started, already finished, or cancelled before). Returns only
    /// after the process is gone and the output was removed.
    pub async fn cancel(&self) -> bool {
        let mut slot = self.handle.lock().await;
        let stopped = match slot.as_mut() {
            Some(handle) => handle.terminate().await,
            None => false,
        };
        self.cancel.cancel();

        if stopped {
            tracing::info!(job = %self.name, "Download cancelled");
        } else {
            tracing::debug!(job = %self.name, "Nothing to cancel");
        }
        stopped
    }

    /// Wait for the terminal status
    ///
    /// Never resolves for a job that is not started and not cancelled.
    pub async fn finished(&self) -> DownloadStatus {
        let mut status = self.tracker.subscribe();
        let terminal = match status.wait_for(|s| s.phase.is_terminal()).await {
            Ok(terminal) => terminal.clone(),
            Err(_) => self.tracker.snapshot(),
        };
        terminal
    }
}

impl std::fmt::Debug for DownloadJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadJob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.source)
            .field("output_path", &self.output_path)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
