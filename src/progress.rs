//! Push-to-pull bridge between the ffmpeg event pump and consumers
//!
//! [`StatusTracker`] is the job's single writer: it receives supervisor callbacks and
//! folds them into a [`DownloadStatus`] held in a `watch` channel. [`ProgressStream`]
//! is the reader: it samples that status once per poll interval and hands out owned
//! copies, ending after the first terminal snapshot.

use crate::downloader::RegistryLease;
use crate::error::{Error, ProcessFailure};
use crate::ffmpeg::{ProcessObserver, parse_duration_line};
use crate::types::{DownloadStatus, Event, JobFailure, ProgressSample, StatusUpdate};
use futures::Stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Bounded buffer of diagnostic lines, oldest dropped first
#[derive(Debug)]
pub(crate) struct DiagnosticCapture {
    lines: VecDeque<String>,
    bytes: usize,
    max_bytes: usize,
    last_line: String,
}

impl DiagnosticCapture {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_bytes,
            last_line: String::new(),
        }
    }

    pub(crate) fn push(&mut self, line: &str) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line.to_string());
        while self.bytes > self.max_bytes && self.lines.len() > 1 {
            if let Some(dropped) = self.lines.pop_front() {
                self.bytes -= dropped.len() + 1;
            }
        }
        self.last_line = line.to_string();
    }

    pub(crate) fn last_line(&self) -> &str {
        &self.last_line
    }

    pub(crate) fn contents(&self) -> String {
        let mut out = String::with_capacity(self.bytes);
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Observer that owns one job's [`DownloadStatus`]
pub(crate) struct StatusTracker {
    name: String,
    status: watch::Sender<DownloadStatus>,
    capture: Mutex<DiagnosticCapture>,
    events: Option<broadcast::Sender<Event>>,
}

impl StatusTracker {
    pub(crate) fn new(
        name: impl Into<String>,
        max_diagnostic_bytes: usize,
        events: Option<broadcast::Sender<Event>>,
    ) -> Self {
        let (status, _) = watch::channel(DownloadStatus::default());
        Self {
            name: name.into(),
            status,
            capture: Mutex::new(DiagnosticCapture::new(max_diagnostic_bytes)),
            events,
        }
    }

    fn capture(&self) -> std::sync::MutexGuard<'_, DiagnosticCapture> {
        self.capture.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            // No subscribers is fine
            events.send(event).ok();
        }
    }

    /// Apply an update; returns whether the status changed
    pub(crate) fn update(&self, update: StatusUpdate) -> bool {
        self.status.send_if_modified(|status| status.apply(update))
    }

    /// Owned copy of the current status
    pub(crate) fn snapshot(&self) -> DownloadStatus {
        self.status.borrow().clone()
    }

    /// Full captured diagnostic output
    pub(crate) fn diagnostics(&self) -> String {
        self.capture().contents()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DownloadStatus> {
        self.status.subscribe()
    }

    /// Record that the process never started
    pub(crate) fn fail_launch(&self, error: &Error) {
        let failure = JobFailure {
            message: error.to_string(),
            exit_code: None,
            last_line: String::new(),
            diagnostics: Arc::from(""),
        };
        if self.update(StatusUpdate::Failed(failure)) {
            tracing::error!(job = %self.name, error = %error, "Download could not start");
            self.emit(Event::Failed {
                name: self.name.clone(),
                error: error.to_string(),
            });
        }
    }
}

impl ProcessObserver for StatusTracker {
    fn on_start(&self, argv: &[String]) {
        tracing::info!(job = %self.name, argv = ?argv, "Download started");
        self.emit(Event::Started {
            name: self.name.clone(),
            argv: argv.to_vec(),
        });
    }

    fn on_diagnostic_line(&self, line: &str) {
        tracing::debug!(job = %self.name, "stderr: {}", line);
        self.capture().push(line);

        if let Some(duration) = parse_duration_line(line) {
            self.update(StatusUpdate::Duration(duration));
        }
    }

    fn on_progress(&self, sample: &ProgressSample) {
        self.update(StatusUpdate::Progress(*sample));
    }

    fn on_completed(&self) {
        if self.update(StatusUpdate::Completed) {
            tracing::info!(job = %self.name, "Download completed");
            self.emit(Event::Completed {
                name: self.name.clone(),
            });
        }
    }

    fn on_terminated(&self) {
        if self.update(StatusUpdate::Terminated) {
            tracing::info!(job = %self.name, "Download terminated");
            self.emit(Event::Terminated {
                name: self.name.clone(),
            });
        }
    }

    fn on_failed(&self, failure: ProcessFailure) {
        let (last_line, diagnostics) = {
            let capture = self.capture();
            (capture.last_line().to_string(), capture.contents())
        };
        let message = failure.to_string();
        let job_failure = JobFailure {
            message: message.clone(),
            exit_code: failure.exit_code(),
            last_line: last_line.clone(),
            diagnostics: Arc::from(diagnostics),
        };

        if self.update(StatusUpdate::Failed(job_failure)) {
            tracing::error!(
                job = %self.name,
                error = %failure,
                last_line = %last_line,
                "Download failed"
            );
            self.emit(Event::Failed {
                name: self.name.clone(),
                error: message,
            });
        }
    }
}

/// Lazily produced, time-throttled sequence of [`DownloadStatus`] snapshots
///
/// Each call to [`next`](Self::next) waits one poll interval (cut short when the job
/// reaches a terminal phase or is cancelled) and returns an owned snapshot. The
/// sequence ends right after the first terminal snapshot, which is always delivered.
/// Streams are not restartable; a retry needs a new job. Dropping the stream returned
/// by [`DownloadJob::start`](crate::DownloadJob::start) before it ended cancels the job.
///
/// ```no_run
/// # async fn example(downloader: remux_dl::RemuxDownloader) -> remux_dl::Result<()> {
/// let mut progress = downloader
///     .start_download("https://example.com/stream.m3u8", "stream")
///     .await?;
///
/// while let Some(status) = progress.next().await {
///     println!("{}", remux_dl::render::render_status(&status));
/// }
/// # Ok(())
/// # }
/// ```
pub struct ProgressStream {
    status: watch::Receiver<DownloadStatus>,
    poll_interval: Duration,
    cancel: CancellationToken,
    finished: bool,
    lease: Option<RegistryLease>,
    guard: Option<DropGuard>,
}

impl ProgressStream {
    pub(crate) fn new(
        status: watch::Receiver<DownloadStatus>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            status,
            poll_interval,
            cancel,
            finished: false,
            lease: None,
            guard: None,
        }
    }

    /// Cancel the job if the stream is dropped before its terminal snapshot
    pub(crate) fn cancel_on_drop(mut self) -> Self {
        self.guard = Some(self.cancel.clone().drop_guard());
        self
    }

    /// Keep `lease` alive until the terminal snapshot has been handed out
    pub(crate) fn with_lease(mut self, lease: RegistryLease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Interval between snapshots
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether the terminal snapshot has already been returned
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the next snapshot; `None` once the terminal snapshot was returned
    pub async fn next(&mut self) -> Option<DownloadStatus> {
        if self.finished {
            return None;
        }

        let mut cancelled = false;
        let mut closed = false;
        if !self.status.borrow().phase.is_terminal() {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                result = self.status.wait_for(|s| s.phase.is_terminal()) => {
                    closed = result.is_err();
                }
                _ = self.cancel.cancelled() => cancelled = true,
            }
        }

        if cancelled && !self.status.borrow().phase.is_terminal() {
            // The supervisor records Terminated right after signalling ffmpeg
            let settle = self.status.wait_for(|s| s.phase.is_terminal());
            if tokio::time::timeout(self.poll_interval, settle).await.is_err() {
                tracing::debug!("Cancelled job did not report termination in time");
            }
        }

        let mut snapshot = self.status.borrow().clone();
        if !snapshot.phase.is_terminal() && (cancelled || closed) {
            snapshot.apply(StatusUpdate::Terminated);
        }

        if snapshot.phase.is_terminal() {
            self.finished = true;
            self.lease = None;
            if let Some(guard) = self.guard.take() {
                guard.disarm();
            }
        }
        Some(snapshot)
    }

    /// Adapt into a [`futures::Stream`]
    pub fn into_stream(self) -> impl Stream<Item = DownloadStatus> + Send {
        futures::stream::unfold(self, |mut progress| async move {
            let status = progress.next().await?;
            Some((status, progress))
        })
    }
}

impl std::fmt::Debug for ProgressStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream")
            .field("poll_interval", &self.poll_interval)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
