//! Core types for remux-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Unique identifier for a job
///
/// Names identify jobs towards the user and may be reused once a job ended;
/// ids never repeat within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Allocate the next process-unique id
    pub fn next() -> Self {
        static NEXT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
        Self(NEXT.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of a download
///
/// Everything except [`Phase::InProgress`] is terminal and absorbing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// ffmpeg is running (or about to)
    #[default]
    InProgress,
    /// ffmpeg exited successfully
    Completed,
    /// Stopped on request (terminate or cancellation)
    Terminated,
    /// ffmpeg could not run or exited with an error
    Failed,
}

impl Phase {
    /// Returns true for phases no event can leave
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Upper-case label used in rendered summaries
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Terminated => "TERMINATED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured progress report parsed from ffmpeg's diagnostic output
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgressSample {
    /// Media time written so far
    pub elapsed: Duration,
    /// Output time divided by wall time (1.0 = realtime)
    pub speed: f64,
    /// Output size so far, in bytes
    pub bytes_written: u64,
}

/// Diagnostic context of a failed job
#[derive(Clone, Debug, PartialEq)]
pub struct JobFailure {
    /// Human-readable summary of what went wrong
    pub message: String,
    /// Exit code, if the process exited on its own
    pub exit_code: Option<i32>,
    /// Last non-empty diagnostic line ffmpeg printed (empty if it printed nothing)
    pub last_line: String,
    /// Captured diagnostic output (bounded, oldest lines dropped first)
    pub diagnostics: Arc<str>,
}

/// Snapshot of a job's progress
///
/// Consumers always receive owned copies; the live value is only touched by the
/// job's event pump.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DownloadStatus {
    /// Total media duration, `None` until ffmpeg reports it (never for live streams)
    pub duration: Option<Duration>,
    /// Media time reached so far
    pub elapsed: Duration,
    /// Transcoding speed multiplier
    pub speed: f64,
    /// Cumulative output size in bytes
    pub bytes_written: u64,
    /// Current lifecycle phase
    pub phase: Phase,
    /// Present only when `phase == Phase::Failed`
    pub error: Option<JobFailure>,
}

/// A change to apply to a [`DownloadStatus`]
#[derive(Clone, Debug, PartialEq)]
pub enum StatusUpdate {
    /// Total duration discovered
    Duration(Duration),
    /// Periodic progress report
    Progress(ProgressSample),
    /// Process exited successfully
    Completed,
    /// Process was stopped on request
    Terminated,
    /// Process could not run or exited with an error
    Failed(JobFailure),
}

impl DownloadStatus {
    /// Apply an update, returning whether anything changed
    ///
    /// Terminal phases absorb every update. The duration is only set once.
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        if self.phase.is_terminal() {
            return false;
        }

        match update {
            StatusUpdate::Duration(duration) => {
                if self.duration.is_some() {
                    return false;
                }
                self.duration = Some(duration);
            }
            StatusUpdate::Progress(sample) => {
                self.elapsed = sample.elapsed;
                self.speed = sample.speed;
                self.bytes_written = sample.bytes_written;
                self.phase = Phase::InProgress;
            }
            StatusUpdate::Completed => self.phase = Phase::Completed,
            StatusUpdate::Terminated => self.phase = Phase::Terminated,
            StatusUpdate::Failed(failure) => {
                self.phase = Phase::Failed;
                self.error = Some(failure);
            }
        }
        true
    }

    /// Fraction of the media processed, when the duration is known
    pub fn fraction(&self) -> Option<f64> {
        let total = self.duration?.as_secs_f64();
        if total <= 0.0 {
            return None;
        }
        Some((self.elapsed.as_secs_f64() / total).clamp(0.0, 1.0))
    }
}

/// Event emitted by the downloader
///
/// Subscribe with [`RemuxDownloader::subscribe`](crate::RemuxDownloader::subscribe).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// ffmpeg was spawned
    Started {
        /// Job name
        name: String,
        /// Full argument vector, binary first
        argv: Vec<String>,
    },

    /// Download finished successfully
    Completed {
        /// Job name
        name: String,
    },

    /// Download was stopped on request
    Terminated {
        /// Job name
        name: String,
    },

    /// Download failed
    Failed {
        /// Job name
        name: String,
        /// Error message
        error: String,
    },

    /// Job left the registry
    Removed {
        /// Job name
        name: String,
    },
}

/// Overview of an active job
#[derive(Clone, Debug)]
pub struct JobInfo {
    /// Process-unique id
    pub id: JobId,
    /// Registry key (normalized output filename)
    pub name: String,
    /// Source URL or path handed to ffmpeg
    pub source: String,
    /// Where the output is written
    pub output_path: PathBuf,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// Current status snapshot
    pub status: DownloadStatus,
}
