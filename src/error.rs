//! Error types for remux-dl
//!
//! Two layers of errors exist:
//! - [`Error`] is returned from API calls (starting, cancelling, looking up jobs).
//! - [`ProcessFailure`] describes how a supervised ffmpeg run ended badly. It is never
//!   returned from the progress stream; it is folded into the job's
//!   [`DownloadStatus`](crate::types::DownloadStatus) so consumers keep draining until
//!   the terminal snapshot.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for remux-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for remux-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// The transcoding binary could not be started (not found, permission denied, ...)
    #[error("failed to launch {}: {source}", binary.display())]
    Launch {
        /// Binary that was being executed
        binary: PathBuf,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// A job with the same name is already active
    #[error("duplicate download: {0}")]
    Duplicate(String),

    /// No active job with this name
    #[error("download not found: {0}")]
    NotFound(String),

    /// Output name is empty or would escape the output directory
    #[error("invalid output name: {0:?}")]
    InvalidName(String),

    /// The job was already started once; jobs are not restartable
    #[error("download already started: {0}")]
    AlreadyStarted(String),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Required external tool could not be located
    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abnormal end of a supervised process
///
/// Captured onto the job status instead of being propagated.
#[derive(Debug, Error)]
pub enum ProcessFailure {
    /// Process exited with a non-zero exit code
    #[error("ffmpeg exited with code {code}")]
    ExitCode {
        /// The exit code reported by the OS
        code: i32,
    },

    /// Process was killed by a signal it was not sent by us
    #[error("ffmpeg was killed by signal {signal}")]
    Signal {
        /// Signal number
        signal: i32,
    },

    /// Waiting for the process failed
    #[error("failed to wait for ffmpeg: {0}")]
    Wait(#[from] std::io::Error),

    /// The task monitoring the process died before the run ended
    #[error("ffmpeg monitoring failed: {0}")]
    Monitor(String),

    /// Process ended unsuccessfully without an exit code or signal
    #[error("ffmpeg exited unsuccessfully")]
    Unknown,
}

impl ProcessFailure {
    /// Classify a non-successful exit status
    pub fn from_exit_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::ExitCode { code };
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal { signal };
            }
        }

        Self::Unknown
    }

    /// Exit code, when the process exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitCode { code } => Some(*code),
            _ => None,
        }
    }
}
