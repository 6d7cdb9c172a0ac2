//! Text rendering of download status for chat front-ends
//!
//! Everything here is pure formatting; nothing touches a job.
//!
//! ```
//! use remux_dl::render::progress_bar;
//! use std::time::Duration;
//!
//! let bar = progress_bar(Duration::from_secs(75), Duration::from_secs(150), 10);
//! assert_eq!(bar, "[█████░░░░░] 50.00%");
//! ```

use crate::types::{DownloadStatus, JobFailure, Phase};
use std::fmt;
use std::time::Duration;

/// Width of the bar in [`render_status`]
pub const DEFAULT_BAR_WIDTH: usize = 20;

/// File name of the diagnostic attachment in a [`FailureReport`]
pub const DIAGNOSTICS_FILENAME: &str = "stderr.txt";

/// Textual progress bar with a percentage, e.g. `[█████░░░░░] 50.00%`
///
/// The fraction `elapsed / duration` is clamped to `[0, 1]`; a zero duration renders
/// as empty.
pub fn progress_bar(elapsed: Duration, duration: Duration, width: usize) -> String {
    let fraction = if duration.is_zero() {
        0.0
    } else {
        (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
    };

    let filled = ((fraction * width as f64).round() as usize).min(width);
    let empty = width - filled;

    format!(
        "[{}{}] {:.2}%",
        "█".repeat(filled),
        "░".repeat(empty),
        fraction * 100.0
    )
}

/// Format as `H:MM:SS`
pub fn format_hms(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

/// Bytes as decimal megabytes rounded to 2 places, e.g. `5.0MB` or `12.35MB`
pub fn format_megabytes(bytes: u64) -> String {
    let megabytes = (bytes as f64 / 1_000_000.0 * 100.0).round() / 100.0;
    format!("{}MB", format_decimal(megabytes))
}

// Shortest representation, but always with a fractional part ("1.0", "1.25")
fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

impl fmt::Display for DownloadStatus {
    /// Summary block:
    ///
    /// ```text
    /// Duration: 0:02:30
    /// Status: IN_PROGRESS
    /// Time: 0:01:15
    /// Speed: 1.0x
    /// Size: 5.0MB
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration {
            Some(duration) => writeln!(f, "Duration: {}", format_hms(duration))?,
            None => writeln!(f, "Duration: N/A")?,
        }
        writeln!(f, "Status: {}", self.phase)?;
        writeln!(f, "Time: {}", format_hms(self.elapsed))?;
        writeln!(f, "Speed: {}x", format_decimal(self.speed))?;
        write!(f, "Size: {}", format_megabytes(self.bytes_written))
    }
}

/// Fenced text block for a status message
///
/// Includes a progress bar only when the duration is known.
pub fn render_status(status: &DownloadStatus) -> String {
    let mut out = String::from("```\n");
    if let Some(duration) = status.duration.filter(|d| !d.is_zero()) {
        out.push_str("Progress:\n");
        out.push_str(&progress_bar(status.elapsed, duration, DEFAULT_BAR_WIDTH));
        out.push('\n');
    }
    out.push_str(&status.to_string());
    out.push_str("\n```");
    out
}

/// A file to upload along with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Suggested file name
    pub filename: String,
    /// File contents
    pub data: Vec<u8>,
}

/// Rendered failure: a short message plus the full diagnostics as an attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Error summary and the last diagnostic line, fenced
    pub content: String,
    /// Full captured diagnostic output
    pub attachment: Attachment,
}

/// Render a failed job for display
pub fn render_failure(failure: &JobFailure) -> FailureReport {
    let last_line = if failure.last_line.is_empty() {
        "(no output)"
    } else {
        failure.last_line.as_str()
    };

    FailureReport {
        content: format!(
            "```\n{}\nLast line of stderr:\n{}\n```",
            failure.message, last_line
        ),
        attachment: Attachment {
            filename: DIAGNOSTICS_FILENAME.to_string(),
            data: failure.diagnostics.as_bytes().to_vec(),
        },
    }
}

/// What a front-end should show for one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Regular status block
    Status(String),
    /// Failure message with diagnostics attachment
    Failure(FailureReport),
}

/// Pick the rendering for a snapshot: failure report when failed, status block otherwise
pub fn render(status: &DownloadStatus) -> Rendered {
    match (&status.phase, &status.error) {
        (Phase::Failed, Some(failure)) => Rendered::Failure(render_failure(failure)),
        _ => Rendered::Status(render_status(status)),
    }
}

/// Acknowledgement for a successful cancel
pub fn render_cancelled() -> &'static str {
    "Download cancelled"
}

/// Reply when no job has the requested name
pub fn render_not_found() -> &'static str {
    "No such download"
}

/// Reply when a job with the requested name is already running
pub fn render_duplicate() -> &'static str {
    "Already downloading"
}
