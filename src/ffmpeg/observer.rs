//! Callbacks emitted by the process supervisor

use crate::error::ProcessFailure;
use crate::types::ProgressSample;

/// Receives lifecycle events of one supervised ffmpeg run
///
/// Callbacks are invoked from the supervisor's background task, in the order ffmpeg
/// produced the underlying output. Exactly one of [`on_completed`](Self::on_completed),
/// [`on_terminated`](Self::on_terminated) or [`on_failed`](Self::on_failed) ends every
/// run that was started. Implementations must not block.
pub trait ProcessObserver: Send + Sync {
    /// The process was spawned with this argument vector (binary first)
    fn on_start(&self, _argv: &[String]) {}

    /// A line of diagnostic output (stderr), progress lines included
    fn on_diagnostic_line(&self, _line: &str) {}

    /// A progress report was parsed from the diagnostic output
    fn on_progress(&self, _sample: &ProgressSample) {}

    /// The process exited successfully
    fn on_completed(&self) {}

    /// The process was stopped through termination or cancellation
    fn on_terminated(&self) {}

    /// The process exited with an error
    fn on_failed(&self, _failure: ProcessFailure) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl ProcessObserver for NoOpObserver {}
