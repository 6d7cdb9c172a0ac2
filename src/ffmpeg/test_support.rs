//! Fake ffmpeg binaries and a recording observer for tests.
//!
//! The fakes are `/bin/sh` scripts that ignore their options, print ffmpeg-like
//! diagnostics to stderr and write to the last argument (the output path).

use super::{FfmpegSupervisor, ProcessObserver};
use crate::error::ProcessFailure;
use crate::types::ProgressSample;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

const DURATION_LINE: &str =
    "  Duration: 00:02:30.00, start: 0.000000, bitrate: 500 kb/s";

/// A fake ffmpeg script living in its own temp directory
pub(crate) struct FakeFfmpeg {
    dir: TempDir,
    binary: PathBuf,
}

impl FakeFfmpeg {
    /// Write a script whose body runs after `$last` is set to the output path
    pub(crate) fn with_body(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("ffmpeg");
        let script = format!("#!/bin/sh\nfor last; do :; done\n{body}\n");
        std::fs::write(&binary, script).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        Self { dir, binary }
    }

    /// Reports a duration and two progress samples, writes the output, exits 0
    pub(crate) fn completing() -> Self {
        Self::with_body(&format!(
            "printf 'Input #0, mpegts, from in.ts:\\n' >&2\n\
             printf '{DURATION_LINE}\\n' >&2\n\
             printf 'size=    4883kB time=00:01:15.00 bitrate= 533.3kbits/s speed=1.0x\\r' >&2\n\
             printf 'data' > \"$last\"\n\
             printf 'size=    9766kB time=00:02:30.00 bitrate= 533.3kbits/s speed=1.0x\\n' >&2\n\
             exit 0"
        ))
    }

    /// A live source: no duration is ever reported
    pub(crate) fn live() -> Self {
        Self::with_body(
            "printf '  Duration: N/A, start: 1.400000, bitrate: N/A\\n' >&2\n\
             printf 'size=     512kB time=00:00:32.00 bitrate= 129.0kbits/s speed=1.0x\\n' >&2\n\
             printf 'data' > \"$last\"\n\
             exit 0",
        )
    }

    /// Makes some progress, then fails with `code`
    pub(crate) fn failing(code: i32) -> Self {
        Self::with_body(&format!(
            "printf '{DURATION_LINE}\\n' >&2\n\
             printf 'size=    1024kB time=00:00:10.00 bitrate= 533.3kbits/s speed=1.0x\\r' >&2\n\
             printf 'https://example.com/seg2.ts: Connection refused\\n' >&2\n\
             exit {code}"
        ))
    }

    /// Writes a partial output, reports progress, then blocks until signalled
    pub(crate) fn hanging() -> Self {
        Self::with_body(&format!(
            "printf '{DURATION_LINE}\\n' >&2\n\
             printf 'partial' > \"$last\"\n\
             printf 'size=    1024kB time=00:00:10.00 bitrate= 533.3kbits/s speed=1.0x\\r' >&2\n\
             exec sleep 30"
        ))
    }

    /// Like [`hanging`](Self::hanging), but SIGTERM is ignored
    pub(crate) fn ignoring_sigterm() -> Self {
        Self::with_body(&format!(
            "trap '' TERM\n\
             printf '{DURATION_LINE}\\n' >&2\n\
             printf 'partial' > \"$last\"\n\
             printf 'size=    1024kB time=00:00:10.00 bitrate= 533.3kbits/s speed=1.0x\\r' >&2\n\
             exec sleep 30"
        ))
    }

    pub(crate) fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn binary(&self) -> &Path {
        &self.binary
    }

    pub(crate) fn supervisor(&self) -> FfmpegSupervisor {
        FfmpegSupervisor::new(self.binary.clone())
    }
}

/// Everything a [`RecordingObserver`] saw
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Recorded {
    Start(Vec<String>),
    Line(String),
    Progress(ProgressSample),
    Completed,
    Terminated,
    Failed(Option<i32>),
}

/// Observer that keeps every callback for later assertions
#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<Recorded>>,
    changed: Notify,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
        self.changed.notify_waiters();
    }

    async fn wait_until(&self, what: &str, done: impl Fn(&[Recorded]) -> bool) {
        let wait = async {
            loop {
                let changed = self.changed.notified();
                if done(&self.events.lock().unwrap()) {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
    }

    /// Wait for a diagnostic line containing `needle`
    pub(crate) async fn wait_for_line(&self, needle: &str) {
        self.wait_until(needle, |events| {
            events
                .iter()
                .any(|e| matches!(e, Recorded::Line(line) if line.contains(needle)))
        })
        .await;
    }

    /// Wait for the run to end one way or another
    pub(crate) async fn wait_until_finished(&self) {
        self.wait_until("run to finish", |events| {
            events.iter().any(|e| {
                matches!(
                    e,
                    Recorded::Completed | Recorded::Terminated | Recorded::Failed(_)
                )
            })
        })
        .await;
    }
}

impl ProcessObserver for RecordingObserver {
    fn on_start(&self, argv: &[String]) {
        self.push(Recorded::Start(argv.to_vec()));
    }

    fn on_diagnostic_line(&self, line: &str) {
        self.push(Recorded::Line(line.to_string()));
    }

    fn on_progress(&self, sample: &ProgressSample) {
        self.push(Recorded::Progress(*sample));
    }

    fn on_completed(&self) {
        self.push(Recorded::Completed);
    }

    fn on_terminated(&self) {
        self.push(Recorded::Terminated);
    }

    fn on_failed(&self, failure: ProcessFailure) {
        self.push(Recorded::Failed(failure.exit_code()));
    }
}
