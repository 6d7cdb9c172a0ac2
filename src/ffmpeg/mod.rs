//! ffmpeg process supervision
//!
//! [`FfmpegSupervisor`] owns the lifecycle of one ffmpeg invocation that copies a
//! remote stream into a local file without re-encoding:
//!
//! - builds the argument list (input, audio bitstream filter, stream copy, output)
//! - spawns the process and pumps its stderr line by line ([`DiagnosticLineCodec`])
//! - parses progress lines into [`ProgressSample`](crate::types::ProgressSample)s
//! - reports everything to a [`ProcessObserver`]
//! - converges explicit termination and token cancellation on one stop path
//!
//! ## Usage
//!
//! ```no_run
//! use remux_dl::ffmpeg::{FfmpegSupervisor, ProcessObserver};
//! use remux_dl::types::ProgressSample;
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Print;
//!
//! impl ProcessObserver for Print {
//!     fn on_progress(&self, sample: &ProgressSample) {
//!         println!("{:?} at {}x", sample.elapsed, sample.speed);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let supervisor = FfmpegSupervisor::from_path().expect("ffmpeg binary not found");
//!     let mut handle = supervisor.start(
//!         "https://example.com/stream.m3u8",
//!         Path::new("stream.mp4"),
//!         Arc::new(Print),
//!         CancellationToken::new(),
//!     )?;
//!     handle.wait().await;
//!     Ok(())
//! }
//! ```

mod codec;
mod observer;
mod parser;
mod supervisor;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

pub use codec::DiagnosticLineCodec;
pub use observer::{NoOpObserver, ProcessObserver};
pub use parser::{parse_duration_line, parse_progress_line};
pub use supervisor::{FfmpegSupervisor, ProcessHandle};
