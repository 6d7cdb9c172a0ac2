//! # remux-dl
//!
//! Supervised ffmpeg stream-copy downloads with live progress, built for chat front-ends.
//!
//! ## Design Philosophy
//!
//! remux-dl is designed to be:
//! - **Library-first** - No CLI or UI, the front-end drives a typed dispatcher
//! - **Pull-based** - Each download is a lazy, time-throttled stream of status snapshots
//! - **Cancellation-safe** - Terminate and token cancellation end the same way
//! - **Event-driven** - Consumers may also subscribe to lifecycle events
//!
//! ## Quick Start
//!
//! ```no_run
//! use remux_dl::{Config, RemuxDownloader, render};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = RemuxDownloader::new(Config::default()).await?;
//!
//!     let mut progress = downloader
//!         .start_download("https://example.com/live/index.m3u8", "concert")
//!         .await?;
//!
//!     while let Some(status) = progress.next().await {
//!         match render::render(&status) {
//!             render::Rendered::Status(text) => println!("{text}"),
//!             render::Rendered::Failure(report) => eprintln!("{}", report.content),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download dispatcher (job registry, start/cancel, shutdown)
pub mod downloader;
/// Error types
pub mod error;
/// ffmpeg process supervision
pub mod ffmpeg;
/// A single supervised download
pub mod job;
/// Status tracking and the progress stream
pub mod progress;
/// Text rendering of download status
pub mod render;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use downloader::RemuxDownloader;
pub use error::{Error, ProcessFailure, Result};
pub use job::DownloadJob;
pub use progress::ProgressStream;
pub use types::{DownloadStatus, Event, JobFailure, JobId, JobInfo, Phase, ProgressSample};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method,
/// which cancels every active download.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use remux_dl::{RemuxDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = RemuxDownloader::new(Config::default()).await?;
///
///     // Hand clones to the front-end, then block until a signal arrives
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: RemuxDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            let received = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = received, "Received shutdown signal");
        }
        (Ok(mut remaining), Err(e)) | (Err(e), Ok(mut remaining)) => {
            tracing::warn!(error = %e, "Could not register one signal handler, waiting on the other");
            remaining.recv().await;
            tracing::info!("Received shutdown signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    } else {
        tracing::info!("Received Ctrl+C signal");
    }
}
