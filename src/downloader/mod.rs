//! Download dispatcher split into focused submodules.
//!
//! The `RemuxDownloader` struct and its methods are organized by domain:
//! - [`registry`] - Active jobs keyed by output file name
//! - [`control`] - Start, cancel and inspect downloads
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod lifecycle;
mod registry;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub(crate) use registry::{JobRegistry, RegistryLease};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ffmpeg::FfmpegSupervisor;
use crate::types::Event;
use crate::utils::find_ffmpeg;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Main downloader instance (cloneable - all fields are Arc-wrapped or cheap to clone)
///
/// Owns the registry of active jobs. Job names are normalized output file names, so at
/// most one job writes to a given file at a time.
#[derive(Clone)]
pub struct RemuxDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Supervisor every job runs its ffmpeg process with
    pub(crate) supervisor: FfmpegSupervisor,
    /// Active jobs
    pub(crate) registry: JobRegistry,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Flag to indicate whether new downloads are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Parent of every job's cancellation token
    pub(crate) shutdown_token: CancellationToken,
}

impl RemuxDownloader {
    /// Create a new RemuxDownloader instance
    ///
    /// Validates the configuration, locates the ffmpeg binary and creates the output
    /// directory.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for invalid settings
    /// - [`Error::ToolNotFound`] if ffmpeg cannot be located
    /// - [`Error::Io`] if the output directory cannot be created
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.output_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        config.output_dir().display(),
                        e
                    ),
                ))
            })?;

        let binary = find_ffmpeg(&config.tools)?;
        tracing::info!(binary = %binary.display(), "Using ffmpeg");
        let supervisor = FfmpegSupervisor::with_config(binary, config.process.clone());

        // Buffer size of 1000 events; slow subscribers see Lagged rather than blocking jobs
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            config: Arc::new(config),
            supervisor,
            registry: JobRegistry::new(event_tx.clone()),
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Subscribe to download events
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use remux_dl::{RemuxDownloader, Config};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let downloader = RemuxDownloader::new(Config::default()).await?;
    ///
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "download event");
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Supervisor used for every job
    pub fn supervisor(&self) -> &FfmpegSupervisor {
        &self.supervisor
    }
}

impl std::fmt::Debug for RemuxDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemuxDownloader")
            .field("config", &self.config)
            .field("supervisor", &self.supervisor)
            .field("active_jobs", &self.registry.len())
            .finish_non_exhaustive()
    }
}
