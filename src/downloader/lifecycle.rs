//! Shutdown coordination.

use crate::error::Result;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::RemuxDownloader;

impl RemuxDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new downloads
    /// 2. Cancels every active job (stopping ffmpeg and removing partial outputs)
    /// 3. Waits for the cancellations, bounded by the termination grace period
    ///
    /// Streams of cancelled jobs end with a `Terminated` snapshot.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        let jobs = self.registry.drain();
        tracing::debug!(active_count = jobs.len(), "Cancelling active downloads");

        let shutdown_timeout = self.config.process.terminate_grace_period + Duration::from_secs(5);
        let cancel_all = futures::future::join_all(jobs.iter().map(|job| job.cancel()));

        match tokio::time::timeout(shutdown_timeout, cancel_all).await {
            Ok(stopped) => {
                let cancelled = stopped.into_iter().filter(|stopped| *stopped).count();
                tracing::info!(cancelled, "All active downloads stopped");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for downloads to stop, proceeding with shutdown");
            }
        }

        // Jobs that slipped past the drain still hang off this token
        self.shutdown_token.cancel();

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new downloads are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }
}
