//! Download control: start, cancel, inspect.

use crate::error::{Error, Result};
use crate::job::DownloadJob;
use crate::progress::ProgressStream;
use crate::types::JobInfo;
use crate::utils::normalize_output_name;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::RemuxDownloader;

impl RemuxDownloader {
    /// Start downloading `url` into the output directory under `name`
    ///
    /// `name` gets the configured extension appended if it lacks it. The job stays
    /// registered until the returned stream has yielded its terminal snapshot (or is
    /// dropped), after which the name can be used again.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown) was called
    /// - [`Error::InvalidName`] if `name` is empty or contains path separators
    /// - [`Error::Duplicate`] if a job with this name is active
    /// - [`Error::Launch`] if ffmpeg cannot be started (nothing stays registered)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use remux_dl::*;
    /// # async fn example(downloader: RemuxDownloader) -> Result<()> {
    /// let mut progress = downloader
    ///     .start_download("https://example.com/live/index.m3u8", "concert")
    ///     .await?;
    ///
    /// while let Some(status) = progress.next().await {
    ///     println!("{}", render::render_status(&status));
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_download(&self, url: &str, name: &str) -> Result<ProgressStream> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let name = normalize_output_name(name, &self.config.download.output_extension)?;
        let output_path = self.config.output_dir().join(&name);

        let job = Arc::new(
            DownloadJob::new(
                self.supervisor.clone(),
                url,
                output_path,
                self.config.download.poll_interval,
            )
            .with_parent_token(&self.shutdown_token)
            .with_events(self.event_tx.clone()),
        );

        let lease = match self.registry.register(job.clone()) {
            Ok(lease) => lease,
            Err(e) => {
                tracing::info!(job = %name, "Rejected duplicate download");
                return Err(e);
            }
        };

        tracing::info!(job = %name, url, "Starting download");
        // On error the lease is dropped here, which unregisters the job
        let progress = job.start().await?;
        Ok(progress.with_lease(lease))
    }

    /// Cancel the download registered under `name`
    ///
    /// Stops ffmpeg, removes the partial output and unregisters the job. Returns
    /// `true` if a running process was stopped, `false` if the job had already ended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no job is registered under `name`.
    pub async fn cancel_download(&self, name: &str) -> Result<bool> {
        let job = self.job(name)?;
        let stopped = job.cancel().await;
        self.registry.unregister(job.name(), job.id());
        Ok(stopped)
    }

    /// Look up an active job by name (extension optional)
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no job is registered under `name`.
    pub fn job(&self, name: &str) -> Result<Arc<DownloadJob>> {
        let name = normalize_output_name(name, &self.config.download.output_extension)
            .map_err(|_| Error::NotFound(name.to_string()))?;
        self.registry.lookup(&name)
    }

    /// Overview of every active job, oldest first
    pub fn active_jobs(&self) -> Vec<JobInfo> {
        self.registry.jobs().iter().map(|job| job.info()).collect()
    }
}
