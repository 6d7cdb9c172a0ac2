//! Common test utilities for remux-dl integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;
use remux_dl::{Config, DownloadStatus, ProgressStream, RemuxDownloader};
use tempfile::TempDir;

/// Duration line every fake prints first
const DURATION_LINE: &str = "  Duration: 00:02:30.00, start: 0.000000, bitrate: 500 kb/s";

/// Write an executable `/bin/sh` script standing in for ffmpeg
///
/// `body` runs with `$last` set to the last argument (the output path).
pub fn write_fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\nfor last; do :; done\n{body}\n")).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    path
}

/// Body that reports half the duration, then the full duration, and exits 0
pub fn completing_body() -> String {
    format!(
        "printf '{DURATION_LINE}\\n' >&2\n\
         printf 'size=    4883kB time=00:01:15.00 bitrate= 533.3kbits/s speed=1.0x\\r' >&2\n\
         printf 'data' > \"$last\"\n\
         printf 'size=    9766kB time=00:02:30.00 bitrate= 533.3kbits/s speed=1.0x\\n' >&2\n\
         exit 0"
    )
}

/// Body that writes a partial file and then blocks
pub fn hanging_body() -> String {
    format!(
        "printf '{DURATION_LINE}\\n' >&2\n\
         printf 'partial' > \"$last\"\n\
         printf 'size=    1024kB time=00:00:10.00 bitrate= 533.3kbits/s speed=1.0x\\r' >&2\n\
         exec sleep 30"
    )
}

/// Body that fails after some progress
pub fn failing_body(code: i32) -> String {
    format!(
        "printf '{DURATION_LINE}\\n' >&2\n\
         printf 'size=    1024kB time=00:00:10.00 bitrate= 533.3kbits/s speed=1.0x\\r' >&2\n\
         printf 'https://example.com/seg2.ts: Connection refused\\n' >&2\n\
         exit {code}"
    )
}

/// Create a downloader running a fake ffmpeg with `body`
///
/// Returns the downloader and temp directory (keep temp_dir alive for test duration)
pub async fn create_fake_downloader(body: &str) -> (RemuxDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let binary = write_fake_ffmpeg(temp_dir.path(), body);

    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("downloads");
    config.download.poll_interval = Duration::from_millis(50);
    config.tools.ffmpeg_path = Some(binary);
    config.process.terminate_grace_period = Duration::from_secs(1);

    let downloader = RemuxDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// Drain a progress stream, failing the test if it does not end in time
pub async fn drain(progress: &mut ProgressStream) -> Vec<DownloadStatus> {
    tokio::time::timeout(Duration::from_secs(30), async {
        let mut statuses = Vec::new();
        while let Some(status) = progress.next().await {
            statuses.push(status);
        }
        statuses
    })
    .await
    .expect("progress stream did not end")
}

/// Poll until `path` exists
pub async fn wait_for_file(path: &Path) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} was never created", path.display()));
}
