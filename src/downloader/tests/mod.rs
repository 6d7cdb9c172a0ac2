use super::*;
use crate::ffmpeg::test_support::FakeFfmpeg;
use crate::progress::ProgressStream;
use crate::types::{DownloadStatus, Phase};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

mod control;

/// Create a downloader that runs `fake` and writes into a fresh temp directory.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(super) async fn create_test_downloader(fake: &FakeFfmpeg) -> (RemuxDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("downloads");
    config.download.poll_interval = Duration::from_millis(50);
    config.tools.ffmpeg_path = Some(fake.binary().to_path_buf());
    config.process.terminate_grace_period = Duration::from_secs(1);

    let downloader = RemuxDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

pub(super) fn output_path(downloader: &RemuxDownloader, name: &str) -> PathBuf {
    downloader.get_config().output_dir().join(name)
}

pub(super) async fn drain(progress: &mut ProgressStream) -> Vec<DownloadStatus> {
    let mut statuses = Vec::new();
    while let Some(status) = progress.next().await {
        statuses.push(status);
    }
    statuses
}

pub(super) async fn wait_for_file(path: &Path, exists: bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while path.exists() != exists {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} never reached exists={exists}", path.display()));
}

#[tokio::test]
async fn test_new_without_ffmpeg_is_tool_not_found() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("downloads");
    config.tools.ffmpeg_path = None;
    config.tools.search_path = false;

    match RemuxDownloader::new(config).await {
        Err(Error::ToolNotFound(_)) => {}
        other => panic!("Expected ToolNotFound, got: {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_new_rejects_invalid_config() {
    let mut config = Config::default();
    config.download.poll_interval = Duration::ZERO;

    assert!(matches!(
        RemuxDownloader::new(config).await,
        Err(Error::Config { .. })
    ));
}

#[tokio::test]
async fn test_new_creates_output_directory() {
    let fake = FakeFfmpeg::completing();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    assert!(downloader.get_config().output_dir().is_dir());
    assert!(downloader.is_accepting());
    assert!(downloader.active_jobs().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_events_follow_job_lifecycle() {
    let fake = FakeFfmpeg::completing();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;
    let mut events = downloader.subscribe();

    let mut progress = downloader.start_download("in.ts", "show").await.unwrap();
    let last = drain(&mut progress).await.pop().unwrap();
    assert_eq!(last.phase, Phase::Completed);

    match events.recv().await.unwrap() {
        Event::Started { name, argv } => {
            assert_eq!(name, "show.mp4");
            assert_eq!(argv.first().unwrap(), &fake.binary().display().to_string());
        }
        other => panic!("Expected Started, got: {other:?}"),
    }
    assert_eq!(
        events.recv().await.unwrap(),
        Event::Completed {
            name: "show.mp4".to_string()
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        Event::Removed {
            name: "show.mp4".to_string()
        }
    );
}
