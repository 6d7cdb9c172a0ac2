use super::*;

#[cfg(unix)]
#[tokio::test]
async fn test_start_download_appends_extension_and_completes() {
    let fake = FakeFfmpeg::completing();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    let mut progress = downloader.start_download("in.ts", "show").await.unwrap();
    let statuses = drain(&mut progress).await;

    let last = statuses.last().unwrap();
    assert_eq!(last.phase, Phase::Completed);
    assert_eq!(last.duration, Some(Duration::from_secs(150)));
    assert_eq!(statuses.iter().filter(|s| s.phase.is_terminal()).count(), 1);
    assert!(output_path(&downloader, "show.mp4").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_name_is_released_after_terminal_snapshot() {
    let fake = FakeFfmpeg::completing();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    let mut progress = downloader.start_download("in.ts", "show").await.unwrap();
    drain(&mut progress).await;
    assert!(downloader.active_jobs().is_empty());

    let mut again = downloader
        .start_download("in.ts", "show.mp4")
        .await
        .expect("name must be reusable once the job ended");
    assert_eq!(drain(&mut again).await.pop().unwrap().phase, Phase::Completed);
}

#[cfg(unix)]
#[tokio::test]
async fn test_duplicate_active_name_is_rejected() {
    let fake = FakeFfmpeg::hanging();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    let _progress = downloader.start_download("in.ts", "show").await.unwrap();

    match downloader.start_download("other.ts", "show.mp4").await {
        Err(Error::Duplicate(name)) => assert_eq!(name, "show.mp4"),
        other => panic!("Expected Duplicate, got: {other:?}"),
    }
    assert_eq!(downloader.active_jobs().len(), 1);

    downloader.cancel_download("show").await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancel_download_terminates_and_removes_output() {
    let fake = FakeFfmpeg::hanging();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;
    let output = output_path(&downloader, "show.mp4");

    let mut progress = downloader.start_download("in.ts", "show").await.unwrap();
    wait_for_file(&output, true).await;

    assert!(downloader.cancel_download("show").await.unwrap());

    let last = drain(&mut progress).await.pop().unwrap();
    assert_eq!(last.phase, Phase::Terminated);
    assert!(!output.exists());
    assert!(matches!(downloader.job("show"), Err(Error::NotFound(_))));
    assert!(matches!(
        downloader.cancel_download("show").await,
        Err(Error::NotFound(_))
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancel_finished_but_undrained_job_returns_false() {
    let fake = FakeFfmpeg::completing();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    let progress = downloader.start_download("in.ts", "show").await.unwrap();
    let job = downloader.job("show").unwrap();
    assert_eq!(job.finished().await.phase, Phase::Completed);

    assert!(!downloader.cancel_download("show").await.unwrap());
    assert!(output_path(&downloader, "show.mp4").exists());
    assert!(downloader.active_jobs().is_empty());
    drop(progress);
}

#[tokio::test]
async fn test_cancel_unknown_name_is_not_found() {
    let fake = FakeFfmpeg::completing();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    match downloader.cancel_download("missing").await {
        Err(Error::NotFound(name)) => assert_eq!(name, "missing.mp4"),
        other => panic!("Expected NotFound, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_name_is_rejected() {
    let fake = FakeFfmpeg::completing();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    assert!(matches!(
        downloader.start_download("in.ts", "../escape").await,
        Err(Error::InvalidName(_))
    ));
    assert!(downloader.active_jobs().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_download_is_removable_from_registry() {
    let fake = FakeFfmpeg::failing(1);
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    let mut progress = downloader.start_download("in.ts", "show").await.unwrap();
    let last = drain(&mut progress).await.pop().unwrap();

    assert_eq!(last.phase, Phase::Failed);
    let error = last.error.unwrap();
    assert!(!error.last_line.is_empty());
    assert!(error.diagnostics.contains("Connection refused"));
    assert!(downloader.active_jobs().is_empty());
}

#[tokio::test]
async fn test_launch_failure_rolls_back_registration() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("downloads");
    config.tools.ffmpeg_path = Some(PathBuf::from("/nonexistent/path/to/ffmpeg"));
    let downloader = RemuxDownloader::new(config).await.unwrap();

    let result = downloader.start_download("in.ts", "show").await;

    assert!(matches!(result, Err(Error::Launch { .. })));
    assert!(downloader.active_jobs().is_empty());
    assert!(matches!(
        downloader.start_download("in.ts", "show").await,
        Err(Error::Launch { .. })
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_active_jobs_reports_info() {
    let fake = FakeFfmpeg::hanging();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;

    let _progress = downloader
        .start_download("https://example.com/a.m3u8", "show")
        .await
        .unwrap();

    let jobs = downloader.active_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "show.mp4");
    assert_eq!(jobs[0].source, "https://example.com/a.m3u8");
    assert_eq!(jobs[0].output_path, output_path(&downloader, "show.mp4"));
    assert_eq!(jobs[0].status.phase, Phase::InProgress);

    downloader.cancel_download("show.mp4").await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_dropping_stream_cancels_download() {
    let fake = FakeFfmpeg::hanging();
    let (downloader, _temp_dir) = create_test_downloader(&fake).await;
    let output = output_path(&downloader, "show.mp4");

    let progress = downloader.start_download("in.ts", "show").await.unwrap();
    let job = downloader.job("show").unwrap();
    wait_for_file(&output, true).await;

    drop(progress);

    assert!(downloader.active_jobs().is_empty());
    assert_eq!(job.finished().await.phase, Phase::Terminated);
    wait_for_file(&output, false).await;
}
