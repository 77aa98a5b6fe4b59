//! Integration tests for downloading onto the volume

mod common;

use common::*;
use flashtune_usb::{DownloadStage, Library, MirrorStatus, UsbError};

async fn attached(env: &TestEnv) -> Library {
    let provider = env.provider();
    let root = env.grant(&provider).await;
    let library = env.library(provider).await;
    library.attach(root).await.unwrap();
    library
}

#[tokio::test]
async fn test_download_and_save_full_flow() {
    let env = TestEnv::new();
    let library = attached(&env).await;
    let fetcher = CannedFetcher::new(b"ID3 fake mp3 frames");
    let temp_dir = env.cache.path().join("flashtune");
    let mut stages = Vec::new();

    let saved = library
        .download_and_save(
            &fetcher,
            &search_result("Harder, Better, Faster, Stronger", "https://youtu.be/hbfs"),
            &temp_dir,
            |stage| stages.push(stage),
        )
        .await
        .unwrap();

    assert_eq!(
        stages.iter().map(|s| s.progress()).collect::<Vec<_>>(),
        vec![0.1, 0.5, 0.7, 0.9, 1.0]
    );
    assert_eq!(stages.last(), Some(&DownloadStage::Done));

    assert_eq!(saved.filename, "Daft Punk - Harder, Better, Faster, Stronger.mp3");
    assert_eq!(saved.mirror, MirrorStatus::Synced);
    assert_eq!(
        std::fs::read(env.music_path(&saved.filename)).unwrap(),
        b"ID3 fake mp3 frames"
    );

    let song = library.get_song(saved.song_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(song.duration_ms, 320_000);
    assert_eq!(song.source_url, "https://youtu.be/hbfs");

    // Temp file gone, mirror written
    assert!(!temp_dir.join(&saved.filename).exists());
    assert!(env.mirror_path().exists());
}

#[tokio::test]
async fn test_filename_is_sanitized() {
    let env = TestEnv::new();
    let library = attached(&env).await;
    let fetcher = CannedFetcher::new(b"data");

    let saved = library
        .download_and_save(
            &fetcher,
            &search_result("What? <Live> 1/2", "https://youtu.be/w"),
            &env.cache.path().join("tmp"),
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(saved.filename, "Daft Punk - What- -Live- 1-2.mp3");
    assert!(env.music_path(&saved.filename).exists());
}

#[tokio::test]
async fn test_duplicate_download_rejected_before_fetch() {
    let env = TestEnv::new();
    let library = attached(&env).await;
    let fetcher = CannedFetcher::new(b"data");
    let result = search_result("Robot Rock", "https://youtu.be/rr");
    let temp_dir = env.cache.path().join("tmp");

    library
        .download_and_save(&fetcher, &result, &temp_dir, |_| {})
        .await
        .unwrap();
    let second = library
        .download_and_save(&fetcher, &result, &temp_dir, |_| {})
        .await;

    assert!(matches!(second, Err(UsbError::AlreadyExists { .. })));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_failed_fetch_cleans_up_and_records_nothing() {
    let env = TestEnv::new();
    let library = attached(&env).await;
    let fetcher = CannedFetcher {
        bytes: b"partial".to_vec(),
        ..CannedFetcher::failing()
    };
    let temp_dir = env.cache.path().join("tmp");
    let mut stages = Vec::new();

    let result = library
        .download_and_save(
            &fetcher,
            &search_result("Gone", "https://youtu.be/gone"),
            &temp_dir,
            |stage| stages.push(stage),
        )
        .await;

    match result {
        Err(UsbError::Download(e)) => assert!(e.to_string().contains("Video unavailable")),
        other => panic!("expected download error, got {:?}", other),
    }
    assert_eq!(stages, vec![DownloadStage::Downloading]);
    assert!(std::fs::read_dir(&temp_dir).unwrap().next().is_none());
    assert!(library.songs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_download_requires_attached_volume() {
    let env = TestEnv::new();
    let library = env.library(env.provider()).await;
    let fetcher = CannedFetcher::new(b"data");

    let result = library
        .download_and_save(
            &fetcher,
            &search_result("Nowhere", "https://youtu.be/n"),
            env.cache.path(),
            |_| {},
        )
        .await;

    assert!(matches!(result, Err(UsbError::NotAttached)));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_delete_song_with_file() {
    let env = TestEnv::new();
    let library = attached(&env).await;
    let fetcher = CannedFetcher::new(b"data");

    let saved = library
        .download_and_save(
            &fetcher,
            &search_result("Voyager", "https://youtu.be/v"),
            &env.cache.path().join("tmp"),
            |_| {},
        )
        .await
        .unwrap();
    let id = saved.song_id.unwrap();

    let deleted = library.delete_song_with_file(id).await.unwrap();
    assert!(deleted.value);
    assert!(!env.music_path(&saved.filename).exists());
    assert!(library.get_song(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_song_tolerates_missing_file() {
    let env = TestEnv::new();
    let library = attached(&env).await;

    let id = library
        .insert_song(flashtune_core::NewSong::new("Ghost", "Daft Punk", "https://youtu.be/g"))
        .await
        .unwrap()
        .value
        .unwrap();

    let deleted = library.delete_song_with_file(id).await.unwrap();
    assert!(deleted.value);
    assert!(library.songs().await.unwrap().is_empty());
}
