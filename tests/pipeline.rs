use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shot_clips::config::{Config, ConfigBuilder};
use shot_clips::download::ClipFetcher;
use shot_clips::error::StatsApiError;
use shot_clips::events::{EventKind, GameEvent};
use shot_clips::pipeline::{DatasetBuilder, GameReport, ShotStatus};
use shot_clips::remote::{ClipAsset, StatsSource};
use shot_clips::video::ScriptedRecognizer;
use tempfile::TempDir;

const GAME_ID: &str = "0022300001";

fn shot(num: u32, action: u32, clock: &str, home: &str) -> GameEvent {
    GameEvent {
        game_id: GAME_ID.to_string(),
        event_num: num,
        kind: EventKind::MadeShot,
        action_type: action,
        period: 1,
        clock: clock.to_string(),
        home_description: Some(home.to_string()),
        neutral_description: None,
        visitor_description: None,
        video_available: true,
    }
}

enum AssetReply {
    Asset(ClipAsset),
    Transient,
}

struct FakeStats {
    events: Vec<GameEvent>,
    asset: fn(u32) -> AssetReply,
}

#[async_trait]
impl StatsSource for FakeStats {
    async fn play_by_play(&self, _game_id: &str) -> Result<Vec<GameEvent>, StatsApiError> {
        Ok(self.events.clone())
    }

    async fn clip_asset(&self, _game_id: &str, event_num: u32) -> Result<ClipAsset, StatsApiError> {
        match (self.asset)(event_num) {
            AssetReply::Asset(asset) => Ok(asset),
            AssetReply::Transient => Err(StatsApiError::Http {
                status: 503,
                url: "http://stats.test/videoeventsasset".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl ClipFetcher for CountingFetcher {
    async fn fetch(&self, _asset: &ClipAsset, dir: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StatsApiError::Http {
            status: 502,
            url: dir.display().to_string(),
        }
        .into())
    }
}

/// Drops a prepared file into the download directory
struct LocalFetcher {
    source: PathBuf,
}

#[async_trait]
impl ClipFetcher for LocalFetcher {
    async fn fetch(&self, _asset: &ClipAsset, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let video = dir.join("video.mp4");
        tokio::fs::copy(&self.source, &video).await?;
        Ok(video)
    }
}

fn with_video(event_num: u32) -> AssetReply {
    AssetReply::Asset(ClipAsset {
        description: Some(format!("event {}", event_num)),
        video_url: Some(format!("https://videos.test/{}.mp4", event_num)),
    })
}

fn no_video(_: u32) -> AssetReply {
    AssetReply::Asset(ClipAsset {
        description: None,
        video_url: None,
    })
}

fn config(dir: &TempDir) -> Config {
    ConfigBuilder::new()
        .with_output_dir(dir.path().to_path_buf())
        .build()
}

fn builder(config: Config, stats: FakeStats, fetcher: Arc<CountingFetcher>) -> DatasetBuilder {
    DatasetBuilder::with_components(
        config,
        Arc::new(stats),
        fetcher,
        Arc::new(ScriptedRecognizer::constant("")),
    )
}

fn local_builder(config: Config, stats: FakeStats, source: PathBuf) -> DatasetBuilder {
    DatasetBuilder::with_components(
        config,
        Arc::new(stats),
        Arc::new(LocalFetcher { source }),
        Arc::new(ScriptedRecognizer::constant("")),
    )
}

fn status_of<'a>(report: &'a GameReport, event_id: &str) -> &'a ShotStatus {
    &report
        .records
        .iter()
        .find(|r| r.event_id == event_id)
        .unwrap()
        .status
}

#[tokio::test]
async fn records_every_shot_and_writes_report() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(CountingFetcher::default());
    let stats = FakeStats {
        events: vec![
            shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)"),
            shot(2, 999, "11:00", "Doe (2 PTS)"),
            shot(3, 42, "10:30", "James  Driving Layup (2 PTS)"),
        ],
        asset: |event_num| match event_num {
            1 => no_video(event_num),
            _ => AssetReply::Transient,
        },
    };

    let report = builder(config(&dir), stats, Arc::clone(&fetcher))
        .process_game(GAME_ID)
        .await
        .unwrap();

    assert_eq!(report.total_events, 3);
    assert_eq!(report.total_shots, 3);
    assert!(matches!(status_of(&report, "0022300001_1"), ShotStatus::Skipped { reason } if reason.contains("no video")));
    assert!(matches!(status_of(&report, "0022300001_2"), ShotStatus::Skipped { reason } if reason.contains("unknown")));
    assert!(matches!(status_of(&report, "0022300001_3"), ShotStatus::Failed { .. }));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

    let report_path = dir.path().join("clips").join("reports").join("0022300001.json");
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(saved["game_id"], GAME_ID);
    assert_eq!(saved["skipped"], 2);
    assert_eq!(saved["failed"], 1);
}

#[tokio::test]
async fn failed_download_does_not_stop_the_batch() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(CountingFetcher::default());
    let stats = FakeStats {
        events: vec![
            shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)"),
            shot(2, 42, "11:00", "James  Driving Layup (2 PTS)"),
        ],
        asset: |event_num| {
            AssetReply::Asset(ClipAsset {
                description: Some(format!("event {}", event_num)),
                video_url: Some(format!("https://videos.test/{}.mp4", event_num)),
            })
        },
    };

    let report = builder(config(&dir), stats, Arc::clone(&fetcher))
        .process_game(GAME_ID)
        .await
        .unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    let record = &report.records[1];
    assert_eq!(record.target_clock.as_deref(), Some("11:00"));
    assert_eq!(
        record.clip_path.as_deref(),
        Some(dir.path().join("clips/DRIVING_LAYUP/0022300001_2/cut_video.avi").as_path())
    );
}

#[tokio::test]
async fn existing_clips_are_not_fetched_again() {
    let dir = TempDir::new().unwrap();
    let clip_dir = dir.path().join("clips/JUMP_SHOT/0022300001_1");
    std::fs::create_dir_all(&clip_dir).unwrap();
    std::fs::write(clip_dir.join("cut_video.avi"), b"already cut").unwrap();

    let fetcher = Arc::new(CountingFetcher::default());
    let stats = FakeStats {
        events: vec![shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)")],
        asset: |_| AssetReply::Transient,
    };

    let report = tokio_test::assert_ok!(
        builder(config(&dir), stats, Arc::clone(&fetcher))
            .process_game(GAME_ID)
            .await
    );

    assert_eq!(report.existing, 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn clock_offset_shifts_the_search_target() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.extraction.clock_offset_secs = 2;

    let stats = FakeStats {
        events: vec![shot(1, 1, "00:45", "Curry 25' 3PT Jump Shot (3 PTS)")],
        asset: no_video,
    };

    let report = builder(config, stats, Arc::new(CountingFetcher::default()))
        .process_game(GAME_ID)
        .await
        .unwrap();
    assert_eq!(report.records[0].target_clock.as_deref(), Some("47."));
}

#[tokio::test]
async fn inconsistent_descriptions_abort_the_game() {
    let dir = TempDir::new().unwrap();
    let mut both = shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)");
    both.visitor_description = Some("Tatum Jump Shot".to_string());
    let stats = FakeStats {
        events: vec![both],
        asset: no_video,
    };

    let err = tokio_test::assert_err!(
        builder(config(&dir), stats, Arc::new(CountingFetcher::default()))
            .process_game(GAME_ID)
            .await
    );

    assert!(format!("{:#}", err).contains("both home and visitor"));
    assert!(!dir.path().join("clips/reports/0022300001.json").exists());
}

#[tokio::test]
async fn shot_table_is_exposed() {
    let dir = TempDir::new().unwrap();
    let mut blocked = shot(2, 1, "11:00", "MISS Curry  Jump Shot");
    blocked.kind = EventKind::MissedShot;
    blocked.home_description = Some("MISS Curry  Jump Shot BLOCK".to_string());
    let stats = FakeStats {
        events: vec![shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)"), blocked],
        asset: no_video,
    };

    let shots = builder(config(&dir), stats, Arc::new(CountingFetcher::default()))
        .shots(GAME_ID)
        .await
        .unwrap();
    assert_eq!(shots.len(), 1);
    assert_eq!(shots[0].label.as_deref(), Some("JUMP_SHOT"));
}

#[tokio::test]
async fn unusable_frame_rate_aborts_the_batch() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.mp4");
    std::fs::write(&source, b"not decoded before the settings are checked").unwrap();

    let mut config = config(&dir);
    config.extraction.target_fps = Some(0.0);
    let stats = FakeStats {
        events: vec![
            shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)"),
            shot(2, 42, "11:00", "James  Driving Layup (2 PTS)"),
        ],
        asset: with_video,
    };

    let err = tokio_test::assert_err!(local_builder(config, stats, source).process_game(GAME_ID).await);

    assert!(format!("{:#}", err).contains("frame rate"));
    assert!(!dir.path().join("clips/reports/0022300001.json").exists());
}

#[tokio::test]
async fn unusable_resolution_aborts_the_batch() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.mp4");
    std::fs::write(&source, b"never opened").unwrap();

    let mut config = config(&dir);
    config.extraction.width = Some(0);
    config.extraction.height = Some(360);
    let stats = FakeStats {
        events: vec![shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)")],
        asset: with_video,
    };

    tokio_test::assert_err!(local_builder(config, stats, source).process_game(GAME_ID).await);
}

#[tokio::test]
async fn unreadable_video_fails_only_that_shot() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.mp4");
    std::fs::write(&source, b"definitely not a video container").unwrap();

    let stats = FakeStats {
        events: vec![
            shot(1, 1, "11:30", "Curry 25' 3PT Jump Shot (3 PTS)"),
            shot(2, 42, "11:00", "James  Driving Layup (2 PTS)"),
        ],
        asset: with_video,
    };

    let mut config = config(&dir);
    config.output.keep_downloads = false;

    let report = local_builder(config, stats, source)
        .process_game(GAME_ID)
        .await
        .unwrap();

    assert_eq!(report.failed, 2);
    assert!(matches!(status_of(&report, "0022300001_1"), ShotStatus::Failed { reason } if reason.contains("extraction")));
    assert!(!dir.path().join("raw/JUMP_SHOT/0022300001_1").exists());
}
