use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::clock::shift_clock;
use crate::config::Config;
use crate::dataset::CLIP_FILE;
use crate::download::{ClipDownloader, ClipFetcher};
use crate::events::{ShotEvent, ShotTableBuilder};
use crate::remote::{Retryable, StatsClient, StatsSource};
use crate::video::{ClipExtractor, ClipOutcome, ClipRequest, TesseractRecognizer, TextRecognizer};

/// What happened to one shot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ShotStatus {
    Written { frames: usize },
    /// Clip was already on disk
    Existing,
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotRecord {
    pub event_id: String,
    pub category: Option<String>,
    pub period: u32,
    pub clock: String,
    pub target_clock: Option<String>,
    pub description: String,
    pub clip_path: Option<PathBuf>,
    pub status: ShotStatus,
}

/// Per-game results, saved as `clips/reports/<game_id>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameReport {
    pub game_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_events: usize,
    pub total_shots: usize,
    pub written: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
    pub processing_time: Duration,
    pub records: Vec<ShotRecord>,
}

impl GameReport {
    fn new(game_id: &str, total_events: usize, records: Vec<ShotRecord>, processing_time: Duration) -> Self {
        let count = |f: fn(&ShotStatus) -> bool| records.iter().filter(|r| f(&r.status)).count();
        Self {
            game_id: game_id.to_string(),
            generated_at: Utc::now(),
            total_events,
            total_shots: records.len(),
            written: count(|s| matches!(s, ShotStatus::Written { .. })),
            existing: count(|s| matches!(s, ShotStatus::Existing)),
            skipped: count(|s| matches!(s, ShotStatus::Skipped { .. })),
            failed: count(|s| matches!(s, ShotStatus::Failed { .. })),
            processing_time,
            records,
        }
    }
}

/// Builds the clip dataset game by game
pub struct DatasetBuilder {
    config: Config,
    stats: Arc<dyn StatsSource>,
    fetcher: Arc<dyn ClipFetcher>,
    recognizer: Arc<dyn TextRecognizer>,
    table: ShotTableBuilder,
    extractor: ClipExtractor,
}

impl DatasetBuilder {
    /// Wire up the HTTP client, the downloader and the tesseract recognizer
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let stats = StatsClient::new(&config.api).context("Failed to build stats client")?;
        let fetcher = ClipDownloader::new(config.api.timeout(), config.api.retry_policy())?;

        let recognizer = TesseractRecognizer::from_config(&config.ocr)?;

        Ok(Self::with_components(
            config,
            Arc::new(stats),
            Arc::new(fetcher),
            Arc::new(recognizer),
        ))
    }

    pub fn with_components(
        config: Config,
        stats: Arc<dyn StatsSource>,
        fetcher: Arc<dyn ClipFetcher>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        let extractor = ClipExtractor::new(config.extraction.min_duration_secs);
        Self {
            config,
            stats,
            fetcher,
            recognizer,
            table: ShotTableBuilder::new(),
            extractor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Filtered shot table of one game
    pub async fn shots(&self, game_id: &str) -> Result<Vec<ShotEvent>> {
        let events = self
            .stats
            .play_by_play(game_id)
            .await
            .with_context(|| format!("Failed to fetch play-by-play for game {}", game_id))?;
        Ok(self.table.build(&events)?)
    }

    /// Process several games one after another
    pub async fn process_games(&self, game_ids: &[String]) -> Result<Vec<GameReport>> {
        let mut reports = Vec::with_capacity(game_ids.len());
        for (index, game_id) in game_ids.iter().enumerate() {
            info!("🏀 Processing game {}/{}: {}", index + 1, game_ids.len(), game_id);
            reports.push(self.process_game(game_id).await?);
        }
        Ok(reports)
    }

    pub async fn process_game(&self, game_id: &str) -> Result<GameReport> {
        let start_time = Instant::now();

        let events = self
            .stats
            .play_by_play(game_id)
            .await
            .with_context(|| format!("Failed to fetch play-by-play for game {}", game_id))?;
        let shots = self
            .table
            .build(&events)
            .with_context(|| format!("Inconsistent play-by-play for game {}", game_id))?;
        info!("🎯 {} of {} events in game {} are usable shots", shots.len(), events.len(), game_id);

        let mut records = Vec::with_capacity(shots.len());
        for (index, shot) in shots.iter().enumerate() {
            debug!("Shot {}/{}: {}", index + 1, shots.len(), shot.event_id());
            let record = self.process_shot(shot).await?;
            match &record.status {
                ShotStatus::Written { frames } => {
                    info!("✅ {} ({} frames)", record.event_id, frames)
                }
                ShotStatus::Existing => debug!("{} already extracted", record.event_id),
                ShotStatus::Skipped { reason } => warn!("⚠️ Skipped {}: {}", record.event_id, reason),
                ShotStatus::Failed { reason } => warn!("❌ Failed {}: {}", record.event_id, reason),
            }
            records.push(record);
        }

        let report = GameReport::new(game_id, events.len(), records, start_time.elapsed());
        info!(
            "📊 Game {}: {} written, {} existing, {} skipped, {} failed",
            game_id, report.written, report.existing, report.skipped, report.failed
        );

        if self.config.output.save_reports {
            let path = self.save_report(&report).await?;
            info!("💾 Report saved to: {}", path.display());
        }
        Ok(report)
    }

    async fn process_shot(&self, shot: &ShotEvent) -> Result<ShotRecord> {
        let event_id = shot.event_id();
        let mut record = ShotRecord {
            event_id: event_id.clone(),
            category: shot.category(),
            period: shot.event.period,
            clock: shot.event.clock.clone(),
            target_clock: None,
            description: shot.description.clone(),
            clip_path: None,
            status: ShotStatus::Existing,
        };

        let Some(category) = record.category.clone() else {
            record.status = skipped("unknown shot type");
            return Ok(record);
        };

        let clip_path = self
            .config
            .output
            .clips_dir()
            .join(&category)
            .join(&event_id)
            .join(CLIP_FILE);
        record.clip_path = Some(clip_path.clone());
        if self.config.output.skip_existing && clip_path.exists() {
            return Ok(record);
        }

        let target_clock = shift_clock(&shot.event.clock, self.config.extraction.clock_offset_secs)
            .with_context(|| format!("Invalid clock for {}", event_id))?;
        record.target_clock = Some(target_clock.clone());

        let asset = match self.stats.clip_asset(&shot.event.game_id, shot.event.event_num).await {
            Ok(asset) => asset,
            Err(e) if e.is_transient() => {
                record.status = failed(format!("clip lookup: {}", e));
                return Ok(record);
            }
            Err(e) => return Err(e).with_context(|| format!("Clip lookup failed for {}", event_id)),
        };
        if asset.video_url.is_none() {
            record.status = skipped("no video available");
            return Ok(record);
        }

        let raw_dir = self.config.output.raw_dir().join(&category).join(&event_id);
        let video = match self.fetcher.fetch(&asset, &raw_dir).await {
            Ok(video) => video,
            Err(e) if e.is_transient() => {
                record.status = failed(format!("download: {:#}", e));
                return Ok(record);
            }
            Err(e) => return Err(e.context(format!("Download failed for {}", event_id))),
        };

        let request = ClipRequest::new(video, clip_path, target_clock)
            .with_window(
                self.config.extraction.seconds_before,
                self.config.extraction.seconds_after,
            )
            .with_resolution(self.config.extraction.resolution())
            .with_target_fps(self.config.extraction.target_fps);

        record.status = match self.cut(request).await {
            Ok(ClipOutcome::Written { frames }) => ShotStatus::Written { frames },
            Ok(outcome) => skipped(describe_miss(&outcome)),
            Err(e) if e.is_configuration_error() => {
                error!("Extraction settings are unusable: {}", e);
                return Err(e.into());
            }
            Err(e) => failed(format!("extraction: {}", e)),
        };

        if !self.config.output.keep_downloads {
            remove_download(&raw_dir).await;
        }
        Ok(record)
    }

    /// Run the extractor on the blocking pool
    async fn cut(&self, request: ClipRequest) -> Result<ClipOutcome, crate::error::ExtractionError> {
        let extractor = self.extractor.clone();
        let recognizer = Arc::clone(&self.recognizer);

        match tokio::task::spawn_blocking(move || extractor.extract_file(&request, recognizer.as_ref())).await {
            Ok(result) => result,
            Err(join_error) => Err(crate::error::VideoError::Io(std::io::Error::other(format!(
                "extraction task failed: {}",
                join_error
            )))
            .into()),
        }
    }

    async fn save_report(&self, report: &GameReport) -> Result<PathBuf> {
        let dir = self.config.output.reports_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(format!("{}.json", report.game_id));
        let json_data = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, json_data).await?;
        Ok(path)
    }
}

fn skipped(reason: impl Into<String>) -> ShotStatus {
    ShotStatus::Skipped {
        reason: reason.into(),
    }
}

fn failed(reason: impl Into<String>) -> ShotStatus {
    ShotStatus::Failed {
        reason: reason.into(),
    }
}

fn describe_miss(outcome: &ClipOutcome) -> String {
    match outcome {
        ClipOutcome::Written { frames } => format!("written ({} frames)", frames),
        ClipOutcome::ClockNotFound { probes } => {
            format!("clock not found on screen after {} probes", probes)
        }
        ClipOutcome::SeekFailed { frame } => format!("could not read after seeking to frame {}", frame),
        ClipOutcome::TooShort { frames, required } => {
            format!("clip too short ({} frames, need more than {})", frames, required)
        }
    }
}

async fn remove_download(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        debug!("Could not remove {}: {}", dir.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let record = |status| ShotRecord {
            event_id: "g_1".to_string(),
            category: Some("DUNK".to_string()),
            period: 1,
            clock: "11:00".to_string(),
            target_clock: Some("11:00".to_string()),
            description: "Dunk".to_string(),
            clip_path: None,
            status,
        };
        let records = vec![
            record(ShotStatus::Written { frames: 150 }),
            record(ShotStatus::Written { frames: 120 }),
            record(ShotStatus::Existing),
            record(skipped("no video available")),
            record(failed("download: timeout")),
        ];

        let report = GameReport::new("g", 40, records, Duration::from_secs(1));
        assert_eq!(report.total_shots, 5);
        assert_eq!(report.written, 2);
        assert_eq!(report.existing, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_describe_miss() {
        assert_eq!(
            describe_miss(&ClipOutcome::ClockNotFound { probes: 20 }),
            "clock not found on screen after 20 probes"
        );
        assert!(describe_miss(&ClipOutcome::TooShort { frames: 10, required: 90.0 }).contains("10 frames"));
    }
}
