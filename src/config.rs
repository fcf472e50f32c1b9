use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dataset::SplitRatios;
use crate::remote::{RetryPolicy, VideoQuality};
use crate::video::{ClockRegion, Resolution};

/// Configuration for the shot-clip dataset builder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Statistics service access
    pub api: ApiConfig,

    /// Clip window and output format
    pub extraction: ExtractionConfig,

    /// Scoreboard recognition
    pub ocr: OcrConfig,

    /// Output directories
    pub output: OutputConfig,

    /// Train/validation/test split
    pub dataset: DatasetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the stats endpoints
    pub base_url: String,

    /// Per-request timeout (seconds)
    pub timeout_seconds: u64,

    /// Minimum pause between two requests (milliseconds)
    pub cooldown_ms: u64,

    /// Attempts per call before giving up
    pub max_attempts: u32,

    /// Retry backoff range (milliseconds)
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,

    /// Highlight rendition to download
    pub video_quality: VideoQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Seconds kept before the matched clock reading
    pub seconds_before: f64,

    /// Seconds kept after it
    pub seconds_after: f64,

    /// Clips must be longer than this to count
    pub min_duration_secs: f64,

    /// Output frame rate, unset keeps the source rate.
    ///
    /// Clip extraction has no tolerance: the rate must divide the source rate
    /// exactly, so 30 against a 29.97 fps broadcast is a configuration error
    /// and stops a `build` run at the first clip.
    pub target_fps: Option<f64>,

    /// Output size, unset keeps the source size
    pub width: Option<i32>,
    pub height: Option<i32>,

    /// Normalizer keeps the source rate when the target is this close
    pub fps_tolerance: f64,

    /// Added to the play-by-play clock before searching the scoreboard
    pub clock_offset_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit tesseract binary, otherwise the platform default
    pub tesseract_path: Option<PathBuf>,

    pub language: String,

    /// Tesseract `--psm` value
    pub page_segmentation_mode: u32,

    /// Scoreboard band is the bottom `1 / region_divisor` of the frame
    pub region_divisor: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root for downloads, clips and reports
    pub base_dir: PathBuf,

    /// Skip shots whose clip already exists
    pub skip_existing: bool,

    /// Keep downloaded source videos after cutting
    pub keep_downloads: bool,

    /// Write a JSON report per game
    pub save_reports: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub train_ratio: f64,
    pub validation_ratio: f64,
    pub test_ratio: f64,
    pub seed: u64,

    /// Destination of the split dataset
    pub output_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://stats.nba.com/stats".to_string(),
            timeout_seconds: 300,
            cooldown_ms: 600,
            max_attempts: 50,
            min_backoff_ms: 1000,
            max_backoff_ms: 2000,
            video_quality: VideoQuality::Large,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            seconds_before: 3.0,
            seconds_after: 2.0,
            min_duration_secs: 3.0,
            target_fps: None,
            width: None,
            height: None,
            fps_tolerance: 0.5,
            clock_offset_secs: 0,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            language: "eng".to_string(),
            page_segmentation_mode: 11, // sparse text
            region_divisor: ClockRegion::BOTTOM_THIRD.divisor,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data"),
            skip_existing: true,
            keep_downloads: true,
            save_reports: true,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        let ratios = SplitRatios::default();
        Self {
            train_ratio: ratios.train,
            validation_ratio: ratios.validation,
            test_ratio: ratios.test,
            seed: 42,
            output_dir: PathBuf::from("./dataset"),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.min_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

impl ExtractionConfig {
    pub fn resolution(&self) -> Option<Resolution> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Resolution::new(width, height)),
            _ => None,
        }
    }
}

impl OcrConfig {
    pub fn region(&self) -> ClockRegion {
        ClockRegion::new(self.region_divisor)
    }
}

impl OutputConfig {
    /// Downloaded source videos, `raw/<category>/<event_id>/`
    pub fn raw_dir(&self) -> PathBuf {
        self.base_dir.join("raw")
    }

    /// Extracted clips, `clips/<category>/<event_id>/cut_video.avi`
    pub fn clips_dir(&self) -> PathBuf {
        self.base_dir.join("clips")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.clips_dir().join("reports")
    }
}

impl DatasetConfig {
    pub fn ratios(&self) -> SplitRatios {
        SplitRatios {
            train: self.train_ratio,
            validation: self.validation_ratio,
            test: self.test_ratio,
        }
    }

    /// Where a split lands: an explicit directory, else `output_dir`
    pub fn split_output(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.output_dir.clone())
    }
}

impl Config {
    /// Load configuration from the first readable config file, falling back
    /// to defaults with environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = ["shot-clips.toml", "config/shot-clips.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config.with_env_overrides())
    }

    /// Defaults with `SHOT_CLIPS_*` environment overrides
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var("SHOT_CLIPS_API_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Ok(cooldown) = std::env::var("SHOT_CLIPS_COOLDOWN_MS") {
            self.api.cooldown_ms = cooldown.parse().unwrap_or(self.api.cooldown_ms);
        }

        if let Ok(attempts) = std::env::var("SHOT_CLIPS_MAX_ATTEMPTS") {
            self.api.max_attempts = attempts.parse().unwrap_or(self.api.max_attempts);
        }

        if let Ok(quality) = std::env::var("SHOT_CLIPS_VIDEO_QUALITY") {
            match quality.parse() {
                Ok(quality) => self.api.video_quality = quality,
                Err(e) => tracing::warn!("Ignoring SHOT_CLIPS_VIDEO_QUALITY: {}", e),
            }
        }

        if let Ok(tesseract) = std::env::var("SHOT_CLIPS_TESSERACT") {
            self.ocr.tesseract_path = Some(PathBuf::from(tesseract));
        }

        if let Ok(output_dir) = std::env::var("SHOT_CLIPS_OUTPUT_DIR") {
            self.output.base_dir = PathBuf::from(output_dir);
        }

        if let Ok(dataset_dir) = std::env::var("SHOT_CLIPS_DATASET_DIR") {
            self.dataset.output_dir = PathBuf::from(dataset_dir);
        }

        if let Ok(seed) = std::env::var("SHOT_CLIPS_SEED") {
            self.dataset.seed = seed.parse().unwrap_or(self.dataset.seed);
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;

        if self.api.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be greater than 0"));
        }

        if self.api.min_backoff_ms > self.api.max_backoff_ms {
            return Err(anyhow!("min_backoff_ms must not exceed max_backoff_ms"));
        }

        let extraction = &self.extraction;
        if extraction.seconds_before < 0.0
            || extraction.seconds_after < 0.0
            || extraction.seconds_before + extraction.seconds_after <= 0.0
        {
            return Err(anyhow!("clip window must be non-negative and non-empty"));
        }

        if let Some(fps) = extraction.target_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(anyhow!("target_fps must be positive"));
            }
        }

        match (extraction.width, extraction.height) {
            (Some(w), Some(h)) if w <= 0 || h <= 0 => {
                return Err(anyhow!("output resolution must be positive, got {}x{}", w, h));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(anyhow!("width and height must be set together"));
            }
            _ => {}
        }

        if self.ocr.region_divisor < 1 {
            return Err(anyhow!("region_divisor must be at least 1"));
        }

        if self.ocr.language.trim().is_empty() {
            return Err(anyhow!("OCR language must not be empty"));
        }

        self.dataset.ratios().validate()?;

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        let resolution = self
            .extraction
            .resolution()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "source".to_string());
        let fps = self
            .extraction
            .target_fps
            .map(|f| format!("{}", f))
            .unwrap_or_else(|| "source".to_string());

        format!(
            "Shot Clips Configuration:\n\
            - API: {} (cooldown {}ms, {} attempts)\n\
            - Video Quality: {}\n\
            - Clip Window: {}s before / {}s after (min {}s)\n\
            - Output: {} @ {} fps\n\
            - OCR: {} --psm {} (bottom 1/{})\n\
            - Output Directory: {}\n\
            - Split: {}/{}/{} (seed {}) into {}",
            self.api.base_url,
            self.api.cooldown_ms,
            self.api.max_attempts,
            self.api.video_quality,
            self.extraction.seconds_before,
            self.extraction.seconds_after,
            self.extraction.min_duration_secs,
            resolution,
            fps,
            self.ocr.language,
            self.ocr.page_segmentation_mode,
            self.ocr.region_divisor,
            self.output.base_dir.display(),
            self.dataset.train_ratio,
            self.dataset.validation_ratio,
            self.dataset.test_ratio,
            self.dataset.seed,
            self.dataset.output_dir.display()
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.api.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, min_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        self.config.api.max_attempts = max_attempts;
        self.config.api.min_backoff_ms = min_backoff_ms;
        self.config.api.max_backoff_ms = max_backoff_ms;
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.config.api.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_window(mut self, seconds_before: f64, seconds_after: f64) -> Self {
        self.config.extraction.seconds_before = seconds_before;
        self.config.extraction.seconds_after = seconds_after;
        self
    }

    pub fn with_resolution(mut self, width: i32, height: i32) -> Self {
        self.config.extraction.width = Some(width);
        self.config.extraction.height = Some(height);
        self
    }

    pub fn with_target_fps(mut self, fps: f64) -> Self {
        self.config.extraction.target_fps = Some(fps);
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn with_tesseract(mut self, path: PathBuf) -> Self {
        self.config.ocr.tesseract_path = Some(path);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.dataset.seed = seed;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://stats.nba.com/stats");
        assert_eq!(config.api.timeout_seconds, 300);
        assert_eq!(config.api.cooldown(), Duration::from_millis(600));
        assert_eq!(config.api.retry_policy(), RetryPolicy::default());
        assert_eq!(config.extraction.seconds_before, 3.0);
        assert_eq!(config.extraction.seconds_after, 2.0);
        assert_eq!(config.ocr.region(), ClockRegion::BOTTOM_THIRD);
        assert_eq!(config.dataset.seed, 42);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_window(1.0, 4.0)
            .with_resolution(224, 224)
            .with_target_fps(15.0)
            .with_seed(7)
            .build();

        assert_eq!(config.extraction.resolution(), Some(Resolution::new(224, 224)));
        assert_eq!(config.extraction.target_fps, Some(15.0));
        assert_eq!(config.extraction.seconds_after, 4.0);
        assert_eq!(config.dataset.seed, 7);
    }

    #[test]
    fn test_split_output_falls_back_to_dataset_dir() {
        let dataset = DatasetConfig {
            output_dir: PathBuf::from("/srv/shots"),
            ..DatasetConfig::default()
        };
        assert_eq!(dataset.split_output(None), PathBuf::from("/srv/shots"));
        assert_eq!(
            dataset.split_output(Some(PathBuf::from("out"))),
            PathBuf::from("out")
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let mut half_resolution = Config::default();
        half_resolution.extraction.width = Some(224);
        assert!(half_resolution.validate().is_err());

        let bad_url = ConfigBuilder::new().with_base_url("not a url").build();
        assert!(bad_url.validate().is_err());

        let mut bad_split = Config::default();
        bad_split.dataset.test_ratio = 0.5;
        assert!(bad_split.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [extraction]
            seconds_before = 1.5
            width = 320
            height = 180

            [api]
            video_quality = "small"
            "#,
        )
        .unwrap();

        assert_eq!(config.extraction.seconds_before, 1.5);
        assert_eq!(config.extraction.seconds_after, 2.0);
        assert_eq!(config.extraction.resolution(), Some(Resolution::new(320, 180)));
        assert_eq!(config.api.video_quality, VideoQuality::Small);
        assert_eq!(config.api.max_attempts, 50);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot-clips.toml");
        let config = ConfigBuilder::new().with_seed(99).build();

        config.save(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.dataset.seed, 99);
    }
}
