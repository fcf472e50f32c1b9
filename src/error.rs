//! Error taxonomy shared by the library modules.
//!
//! Configuration and data-consistency problems are errors and abort a run.
//! Expected extraction misses ("clock never shown", "clip too short") are not
//! errors at all: they come back as outcome values from the video modules.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed `MM:SS` clock readings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("invalid clock reading '{0}', expected MM:SS")]
    Format(String),

    #[error("clock reading '{0}' is out of range")]
    OutOfRange(String),
}

/// Inconsistent play-by-play records. These halt the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventTableError {
    #[error("event {event_num} has both home and visitor descriptions")]
    ConflictingDescriptions { event_num: u32 },

    #[error("event {event_num} has neither a home nor a visitor description")]
    MissingDescription { event_num: u32 },

    #[error("event {event_num}: {source}")]
    Clock {
        event_num: u32,
        #[source]
        source: ClockError,
    },
}

/// Failures talking to the statistics service
#[derive(Error, Debug)]
pub enum StatsApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("stats API returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("failed to decode stats API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected stats API payload: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StatsApiError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
}

/// Video decoding/encoding failures
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("failed to open video file: {}", .0.display())]
    OpenFailed(PathBuf),

    #[error("failed to create video writer: {}", .0.display())]
    WriterFailed(PathBuf),

    #[error("video path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("video reports an unusable frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text recognition failures
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("no tesseract location known for platform '{0}'; set ocr.tesseract_path")]
    UnsupportedPlatform(String),

    #[error("failed to run tesseract at {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tesseract exited with {status}: {stderr}")]
    Engine { status: i32, stderr: String },

    #[error("frame preprocessing failed: {0}")]
    Image(#[from] opencv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hard failures of the clip extractor and normalizer.
///
/// Soft failures are reported through `ClipOutcome` / `NormalizeOutcome`.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("target frame rate {target_fps} does not evenly divide source frame rate {source_fps}")]
    FractionalDecimation { source_fps: f64, target_fps: f64 },

    #[error("invalid target frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("invalid output resolution {width}x{height}")]
    InvalidResolution { width: i32, height: i32 },

    #[error("invalid clip window: {before}s before, {after}s after")]
    InvalidWindow { before: f64, after: f64 },

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

impl ExtractionError {
    /// Errors caused by settings rather than by one bad input video.
    /// Retrying another clip with the same settings would fail the same way.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            ExtractionError::FractionalDecimation { .. }
            | ExtractionError::InvalidFrameRate(_)
            | ExtractionError::InvalidResolution { .. }
            | ExtractionError::InvalidWindow { .. } => true,
            ExtractionError::Ocr(err) => matches!(
                err,
                OcrError::UnsupportedPlatform(_) | OcrError::Spawn { .. }
            ),
            ExtractionError::Video(_) => false,
        }
    }
}

impl From<opencv::Error> for ExtractionError {
    fn from(err: opencv::Error) -> Self {
        Self::Video(VideoError::OpenCv(err))
    }
}

/// Dataset split failures
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("split ratios must be non-negative and sum to 1.0 (got {0})")]
    InvalidRatios(f64),

    #[error("dataset root not found: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}
