//! Shot-moment localization and clip extraction.
//!
//! A clip is cut in three phases:
//!
//! 1. **Probe**: read one frame per second of video and OCR it until the
//!    scoreboard shows the target clock string.
//! 2. **Seek back**: jump to `seconds_before` ahead of the matched frame.
//! 3. **Record**: write `seconds_before + seconds_after` worth of frames,
//!    decimated to the target frame rate and resized to the target
//!    resolution.
//!
//! A clip that never shows the clock, cannot be rewound, or ends up shorter
//! than the minimum duration is an expected miss and comes back as a
//! [`ClipOutcome`], not as an error.

use std::path::PathBuf;

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ocr::TextRecognizer;
use super::source::{FrameSink, FrameSource, Resolution, VideoFileWriter, VideoReader};
use crate::error::{ExtractionError, VideoError};

const DECIMATION_TOLERANCE: f64 = 1e-6;

/// Everything needed to cut one clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Clock string as the scoreboard renders it (`"5:00"`, `"45."`)
    pub target_clock: String,
    pub seconds_before: f64,
    pub seconds_after: f64,
    /// Output size, `None` keeps the source size
    pub resolution: Option<Resolution>,
    /// Output frame rate, `None` keeps the source rate
    pub target_fps: Option<f64>,
}

impl ClipRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, target_clock: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            target_clock: target_clock.into(),
            seconds_before: 3.0,
            seconds_after: 2.0,
            resolution: None,
            target_fps: None,
        }
    }

    pub fn with_window(mut self, seconds_before: f64, seconds_after: f64) -> Self {
        self.seconds_before = seconds_before;
        self.seconds_after = seconds_after;
        self
    }

    pub fn with_resolution(mut self, resolution: Option<Resolution>) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_target_fps(mut self, target_fps: Option<f64>) -> Self {
        self.target_fps = target_fps;
        self
    }

    fn validate(&self) -> Result<(), ExtractionError> {
        let window_ok = self.seconds_before.is_finite()
            && self.seconds_after.is_finite()
            && self.seconds_before >= 0.0
            && self.seconds_after >= 0.0
            && self.seconds_before + self.seconds_after > 0.0;
        if !window_ok {
            return Err(ExtractionError::InvalidWindow {
                before: self.seconds_before,
                after: self.seconds_after,
            });
        }
        if let Some(fps) = self.target_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(ExtractionError::InvalidFrameRate(fps));
            }
        }
        validate_resolution(self.resolution)
    }
}

pub(crate) fn validate_resolution(resolution: Option<Resolution>) -> Result<(), ExtractionError> {
    match resolution {
        Some(res) if !res.is_valid() => Err(ExtractionError::InvalidResolution {
            width: res.width,
            height: res.height,
        }),
        _ => Ok(()),
    }
}

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClipOutcome {
    Written { frames: usize },
    /// The stream ended before the clock string was read
    ClockNotFound { probes: usize },
    /// Nothing could be read after rewinding to `frame`
    SeekFailed { frame: usize },
    /// Fewer frames than the minimum duration requires
    TooShort { frames: usize, required: f64 },
}

impl ClipOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClipOutcome::Written { .. })
    }

    pub fn frames(&self) -> usize {
        match self {
            ClipOutcome::Written { frames } | ClipOutcome::TooShort { frames, .. } => *frames,
            _ => 0,
        }
    }
}

/// Integer frame-skip factor turning `source_fps` into `target_fps`.
///
/// The target must divide the source rate exactly (within floating point
/// noise), e.g. 60 → 30 gives 2, 30 → 25 is rejected.
pub fn decimation_factor(source_fps: f64, target_fps: f64) -> Result<usize, ExtractionError> {
    if !source_fps.is_finite() || source_fps <= 0.0 {
        return Err(ExtractionError::InvalidFrameRate(source_fps));
    }
    if !target_fps.is_finite() || target_fps <= 0.0 {
        return Err(ExtractionError::InvalidFrameRate(target_fps));
    }

    let ratio = source_fps / target_fps;
    let rounded = ratio.round();
    if rounded < 1.0 || (ratio - rounded).abs() > DECIMATION_TOLERANCE {
        return Err(ExtractionError::FractionalDecimation {
            source_fps,
            target_fps,
        });
    }
    Ok(rounded as usize)
}

/// Resize `frame` to `size` if it differs
pub(crate) fn fit_frame(frame: &Mat, size: Resolution) -> Result<Option<Mat>, ExtractionError> {
    let current = frame.size()?;
    if Resolution::from(current) == size {
        return Ok(None);
    }
    let mut resized = Mat::default();
    imgproc::resize(frame, &mut resized, size.to_size(), 0.0, 0.0, imgproc::INTER_AREA)?;
    Ok(Some(resized))
}

pub(crate) fn write_fitted<K: FrameSink + ?Sized>(
    sink: &mut K,
    frame: &Mat,
    size: Resolution,
) -> Result<(), ExtractionError> {
    match fit_frame(frame, size)? {
        Some(resized) => sink.write(&resized)?,
        None => sink.write(frame)?,
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ClipExtractor {
    /// Clips must last strictly longer than this at the output frame rate
    pub min_duration_secs: f64,
}

impl Default for ClipExtractor {
    fn default() -> Self {
        Self {
            min_duration_secs: 3.0,
        }
    }
}

impl ClipExtractor {
    pub fn new(min_duration_secs: f64) -> Self {
        Self { min_duration_secs }
    }

    /// Run probe, seek back and record against `source`.
    ///
    /// `open_sink` is called with the output frame rate and size once a
    /// frame to record exists, so no output is created for clips that never
    /// show the clock.
    pub fn extract<S, R, K, F>(
        &self,
        source: &mut S,
        open_sink: F,
        recognizer: &R,
        request: &ClipRequest,
    ) -> Result<ClipOutcome, ExtractionError>
    where
        S: FrameSource + ?Sized,
        R: TextRecognizer + ?Sized,
        K: FrameSink,
        F: FnOnce(f64, Resolution) -> Result<K, VideoError>,
    {
        request.validate()?;

        let source_fps = source.fps();
        let target_fps = request.target_fps.unwrap_or(source_fps);
        let factor = decimation_factor(source_fps, target_fps)?;

        let matched = match self.probe(source, recognizer, &request.target_clock)? {
            Probe::Found(index) => index,
            Probe::Exhausted(probes) => return Ok(ClipOutcome::ClockNotFound { probes }),
        };

        let rewind = (request.seconds_before * source_fps).round() as usize;
        let start = matched.saturating_sub(rewind);
        source.seek(start)?;
        let Some(mut frame) = source.read()? else {
            debug!("Nothing to read after seeking to frame {}", start);
            return Ok(ClipOutcome::SeekFailed { frame: start });
        };

        let size = request.resolution.unwrap_or_else(|| source.frame_size());
        let mut sink = open_sink(target_fps, size)?;
        let budget = ((request.seconds_before + request.seconds_after) * target_fps).round() as usize;

        // The counter keeps the matched frame's index across the seek, so
        // the decimation phase is anchored on the probe, not on `start`.
        let mut counter = matched;
        let mut written = 0;
        while written < budget {
            if counter % factor == 0 {
                write_fitted(&mut sink, &frame, size)?;
                written += 1;
            }
            counter += 1;
            match source.read()? {
                Some(next) => frame = next,
                None => break,
            }
        }

        let required = self.min_duration_secs * target_fps;
        if written as f64 > required {
            info!(
                "🎬 Cut {} frames around '{}' ({} @ {:.2} fps)",
                written, request.target_clock, size, target_fps
            );
            Ok(ClipOutcome::Written { frames: written })
        } else {
            Ok(ClipOutcome::TooShort {
                frames: written,
                required,
            })
        }
    }

    /// Open `request.input` and write `request.output` as XVID.
    ///
    /// Partial output from an unsuccessful cut is removed.
    pub fn extract_file<R>(&self, request: &ClipRequest, recognizer: &R) -> Result<ClipOutcome, ExtractionError>
    where
        R: TextRecognizer + ?Sized,
    {
        request.validate()?;
        let mut reader = VideoReader::open(&request.input)?;
        let output = request.output.clone();

        let outcome = self.extract(
            &mut reader,
            |fps, size| VideoFileWriter::create(&output, fps, size),
            recognizer,
            request,
        )?;

        if !outcome.is_success() && request.output.exists() {
            std::fs::remove_file(&request.output).map_err(VideoError::from)?;
        }
        Ok(outcome)
    }

    /// Sample one frame per second until the text contains `target`
    fn probe<S, R>(&self, source: &mut S, recognizer: &R, target: &str) -> Result<Probe, ExtractionError>
    where
        S: FrameSource + ?Sized,
        R: TextRecognizer + ?Sized,
    {
        let step = (source.fps().round() as usize).max(1);
        let mut index = source.position();
        let mut probes = 0;

        while let Some(frame) = source.read()? {
            probes += 1;
            let text = recognizer.recognize(&frame)?;
            if text.contains(target) {
                debug!("Clock '{}' found at frame {} after {} probes", target, index, probes);
                return Ok(Probe::Found(index));
            }
            let skipped = source.skip(step - 1)?;
            index += 1 + skipped;
        }

        Ok(Probe::Exhausted(probes))
    }
}

enum Probe {
    Found(usize),
    Exhausted(usize),
}
