use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::extractor::{decimation_factor, validate_resolution, write_fitted};
use super::source::{FrameSink, FrameSource, Resolution, VideoFileWriter, VideoReader};
use crate::error::{ExtractionError, VideoError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NormalizeOutcome {
    /// Input already matched, copied byte for byte
    Copied,
    Reencoded { frames: usize },
    EmptySource,
}

impl NormalizeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NormalizeOutcome::Copied | NormalizeOutcome::Reencoded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Targets this close to the source rate keep the source rate
    pub fps_tolerance: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self { fps_tolerance: 0.5 }
    }
}

impl Normalizer {
    pub fn new(fps_tolerance: f64) -> Self {
        Self { fps_tolerance }
    }

    /// Output frame rate for a source at `source_fps`
    pub fn effective_fps(&self, source_fps: f64, target_fps: Option<f64>) -> f64 {
        match target_fps {
            Some(target) if (target - source_fps).abs() > self.fps_tolerance => target,
            _ => source_fps,
        }
    }

    pub fn normalize<S, K, F>(
        &self,
        source: &mut S,
        open_sink: F,
        resolution: Option<Resolution>,
        target_fps: Option<f64>,
    ) -> Result<NormalizeOutcome, ExtractionError>
    where
        S: FrameSource + ?Sized,
        K: FrameSink,
        F: FnOnce(f64, Resolution) -> Result<K, VideoError>,
    {
        validate_resolution(resolution)?;
        let source_fps = source.fps();
        let fps = self.effective_fps(source_fps, target_fps);
        let factor = decimation_factor(source_fps, fps)?;
        let size = resolution.unwrap_or_else(|| source.frame_size());

        let Some(mut frame) = source.read()? else {
            return Ok(NormalizeOutcome::EmptySource);
        };

        let mut sink = open_sink(fps, size)?;
        let mut counter = 0usize;
        loop {
            if counter % factor == 0 {
                write_fitted(&mut sink, &frame, size)?;
            }
            counter += 1;
            match source.read()? {
                Some(next) => frame = next,
                None => break,
            }
        }

        // The first frame is always kept, so a sink that opened holds at least one
        Ok(NormalizeOutcome::Reencoded {
            frames: sink.frames_written(),
        })
    }

    /// True when normalizing would leave a `source_size` clip at `source_fps`
    /// unchanged, so the file can be copied instead of re-encoded.
    pub fn is_passthrough(
        &self,
        source_fps: f64,
        source_size: Resolution,
        resolution: Option<Resolution>,
        target_fps: Option<f64>,
    ) -> bool {
        let same_size = resolution.map_or(true, |res| res == source_size);
        same_size && self.effective_fps(source_fps, target_fps) == source_fps
    }

    /// Normalize `input` into `output`, copying when nothing would change.
    pub fn normalize_file(
        &self,
        input: &Path,
        output: &Path,
        resolution: Option<Resolution>,
        target_fps: Option<f64>,
    ) -> Result<NormalizeOutcome, ExtractionError> {
        validate_resolution(resolution)?;
        let mut reader = VideoReader::open(input)?;

        if self.is_passthrough(reader.fps(), reader.frame_size(), resolution, target_fps) {
            drop(reader);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent).map_err(VideoError::from)?;
            }
            std::fs::copy(input, output).map_err(VideoError::from)?;
            debug!("{} already normalized, copied", input.display());
            return Ok(NormalizeOutcome::Copied);
        }

        let outcome = self.normalize(
            &mut reader,
            |fps, size| VideoFileWriter::create(output, fps, size),
            resolution,
            target_fps,
        )?;
        if let NormalizeOutcome::Reencoded { frames } = outcome {
            info!("🔁 Normalized {} → {} ({} frames)", input.display(), output.display(), frames);
        }
        Ok(outcome)
    }
}
