//! In-memory frame source and sink.
//!
//! Synthetic frames are uniform images whose pixel value encodes the frame
//! index (blue = low byte, green = high byte), so a recognizer or a test can
//! tell which frame it is looking at without decoding a real video.

use opencv::core::{Mat, Scalar, Vec3b, CV_8UC3};
use opencv::prelude::*;

use super::source::{FrameSink, FrameSource, Resolution};
use crate::error::VideoError;

/// Build a synthetic frame carrying `index`
pub fn encoded_frame(index: usize, size: Resolution) -> Result<Mat, VideoError> {
    let blue = (index & 0xff) as f64;
    let green = ((index >> 8) & 0xff) as f64;
    Ok(Mat::new_rows_cols_with_default(
        size.height,
        size.width,
        CV_8UC3,
        Scalar::new(blue, green, 0.0, 0.0),
    )?)
}

/// Recover the index stored by [`encoded_frame`]
pub fn frame_index(frame: &Mat) -> Result<usize, VideoError> {
    let pixel = frame.at_2d::<Vec3b>(0, 0)?;
    Ok(usize::from(pixel[0]) | (usize::from(pixel[1]) << 8))
}

pub struct MemorySource {
    frames: Vec<Mat>,
    fps: f64,
    size: Resolution,
    position: usize,
    reads: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Mat>, fps: f64, size: Resolution) -> Self {
        Self {
            frames,
            fps,
            size,
            position: 0,
            reads: 0,
        }
    }

    /// `count` index-encoded frames
    pub fn synthetic(count: usize, fps: f64, size: Resolution) -> Result<Self, VideoError> {
        let frames = (0..count)
            .map(|index| encoded_frame(index, size))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(frames, fps, size))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames handed out by `read`
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl FrameSource for MemorySource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_size(&self) -> Resolution {
        self.size
    }

    fn position(&self) -> usize {
        self.position
    }

    fn read(&mut self) -> Result<Option<Mat>, VideoError> {
        let Some(frame) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let frame = frame.try_clone()?;
        self.position += 1;
        self.reads += 1;
        Ok(Some(frame))
    }

    fn seek(&mut self, index: usize) -> Result<(), VideoError> {
        self.position = index;
        Ok(())
    }

    fn skip(&mut self, count: usize) -> Result<usize, VideoError> {
        let available = self.frames.len().saturating_sub(self.position);
        let skipped = count.min(available);
        self.position += skipped;
        Ok(skipped)
    }
}

/// Sink that keeps every written frame
#[derive(Default)]
pub struct MemorySink {
    frames: Vec<Mat>,
    fps: Option<f64>,
    size: Option<Resolution>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the parameters the sink was opened with
    pub fn open(&mut self, fps: f64, size: Resolution) -> &mut Self {
        self.fps = Some(fps);
        self.size = Some(size);
        self
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub fn size(&self) -> Option<Resolution> {
        self.size
    }

    pub fn frames(&self) -> &[Mat] {
        &self.frames
    }

    /// Indices decoded from the written frames
    pub fn frame_indices(&self) -> Result<Vec<usize>, VideoError> {
        self.frames.iter().map(frame_index).collect()
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Mat) -> Result<(), VideoError> {
        self.frames.push(frame.try_clone()?);
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames.len()
    }
}
