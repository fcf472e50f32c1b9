//! Frame source and sink seams, with OpenCV file backends.

use std::fmt;
use std::path::{Path, PathBuf};

use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::VideoError;

/// Output frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: i32,
    pub height: i32,
}

impl Resolution {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn to_size(self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl From<Size> for Resolution {
    fn from(size: Size) -> Self {
        Self::new(size.width, size.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Sequential, seekable source of decoded frames
pub trait FrameSource {
    fn fps(&self) -> f64;

    fn frame_size(&self) -> Resolution;

    /// Index of the next frame `read` returns
    fn position(&self) -> usize;

    /// Next frame, `None` at end of stream
    fn read(&mut self) -> Result<Option<Mat>, VideoError>;

    /// Reposition so the next `read` returns frame `index`
    fn seek(&mut self, index: usize) -> Result<(), VideoError>;

    /// Discard up to `count` frames. Returns how many were actually skipped.
    fn skip(&mut self, count: usize) -> Result<usize, VideoError> {
        for skipped in 0..count {
            if self.read()?.is_none() {
                return Ok(skipped);
            }
        }
        Ok(count)
    }
}

/// Destination for encoded frames
pub trait FrameSink {
    fn write(&mut self, frame: &Mat) -> Result<(), VideoError>;

    fn frames_written(&self) -> usize;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn frame_size(&self) -> Resolution {
        (**self).frame_size()
    }

    fn position(&self) -> usize {
        (**self).position()
    }

    fn read(&mut self) -> Result<Option<Mat>, VideoError> {
        (**self).read()
    }

    fn seek(&mut self, index: usize) -> Result<(), VideoError> {
        (**self).seek(index)
    }

    fn skip(&mut self, count: usize) -> Result<usize, VideoError> {
        (**self).skip(count)
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn write(&mut self, frame: &Mat) -> Result<(), VideoError> {
        (**self).write(frame)
    }

    fn frames_written(&self) -> usize {
        (**self).frames_written()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write(&mut self, frame: &Mat) -> Result<(), VideoError> {
        (**self).write(frame)
    }

    fn frames_written(&self) -> usize {
        (**self).frames_written()
    }
}

fn path_str(path: &Path) -> Result<&str, VideoError> {
    path.to_str()
        .ok_or_else(|| VideoError::InvalidPath(path.to_path_buf()))
}

/// Video file reader backed by `cv::VideoCapture`
pub struct VideoReader {
    capture: VideoCapture,
    path: PathBuf,
    fps: f64,
    size: Resolution,
    position: usize,
}

impl VideoReader {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let capture = VideoCapture::from_file(path_str(path)?, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(VideoError::OpenFailed(path.to_path_buf()));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(VideoError::InvalidFrameRate(fps));
        }
        let size = Resolution::new(
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
        );

        debug!("Opened {} ({} @ {:.2} fps)", path.display(), size, fps);
        Ok(Self {
            capture,
            path: path.to_path_buf(),
            fps,
            size,
            position: 0,
        })
    }

}

impl FrameSource for VideoReader {
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
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        self.position += 1;
        Ok(Some(frame))
    }

    fn seek(&mut self, index: usize) -> Result<(), VideoError> {
        self.capture.set(videoio::CAP_PROP_POS_FRAMES, index as f64)?;
        self.position = index;
        Ok(())
    }

    fn skip(&mut self, count: usize) -> Result<usize, VideoError> {
        // grab() advances without decoding
        for skipped in 0..count {
            if !self.capture.grab()? {
                return Ok(skipped);
            }
            self.position += 1;
        }
        Ok(count)
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            debug!("Failed to release capture for {}: {}", self.path.display(), e);
        }
    }
}

/// XVID-encoded video file writer backed by `cv::VideoWriter`
pub struct VideoFileWriter {
    writer: VideoWriter,
    path: PathBuf,
    frames: usize,
}

impl VideoFileWriter {
    pub fn create(path: &Path, fps: f64, size: Resolution) -> Result<Self, VideoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let fourcc = VideoWriter::fourcc('X', 'V', 'I', 'D')?;
        let writer = VideoWriter::new(path_str(path)?, fourcc, fps, size.to_size(), true)?;
        if !writer.is_opened()? {
            return Err(VideoError::WriterFailed(path.to_path_buf()));
        }

        debug!("Writing {} ({} @ {:.2} fps)", path.display(), size, fps);
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            frames: 0,
        })
    }
}

impl FrameSink for VideoFileWriter {
    fn write(&mut self, frame: &Mat) -> Result<(), VideoError> {
        self.writer.write(frame)?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames
    }
}

impl Drop for VideoFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.release() {
            debug!("Failed to release writer for {}: {}", self.path.display(), e);
        }
    }
}
