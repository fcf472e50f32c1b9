//! Scoreboard text recognition.
//!
//! Frames are cropped to the band where the broadcast shows the game clock,
//! binarised and handed to the `tesseract` command-line engine.

use std::path::{Path, PathBuf};
use std::process::Command;

use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::error::OcrError;

const WINDOWS_TESSERACT: &str = r"C:\Program Files\Tesseract-OCR\tesseract.exe";
const LINUX_TESSERACT: &str = "/usr/bin/tesseract";

/// Bottom band of the frame where the scoreboard lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockRegion {
    /// The band is the bottom `1 / divisor` of the frame height
    pub divisor: i32,
}

impl ClockRegion {
    pub const BOTTOM_THIRD: ClockRegion = ClockRegion { divisor: 3 };
    pub const BOTTOM_QUARTER: ClockRegion = ClockRegion { divisor: 4 };

    pub fn new(divisor: i32) -> Self {
        Self {
            divisor: divisor.max(1),
        }
    }

    /// Crop rectangle for a `cols` x `rows` frame
    pub fn rect(&self, cols: i32, rows: i32) -> Rect {
        let band = (rows / self.divisor.max(1)).max(1).min(rows);
        Rect::new(0, rows - band, cols, band)
    }
}

impl Default for ClockRegion {
    fn default() -> Self {
        Self::BOTTOM_THIRD
    }
}

/// Crop to the clock band, convert to grayscale, Otsu-threshold inverted and
/// smooth with a 5x5 Gaussian.
pub fn preprocess(frame: &Mat, region: ClockRegion) -> Result<Mat, OcrError> {
    let rect = region.rect(frame.cols(), frame.rows());
    let roi = Mat::roi(frame, rect)?;
    let mut crop = Mat::default();
    roi.copy_to(&mut crop)?;

    let gray = if crop.channels() == 1 {
        crop
    } else {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(&crop, &mut gray, imgproc::COLOR_BGR2GRAY)?;
        gray
    };

    let mut binary = Mat::default();
    imgproc::threshold(
        &gray,
        &mut binary,
        0.0,
        255.0,
        imgproc::THRESH_BINARY_INV | imgproc::THRESH_OTSU,
    )?;

    let mut blurred = Mat::default();
    imgproc::gaussian_blur_def(&binary, &mut blurred, Size::new(5, 5), 0.0)?;
    Ok(blurred)
}

/// Turns a frame into whatever text the engine can read on it
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, frame: &Mat) -> Result<String, OcrError>;
}

impl<R: TextRecognizer + ?Sized> TextRecognizer for Box<R> {
    fn recognize(&self, frame: &Mat) -> Result<String, OcrError> {
        (**self).recognize(frame)
    }
}

impl<R: TextRecognizer + ?Sized> TextRecognizer for std::sync::Arc<R> {
    fn recognize(&self, frame: &Mat) -> Result<String, OcrError> {
        (**self).recognize(frame)
    }
}

/// Resolve the tesseract binary for `os` (as in `std::env::consts::OS`).
///
/// A configured path always wins. Without one only Windows and Linux have
/// a known install location.
pub fn tesseract_path(os: &str, configured: Option<&Path>) -> Result<PathBuf, OcrError> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    match os {
        "windows" => Ok(PathBuf::from(WINDOWS_TESSERACT)),
        "linux" => Ok(PathBuf::from(LINUX_TESSERACT)),
        other => Err(OcrError::UnsupportedPlatform(other.to_string())),
    }
}

/// Recognizer that shells out to `tesseract <image> stdout -l <lang> --psm <n>`
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
    page_segmentation_mode: u32,
    region: ClockRegion,
}

impl TesseractRecognizer {
    pub fn new(binary: PathBuf, language: impl Into<String>, page_segmentation_mode: u32, region: ClockRegion) -> Self {
        Self {
            binary,
            language: language.into(),
            page_segmentation_mode,
            region,
        }
    }

    /// Recognizer described by `config`, resolving the binary for the running OS
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let binary = tesseract_path(std::env::consts::OS, config.tesseract_path.as_deref())?;
        info!("🔧 Using tesseract at {}", binary.display());
        Ok(Self::new(
            binary,
            config.language.clone(),
            config.page_segmentation_mode,
            config.region(),
        ))
    }

    fn run_engine(&self, image: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .output()
            .map_err(|source| OcrError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Engine {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, frame: &Mat) -> Result<String, OcrError> {
        let prepared = preprocess(frame, self.region)?;

        let image = tempfile::Builder::new()
            .prefix("clock-")
            .suffix(".png")
            .tempfile()?;
        let image_path = image.path().to_string_lossy().into_owned();
        if !imgcodecs::imwrite(&image_path, &prepared, &Vector::new())? {
            return Err(OcrError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("failed to encode {}", image_path),
            )));
        }

        let text = self.run_engine(image.path())?;
        debug!("OCR read {:?}", text.trim());
        Ok(text)
    }
}

/// Closure-backed recognizer for dry runs and tests
pub struct ScriptedRecognizer {
    script: Box<dyn Fn(&Mat) -> Result<String, OcrError> + Send + Sync>,
}

impl ScriptedRecognizer {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Mat) -> Result<String, OcrError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
        }
    }

    /// Always reads `text`
    pub fn constant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, frame: &Mat) -> Result<String, OcrError> {
        (self.script)(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::memory::encoded_frame;
    use opencv::prelude::*;
    use crate::video::Resolution;

    #[test]
    fn test_tesseract_path_per_platform() {
        assert_eq!(
            tesseract_path("windows", None).unwrap(),
            PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe")
        );
        assert_eq!(tesseract_path("linux", None).unwrap(), PathBuf::from("/usr/bin/tesseract"));
        assert!(matches!(
            tesseract_path("macos", None),
            Err(OcrError::UnsupportedPlatform(os)) if os == "macos"
        ));
        assert_eq!(
            tesseract_path("macos", Some(Path::new("/opt/homebrew/bin/tesseract"))).unwrap(),
            PathBuf::from("/opt/homebrew/bin/tesseract")
        );
    }

    #[test]
    fn test_clock_region_rect() {
        let rect = ClockRegion::BOTTOM_THIRD.rect(640, 360);
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 240, 640, 120));

        let rect = ClockRegion::BOTTOM_QUARTER.rect(640, 360);
        assert_eq!((rect.y, rect.height), (270, 90));

        let tiny = ClockRegion::BOTTOM_THIRD.rect(4, 2);
        assert_eq!((tiny.y, tiny.height), (1, 1));
    }

    #[test]
    fn test_preprocess_crops_to_band() {
        let frame = encoded_frame(7, Resolution::new(64, 48)).unwrap();
        let prepared = preprocess(&frame, ClockRegion::BOTTOM_THIRD).unwrap();
        assert_eq!(prepared.rows(), 16);
        assert_eq!(prepared.cols(), 64);
        assert_eq!(prepared.channels(), 1);
    }

    #[test]
    fn test_missing_binary_reports_spawn_error() {
        let config = OcrConfig {
            tesseract_path: Some(PathBuf::from("/nonexistent/tesseract")),
            ..OcrConfig::default()
        };
        let recognizer = TesseractRecognizer::from_config(&config).unwrap();
        let frame = encoded_frame(1, Resolution::new(32, 24)).unwrap();
        assert!(matches!(
            recognizer.recognize(&frame),
            Err(OcrError::Spawn { binary, .. }) if binary == PathBuf::from("/nonexistent/tesseract")
        ));
    }

    #[test]
    fn test_scripted_recognizer() {
        let recognizer = ScriptedRecognizer::constant("Q2 5:00 24");
        let frame = encoded_frame(0, Resolution::new(8, 8)).unwrap();
        assert_eq!(recognizer.recognize(&frame).unwrap(), "Q2 5:00 24");
    }
}
