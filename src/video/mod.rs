//! Video decoding, scoreboard OCR, clip extraction and normalization.
//!
//! Everything in here is synchronous. The async pipeline drives it from the
//! blocking thread pool.

pub mod extractor;
pub mod memory;
pub mod normalizer;
pub mod ocr;
pub mod source;

pub use extractor::{decimation_factor, ClipExtractor, ClipOutcome, ClipRequest};
pub use memory::{MemorySink, MemorySource};
pub use normalizer::{NormalizeOutcome, Normalizer};
pub use ocr::{preprocess, tesseract_path, ClockRegion, ScriptedRecognizer, TesseractRecognizer, TextRecognizer};
pub use source::{FrameSink, FrameSource, Resolution, VideoFileWriter, VideoReader};
