//! Shot Clips - basketball shot-clip dataset builder
//!
//! Turns play-by-play records and broadcast highlight videos into short,
//! labeled clips of individual shot attempts. The game clock on the
//! scoreboard is read with OCR to find the moment of each shot.

pub mod clock;
pub mod config;
pub mod dataset;
pub mod download;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod remote;
pub mod taxonomy;
pub mod video;

// Re-export main types for easy access
pub use crate::clock::{shift_clock, GameClock};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::dataset::{DatasetSplitter, SplitRatios, SplitSummary};
pub use crate::download::{ClipDownloader, ClipFetcher};
pub use crate::events::{extract_action_label, GameEvent, ShotEvent, ShotTableBuilder};
pub use crate::pipeline::{DatasetBuilder, GameReport, ShotStatus};
pub use crate::remote::{RateLimiter, RetryPolicy, StatsClient, StatsSource};
pub use crate::taxonomy::{taxonomy, ShotFamily, ShotTaxonomy};
pub use crate::video::{ClipExtractor, ClipOutcome, ClipRequest, NormalizeOutcome, Normalizer};
