use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::DatasetError;
use crate::taxonomy::taxonomy;

/// File name of every extracted clip inside its event directory
pub const CLIP_FILE: &str = "cut_video.avi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            validation: 0.15,
            test: 0.15,
        }
    }
}

impl SplitRatios {
    pub fn validate(&self) -> Result<(), DatasetError> {
        let sum = self.train + self.validation + self.test;
        let non_negative = [self.train, self.validation, self.test]
            .iter()
            .all(|r| r.is_finite() && *r >= 0.0);
        if !non_negative || (sum - 1.0).abs() > 1e-6 {
            return Err(DatasetError::InvalidRatios(sum));
        }
        Ok(())
    }

    /// (train, validation) counts for `n` items; the test split takes the rest
    fn counts(&self, n: usize) -> (usize, usize) {
        let train = ((n as f64) * self.train).floor() as usize;
        let validation = (((n as f64) * self.validation).floor() as usize).min(n - train);
        (train, validation)
    }
}

/// A clip found under the dataset root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClipEntry {
    pub category: String,
    pub event_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub counts: BTreeMap<Split, usize>,
    pub per_category: BTreeMap<String, BTreeMap<Split, usize>>,
    /// Taxonomy class weights of the categories present
    pub class_weights: BTreeMap<String, f64>,
}

impl SplitSummary {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, split: Split) -> usize {
        self.counts.get(&split).copied().unwrap_or(0)
    }
}

/// Collect `root/<category>/<event_id>/cut_video.avi`
pub fn collect_clips(root: &Path) -> Result<Vec<ClipEntry>, DatasetError> {
    if !root.is_dir() {
        return Err(DatasetError::MissingRoot(root.to_path_buf()));
    }

    let mut clips = Vec::new();
    for entry in WalkDir::new(root).min_depth(3).max_depth(3) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != CLIP_FILE {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let mut parts = relative.iter().map(|p| p.to_string_lossy().into_owned());
        if let (Some(category), Some(event_id)) = (parts.next(), parts.next()) {
            clips.push(ClipEntry {
                category,
                event_id,
                path: entry.path().to_path_buf(),
            });
        }
    }

    clips.sort();
    Ok(clips)
}

#[derive(Debug, Clone)]
pub struct DatasetSplitter {
    pub ratios: SplitRatios,
    pub seed: u64,
}

impl DatasetSplitter {
    pub fn new(ratios: SplitRatios, seed: u64) -> Self {
        Self { ratios, seed }
    }

    /// Assign every clip a split. Each category is shuffled independently
    /// with a generator seeded once, so the result only depends on the seed
    /// and the set of clips.
    pub fn assign(&self, clips: Vec<ClipEntry>) -> Result<Vec<(Split, ClipEntry)>, DatasetError> {
        self.ratios.validate()?;

        let mut by_category: BTreeMap<String, Vec<ClipEntry>> = BTreeMap::new();
        for clip in clips {
            by_category.entry(clip.category.clone()).or_default().push(clip);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assigned = Vec::new();
        for (_, mut entries) in by_category {
            entries.sort();
            entries.shuffle(&mut rng);

            let (train, validation) = self.ratios.counts(entries.len());
            for (position, clip) in entries.into_iter().enumerate() {
                let split = if position < train {
                    Split::Train
                } else if position < train + validation {
                    Split::Validation
                } else {
                    Split::Test
                };
                assigned.push((split, clip));
            }
        }
        Ok(assigned)
    }

    /// Copy clips under `root` into `out/<split>/<category>/<event_id>.avi`
    pub fn split(&self, root: &Path, out: &Path) -> Result<SplitSummary, DatasetError> {
        let clips = collect_clips(root)?;
        info!("📂 Found {} clips under {}", clips.len(), root.display());

        let weights = taxonomy().class_weights();
        let mut summary = SplitSummary::default();
        for (split, clip) in self.assign(clips)? {
            let dir = out.join(split.dir_name()).join(&clip.category);
            std::fs::create_dir_all(&dir)?;
            let target = dir.join(format!("{}.avi", clip.event_id));
            std::fs::copy(&clip.path, &target)?;
            debug!("{} → {}", clip.path.display(), target.display());

            *summary.counts.entry(split).or_default() += 1;
            *summary
                .per_category
                .entry(clip.category.clone())
                .or_default()
                .entry(split)
                .or_default() += 1;
            if let Some(weight) = weights.get(clip.category.as_str()) {
                summary.class_weights.insert(clip.category, *weight);
            }
        }

        info!(
            "✅ Split {} clips: {} train, {} validation, {} test",
            summary.total(),
            summary.count(Split::Train),
            summary.count(Split::Validation),
            summary.count(Split::Test)
        );
        Ok(summary)
    }
}
