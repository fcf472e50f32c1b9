//! Shot-type taxonomy keyed by the play-by-play action-type code.
//!
//! The table is static reference data. It is built once per process, never
//! mutated, and the shot families are derived from it at the same time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// (action-type code, label, historical frequency weight)
const SHOT_TYPES: &[(u32, &str, u32)] = &[
    (1, "JUMP_SHOT", 61_482),
    (2, "RUNNING_JUMP_SHOT", 2_118),
    (3, "HOOK_SHOT", 3_204),
    (4, "TIP_SHOT", 962),
    (5, "LAYUP", 9_871),
    (6, "DRIVING_LAYUP_SHOT", 1_043),
    (7, "DUNK", 4_512),
    (8, "SLAM_DUNK", 327),
    (9, "DRIVING_DUNK", 1_884),
    (41, "RUNNING_LAYUP", 2_967),
    (42, "DRIVING_LAYUP", 15_630),
    (43, "ALLEY_OOP_LAYUP", 611),
    (44, "REVERSE_LAYUP", 2_406),
    (45, "JUMP_SHOT_CLOSE", 154),
    (46, "RUNNING_HOOK_SHOT", 402),
    (47, "TURNAROUND_JUMP_SHOT", 2_853),
    (50, "RUNNING_DUNK", 1_517),
    (51, "REVERSE_DUNK", 208),
    (52, "ALLEY_OOP_DUNK", 2_245),
    (55, "HOOK_BANK_SHOT", 181),
    (57, "DRIVING_HOOK_SHOT", 1_270),
    (58, "TURNAROUND_HOOK_SHOT", 1_986),
    (63, "FADEAWAY_JUMP_SHOT", 2_774),
    (66, "JUMP_BANK_SHOT", 1_102),
    (67, "HOOK_BANK_SHOT_CLOSE", 96),
    (71, "FINGER_ROLL_LAYUP", 598),
    (72, "PUTBACK_LAYUP", 3_318),
    (73, "DRIVING_REVERSE_LAYUP", 2_150),
    (74, "RUNNING_REVERSE_LAYUP", 587),
    (75, "DRIVING_FINGER_ROLL_LAYUP", 3_744),
    (76, "RUNNING_FINGER_ROLL_LAYUP", 1_062),
    (78, "FLOATING_JUMP_SHOT", 4_980),
    (79, "PULLUP_JUMP_SHOT", 16_204),
    (80, "STEP_BACK_JUMP_SHOT", 7_915),
    (81, "PULLUP_BANK_SHOT", 233),
    (82, "DRIVING_BANK_SHOT", 148),
    (83, "FADEAWAY_BANK_SHOT", 312),
    (85, "TURNAROUND_BANK_SHOT", 441),
    (86, "TURNAROUND_FADEAWAY_SHOT", 1_809),
    (87, "PUTBACK_DUNK", 1_391),
    (93, "DRIVING_BANK_HOOK_SHOT", 166),
    (96, "TURNAROUND_BANK_HOOK_SHOT", 240),
    (97, "TIP_LAYUP_SHOT", 1_655),
    (98, "CUTTING_LAYUP_SHOT", 4_367),
    (99, "CUTTING_FINGER_ROLL_LAYUP_SHOT", 1_128),
    (100, "RUNNING_ALLEY_OOP_LAYUP_SHOT", 253),
    (101, "DRIVING_FLOATING_JUMP_SHOT", 5_432),
    (102, "DRIVING_FLOATING_BANK_JUMP_SHOT", 1_097),
    (103, "RUNNING_PULL_UP_JUMP_SHOT", 3_680),
    (104, "STEP_BACK_BANK_JUMP_SHOT", 120),
    (105, "TURNAROUND_FADEAWAY_BANK_JUMP_SHOT", 219),
    (106, "RUNNING_ALLEY_OOP_DUNK_SHOT", 1_284),
    (107, "TIP_DUNK_SHOT", 512),
    (108, "CUTTING_DUNK_SHOT", 3_506),
    (109, "DRIVING_REVERSE_DUNK_SHOT", 174),
    (110, "RUNNING_REVERSE_DUNK_SHOT", 102),
];

/// Shot families derived from label substrings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShotFamily {
    Hook,
    Bank,
    Jump,
    Layup,
    Dunk,
    Cut,
    Putback,
}

impl ShotFamily {
    pub const ALL: [ShotFamily; 7] = [
        ShotFamily::Hook,
        ShotFamily::Bank,
        ShotFamily::Jump,
        ShotFamily::Layup,
        ShotFamily::Dunk,
        ShotFamily::Cut,
        ShotFamily::Putback,
    ];

    /// Label substrings that put a shot type into this family
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            ShotFamily::Hook => &["HOOK"],
            ShotFamily::Bank => &["BANK"],
            ShotFamily::Jump => &["JUMP"],
            ShotFamily::Layup => &["LAYUP"],
            ShotFamily::Dunk => &["DUNK"],
            ShotFamily::Cut => &["CUTTING"],
            ShotFamily::Putback => &["PUTBACK", "TIP"],
        }
    }

    fn matches(&self, label: &str) -> bool {
        self.keywords().iter().any(|keyword| label.contains(keyword))
    }
}

impl fmt::Display for ShotFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShotFamily::Hook => "hook",
            ShotFamily::Bank => "bank",
            ShotFamily::Jump => "jump",
            ShotFamily::Layup => "layup",
            ShotFamily::Dunk => "dunk",
            ShotFamily::Cut => "cut",
            ShotFamily::Putback => "putback",
        };
        f.write_str(name)
    }
}

/// Immutable code → label table with derived families
#[derive(Debug)]
pub struct ShotTaxonomy {
    labels: BTreeMap<u32, &'static str>,
    codes: HashMap<&'static str, u32>,
    frequencies: HashMap<&'static str, u32>,
    families: HashMap<ShotFamily, BTreeSet<u32>>,
}

static TAXONOMY: Lazy<ShotTaxonomy> = Lazy::new(ShotTaxonomy::build);

/// Process-wide taxonomy instance
pub fn taxonomy() -> &'static ShotTaxonomy {
    &TAXONOMY
}

impl ShotTaxonomy {
    fn build() -> Self {
        let mut labels = BTreeMap::new();
        let mut codes = HashMap::new();
        let mut frequencies = HashMap::new();

        for &(code, label, weight) in SHOT_TYPES {
            labels.insert(code, label);
            codes.insert(label, code);
            frequencies.insert(label, weight);
        }

        let families = ShotFamily::ALL
            .iter()
            .map(|family| {
                let members = labels
                    .iter()
                    .filter(|(_, label)| family.matches(label))
                    .map(|(code, _)| *code)
                    .collect();
                (*family, members)
            })
            .collect();

        Self {
            labels,
            codes,
            frequencies,
            families,
        }
    }

    /// Label for an action-type code, `None` for codes outside the taxonomy
    pub fn label(&self, code: u32) -> Option<&'static str> {
        self.labels.get(&code).copied()
    }

    pub fn code(&self, label: &str) -> Option<u32> {
        self.codes.get(label).copied()
    }

    /// Historical frequency weight of a label
    pub fn frequency(&self, label: &str) -> Option<u32> {
        self.frequencies.get(label).copied()
    }

    /// Codes belonging to a family
    pub fn family(&self, family: ShotFamily) -> &BTreeSet<u32> {
        &self.families[&family]
    }

    pub fn is_in_family(&self, code: u32, family: ShotFamily) -> bool {
        self.family(family).contains(&code)
    }

    /// All families a code belongs to (a jump bank shot is both)
    pub fn families_of(&self, code: u32) -> Vec<ShotFamily> {
        ShotFamily::ALL
            .iter()
            .copied()
            .filter(|family| self.is_in_family(code, *family))
            .collect()
    }

    pub fn is_putback(&self, code: u32) -> bool {
        self.is_in_family(code, ShotFamily::Putback)
    }

    /// Inverse-frequency class weights normalised so the mean weight is 1.0
    pub fn class_weights(&self) -> BTreeMap<&'static str, f64> {
        let count = self.frequencies.len() as f64;
        let inverse: Vec<(&'static str, f64)> = self
            .frequencies
            .iter()
            .map(|(label, weight)| (*label, 1.0 / f64::from((*weight).max(1))))
            .collect();
        let total: f64 = inverse.iter().map(|(_, w)| w).sum();

        inverse
            .into_iter()
            .map(|(label, w)| (label, w * count / total))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
