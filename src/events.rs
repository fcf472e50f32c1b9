//! Play-by-play events and the filter that turns them into shot clips to cut.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{seconds_between, GameClock, PERIOD_START};
use crate::error::{ClockError, EventTableError};
use crate::taxonomy::{taxonomy, ShotFamily};

/// Play-by-play event type (`EVENTMSGTYPE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MadeShot,
    MissedShot,
    FreeThrow,
    Rebound,
    Turnover,
    Foul,
    Violation,
    Substitution,
    Timeout,
    JumpBall,
    Ejection,
    PeriodStart,
    PeriodEnd,
    Other(u32),
}

impl EventKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => EventKind::MadeShot,
            2 => EventKind::MissedShot,
            3 => EventKind::FreeThrow,
            4 => EventKind::Rebound,
            5 => EventKind::Turnover,
            6 => EventKind::Foul,
            7 => EventKind::Violation,
            8 => EventKind::Substitution,
            9 => EventKind::Timeout,
            10 => EventKind::JumpBall,
            11 => EventKind::Ejection,
            12 => EventKind::PeriodStart,
            13 => EventKind::PeriodEnd,
            other => EventKind::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            EventKind::MadeShot => 1,
            EventKind::MissedShot => 2,
            EventKind::FreeThrow => 3,
            EventKind::Rebound => 4,
            EventKind::Turnover => 5,
            EventKind::Foul => 6,
            EventKind::Violation => 7,
            EventKind::Substitution => 8,
            EventKind::Timeout => 9,
            EventKind::JumpBall => 10,
            EventKind::Ejection => 11,
            EventKind::PeriodStart => 12,
            EventKind::PeriodEnd => 13,
            EventKind::Other(code) => *code,
        }
    }

    /// Field-goal attempt, made or missed
    pub fn is_shot(&self) -> bool {
        matches!(self, EventKind::MadeShot | EventKind::MissedShot)
    }
}

/// One play-by-play row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub game_id: String,
    pub event_num: u32,
    pub kind: EventKind,
    pub action_type: u32,
    pub period: u32,
    /// `MM:SS` period clock
    pub clock: String,
    pub home_description: Option<String>,
    pub neutral_description: Option<String>,
    pub visitor_description: Option<String>,
    pub video_available: bool,
}

impl GameEvent {
    fn descriptions(&self) -> impl Iterator<Item = &str> {
        [
            self.home_description.as_deref(),
            self.neutral_description.as_deref(),
            self.visitor_description.as_deref(),
        ]
        .into_iter()
        .flatten()
    }

    fn clock_reading(&self) -> Result<GameClock, EventTableError> {
        self.clock
            .parse()
            .map_err(|source: ClockError| EventTableError::Clock {
                event_num: self.event_num,
                source,
            })
    }
}

/// A shot event that survived filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotEvent {
    pub event: GameEvent,
    /// Home or visitor description, whichever was present
    pub description: String,
    pub secs_since_previous: i64,
    /// Taxonomy label of the action type
    pub label: Option<String>,
}

impl ShotEvent {
    /// Category used for the dataset folders: the taxonomy label, or the
    /// action phrase parsed out of the description for unknown codes.
    pub fn category(&self) -> Option<String> {
        self.label
            .clone()
            .or_else(|| extract_action_label(&self.description))
    }

    /// `<game_id>_<event_num>`
    pub fn event_id(&self) -> String {
        format!("{}_{}", self.event.game_id, self.event.event_num)
    }
}

/// Per-row seconds since the previous event.
///
/// The first row of every period is measured against `12:00`.
pub fn time_since_previous(events: &[GameEvent]) -> Result<Vec<i64>, EventTableError> {
    let mut gaps = Vec::with_capacity(events.len());
    let mut previous: Option<(u32, GameClock)> = None;

    for event in events {
        let current = event.clock_reading()?;
        let reference = match previous {
            Some((period, clock)) if period == event.period => clock,
            _ => PERIOD_START,
        };
        gaps.push(seconds_between(&reference, &current));
        previous = Some((event.period, current));
    }

    Ok(gaps)
}

static ACTION_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?:  |' )([^(]+)").ok());

/// Recover the shot-type token from a free-text description.
///
/// `"Curry 25' 3PT Jump Shot (3 PTS)"` becomes `JUMP_SHOT` and
/// `"MISS James  Driving Layup"` becomes `DRIVING_LAYUP`. `None` means the
/// label is unknown, not that the description is invalid.
pub fn extract_action_label(description: &str) -> Option<String> {
    let captures = ACTION_PATTERN.as_ref()?.captures(description)?;
    let phrase = captures.get(1)?.as_str();

    let label = phrase.replace(' ', "_").to_uppercase();
    let label = label.trim_end_matches('_').replace("3PT_", "");

    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

/// Reduces a raw play-by-play table to the shots worth cutting
#[derive(Debug, Clone)]
pub struct ShotTableBuilder {
    /// Max seconds between a rebound and the shots around it
    pub rebound_window_secs: i64,
    pub block_marker: String,
    pub excluded_families: Vec<ShotFamily>,
}

impl Default for ShotTableBuilder {
    fn default() -> Self {
        Self {
            rebound_window_secs: 4,
            block_marker: "BLOCK".to_string(),
            excluded_families: vec![ShotFamily::Putback],
        }
    }
}

impl ShotTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&self, events: &[GameEvent]) -> Result<Vec<ShotEvent>, EventTableError> {
        let gaps = time_since_previous(events)?;
        let sandwiched = self.rebound_sandwiches(events, &gaps);
        let tax = taxonomy();

        let mut shots = Vec::new();
        for (index, event) in events.iter().enumerate() {
            if sandwiched[index] {
                debug!("Dropping event {}: shot-rebound-shot sequence", event.event_num);
                continue;
            }
            if !event.kind.is_shot() || !event.video_available {
                continue;
            }
            if event.descriptions().any(|d| d.contains(&self.block_marker)) {
                debug!("Dropping event {}: blocked shot", event.event_num);
                continue;
            }
            if self
                .excluded_families
                .iter()
                .any(|family| tax.is_in_family(event.action_type, *family))
            {
                debug!("Dropping event {}: excluded shot family", event.event_num);
                continue;
            }

            let description = coalesce_description(event)?;
            shots.push(ShotEvent {
                event: event.clone(),
                description,
                secs_since_previous: gaps[index],
                label: tax.label(event.action_type).map(str::to_string),
            });
        }

        Ok(shots)
    }

    /// Marks rebounds that sit between two shots within the window on both
    /// sides, together with those two shots.
    fn rebound_sandwiches(&self, events: &[GameEvent], gaps: &[i64]) -> Vec<bool> {
        let mut marked = vec![false; events.len()];

        for i in 1..events.len().saturating_sub(1) {
            let (before, rebound, after) = (&events[i - 1], &events[i], &events[i + 1]);
            if rebound.kind != EventKind::Rebound || !before.kind.is_shot() || !after.kind.is_shot() {
                continue;
            }
            if before.period != rebound.period || after.period != rebound.period {
                continue;
            }
            let within = |gap: i64| (0..=self.rebound_window_secs).contains(&gap);
            if within(gaps[i]) && within(gaps[i + 1]) {
                marked[i - 1] = true;
                marked[i] = true;
                marked[i + 1] = true;
            }
        }

        marked
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn coalesce_description(event: &GameEvent) -> Result<String, EventTableError> {
    match (
        non_empty(&event.home_description),
        non_empty(&event.visitor_description),
    ) {
        (Some(_), Some(_)) => Err(EventTableError::ConflictingDescriptions {
            event_num: event.event_num,
        }),
        (Some(description), None) | (None, Some(description)) => Ok(description.to_string()),
        (None, None) => Err(EventTableError::MissingDescription {
            event_num: event.event_num,
        }),
    }
}
