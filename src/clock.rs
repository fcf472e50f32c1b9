//! Game-clock readings and the arithmetic used to build OCR targets.
//!
//! Play-by-play rows carry the period clock as `MM:SS`. Broadcast graphics
//! show the same clock as `M:SS` above one minute and as `S.t` (seconds with a
//! tenths digit) below it, so the strings searched for on screen are
//! formatted the way the scoreboard renders them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClockError;

/// Length of a regulation period, used as the "previous" reading of the
/// first event in a period.
pub const PERIOD_START: GameClock = GameClock {
    minutes: 12,
    seconds: 0,
};

/// A `MM:SS` game-clock reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameClock {
    pub minutes: u32,
    pub seconds: u32,
}

impl GameClock {
    pub fn new(minutes: u32, seconds: u32) -> Result<Self, ClockError> {
        if minutes > 59 || seconds > 59 {
            return Err(ClockError::OutOfRange(format!("{}:{:02}", minutes, seconds)));
        }
        Ok(Self { minutes, seconds })
    }

    pub fn total_seconds(&self) -> i64 {
        i64::from(self.minutes) * 60 + i64::from(self.seconds)
    }
}

impl FromStr for GameClock {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (minutes, seconds) = trimmed
            .split_once(':')
            .ok_or_else(|| ClockError::Format(s.to_string()))?;

        let parse_part = |part: &str| -> Result<u32, ClockError> {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ClockError::Format(s.to_string()));
            }
            part.parse().map_err(|_| ClockError::Format(s.to_string()))
        };

        let minutes = parse_part(minutes)?;
        let seconds = parse_part(seconds)?;
        Self::new(minutes, seconds).map_err(|_| ClockError::OutOfRange(s.to_string()))
    }
}

impl fmt::Display for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// Seconds elapsed between two readings of a count-down clock.
pub fn seconds_between(previous: &GameClock, current: &GameClock) -> i64 {
    previous.total_seconds() - current.total_seconds()
}

/// Shift a clock reading by `delta_secs` and format it the way the broadcast
/// scoreboard shows it.
///
/// Readings under a minute never go below zero: the delta is floored at the
/// remaining seconds. Longer readings clamp at zero too rather than wrapping
/// back around the hour, so `("01:10", -500)` gives `"0."`, not `"52:50"`.
///
/// Results under one minute are rendered as `"<S>."` (`"45."`, `"5."`,
/// `"0."`), everything else as `"<M>:<SS>"` with no leading zero on the
/// minutes.
pub fn shift_clock(clock: &str, delta_secs: i64) -> Result<String, ClockError> {
    let reading: GameClock = clock.parse()?;

    let delta = if reading.minutes == 0 {
        delta_secs.max(-i64::from(reading.seconds))
    } else {
        delta_secs
    };

    let shifted = (reading.total_seconds() + delta).max(0);
    // minutes roll over at the hour, like a %M formatter would
    let minutes = (shifted / 60) % 60;
    let seconds = shifted % 60;

    if minutes == 0 {
        Ok(format!("{}.", seconds))
    } else {
        Ok(format!("{}:{:02}", minutes, seconds))
    }
}
