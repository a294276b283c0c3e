use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a tool-level or timeframe-level computation.
///
/// Severity is totally ordered as `Error > PartialSuccess = Warning > Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    PartialSuccess,
    Warning,
    Error,
}

impl Status {
    /// Rolls a set of per-frame statuses into one overall status.
    ///
    /// Any `Error` makes the whole result an error; any other degradation is reported
    /// as `PartialSuccess`. An empty set is a `Warning` since nothing was produced.
    pub fn rollup<I>(statuses: I) -> Status
    where
        I: IntoIterator<Item = Status>,
    {
        let mut seen_any = false;
        let mut overall = Status::Success;
        for status in statuses {
            seen_any = true;
            match status {
                Status::Error => return Status::Error,
                Status::PartialSuccess | Status::Warning => overall = Status::PartialSuccess,
                Status::Success => {}
            }
        }
        if seen_any { overall } else { Status::Warning }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::PartialSuccess => write!(f, "partial_success"),
            Status::Warning => write!(f, "warning"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// Bullish or bearish side of a gap, breakout or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "bullish"),
            Direction::Bearish => write!(f, "bearish"),
        }
    }
}

/// The role a price zone plays for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneKind {
    Support,
    Resistance,
    Neutral,
    TargetUpside,
    TargetDownside,
}
