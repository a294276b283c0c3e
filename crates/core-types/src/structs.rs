use crate::enums::ZoneKind;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(CoreError::InvalidInput(
                    name.to_string(),
                    format!("non-finite value {} at {}", value, self.timestamp),
                ));
            }
        }
        if self.low > self.high {
            return Err(CoreError::InvalidInput(
                "low".to_string(),
                format!("low {} above high {} at {}", self.low, self.high, self.timestamp),
            ));
        }
        Ok(())
    }
}

/// A validated, chronologically ordered (oldest first) sequence of bars.
///
/// Timestamps are strictly increasing. A series is never mutated after construction;
/// the slicing helpers hand out borrowed views or fresh series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Builds a series from bars that are already in chronological order.
    pub fn new(bars: Vec<Bar>) -> Result<Self, CoreError> {
        for bar in &bars {
            bar.validate()?;
        }
        for pair in bars.windows(2) {
            let (previous, current) = (pair[0].timestamp, pair[1].timestamp);
            if current == previous {
                return Err(CoreError::DuplicateTimestamp(current));
            }
            if current < previous {
                return Err(CoreError::OutOfOrder { previous, current });
            }
        }
        Ok(Self { bars })
    }

    /// Builds a series from bars in any order (providers commonly return newest first).
    pub fn from_unordered(mut bars: Vec<Bar>) -> Result<Self, CoreError> {
        bars.sort_by_key(|b| b.timestamp);
        Self::new(bars)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The most recent `n` bars (or all of them when the series is shorter).
    pub fn tail(&self, n: usize) -> &[Bar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    /// Bars with `start <= timestamp <= end`, as a new series.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BarSeries {
        BarSeries {
            bars: self
                .bars
                .iter()
                .filter(|b| b.timestamp >= start && b.timestamp <= end)
                .copied()
                .collect(),
        }
    }

    /// A new series holding the first `n` bars. Used to replay a series bar by bar.
    pub fn truncated(&self, n: usize) -> BarSeries {
        BarSeries {
            bars: self.bars[..n.min(self.bars.len())].to_vec(),
        }
    }

    /// Bars from index `start` onwards, as a new series.
    pub fn slice_from(&self, start: usize) -> BarSeries {
        BarSeries {
            bars: self.bars[start.min(self.bars.len())..].to_vec(),
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn max_high(&self) -> Option<f64> {
        self.bars.iter().map(|b| b.high).reduce(f64::max)
    }

    pub fn min_low(&self) -> Option<f64> {
        self.bars.iter().map(|b| b.low).reduce(f64::min)
    }

    pub fn total_volume(&self) -> f64 {
        self.bars.iter().map(|b| b.volume).sum()
    }
}

impl<'de> Deserialize<'de> for BarSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            bars: Vec<Bar>,
        }
        let raw = Raw::deserialize(deserializer)?;
        BarSeries::new(raw.bars).map_err(serde::de::Error::custom)
    }
}

/// Where a zone sits on the price axis: a single level or a band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneBounds {
    Level {
        #[serde(serialize_with = "crate::precision::serialize_price")]
        level: f64,
    },
    Range {
        #[serde(serialize_with = "crate::precision::serialize_price")]
        range_start: f64,
        #[serde(serialize_with = "crate::precision::serialize_price")]
        range_end: f64,
    },
}

/// A typed price zone with provenance.
///
/// Serializes flat, e.g. `{"type":"SUPPORT","name":"5M VAL","range_start":..,"range_end":..,"source":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "type")]
    pub kind: ZoneKind,
    pub name: String,
    #[serde(flatten)]
    pub bounds: ZoneBounds,
    pub source: String,
}

impl Zone {
    pub fn level(kind: ZoneKind, name: impl Into<String>, level: f64, source: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            bounds: ZoneBounds::Level { level },
            source: source.into(),
        }
    }

    pub fn range(
        kind: ZoneKind,
        name: impl Into<String>,
        range_start: f64,
        range_end: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            bounds: ZoneBounds::Range {
                range_start,
                range_end,
            },
            source: source.into(),
        }
    }
}
