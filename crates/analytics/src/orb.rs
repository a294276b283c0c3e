//! Opening Range Breakout analysis.
//!
//! For each requested period the opening range is the high/low traded between the session
//! open and `open + period`. The analyzer then classifies where the current price sits,
//! whether a breakout has held, which extension targets were reached, and combines all
//! periods into a directional bias and a range-squeeze reading.

use crate::error::AnalyticsError;
use crate::trend::Sentiment;
use chrono::{DateTime, Duration, Utc};
use core_types::precision::{round_to, serialize_price, serialize_price_map};
use core_types::{Bar, BarSeries, Direction, round_price};
use indexmap::IndexMap;
use serde::Serialize;

const TARGET_MULTIPLES: [(&str, f64); 4] = [("0.5x", 0.5), ("1x", 1.0), ("1.5x", 1.5), ("2x", 2.0)];
const SQUEEZE_RATIO: f64 = 0.7;

/// Regular-session boundaries for the trading day being analysed, as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePosition {
    AboveRange,
    BelowRange,
    InsideRange,
}

impl RangePosition {
    fn side(&self) -> Option<Direction> {
        match self {
            RangePosition::AboveRange => Some(Direction::Bullish),
            RangePosition::BelowRange => Some(Direction::Bearish),
            RangePosition::InsideRange => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeVolume {
    pub total_volume: f64,
    pub avg_volume_per_minute: f64,
    /// Mean window volume over mean regular-session volume.
    pub volume_ratio: f64,
    pub high_volume: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpeningRange {
    pub period_minutes: u32,
    #[serde(serialize_with = "serialize_price")]
    pub high: f64,
    #[serde(serialize_with = "serialize_price")]
    pub low: f64,
    #[serde(serialize_with = "serialize_price")]
    pub range_width: f64,
    #[serde(serialize_with = "serialize_price")]
    pub midpoint: f64,
    pub position: RangePosition,
    pub distance_from_range_pct: f64,
    pub breakout_confirmed: bool,
    pub breakout_kind: Option<Direction>,
    pub volume: RangeVolume,
    #[serde(serialize_with = "serialize_price_map")]
    pub targets: IndexMap<String, f64>,
    pub targets_hit: Vec<String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Outcome for one opening-range period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeriodOutcome {
    Analyzed(OpeningRange),
    InsufficientData {
        message: String,
        required: usize,
        available: usize,
    },
}

impl PeriodOutcome {
    pub fn range(&self) -> Option<&OpeningRange> {
        match self {
            PeriodOutcome::Analyzed(range) => Some(range),
            PeriodOutcome::InsufficientData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingBias {
    pub bias: Sentiment,
    pub confidence: Confidence,
    pub bullish_signals: u32,
    pub bearish_signals: u32,
    pub strength_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqueezeReport {
    pub squeeze_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contracting_ranges: Option<bool>,
    /// Range at the longest period over range at the shortest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(serialize_with = "serialize_price_map")]
    pub range_progression: IndexMap<String, f64>,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrbReport {
    pub periods: IndexMap<String, PeriodOutcome>,
    pub trading_bias: TradingBias,
    pub squeeze: SqueezeReport,
}

pub fn period_label(period: u32) -> String {
    format!("{}min", period)
}

#[derive(Debug, Clone)]
pub struct OpeningRangeAnalyzer {
    periods: Vec<u32>,
    breakout_buffer_pct: f64,
    confirmation_bars: usize,
    high_volume_ratio: f64,
}

impl Default for OpeningRangeAnalyzer {
    fn default() -> Self {
        Self {
            periods: vec![5, 15, 30],
            breakout_buffer_pct: 0.1,
            confirmation_bars: 3,
            high_volume_ratio: 1.2,
        }
    }
}

impl OpeningRangeAnalyzer {
    pub fn new(
        periods: Vec<u32>,
        breakout_buffer_pct: f64,
        confirmation_bars: usize,
        high_volume_ratio: f64,
    ) -> Result<Self, AnalyticsError> {
        if periods.is_empty() || periods.contains(&0) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "opening range periods must be non-empty and positive, got {:?}",
                periods
            )));
        }
        Ok(Self {
            periods,
            breakout_buffer_pct,
            confirmation_bars,
            high_volume_ratio,
        })
    }

    /// Analyses every configured period against the bars of `session`.
    ///
    /// `current_price` is the latest traded price; bars outside the regular session are
    /// ignored. Fails only when there is nothing to analyse at all.
    pub fn analyze(
        &self,
        series: &BarSeries,
        session: SessionWindow,
        current_price: f64,
    ) -> Result<OrbReport, AnalyticsError> {
        if series.is_empty() {
            return Err(AnalyticsError::EmptySeries);
        }
        let regular = series.between(session.open, session.close);
        if regular.is_empty() {
            return Err(AnalyticsError::NoSessionData);
        }
        let session_avg_volume = regular.total_volume() / regular.len() as f64;

        let periods: IndexMap<String, PeriodOutcome> = self
            .periods
            .iter()
            .map(|&period| {
                let outcome =
                    self.analyze_period(regular.bars(), session.open, period, session_avg_volume, current_price);
                (period_label(period), outcome)
            })
            .collect();

        let trading_bias = self.bias(&periods);
        let squeeze = squeeze(&periods);
        tracing::debug!(
            bias = ?trading_bias.bias,
            squeeze = squeeze.squeeze_detected,
            "Opening range analysis complete"
        );

        Ok(OrbReport {
            periods,
            trading_bias,
            squeeze,
        })
    }

    fn analyze_period(
        &self,
        session_bars: &[Bar],
        open: DateTime<Utc>,
        period: u32,
        session_avg_volume: f64,
        current_price: f64,
    ) -> PeriodOutcome {
        let window_end = open + Duration::minutes(period as i64);
        let split = session_bars.partition_point(|b| b.timestamp <= window_end);
        let (window, after) = session_bars.split_at(split);

        let required = period as usize;
        if window.len() < required {
            tracing::debug!(period, available = window.len(), "Opening range window incomplete");
            return PeriodOutcome::InsufficientData {
                message: format!(
                    "Need {} minutes of data, only have {}",
                    period,
                    window.len()
                ),
                required,
                available: window.len(),
            };
        }

        let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range_width = high - low;

        let (position, distance) = if current_price > high {
            (RangePosition::AboveRange, (current_price - high) / high * 100.0)
        } else if current_price < low {
            (RangePosition::BelowRange, (low - current_price) / low * 100.0)
        } else {
            (RangePosition::InsideRange, 0.0)
        };

        let breakout_kind = [Direction::Bullish, Direction::Bearish]
            .into_iter()
            .find(|&side| position.side() == Some(side) && self.breakout_held(after, side, high, low));

        let total_volume: f64 = window.iter().map(|b| b.volume).sum();
        let avg_volume = total_volume / window.len() as f64;
        let volume_ratio = if session_avg_volume > 0.0 {
            avg_volume / session_avg_volume
        } else {
            0.0
        };

        let mut targets = IndexMap::new();
        for (label, multiple) in TARGET_MULTIPLES {
            targets.insert(format!("bull_{}", label), high + range_width * multiple);
        }
        for (label, multiple) in TARGET_MULTIPLES {
            targets.insert(format!("bear_{}", label), low - range_width * multiple);
        }
        let targets_hit = targets
            .iter()
            .filter(|(label, level)| {
                if label.starts_with("bull") {
                    current_price >= **level
                } else {
                    current_price <= **level
                }
            })
            .map(|(label, _)| label.clone())
            .collect();

        PeriodOutcome::Analyzed(OpeningRange {
            period_minutes: period,
            high,
            low,
            range_width,
            midpoint: (high + low) / 2.0,
            position,
            distance_from_range_pct: round_to(distance, 2),
            breakout_confirmed: breakout_kind.is_some(),
            breakout_kind,
            volume: RangeVolume {
                total_volume,
                avg_volume_per_minute: avg_volume,
                volume_ratio: round_to(volume_ratio, 2),
                high_volume: volume_ratio > self.high_volume_ratio,
            },
            targets,
            targets_hit,
            window_start: open,
            window_end,
        })
    }

    /// A breakout holds when some close cleared the boundary by the buffer and enough
    /// closes stayed beyond the boundary itself.
    fn breakout_held(&self, after: &[Bar], side: Direction, high: f64, low: f64) -> bool {
        let beyond = |close: f64, margin: f64| match side {
            Direction::Bullish => close > high * (1.0 + margin),
            Direction::Bearish => close < low * (1.0 - margin),
        };
        let buffer = self.breakout_buffer_pct / 100.0;
        after.iter().any(|b| beyond(b.close, buffer))
            && after.iter().filter(|b| beyond(b.close, 0.0)).count() >= self.confirmation_bars
    }

    fn bias(&self, periods: &IndexMap<String, PeriodOutcome>) -> TradingBias {
        let mut bullish = 0u32;
        let mut bearish = 0u32;
        let mut factors = Vec::new();

        for (label, range) in periods.iter().filter_map(|(l, o)| o.range().map(|r| (l, r))) {
            if let Some(kind) = range.breakout_kind {
                match kind {
                    Direction::Bullish => bullish += 2,
                    Direction::Bearish => bearish += 2,
                }
                factors.push(format!("{} {} breakout confirmed", label, kind));
            }

            match range.position {
                RangePosition::AboveRange => bullish += 1,
                RangePosition::BelowRange => bearish += 1,
                RangePosition::InsideRange => {}
            }

            if range.volume.high_volume {
                match range.position {
                    RangePosition::AboveRange => {
                        bullish += 1;
                        factors.push(format!("{} high volume above range", label));
                    }
                    RangePosition::BelowRange => {
                        bearish += 1;
                        factors.push(format!("{} high volume below range", label));
                    }
                    RangePosition::InsideRange => {}
                }
            }

            let bull_hits = range.targets_hit.iter().filter(|t| t.starts_with("bull")).count() as u32;
            let bear_hits = range.targets_hit.iter().filter(|t| t.starts_with("bear")).count() as u32;
            if bull_hits > 0 {
                bullish += bull_hits;
                factors.push(format!("{} hit {} bull targets", label, bull_hits));
            }
            if bear_hits > 0 {
                bearish += bear_hits;
                factors.push(format!("{} hit {} bear targets", label, bear_hits));
            }
        }

        let (b, s) = (bullish as f64, bearish as f64);
        let (bias, confidence) = if b > s * 1.5 {
            (Sentiment::Bullish, if b > s * 2.0 { Confidence::High } else { Confidence::Medium })
        } else if s > b * 1.5 {
            (Sentiment::Bearish, if s > b * 2.0 { Confidence::High } else { Confidence::Medium })
        } else {
            (Sentiment::Neutral, Confidence::Low)
        };

        TradingBias {
            bias,
            confidence,
            bullish_signals: bullish,
            bearish_signals: bearish,
            strength_factors: factors,
        }
    }
}

/// Compares rounded range widths across analysed periods, shortest period first.
fn squeeze(periods: &IndexMap<String, PeriodOutcome>) -> SqueezeReport {
    let mut ranges: Vec<(u32, f64)> = periods
        .values()
        .filter_map(PeriodOutcome::range)
        .map(|r| (r.period_minutes, round_price(r.range_width)))
        .collect();

    if ranges.len() < 2 {
        return SqueezeReport {
            squeeze_detected: false,
            contracting_ranges: None,
            compression_ratio: None,
            range_progression: IndexMap::new(),
            interpretation: "Insufficient ORB periods for squeeze detection".to_string(),
        };
    }

    ranges.sort_by_key(|(period, _)| *period);
    let contracting = ranges.windows(2).all(|w| w[1].1 <= w[0].1);
    let shortest = ranges[0].1;
    let longest = ranges[ranges.len() - 1].1;
    let ratio = if shortest > 0.0 { longest / shortest } else { 1.0 };
    let detected = contracting && ratio < SQUEEZE_RATIO;

    SqueezeReport {
        squeeze_detected: detected,
        contracting_ranges: Some(contracting),
        compression_ratio: Some(round_to(ratio, 2)),
        range_progression: ranges
            .iter()
            .map(|&(period, width)| (period_label(period), width))
            .collect(),
        interpretation: if detected {
            "Potential explosive move ahead".to_string()
        } else {
            "Normal range expansion".to_string()
        },
    }
}
