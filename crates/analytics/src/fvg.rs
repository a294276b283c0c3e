//! Fair Value Gap detection and lifecycle tracking.
//!
//! A gap is a three-candle imbalance: the first and third candles do not overlap, leaving a
//! price band that only the middle candle traded through. Every detection pass rescans the
//! whole window; gap records are built once, after their interaction fold completes.

use chrono::{DateTime, Utc};
use core_types::precision::{round_to, serialize_price, serialize_price_opt};
use core_types::{Bar, BarSeries, Direction};
use serde::{Serialize, Serializer};

const FILLED_PCT: f64 = 95.0;
const UNFILLED_PCT: f64 = 5.0;
const VOLUME_BASELINE_BARS: usize = 20;

fn serialize_fill<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandleSnapshot {
    #[serde(serialize_with = "serialize_price")]
    pub high: f64,
    #[serde(serialize_with = "serialize_price")]
    pub low: f64,
    #[serde(serialize_with = "serialize_price")]
    pub close: f64,
}

impl From<&Bar> for CandleSnapshot {
    fn from(bar: &Bar) -> Self {
        Self {
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }
}

/// The three candles that formed a gap, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceCandles {
    pub candle_1: CandleSnapshot,
    pub candle_2: CandleSnapshot,
    pub candle_3: CandleSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeSnapshot {
    pub candle_1_volume: f64,
    pub candle_2_volume: f64,
    pub candle_3_volume: f64,
    /// Mean volume of the first 20 bars of the analysed window.
    pub avg_volume_20_periods: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairValueGap {
    pub id: String,
    #[serde(rename = "gap_type")]
    pub kind: Direction,
    pub timeframe: String,
    /// Timestamp of the third (newest) candle of the pattern.
    pub formation_timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_price")]
    pub gap_high: f64,
    #[serde(serialize_with = "serialize_price")]
    pub gap_low: f64,
    #[serde(serialize_with = "serialize_price")]
    pub gap_size: f64,
    #[serde(serialize_with = "serialize_price")]
    pub gap_midpoint: f64,
    pub source_candles: SourceCandles,
    pub volume_snapshot: VolumeSnapshot,
    pub age_minutes: i64,
    pub times_tested: u32,
    #[serde(serialize_with = "serialize_price_opt")]
    pub lowest_test: Option<f64>,
    #[serde(serialize_with = "serialize_price_opt")]
    pub highest_test: Option<f64>,
    #[serde(serialize_with = "serialize_fill")]
    pub filled_percentage: f64,
    pub currently_inside: bool,
}

impl FairValueGap {
    pub fn is_above(&self, price: f64) -> bool {
        self.gap_low > price
    }

    pub fn is_below(&self, price: f64) -> bool {
        self.gap_high < price
    }
}

/// Running tally of how later bars traded into a gap.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Interaction {
    times_tested: u32,
    lowest_test: Option<f64>,
    highest_test: Option<f64>,
}

impl Interaction {
    /// Folds one bar in. Only the part of the bar inside `[gap_low, gap_high]` counts.
    fn observe(self, bar: &Bar, gap_low: f64, gap_high: f64) -> Self {
        if bar.low > gap_high || bar.high < gap_low {
            return self;
        }
        let test_low = bar.low.max(gap_low);
        let test_high = bar.high.min(gap_high);
        Self {
            times_tested: self.times_tested + 1,
            lowest_test: Some(self.lowest_test.map_or(test_low, |l| l.min(test_low))),
            highest_test: Some(self.highest_test.map_or(test_high, |h| h.max(test_high))),
        }
    }

    fn filled_percentage(&self, gap_size: f64) -> f64 {
        match (self.lowest_test, self.highest_test) {
            (Some(low), Some(high)) if gap_size > 0.0 => ((high - low) / gap_size * 100.0).min(100.0),
            _ => 0.0,
        }
    }
}

/// Detects fair value gaps and measures how much of each has since been traded through.
#[derive(Debug, Clone)]
pub struct FairValueGapTracker {
    min_gap_percentage: f64,
    lookback_periods: usize,
}

impl Default for FairValueGapTracker {
    fn default() -> Self {
        Self {
            min_gap_percentage: 0.1,
            lookback_periods: 500,
        }
    }
}

impl FairValueGapTracker {
    pub fn new(min_gap_percentage: f64, lookback_periods: usize) -> Self {
        Self {
            min_gap_percentage,
            lookback_periods,
        }
    }

    /// Scans the most recent `lookback_periods` bars for gaps, newest formation first.
    ///
    /// `as_of` is the reference instant for gap ages. Fewer than three bars simply yields
    /// no gaps.
    pub fn detect(
        &self,
        series: &BarSeries,
        timeframe: &str,
        current_price: f64,
        as_of: DateTime<Utc>,
    ) -> Vec<FairValueGap> {
        let window = series.tail(self.lookback_periods);
        if window.len() < 3 {
            return Vec::new();
        }

        let baseline = &window[..window.len().min(VOLUME_BASELINE_BARS)];
        let avg_volume = baseline.iter().map(|b| b.volume).sum::<f64>() / baseline.len() as f64;

        let gaps: Vec<FairValueGap> = (2..window.len())
            .rev()
            .filter_map(|i| {
                let (c1, c2, c3) = (&window[i - 2], &window[i - 1], &window[i]);
                let (kind, gap_low, gap_high) = if c1.high < c3.low {
                    (Direction::Bullish, c1.high, c3.low)
                } else if c1.low > c3.high {
                    (Direction::Bearish, c3.high, c1.low)
                } else {
                    return None;
                };

                let gap_size = gap_high - gap_low;
                let gap_midpoint = (gap_high + gap_low) / 2.0;
                if gap_size / gap_midpoint * 100.0 < self.min_gap_percentage {
                    return None;
                }

                let interaction = window[i + 1..]
                    .iter()
                    .fold(Interaction::default(), |acc, bar| acc.observe(bar, gap_low, gap_high));

                Some(FairValueGap {
                    id: format!("{}_{}", timeframe, c3.timestamp.format("%Y-%m-%dT%H:%M:%SZ")),
                    kind,
                    timeframe: timeframe.to_string(),
                    formation_timestamp: c3.timestamp,
                    gap_high,
                    gap_low,
                    gap_size,
                    gap_midpoint,
                    source_candles: SourceCandles {
                        candle_1: c1.into(),
                        candle_2: c2.into(),
                        candle_3: c3.into(),
                    },
                    volume_snapshot: VolumeSnapshot {
                        candle_1_volume: c1.volume,
                        candle_2_volume: c2.volume,
                        candle_3_volume: c3.volume,
                        avg_volume_20_periods: avg_volume,
                    },
                    age_minutes: (as_of - c3.timestamp).num_minutes(),
                    times_tested: interaction.times_tested,
                    lowest_test: interaction.lowest_test,
                    highest_test: interaction.highest_test,
                    filled_percentage: interaction.filled_percentage(gap_size),
                    currently_inside: gap_low <= current_price && current_price <= gap_high,
                })
            })
            .collect();

        tracing::debug!(timeframe, bars = window.len(), gaps = gaps.len(), "FVG scan complete");
        gaps
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapStatistics {
    pub total_gaps: usize,
    pub filled_completely: usize,
    pub filled_partially: usize,
    pub unfilled: usize,
    pub avg_fill_time_minutes: i64,
    pub avg_gap_size: f64,
}

impl GapStatistics {
    pub fn from_gaps(gaps: &[FairValueGap]) -> Self {
        if gaps.is_empty() {
            return Self {
                total_gaps: 0,
                filled_completely: 0,
                filled_partially: 0,
                unfilled: 0,
                avg_fill_time_minutes: 0,
                avg_gap_size: 0.0,
            };
        }

        let filled: Vec<&FairValueGap> = gaps
            .iter()
            .filter(|g| g.filled_percentage >= FILLED_PCT)
            .collect();
        let avg_fill_time = if filled.is_empty() {
            0.0
        } else {
            filled.iter().map(|g| g.age_minutes as f64).sum::<f64>() / filled.len() as f64
        };

        Self {
            total_gaps: gaps.len(),
            filled_completely: filled.len(),
            filled_partially: gaps
                .iter()
                .filter(|g| g.filled_percentage > UNFILLED_PCT && g.filled_percentage < FILLED_PCT)
                .count(),
            unfilled: gaps
                .iter()
                .filter(|g| g.filled_percentage <= UNFILLED_PCT)
                .count(),
            avg_fill_time_minutes: avg_fill_time.trunc() as i64,
            avg_gap_size: round_to(
                gaps.iter().map(|g| g.gap_size).sum::<f64>() / gaps.len() as f64,
                2,
            ),
        }
    }
}

/// A gap summarised relative to the current price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyGap {
    #[serde(serialize_with = "serialize_price")]
    pub level: f64,
    pub timeframe: String,
    pub gap_id: String,
    #[serde(serialize_with = "serialize_price")]
    pub distance: f64,
    pub gap_type: Direction,
    #[serde(serialize_with = "serialize_fill")]
    pub filled_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NearestGaps {
    pub above_current_price: Vec<NearbyGap>,
    pub below_current_price: Vec<NearbyGap>,
}

/// Splits gaps into those wholly above and wholly below `current_price`, each ordered by
/// midpoint distance and cut to `max_gaps`. Gaps containing the price are in neither list.
pub fn nearest_gaps<'a, I>(gaps: I, current_price: f64, max_gaps: usize) -> NearestGaps
where
    I: IntoIterator<Item = &'a FairValueGap>,
{
    let mut nearest = NearestGaps::default();
    for gap in gaps {
        let summary = || NearbyGap {
            level: gap.gap_midpoint,
            timeframe: gap.timeframe.clone(),
            gap_id: gap.id.clone(),
            distance: (gap.gap_midpoint - current_price).abs(),
            gap_type: gap.kind,
            filled_percentage: gap.filled_percentage,
        };
        if gap.is_above(current_price) {
            nearest.above_current_price.push(summary());
        } else if gap.is_below(current_price) {
            nearest.below_current_price.push(summary());
        }
    }

    for side in [&mut nearest.above_current_price, &mut nearest.below_current_price] {
        side.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        side.truncate(max_gaps);
    }
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 13, 30, 0).unwrap()
    }

    fn series(bars: &[(f64, f64, f64)]) -> BarSeries {
        BarSeries::new(
            bars.iter()
                .enumerate()
                .map(|(i, &(high, low, volume))| {
                    let mid = (high + low) / 2.0;
                    Bar::new(start() + Duration::minutes(i as i64), mid, high, low, mid, volume)
                })
                .collect(),
        )
        .unwrap()
    }

    fn scenario_bars() -> Vec<(f64, f64, f64)> {
        vec![(100.0, 98.0, 1000.0), (101.0, 99.0, 500.0), (104.0, 102.0, 1000.0)]
    }

    #[test]
    fn detects_bullish_gap_from_three_candles() {
        let s = series(&scenario_bars());
        let as_of = start() + Duration::minutes(12);
        let gaps = FairValueGapTracker::default().detect(&s, "1m", 103.0, as_of);

        assert_eq!(gaps.len(), 1);
        let gap = &gaps[0];
        assert_eq!(gap.kind, Direction::Bullish);
        assert_eq!(gap.gap_low, 100.0);
        assert_eq!(gap.gap_high, 102.0);
        assert_eq!(gap.gap_size, 2.0);
        assert_eq!(gap.gap_midpoint, 101.0);
        assert_eq!(gap.id, "1m_2024-06-03T13:32:00Z");
        assert_eq!(gap.age_minutes, 10);
        assert_eq!(gap.times_tested, 0);
        assert_eq!(gap.filled_percentage, 0.0);
        assert!(!gap.currently_inside);
        assert_eq!(gap.volume_snapshot.candle_2_volume, 500.0);
        assert!((gap.volume_snapshot.avg_volume_20_periods - 833.333).abs() < 1e-3);
    }

    #[test]
    fn later_bar_partially_fills_the_gap() {
        let mut bars = scenario_bars();
        bars.push((103.0, 100.5, 800.0));
        let s = series(&bars);
        let gaps = FairValueGapTracker::default().detect(&s, "1m", 101.75, start());

        let gap = gaps
            .iter()
            .find(|g| g.gap_low == 100.0 && g.gap_high == 102.0)
            .unwrap();
        assert_eq!(gap.times_tested, 1);
        assert_eq!(gap.lowest_test, Some(100.5));
        assert_eq!(gap.highest_test, Some(102.0));
        assert_eq!(gap.filled_percentage, 75.0);
        assert!(gap.currently_inside);
    }

    #[test]
    fn bearish_gap_and_minimum_size_filter() {
        // c1.low 110 > c3.high 105: bearish gap [105, 110].
        let s = series(&[(112.0, 110.0, 1.0), (111.0, 104.0, 1.0), (105.0, 103.0, 1.0)]);
        let gaps = FairValueGapTracker::default().detect(&s, "5m", 100.0, start());
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].kind, Direction::Bearish);
        assert_eq!((gaps[0].gap_low, gaps[0].gap_high), (105.0, 110.0));

        // A 0.05 gap at ~100 is 0.05%, below the default 0.1% threshold.
        let tiny = series(&[(100.0, 99.0, 1.0), (100.2, 99.5, 1.0), (101.0, 100.05, 1.0)]);
        assert!(FairValueGapTracker::default().detect(&tiny, "1m", 100.0, start()).is_empty());
        assert!(FairValueGapTracker::new(0.01, 500).detect(&tiny, "1m", 100.0, start()).len() == 1);
    }

    #[test]
    fn statistics_bucket_by_fill() {
        let base = FairValueGapTracker::default()
            .detect(&series(&scenario_bars()), "1m", 0.0, start() + Duration::minutes(32))
            .remove(0);
        let with_fill = |pct: f64, size: f64| FairValueGap {
            filled_percentage: pct,
            gap_size: size,
            ..base.clone()
        };
        let gaps = vec![
            with_fill(100.0, 1.0),
            with_fill(95.0, 2.0),
            with_fill(50.0, 3.0),
            with_fill(5.0, 4.0),
            with_fill(0.0, 5.0),
        ];
        let stats = GapStatistics::from_gaps(&gaps);
        assert_eq!(stats.total_gaps, 5);
        assert_eq!(stats.filled_completely, 2);
        assert_eq!(stats.filled_partially, 1);
        assert_eq!(stats.unfilled, 2);
        assert_eq!(stats.avg_fill_time_minutes, 30);
        assert_eq!(stats.avg_gap_size, 3.0);
        assert_eq!(GapStatistics::from_gaps(&[]).total_gaps, 0);
    }

    #[test]
    fn serializes_rounded_fill_and_gap_type() {
        let mut bars = scenario_bars();
        bars.push((103.0, 100.5, 800.0));
        let gaps = FairValueGapTracker::default().detect(&series(&bars), "1m", 101.0, start());
        let json = serde_json::to_value(&gaps[gaps.len() - 1]).unwrap();
        assert_eq!(json["gap_type"], "bullish");
        assert_eq!(json["filled_percentage"], 75.0);
        assert_eq!(json["source_candles"]["candle_3"]["low"], 102.0);
    }

    fn arb_bars() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
        proptest::collection::vec((90.0f64..110.0, 0.0f64..3.0, 1.0f64..1_000.0), 3..60).prop_map(
            |raw| {
                raw.into_iter()
                    .map(|(low, width, volume)| (low + width, low, volume))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn every_gap_clears_the_minimum_size(bars in arb_bars(), min_pct in 0.0f64..1.0) {
            let gaps = FairValueGapTracker::new(min_pct, 500).detect(&series(&bars), "1m", 100.0, start());
            for gap in &gaps {
                prop_assert!(gap.gap_size / gap.gap_midpoint * 100.0 >= min_pct);
                prop_assert!(gap.gap_low < gap.gap_high);
                prop_assert!((0.0..=100.0).contains(&gap.filled_percentage));
            }
        }

        #[test]
        fn fill_never_shrinks_as_history_extends(bars in arb_bars(), cut in 3usize..60) {
            let full = series(&bars);
            let partial = full.truncated(cut.min(full.len()));
            let tracker = FairValueGapTracker::default();
            let early = tracker.detect(&partial, "1m", 100.0, start());
            let late = tracker.detect(&full, "1m", 100.0, start());
            for gap in &early {
                let later = late.iter().find(|g| g.id == gap.id);
                prop_assert!(later.is_some());
                let later = later.unwrap();
                prop_assert!(later.filled_percentage >= gap.filled_percentage);
                prop_assert!(later.times_tested >= gap.times_tested);
            }
        }

        #[test]
        fn nearest_gaps_never_straddle_price(bars in arb_bars(), price in 90.0f64..113.0) {
            let gaps = FairValueGapTracker::new(0.0, 500).detect(&series(&bars), "1m", price, start());
            let nearest = nearest_gaps(&gaps, price, 3);
            prop_assert!(nearest.above_current_price.len() <= 3);
            prop_assert!(nearest.below_current_price.len() <= 3);
            for side in [&nearest.above_current_price, &nearest.below_current_price] {
                prop_assert!(side.windows(2).all(|w| w[0].distance <= w[1].distance));
                for summary in side.iter() {
                    let gap = gaps.iter().find(|g| g.id == summary.gap_id).unwrap();
                    prop_assert!(!(gap.gap_low <= price && price <= gap.gap_high));
                }
            }
        }
    }
}
