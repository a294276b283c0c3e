use crate::error::AnalyticsError;
use core_types::{BarSeries, Zone, ZoneKind, round_price};

/// Retracement ratios (up to 1.0) followed by extension ratios, with their display labels.
const RATIOS: [(&str, f64); 9] = [
    ("0.0", 0.0),
    ("0.236", 0.236),
    ("0.382", 0.382),
    ("0.5", 0.5),
    ("0.618", 0.618),
    ("0.786", 0.786),
    ("1.0", 1.0),
    ("1.272", 1.272),
    ("1.618", 1.618),
];

/// Projects Fibonacci retracement and extension levels from the swing range of a window.
#[derive(Debug, Clone)]
pub struct FibonacciProjector {
    lookback_periods: usize,
}

impl Default for FibonacciProjector {
    fn default() -> Self {
        Self {
            lookback_periods: 50,
        }
    }
}

impl FibonacciProjector {
    pub fn new(lookback_periods: usize) -> Result<Self, AnalyticsError> {
        if lookback_periods == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "fibonacci lookback must be greater than zero".to_string(),
            ));
        }
        Ok(Self { lookback_periods })
    }

    /// Returns one zone per ratio, lowest level first.
    ///
    /// Retracements are SUPPORT when the latest close is above them and RESISTANCE
    /// otherwise; extensions above the swing high are always upside targets.
    pub fn project(&self, series: &BarSeries) -> Result<Vec<Zone>, AnalyticsError> {
        AnalyticsError::require(self.lookback_periods, series.len())?;

        let window = series.tail(self.lookback_periods);
        let swing_high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let swing_low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        if swing_high <= swing_low {
            return Err(AnalyticsError::DegenerateRange {
                low: swing_low,
                high: swing_high,
            });
        }

        let range = swing_high - swing_low;
        let current_price = series.last().map(|b| b.close).unwrap_or(swing_low);
        let source = format!("Fibonacci ({} bars)", self.lookback_periods);

        let zones = RATIOS
            .iter()
            .map(|&(label, ratio)| {
                let (level, kind) = if ratio <= 1.0 {
                    let level = swing_low + range * ratio;
                    let kind = if current_price > level {
                        ZoneKind::Support
                    } else {
                        ZoneKind::Resistance
                    };
                    (level, kind)
                } else {
                    (swing_high + range * (ratio - 1.0), ZoneKind::TargetUpside)
                };
                Zone::level(kind, format!("Fib {}", label), round_price(level), source.clone())
            })
            .collect();

        Ok(zones)
    }
}
