//! Trend, momentum and volume-flow indicators over a single bar series.
//!
//! Every report has its own minimum history requirement and is computed independently, so a
//! short series can still produce the sections it has enough bars for.

use crate::error::AnalyticsError;
use chrono::{DateTime, Utc};
use core_types::precision::{round_to, serialize_price, serialize_price_opt};
use core_types::{Bar, BarSeries};
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::{ExponentialMovingAverage as Ema, SimpleMovingAverage as Sma};

const ADX_PERIOD: usize = 14;
const RSI_PERIOD: usize = 14;
const CMF_PERIOD: usize = 20;
const VROC_PERIOD: usize = 14;
const PRESSURE_BARS: usize = 10;
const LARGE_VOLUME_WINDOW: usize = 20;
const TENKAN_PERIOD: usize = 9;
const KIJUN_PERIOD: usize = 26;
const SENKOU_B_PERIOD: usize = 52;
const TRENDING_ADX: f64 = 25.0;

/// Minimum bars for the moving-average trend report.
pub const TREND_MIN_BARS: usize = 50;
/// Minimum bars for the volume momentum report.
pub const VOLUME_MOMENTUM_MIN_BARS: usize = 20;

/// A three-way directional reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    fn compare(a: f64, b: f64) -> Self {
        if a > b {
            Sentiment::Bullish
        } else if a < b {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    StrongUptrend,
    Uptrend,
    StrongDowntrend,
    Downtrend,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStrength {
    pub adx: f64,
    pub trend: TrendLabel,
    #[serde(serialize_with = "serialize_price")]
    pub sma20: f64,
    #[serde(serialize_with = "serialize_price")]
    pub sma50: f64,
    #[serde(serialize_with = "serialize_price")]
    pub ema20: f64,
    pub ema20_slope: f64,
    pub price_distance_from_sma20: f64,
    pub price_distance_from_sma50: f64,
    pub is_trending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyingPressure {
    pub up_volume: f64,
    pub down_volume: f64,
    pub up_ratio: f64,
    pub is_bullish_volume: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMomentum {
    pub obv: f64,
    pub cmf: f64,
    pub vroc: f64,
    pub buying_pressure: BuyingPressure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub bullish_divergence: bool,
    pub bearish_divergence: bool,
    pub current_rsi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ichimoku {
    #[serde(serialize_with = "serialize_price")]
    pub tenkan_sen: f64,
    #[serde(serialize_with = "serialize_price")]
    pub kijun_sen: f64,
    #[serde(serialize_with = "serialize_price")]
    pub senkou_span_a: f64,
    /// Needs 26 bars of history beyond the 52-bar window; absent otherwise.
    #[serde(serialize_with = "serialize_price_opt")]
    pub senkou_span_b: Option<f64>,
    /// The latest close, plotted 26 bars back.
    #[serde(serialize_with = "serialize_price")]
    pub chikou_span: f64,
    pub cloud_status: Sentiment,
    pub trend_strength: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeVolumeBar {
    pub timestamp: DateTime<Utc>,
    pub volume: f64,
    pub volume_ratio: f64,
    #[serde(rename = "type")]
    pub kind: Sentiment,
    pub price_change: f64,
}

/// A stateless calculator for the trend/momentum reports.
#[derive(Debug, Clone)]
pub struct TrendMomentumAnalyzer {
    divergence_lookback: usize,
    large_volume_multiplier: f64,
}

impl Default for TrendMomentumAnalyzer {
    fn default() -> Self {
        Self {
            divergence_lookback: 20,
            large_volume_multiplier: 2.0,
        }
    }
}

impl TrendMomentumAnalyzer {
    pub fn new(divergence_lookback: usize, large_volume_multiplier: f64) -> Result<Self, AnalyticsError> {
        if divergence_lookback < 3 {
            return Err(AnalyticsError::InvalidParameter(
                "divergence lookback must cover at least 3 bars".to_string(),
            ));
        }
        if !large_volume_multiplier.is_finite() || large_volume_multiplier <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "large volume multiplier must be positive, got {}",
                large_volume_multiplier
            )));
        }
        Ok(Self {
            divergence_lookback,
            large_volume_multiplier,
        })
    }

    /// ADX and moving-average trend classification.
    pub fn trend_strength(&self, series: &BarSeries) -> Result<TrendStrength, AnalyticsError> {
        AnalyticsError::require(TREND_MIN_BARS, series.len())?;
        let bars = series.bars();
        let closes = series.closes();
        let price = closes[closes.len() - 1];

        let sma20 = last_sma(&closes, 20)?;
        let sma50 = last_sma(&closes, 50)?;
        let mut ema = Ema::new(20).map_err(|e| AnalyticsError::InvalidParameter(format!("{:?}", e)))?;
        let ema20_series: Vec<f64> = closes.iter().map(|&c| ema.next(c)).collect();
        let ema20 = ema20_series[ema20_series.len() - 1];
        let ema20_slope = (ema20 - ema20_series[ema20_series.len() - 5]) / 5.0;

        let adx = average_directional_index(bars).unwrap_or(0.0);

        let trend = if price > sma20 && sma20 > sma50 {
            TrendLabel::StrongUptrend
        } else if price > sma20 {
            TrendLabel::Uptrend
        } else if price < sma20 && sma20 < sma50 {
            TrendLabel::StrongDowntrend
        } else if price < sma20 {
            TrendLabel::Downtrend
        } else {
            TrendLabel::Neutral
        };

        Ok(TrendStrength {
            adx: round_to(adx, 2),
            trend,
            sma20,
            sma50,
            ema20,
            ema20_slope: round_to(ema20_slope, 4),
            price_distance_from_sma20: round_to(percent_from(price, sma20), 2),
            price_distance_from_sma50: round_to(percent_from(price, sma50), 2),
            is_trending: adx > TRENDING_ADX,
        })
    }

    /// OBV, Chaikin Money Flow, volume rate of change and recent buying pressure.
    pub fn volume_momentum(&self, series: &BarSeries) -> Result<VolumeMomentum, AnalyticsError> {
        AnalyticsError::require(VOLUME_MOMENTUM_MIN_BARS, series.len())?;
        let bars = series.bars();

        let obv = bars.windows(2).fold(0.0, |obv, pair| {
            if pair[1].close > pair[0].close {
                obv + pair[1].volume
            } else if pair[1].close < pair[0].close {
                obv - pair[1].volume
            } else {
                obv
            }
        });

        let cmf_window = &bars[bars.len() - CMF_PERIOD..];
        let money_flow: f64 = cmf_window
            .iter()
            .map(|b| money_flow_multiplier(b) * b.volume)
            .sum();
        let window_volume: f64 = cmf_window.iter().map(|b| b.volume).sum();
        let cmf = if window_volume > 0.0 {
            money_flow / window_volume
        } else {
            0.0
        };

        let current_volume = bars[bars.len() - 1].volume;
        let prior_volume = bars[bars.len() - 1 - VROC_PERIOD].volume;
        let vroc = if prior_volume != 0.0 {
            (current_volume - prior_volume) / prior_volume * 100.0
        } else {
            0.0
        };

        let recent = series.tail(PRESSURE_BARS);
        let up_volume: f64 = recent
            .iter()
            .filter(|b| b.close > b.open)
            .map(|b| b.volume)
            .sum();
        let down_volume: f64 = recent
            .iter()
            .filter(|b| b.close < b.open)
            .map(|b| b.volume)
            .sum();
        let directional = up_volume + down_volume;

        Ok(VolumeMomentum {
            obv,
            cmf: round_to(cmf, 4),
            vroc: round_to(vroc, 2),
            buying_pressure: BuyingPressure {
                up_volume,
                down_volume,
                up_ratio: if directional > 0.0 {
                    round_to(up_volume / directional, 3)
                } else {
                    0.5
                },
                is_bullish_volume: up_volume > down_volume,
            },
        })
    }

    /// Regular price/RSI divergence over the last `divergence_lookback` bars.
    pub fn divergence(&self, series: &BarSeries) -> Result<Divergence, AnalyticsError> {
        AnalyticsError::require(self.divergence_lookback + RSI_PERIOD, series.len())?;

        let rsi = rsi_series(&series.closes(), RSI_PERIOD);
        let window = series.tail(self.divergence_lookback);
        let recent_rsi = &rsi[rsi.len() - window.len()..];

        let highs: Vec<Option<f64>> = window.iter().map(|b| Some(b.high)).collect();
        let lows: Vec<Option<f64>> = window.iter().map(|b| Some(b.low)).collect();
        let (price_highs, _) = swing_points(&highs);
        let (_, price_lows) = swing_points(&lows);
        let (rsi_highs, rsi_lows) = swing_points(recent_rsi);

        // Bullish: lower low in price, higher low in RSI. Bearish is the mirror image.
        let bullish_divergence = diverges(&price_lows, &rsi_lows, |a, b| a < b);
        let bearish_divergence = diverges(&price_highs, &rsi_highs, |a, b| a > b);

        let current_rsi = rsi.last().copied().flatten().map(|v| round_to(v, 2));
        tracing::debug!(
            bullish_divergence,
            bearish_divergence,
            ?current_rsi,
            "Divergence scan complete"
        );

        Ok(Divergence {
            bullish_divergence,
            bearish_divergence,
            current_rsi,
        })
    }

    /// Ichimoku Cloud lines at the latest bar.
    pub fn ichimoku(&self, series: &BarSeries) -> Result<Ichimoku, AnalyticsError> {
        AnalyticsError::require(SENKOU_B_PERIOD, series.len())?;
        let bars = series.bars();
        let last = bars.len() - 1;

        let tenkan_sen = channel_midpoint(&bars[..=last], TENKAN_PERIOD);
        let kijun_sen = channel_midpoint(&bars[..=last], KIJUN_PERIOD);

        // The spans plotted at the latest bar were computed KIJUN_PERIOD bars ago.
        let shifted = last - KIJUN_PERIOD;
        let senkou_span_a = (channel_midpoint(&bars[..=shifted], TENKAN_PERIOD)
            + channel_midpoint(&bars[..=shifted], KIJUN_PERIOD))
            / 2.0;
        let senkou_span_b = (shifted + 1 >= SENKOU_B_PERIOD)
            .then(|| channel_midpoint(&bars[..=shifted], SENKOU_B_PERIOD));

        let price = bars[last].close;
        let cloud_status = match senkou_span_b {
            Some(span_b) if price > senkou_span_a.max(span_b) => Sentiment::Bullish,
            Some(span_b) if price < senkou_span_a.min(span_b) => Sentiment::Bearish,
            _ => Sentiment::Neutral,
        };

        Ok(Ichimoku {
            tenkan_sen,
            kijun_sen,
            senkou_span_a,
            senkou_span_b,
            chikou_span: price,
            cloud_status,
            trend_strength: Sentiment::compare(tenkan_sen, kijun_sen),
        })
    }

    /// Bars among the last 20 whose volume exceeds the multiplier times the series' mean.
    pub fn large_volume_bars(&self, series: &BarSeries) -> Result<Vec<LargeVolumeBar>, AnalyticsError> {
        if series.is_empty() {
            return Err(AnalyticsError::EmptySeries);
        }
        let mean_volume = series.total_volume() / series.len() as f64;
        let threshold = mean_volume * self.large_volume_multiplier;

        Ok(series
            .tail(LARGE_VOLUME_WINDOW)
            .iter()
            .filter(|b| b.volume > threshold)
            .map(|b| LargeVolumeBar {
                timestamp: b.timestamp,
                volume: b.volume,
                volume_ratio: round_to(b.volume / mean_volume, 2),
                kind: Sentiment::compare(b.close, b.open),
                price_change: if b.open != 0.0 {
                    round_to((b.close - b.open) / b.open * 100.0, 2)
                } else {
                    0.0
                },
            })
            .collect())
    }
}

fn last_sma(values: &[f64], period: usize) -> Result<f64, AnalyticsError> {
    let mut sma = Sma::new(period).map_err(|e| AnalyticsError::InvalidParameter(format!("{:?}", e)))?;
    Ok(values.iter().fold(0.0, |_, &v| sma.next(v)))
}

fn percent_from(price: f64, reference: f64) -> f64 {
    if reference != 0.0 {
        (price - reference) / reference * 100.0
    } else {
        0.0
    }
}

fn money_flow_multiplier(bar: &Bar) -> f64 {
    let range = bar.high - bar.low;
    if range == 0.0 {
        0.0
    } else {
        ((bar.close - bar.low) - (bar.high - bar.close)) / range
    }
}

/// Average of the highest high and lowest low over the last `period` bars of `bars`.
fn channel_midpoint(bars: &[Bar], period: usize) -> f64 {
    let window = &bars[bars.len().saturating_sub(period)..];
    let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    (high + low) / 2.0
}

/// ADX(14) at the latest bar: the mean of the last 14 DX readings.
///
/// Returns `None` when any of those readings is undefined (zero ATR or no directional
/// movement at all), or when there are not enough bars.
fn average_directional_index(bars: &[Bar]) -> Option<f64> {
    let n = bars.len();
    if n < 2 * ADX_PERIOD - 1 {
        return None;
    }

    let mut true_range = Vec::with_capacity(n);
    let mut plus_dm = Vec::with_capacity(n);
    let mut minus_dm = Vec::with_capacity(n);
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            true_range.push(bar.high - bar.low);
            plus_dm.push(0.0);
            minus_dm.push(0.0);
            continue;
        }
        let prev = &bars[i - 1];
        true_range.push(
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs()),
        );
        let up_move = bar.high - prev.high;
        let down_move = prev.low - bar.low;
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
    }

    let dx_at = |end: usize| -> Option<f64> {
        let start = end + 1 - ADX_PERIOD;
        let atr = true_range[start..=end].iter().sum::<f64>() / ADX_PERIOD as f64;
        if atr == 0.0 {
            return None;
        }
        let pos_di = plus_dm[start..=end].iter().sum::<f64>() / atr * 100.0;
        let neg_di = minus_dm[start..=end].iter().sum::<f64>() / atr * 100.0;
        let total = pos_di + neg_di;
        (total != 0.0).then(|| (pos_di - neg_di).abs() / total * 100.0)
    };

    let readings: Option<Vec<f64>> = (n - ADX_PERIOD..n).map(dx_at).collect();
    readings.map(|dx| dx.iter().sum::<f64>() / ADX_PERIOD as f64)
}

/// RSI from simple rolling means of gains and losses.
///
/// The first bar has no prior close and counts as an unchanged bar. Values before the
/// window fills, or where there was no movement at all, are `None`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let deltas: Vec<f64> = std::iter::once(0.0)
        .chain(closes.windows(2).map(|w| w[1] - w[0]))
        .collect();

    (0..closes.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &deltas[i + 1 - period..=i];
            let gain = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
            let loss = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;
            match (gain, loss) {
                (g, l) if l == 0.0 && g == 0.0 => None,
                (_, l) if l == 0.0 => Some(100.0),
                (g, l) => Some(100.0 - 100.0 / (1.0 + g / l)),
            }
        })
        .collect()
}

/// Strict local maxima and minima (greater/less than both neighbours), oldest first.
fn swing_points(values: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    for w in values.windows(3) {
        if let (Some(prev), Some(cur), Some(next)) = (w[0], w[1], w[2]) {
            if cur > prev && cur > next {
                highs.push(cur);
            }
            if cur < prev && cur < next {
                lows.push(cur);
            }
        }
    }
    (highs, lows)
}

/// True when the last two price swings move per `price_moves` while the oscillator's last
/// two swings move the opposite way.
fn diverges<F>(price_swings: &[f64], oscillator_swings: &[f64], price_moves: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (last_two(price_swings), last_two(oscillator_swings)) {
        (Some((p_prev, p_last)), Some((o_prev, o_last))) => {
            price_moves(p_last, p_prev) && price_moves(o_prev, o_last)
        }
        _ => false,
    }
}

fn last_two(values: &[f64]) -> Option<(f64, f64)> {
    match values {
        [.., a, b] => Some((*a, *b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_types::round_price;

    /// Bars opening at the previous close, with a fixed one-point range around the close.
    fn series_from_closes(closes: &[f64], volumes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                Bar::new(
                    start + Duration::minutes(i as i64),
                    open,
                    open.max(close) + 0.5,
                    open.min(close) - 0.5,
                    close,
                    volumes[i % volumes.len()],
                )
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn rising(n: usize) -> BarSeries {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        series_from_closes(&closes, &[1_000.0])
    }

    #[test]
    fn trend_strength_requires_fifty_bars() {
        let analyzer = TrendMomentumAnalyzer::default();
        assert_eq!(
            analyzer.trend_strength(&rising(49)),
            Err(AnalyticsError::InsufficientData {
                required: 50,
                available: 49
            })
        );
    }

    #[test]
    fn steady_rise_is_a_strong_trending_uptrend() {
        let report = TrendMomentumAnalyzer::default()
            .trend_strength(&rising(60))
            .unwrap();
        assert_eq!(report.trend, TrendLabel::StrongUptrend);
        // Only upward directional movement: every DX reading is 100.
        assert_eq!(report.adx, 100.0);
        assert!(report.is_trending);
        assert_eq!(report.sma20, 149.5);
        assert_eq!(report.sma50, 134.5);
        assert!(report.ema20_slope > 0.0);
        assert!(report.price_distance_from_sma20 > 0.0);
    }

    #[test]
    fn steady_fall_is_a_strong_downtrend() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let report = TrendMomentumAnalyzer::default()
            .trend_strength(&series_from_closes(&closes, &[500.0]))
            .unwrap();
        assert_eq!(report.trend, TrendLabel::StrongDowntrend);
        assert!(report.price_distance_from_sma50 < 0.0);
    }

    #[test]
    fn obv_adds_and_subtracts_by_close_direction() {
        // Up, down, flat, repeated.
        let mut closes = vec![100.0];
        for i in 0..21 {
            let last = closes[closes.len() - 1];
            closes.push(match i % 3 {
                0 => last + 1.0,
                1 => last - 1.0,
                _ => last,
            });
        }
        let volumes: Vec<f64> = (0..closes.len()).map(|i| 10.0 * (i + 1) as f64).collect();
        let series = series_from_closes(&closes, &volumes);
        let report = TrendMomentumAnalyzer::default()
            .volume_momentum(&series)
            .unwrap();

        let expected: f64 = (1..closes.len())
            .map(|i| match (i - 1) % 3 {
                0 => volumes[i],
                1 => -volumes[i],
                _ => 0.0,
            })
            .sum();
        assert_eq!(report.obv, expected);
        assert!(report.buying_pressure.up_volume > 0.0);
        assert!(report.buying_pressure.down_volume > 0.0);
    }

    #[test]
    fn vroc_and_pressure_fall_back_on_zero_denominators() {
        let closes = vec![100.0; 20];
        let series = series_from_closes(&closes, &[0.0]);
        let report = TrendMomentumAnalyzer::default()
            .volume_momentum(&series)
            .unwrap();
        assert_eq!(report.vroc, 0.0);
        assert_eq!(report.cmf, 0.0);
        assert_eq!(report.buying_pressure.up_ratio, 0.5);
        assert!(!report.buying_pressure.is_bullish_volume);
    }

    #[test]
    fn rsi_saturates_without_losses_and_is_undefined_without_movement() {
        let up: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let rsi = rsi_series(&up, 14);
        assert_eq!(rsi[12], None);
        assert_eq!(rsi[13], Some(100.0));

        let flat = vec![5.0; 20];
        assert!(rsi_series(&flat, 14).iter().all(Option::is_none));
    }

    #[test]
    fn divergence_compares_last_two_swings() {
        // Lower price low with a higher oscillator low.
        assert!(diverges(&[10.0, 9.0], &[30.0, 35.0], |a, b| a < b));
        assert!(!diverges(&[10.0, 9.0], &[35.0, 30.0], |a, b| a < b));
        // Higher price high with a lower oscillator high.
        assert!(diverges(&[10.0, 11.0], &[70.0, 65.0], |a, b| a > b));
        assert!(!diverges(&[11.0], &[70.0, 65.0], |a, b| a > b));

        let values = [Some(1.0), Some(3.0), Some(2.0), Some(0.5), Some(4.0), None, Some(1.0)];
        let (highs, lows) = swing_points(&values);
        assert_eq!(highs, vec![3.0]);
        assert_eq!(lows, vec![0.5]);
    }

    #[test]
    fn divergence_on_a_rising_series_reports_saturated_rsi() {
        let report = TrendMomentumAnalyzer::default()
            .divergence(&rising(40))
            .unwrap();
        assert!(!report.bullish_divergence);
        assert!(!report.bearish_divergence);
        assert_eq!(report.current_rsi, Some(100.0));

        assert!(matches!(
            TrendMomentumAnalyzer::default().divergence(&rising(33)),
            Err(AnalyticsError::InsufficientData { required: 34, .. })
        ));
    }

    #[test]
    fn ichimoku_needs_extra_history_for_span_b() {
        let analyzer = TrendMomentumAnalyzer::default();
        let short = analyzer.ichimoku(&rising(60)).unwrap();
        assert_eq!(short.senkou_span_b, None);
        assert_eq!(short.cloud_status, Sentiment::Neutral);
        assert_eq!(short.trend_strength, Sentiment::Bullish);
        assert_eq!(short.chikou_span, 159.0);

        let long = analyzer.ichimoku(&rising(90)).unwrap();
        assert!(long.senkou_span_b.is_some());
        assert_eq!(long.cloud_status, Sentiment::Bullish);

        assert!(analyzer.ichimoku(&rising(51)).is_err());
    }

    #[test]
    fn moving_average_and_cloud_prices_serialize_at_two_decimals() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + 2.0 * (i as f64 * 0.37).sin()).collect();
        let series = series_from_closes(&closes, &[1_000.0]);
        let analyzer = TrendMomentumAnalyzer::default();
        let trend = analyzer.trend_strength(&series).unwrap();
        let cloud = analyzer.ichimoku(&series).unwrap();

        let json = serde_json::to_value(&trend).unwrap();
        assert_eq!(json["sma20"], round_price(trend.sma20));
        assert_eq!(json["sma50"], round_price(trend.sma50));
        assert_eq!(json["ema20"], round_price(trend.ema20));

        let json = serde_json::to_value(&cloud).unwrap();
        assert_eq!(json["tenkan_sen"], round_price(cloud.tenkan_sen));
        assert_eq!(json["kijun_sen"], round_price(cloud.kijun_sen));
        assert_eq!(json["senkou_span_a"], round_price(cloud.senkou_span_a));
        assert_eq!(json["senkou_span_b"], round_price(cloud.senkou_span_b.unwrap()));
        assert_eq!(json["chikou_span"], round_price(cloud.chikou_span));
    }

    #[test]
    fn large_volume_bars_are_flagged_against_series_mean() {
        let mut volumes = vec![100.0; 30];
        volumes[27] = 1_000.0;
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let series = series_from_closes(&closes, &volumes);

        let bars = TrendMomentumAnalyzer::default()
            .large_volume_bars(&series)
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 1_000.0);
        assert_eq!(bars[0].volume_ratio, 7.69);
        assert_eq!(bars[0].kind, Sentiment::Bullish);
        assert_eq!(bars[0].price_change, 0.79);
    }
}
