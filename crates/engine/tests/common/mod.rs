#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::{Config, Lookback, TimeframeConfig};
use core_types::{Bar, BarSeries};

/// Wednesday 2024-07-10 16:00 UTC, mid-session in New York.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 10, 16, 0, 0).unwrap()
}

/// `count` bars of `step` spacing ending just before `end`, oscillating around 100.
pub fn oscillating(end: DateTime<Utc>, step: Duration, count: i64) -> BarSeries {
    let start = end - step * (count as i32);
    let bars = (0..count)
        .map(|i| {
            let close = 100.0 + ((i % 20) as f64 - 10.0) * 0.1;
            Bar::new(
                start + step * (i as i32),
                close - 0.05,
                close + 0.3,
                close - 0.3,
                close,
                1_000.0 + (i % 7) as f64 * 100.0,
            )
        })
        .collect();
    BarSeries::new(bars).unwrap()
}

/// Three completed daily bars, the last one on the day of [`now`].
pub fn daily_bars() -> BarSeries {
    let day = |d: u32, high: f64, low: f64| {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 7, d, 0, 0, 0).unwrap(),
            low + 0.5,
            high,
            low,
            high - 0.5,
            5_000_000.0,
        )
    };
    BarSeries::new(vec![
        day(8, 103.0, 97.0),
        day(9, 102.5, 98.5),
        day(10, 101.5, 99.0),
    ])
    .unwrap()
}

pub fn timeframe(key: &str, interval: &str, lookback: Lookback, intraday: bool) -> TimeframeConfig {
    TimeframeConfig {
        key: key.to_string(),
        bars_interval: interval.to_string(),
        indicator_interval: interval.to_string(),
        lookback,
        intraday,
    }
}

pub fn config_with(timeframes: Vec<TimeframeConfig>) -> Config {
    let mut config = Config::default();
    config.timeframes.0 = timeframes;
    config
}

/// One-minute bars at `minute` offsets from `open` with the given (high, low, close, volume).
pub fn minute_bars(open: DateTime<Utc>, bars: &[(i64, f64, f64, f64, f64)]) -> BarSeries {
    BarSeries::new(
        bars.iter()
            .map(|&(minute, high, low, close, volume)| {
                Bar::new(open + Duration::minutes(minute), close, high, low, close, volume)
            })
            .collect(),
    )
    .unwrap()
}
