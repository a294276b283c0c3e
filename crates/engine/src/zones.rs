use crate::error::EngineError;
use crate::session::last_trading_instant;
use crate::util::{fetch, fetch_window, rollup_message};
use analytics::{FibonacciProjector, PriceBinProfiler, VolumeProfile};
use api_client::error::ApiError;
use api_client::{AtrPoint, BarsRequest, MarketDataProvider};
use chrono::{DateTime, Duration, Utc};
use configuration::{Config, TimeframeConfig};
use core_types::{round_price, Bar, BarSeries, Status, Zone, ZoneKind};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

const DAILY_INTERVAL: &str = "1day";
/// Two calendar days back always covers the prior session's completed daily bar.
const PREVIOUS_DAY_WINDOW_DAYS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationContext {
    pub bars_interval: String,
    pub lookback_description: String,
    pub ta_indicator_interval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeZones {
    pub calculation_context: CalculationContext,
    pub technical_zones: Vec<Zone>,
    pub status: Status,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonesReport {
    pub symbol: String,
    pub timestamp_utc: DateTime<Utc>,
    pub status: Status,
    pub message: String,
    pub timeframe_zones: IndexMap<String, TimeframeZones>,
}

/// A zone source that could not contribute for a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Issue {
    VolumeProfile,
    Fibonacci,
    Atr,
}

impl Issue {
    fn describe(&self) -> &'static str {
        match self {
            Issue::VolumeProfile => "VP failed.",
            Issue::Fibonacci => "No Fib zones.",
            Issue::Atr => "ATR failed.",
        }
    }
}

/// Collects one timeframe's zones and the problems met while building them.
#[derive(Debug, Default)]
struct FrameBuilder {
    zones: Vec<Zone>,
    issues: Vec<Issue>,
    fetch_failed: bool,
    /// The timeframe's own bar window came back empty.
    no_bars: bool,
}

impl FrameBuilder {
    fn issue(&mut self, issue: Issue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    fn finish(self, calculation_context: CalculationContext) -> TimeframeZones {
        let (status, message) = if self.fetch_failed {
            (
                Status::Error,
                "Critical fetch error for one or more data sources.".to_string(),
            )
        } else if self.zones.is_empty() {
            (
                Status::Warning,
                "No technical zones could be generated for this timeframe.".to_string(),
            )
        } else if self.no_bars {
            (Status::Warning, "No bar data available.".to_string())
        } else if !self.issues.is_empty() {
            let issues: Vec<&str> = self.issues.iter().map(Issue::describe).collect();
            (
                Status::PartialSuccess,
                format!("Some zones generated. Issues: {}", issues.join(", ")),
            )
        } else {
            (Status::Success, "Zones generated successfully.".to_string())
        };

        TimeframeZones {
            calculation_context,
            technical_zones: self.zones,
            status,
            message,
        }
    }
}

/// Builds the typed zone list of every configured timeframe from the volume profile,
/// Fibonacci levels, ATR extensions and (intraday only) the prior day's range.
pub struct ZoneAggregator {
    provider: Arc<dyn MarketDataProvider>,
    timeframes: Vec<TimeframeConfig>,
    profiler: PriceBinProfiler,
    fibonacci: FibonacciProjector,
    price_banding_width: f64,
    atr_period: usize,
    output_size: usize,
}

impl ZoneAggregator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &Config) -> Result<Self, EngineError> {
        Ok(Self {
            provider,
            timeframes: config.timeframes.0.clone(),
            profiler: PriceBinProfiler::new(config.profile.num_bins, config.profile.price_precision)?,
            fibonacci: FibonacciProjector::new(config.zones.fibonacci_lookback)?,
            price_banding_width: config.zones.price_banding_width,
            atr_period: config.zones.atr_period,
            output_size: config.provider.output_size,
        })
    }

    /// Computes zones for every timeframe concurrently.
    ///
    /// Windows end at `now`, moved back to Friday on weekends. A failing timeframe only
    /// degrades its own entry.
    pub async fn zones(&self, symbol: &str, now: DateTime<Utc>) -> ZonesReport {
        let as_of = last_trading_instant(now);
        let frames = join_all(
            self.timeframes
                .iter()
                .map(|tf| self.timeframe_zones(symbol, tf, as_of)),
        )
        .await;

        let timeframe_zones: IndexMap<String, TimeframeZones> = self
            .timeframes
            .iter()
            .map(|tf| tf.key.clone())
            .zip(frames)
            .collect();
        let status = Status::rollup(timeframe_zones.values().map(|f| f.status));
        tracing::info!(symbol, %status, timeframes = timeframe_zones.len(), "Zones computed");

        ZonesReport {
            symbol: symbol.to_string(),
            timestamp_utc: now,
            status,
            message: rollup_message(status, "Technical zones"),
            timeframe_zones,
        }
    }

    async fn timeframe_zones(
        &self,
        symbol: &str,
        tf: &TimeframeConfig,
        as_of: DateTime<Utc>,
    ) -> TimeframeZones {
        let previous_day = async {
            if tf.intraday {
                Some(self.previous_day(symbol, as_of).await)
            } else {
                None
            }
        };
        let (bars, atr, previous_day) = futures::join!(
            fetch_window(self.provider.as_ref(), symbol, tf, as_of, self.output_size),
            self.provider
                .fetch_atr(symbol, &tf.indicator_interval, self.atr_period),
            previous_day
        );

        let mut frame = FrameBuilder::default();
        match &bars {
            Err(_) => frame.fetch_failed = true,
            Ok(series) if series.is_empty() => frame.no_bars = true,
            Ok(series) => self.push_structure_zones(&mut frame, tf, series),
        }

        let last_close = bars.as_ref().ok().and_then(BarSeries::last).map(|b| b.close);
        match atr {
            Err(e) => {
                tracing::error!(symbol, timeframe = %tf.key, error = %e, "ATR fetch failed");
                frame.fetch_failed = true;
            }
            Ok(points) => match latest_atr(&points) {
                None => {
                    tracing::warn!(symbol, timeframe = %tf.key, "No usable ATR value; skipping ATR zones");
                    frame.issue(Issue::Atr);
                }
                Some(atr) => {
                    if let Some(close) = last_close {
                        frame.zones.extend(atr_zones(tf, close, atr));
                    }
                }
            },
        }

        match previous_day {
            None => {}
            Some(Err(_)) => frame.fetch_failed = true,
            Some(Ok(None)) => {
                tracing::debug!(symbol, timeframe = %tf.key, "Not enough daily bars for previous day levels");
            }
            Some(Ok(Some(bar))) => frame.zones.extend(previous_day_zones(&bar)),
        }

        frame.finish(CalculationContext {
            bars_interval: tf.bars_interval.clone(),
            lookback_description: tf.lookback.describe(),
            ta_indicator_interval: tf.indicator_interval.clone(),
        })
    }

    /// Volume profile and Fibonacci zones, both read from the timeframe's own bars.
    fn push_structure_zones(&self, frame: &mut FrameBuilder, tf: &TimeframeConfig, series: &BarSeries) {
        match self.profiler.profile(series) {
            Ok(profile) => frame.zones.extend(self.profile_zones(tf, &profile)),
            Err(e) => {
                tracing::warn!(timeframe = %tf.key, reason = %e, "Volume profile unavailable; no VP zones");
                frame.issue(Issue::VolumeProfile);
            }
        }

        match self.fibonacci.project(series) {
            Ok(zones) if !zones.is_empty() => frame.zones.extend(zones),
            Ok(_) => frame.issue(Issue::Fibonacci),
            Err(e) => {
                tracing::warn!(timeframe = %tf.key, reason = %e, "Fibonacci unavailable; no Fib zones");
                frame.issue(Issue::Fibonacci);
            }
        }
    }

    fn profile_zones(&self, tf: &TimeframeConfig, profile: &VolumeProfile) -> Vec<Zone> {
        let key = tf.key.to_uppercase();
        let source = format!("Volume Profile ({} Bars)", tf.bars_interval);
        let half_band = self.price_banding_width / 2.0;

        let mut zones = vec![
            Zone::level(
                ZoneKind::Neutral,
                format!("{} POC", key),
                profile.point_of_control,
                source.as_str(),
            ),
            Zone::range(
                ZoneKind::Resistance,
                format!("{} VAH", key),
                profile.value_area_high,
                profile.value_area_high + half_band,
                source.as_str(),
            ),
            Zone::range(
                ZoneKind::Support,
                format!("{} VAL", key),
                profile.value_area_low - half_band,
                profile.value_area_low,
                source.as_str(),
            ),
        ];

        for node in &profile.high_volume_nodes {
            let kind = if node.range_start > profile.point_of_control {
                ZoneKind::Resistance
            } else {
                ZoneKind::Support
            };
            zones.push(Zone::range(
                kind,
                format!("{} HVN {}", key, round_price(node.range_start)),
                node.range_start,
                node.range_end,
                source.as_str(),
            ));
        }
        for node in &profile.low_volume_nodes {
            zones.push(Zone::range(
                ZoneKind::Neutral,
                format!("{} LVN {}", key, round_price(node.range_start)),
                node.range_start,
                node.range_end,
                source.as_str(),
            ));
        }
        zones
    }

    /// The last completed daily bar before the latest one, if the provider has two.
    async fn previous_day(&self, symbol: &str, as_of: DateTime<Utc>) -> Result<Option<Bar>, ApiError> {
        let request = BarsRequest::latest(symbol, DAILY_INTERVAL, 2)
            .between(as_of - Duration::days(PREVIOUS_DAY_WINDOW_DAYS), as_of);
        let series = fetch(self.provider.as_ref(), &request, "previous day").await?;
        Ok(series.bars().iter().rev().nth(1).copied())
    }
}

/// The newest ATR reading, if it parses to a finite number.
fn latest_atr(points: &[AtrPoint]) -> Option<f64> {
    let point = points.last()?;
    match point.atr.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            tracing::warn!(raw = %point.atr, "Unparseable ATR value");
            None
        }
    }
}

fn atr_zones(tf: &TimeframeConfig, close: f64, atr: f64) -> [Zone; 2] {
    let key = tf.key.to_uppercase();
    let source = format!("ATR Calculation ({})", tf.indicator_interval);
    [
        Zone::level(
            ZoneKind::TargetUpside,
            format!("{} +1 ATR", key),
            close + atr,
            source.as_str(),
        ),
        Zone::level(
            ZoneKind::TargetDownside,
            format!("{} -1 ATR", key),
            close - atr,
            source.as_str(),
        ),
    ]
}

fn previous_day_zones(bar: &Bar) -> [Zone; 2] {
    const SOURCE: &str = "Price Action (Daily Bar)";
    [
        Zone::level(ZoneKind::Resistance, "Previous Day High", bar.high, SOURCE),
        Zone::level(ZoneKind::Support, "Previous Day Low", bar.low, SOURCE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::VolumeNode;
    use api_client::StaticProvider;
    use configuration::Lookback;
    use core_types::ZoneBounds;

    fn timeframe() -> TimeframeConfig {
        TimeframeConfig {
            key: "5m".to_string(),
            bars_interval: "5min".to_string(),
            indicator_interval: "5min".to_string(),
            lookback: Lookback::Days(5),
            intraday: true,
        }
    }

    fn aggregator(banding: f64) -> ZoneAggregator {
        let mut config = Config::default();
        config.zones.price_banding_width = banding;
        ZoneAggregator::new(Arc::new(StaticProvider::new()), &config).unwrap()
    }

    fn context() -> CalculationContext {
        CalculationContext {
            bars_interval: "5min".to_string(),
            lookback_description: "Last ~5 trading days".to_string(),
            ta_indicator_interval: "5min".to_string(),
        }
    }

    #[test]
    fn frame_status_follows_severity() {
        let failed = FrameBuilder {
            zones: vec![Zone::level(ZoneKind::Neutral, "x", 1.0, "s")],
            issues: vec![],
            fetch_failed: true,
            no_bars: true,
        };
        assert_eq!(failed.finish(context()).status, Status::Error);

        let empty = FrameBuilder {
            issues: vec![Issue::Atr],
            no_bars: true,
            ..FrameBuilder::default()
        };
        let empty = empty.finish(context());
        assert_eq!(empty.status, Status::Warning);
        assert_eq!(
            empty.message,
            "No technical zones could be generated for this timeframe."
        );

        let mut without_bars = FrameBuilder {
            no_bars: true,
            ..FrameBuilder::default()
        };
        without_bars
            .zones
            .push(Zone::level(ZoneKind::Resistance, "Previous Day High", 102.5, "s"));
        without_bars.issue(Issue::Atr);
        let without_bars = without_bars.finish(context());
        assert_eq!(without_bars.status, Status::Warning);
        assert_eq!(without_bars.message, "No bar data available.");
        assert_eq!(without_bars.technical_zones.len(), 1);

        let mut partial = FrameBuilder::default();
        partial.zones.push(Zone::level(ZoneKind::Neutral, "x", 1.0, "s"));
        partial.issue(Issue::Fibonacci);
        partial.issue(Issue::Atr);
        partial.issue(Issue::Atr);
        let partial = partial.finish(context());
        assert_eq!(partial.status, Status::PartialSuccess);
        assert_eq!(
            partial.message,
            "Some zones generated. Issues: No Fib zones., ATR failed."
        );
    }

    #[test]
    fn value_area_bands_widen_outwards_and_nodes_split_around_poc() {
        let profile = VolumeProfile {
            point_of_control: 100.0,
            value_area_high: 101.0,
            value_area_low: 99.0,
            high_volume_nodes: vec![
                VolumeNode { range_start: 100.5, range_end: 100.8, volume: 50.0 },
                VolumeNode { range_start: 99.5, range_end: 100.2, volume: 60.0 },
            ],
            low_volume_nodes: vec![VolumeNode { range_start: 98.0, range_end: 98.3, volume: 1.0 }],
            total_volume: 200.0,
            value_area_volume: 150.0,
            value_area_percentage: 75.0,
        };
        let zones = aggregator(0.5).profile_zones(&timeframe(), &profile);

        assert_eq!(zones[0].name, "5M POC");
        assert_eq!(zones[0].bounds, ZoneBounds::Level { level: 100.0 });
        assert_eq!(zones[1].bounds, ZoneBounds::Range { range_start: 101.0, range_end: 101.25 });
        assert_eq!(zones[2].bounds, ZoneBounds::Range { range_start: 98.75, range_end: 99.0 });
        assert_eq!(zones[3].kind, ZoneKind::Resistance);
        assert_eq!(zones[3].name, "5M HVN 100.5");
        assert_eq!(zones[4].kind, ZoneKind::Support);
        assert_eq!(zones[5].kind, ZoneKind::Neutral);
        assert!(zones.iter().all(|z| z.source == "Volume Profile (5min Bars)"));
    }

    #[test]
    fn latest_atr_reads_the_newest_point() {
        let at = |m| Utc::now() + Duration::minutes(m);
        let points = vec![
            AtrPoint { timestamp: at(0), atr: "1.0".to_string() },
            AtrPoint { timestamp: at(1), atr: " 1.5 ".to_string() },
        ];
        assert_eq!(latest_atr(&points), Some(1.5));
        assert_eq!(latest_atr(&[]), None);

        let bad = vec![AtrPoint { timestamp: at(0), atr: "n/a".to_string() }];
        assert_eq!(latest_atr(&bad), None);

        let zones = atr_zones(&timeframe(), 100.0, 1.5);
        assert_eq!(zones[0].bounds, ZoneBounds::Level { level: 101.5 });
        assert_eq!(zones[1].kind, ZoneKind::TargetDownside);
        assert_eq!(zones[1].source, "ATR Calculation (5min)");
    }
}
