mod common;

use api_client::StaticProvider;
use chrono::{TimeZone, Utc};
use common::minute_bars;
use configuration::{Config, FvgTimeframe};
use core_types::{Direction, Status};
use engine::FvgTool;
use engine::fvg_tool::SessionPhase;
use std::sync::Arc;

fn config(timeframes: &[(&str, &str)]) -> Config {
    let mut config = Config::default();
    config.fvg.timeframes = timeframes
        .iter()
        .map(|(key, interval)| FvgTimeframe {
            key: key.to_string(),
            interval: interval.to_string(),
        })
        .collect();
    config
}

/// The three-candle bullish gap [100, 102] followed by one bar trading back into it.
fn provider() -> StaticProvider {
    let open = Utc.with_ymd_and_hms(2024, 7, 10, 13, 30, 0).unwrap();
    let bars = minute_bars(
        open,
        &[
            (0, 100.0, 98.0, 99.0, 1000.0),
            (1, 101.0, 99.0, 100.5, 500.0),
            (2, 104.0, 102.0, 103.0, 1000.0),
            (3, 103.0, 100.5, 102.5, 800.0),
        ],
    );
    StaticProvider::new().with_bars("1min", bars)
}

#[tokio::test]
async fn tracks_gap_fill_and_ranks_it_below_price() {
    let tool = FvgTool::new(Arc::new(provider()), &config(&[("1m", "1min")]));
    let report = tool.analyze("SPY").await;

    assert_eq!(report.status, Status::Success);
    let analysis = report.analysis.expect("analysis present");
    assert_eq!(analysis.current_price, 102.5);

    let one_minute = &analysis.timeframe_data["1m"];
    assert_eq!(one_minute.fvg_count, 1);
    let gap = &one_minute.gaps[0];
    assert_eq!(gap.kind, Direction::Bullish);
    assert_eq!((gap.gap_low, gap.gap_high), (100.0, 102.0));
    assert_eq!(gap.times_tested, 1);
    assert_eq!(gap.lowest_test, Some(100.5));
    assert_eq!(gap.highest_test, Some(102.0));
    assert!((gap.filled_percentage - 75.0).abs() < 1e-9);
    assert_eq!(gap.age_minutes, 1);
    assert!(!gap.currently_inside);

    assert!(analysis.nearest_gaps.above_current_price.is_empty());
    assert_eq!(analysis.nearest_gaps.below_current_price[0].gap_id, gap.id);

    let stats = &analysis.gap_statistics["1m"];
    assert_eq!(stats.total_gaps, 1);
    assert_eq!(stats.filled_partially, 1);

    let context = &analysis.market_context;
    assert_eq!(context.session, SessionPhase::RegularTrading);
    assert_eq!(context.minutes_since_open, 3);
    assert_eq!(context.intraday_high, 104.0);
    assert_eq!(context.intraday_low, 98.0);
    assert_eq!(context.volume_today, 3300.0);
    assert_eq!(context.estimated_daily_volume, 825.0 * 390.0);
}

#[tokio::test]
async fn failing_secondary_timeframe_is_partial_success() {
    let provider = provider().with_bars_failure("5min", "upstream timeout");
    let tool = FvgTool::new(Arc::new(provider), &config(&[("1m", "1min"), ("5m", "5min")]));
    let report = tool.analyze("SPY").await;

    assert_eq!(report.status, Status::PartialSuccess);
    assert_eq!(report.message, "Data unavailable for timeframes: 5m");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["timeframe_data"]["1m"]["fvg_count"], 1);
    assert_eq!(json["timeframe_data"]["5m"]["fvg_count"], 0);
    assert!(json["timeframe_data"]["5m"]["error"].is_string());
    assert_eq!(json["timeframe_data"]["1m"]["gaps"][0]["gap_type"], "bullish");
    assert_eq!(json["timeframe_data"]["1m"]["gaps"][0]["filled_percentage"], 75.0);
    assert_eq!(json["gap_statistics"]["5m"]["total_gaps"], 0);
}

#[tokio::test]
async fn reference_fetch_failure_is_an_error() {
    let provider = StaticProvider::new().with_bars_failure("1min", "down");
    let tool = FvgTool::new(Arc::new(provider), &config(&[("1m", "1min"), ("5m", "5min")]));
    let report = tool.analyze("SPY").await;

    assert_eq!(report.status, Status::Error);
    assert_eq!(report.message, "Failed to fetch price data");
    assert!(report.analysis.is_none());
}
