//! # Confluence Analytics Engine
//!
//! The market-structure calculations behind every tool: volume profiles, trend and
//! momentum indicators, Fibonacci projections, Fair Value Gap tracking and Opening Range
//! Breakout analysis.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It performs no I/O and depends only on
//!   `core-types` (Layer 0).
//! - **Stateless Calculation:** Every calculator is a small configuration struct whose
//!   methods take a `BarSeries` and return a fresh result. Nothing is cached between calls.
//! - **Typed Unavailability:** A calculation that cannot produce a result returns an
//!   `AnalyticsError` naming the reason. Callers treat these as degraded sub-results.
//!
//! ## Public API
//!
//! - `PriceBinProfiler`: Volume Profile (POC, value area, HVN/LVN).
//! - `TrendMomentumAnalyzer`: trend strength, volume momentum, divergence, Ichimoku.
//! - `FibonacciProjector`: retracement/extension zones.
//! - `FairValueGapTracker`: gap detection, interaction, statistics and proximity ranking.
//! - `OpeningRangeAnalyzer`: per-period opening ranges, bias and squeeze.

pub mod error;
pub mod fibonacci;
pub mod fvg;
pub mod orb;
pub mod trend;
pub mod volume_profile;

pub use error::AnalyticsError;
pub use fibonacci::FibonacciProjector;
pub use fvg::{FairValueGap, FairValueGapTracker, GapStatistics, NearestGaps, nearest_gaps};
pub use orb::{OpeningRangeAnalyzer, OrbReport, PeriodOutcome, SessionWindow};
pub use trend::{Sentiment, TrendMomentumAnalyzer};
pub use volume_profile::{PriceBinProfiler, VolumeNode, VolumeProfile};
