//! # Confluence Engine
//!
//! Tool-level orchestration. Each tool fetches bars through a `MarketDataProvider`, runs
//! the pure calculators from `analytics`, and returns a serializable record carrying a
//! `Status`, a message and its payload.
//!
//! Data problems never surface as `Err`: a failed or empty fetch, or a calculation without
//! enough data, degrades the affected timeframe's status. Errors returned from this crate
//! are configuration or construction problems only.

use crate::error::EngineError;
use api_client::{MarketDataProvider, TwelveDataClient};
use configuration::Config;
use serde::Serialize;
use std::sync::Arc;

pub mod error;
pub mod fvg_tool;
pub mod orb_tool;
pub mod profile_tool;
pub mod session;
pub mod technical_tool;
mod util;
pub mod zones;

pub use fvg_tool::{FvgReport, FvgTool};
pub use orb_tool::{OrbTool, OrbToolReport};
pub use profile_tool::{ProfileReport, ProfileTool};
pub use technical_tool::{TechnicalReport, TechnicalTool};
pub use zones::{ZoneAggregator, ZonesReport};

/// Builds the HTTP provider described by the `[provider]` section.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn MarketDataProvider>, EngineError> {
    let client = TwelveDataClient::new(&config.provider)?;
    Ok(Arc::new(client))
}

/// Renders a tool report as pretty-printed JSON.
pub fn render<T: Serialize>(report: &T) -> Result<String, EngineError> {
    Ok(serde_json::to_string_pretty(report)?)
}
