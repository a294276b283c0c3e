//! # Confluence Core Types
//!
//! Layer 0 vocabulary shared by every other crate: validated OHLCV bar series, typed
//! price zones, aggregated result statuses and the price-rounding rules applied at
//! the output boundary.

pub mod enums;
pub mod error;
pub mod precision;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{Direction, Status, ZoneKind};
pub use error::CoreError;
pub use precision::{round_price, round_to, PRICE_PRECISION};
pub use structs::{Bar, BarSeries, Zone, ZoneBounds};
