//! Price rounding applied at the output boundary.
//!
//! Values are rounded through `rust_decimal` with midpoint-away-from-zero so that
//! `101.505` surfaces as `101.51` rather than whatever the nearest binary float happens
//! to round to. The `serialize_*` helpers are meant for `#[serde(serialize_with = ...)]`
//! so that internal structs keep full precision while the JSON surface is rounded.

use rust_decimal::prelude::*;
use serde::Serializer;
use serde::ser::SerializeMap;

/// Decimal places used for every surfaced price field.
pub const PRICE_PRECISION: u32 = 2;

/// Rounds `value` to `dp` decimal places. Non-finite values are returned unchanged.
pub fn round_to(value: f64, dp: u32) -> f64 {
    match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or(value),
        None => value,
    }
}

/// Rounds a price to [`PRICE_PRECISION`] decimal places.
pub fn round_price(value: f64) -> f64 {
    round_to(value, PRICE_PRECISION)
}

/// Rounds `value` and returns it as a `Decimal`, suitable as an ordered map key.
pub fn price_key(value: f64, dp: u32) -> Option<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
}

pub fn serialize_price<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_price(*value))
}

pub fn serialize_price_opt<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_some(&round_price(*v)),
        None => serializer.serialize_none(),
    }
}

/// Serializes any `(label, price)` map-like collection with rounded prices, keeping
/// the collection's iteration order.
pub fn serialize_price_map<'a, M, S>(map: &'a M, serializer: S) -> Result<S::Ok, S::Error>
where
    &'a M: IntoIterator<Item = (&'a String, &'a f64)>,
    S: Serializer,
{
    let mut out = serializer.serialize_map(None)?;
    for (label, price) in map {
        out.serialize_entry(label, &round_price(*price))?;
    }
    out.end()
}
