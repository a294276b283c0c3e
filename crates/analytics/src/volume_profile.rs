//! Volume-at-price profiling.
//!
//! Bar volume is spread evenly over the equal-width price bins each bar spans, then the
//! profile is read off the resulting histogram: the Point of Control (fullest bin), the
//! Value Area grown greedily around it until it holds 70% of the volume, and clusters of
//! unusually high or low volume (HVN/LVN).

use crate::error::AnalyticsError;
use core_types::BarSeries;
use core_types::precision::{price_key, round_to};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of total volume the value area must hold.
const VALUE_AREA_SHARE: f64 = 0.7;
/// Bins within this many bin-widths of a node are merged into it.
const NODE_MERGE_DISTANCE: f64 = 1.5;
const MAX_NODES: usize = 5;

/// A contiguous band of unusually high or low volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeNode {
    pub range_start: f64,
    pub range_end: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub point_of_control: f64,
    pub value_area_high: f64,
    pub value_area_low: f64,
    pub high_volume_nodes: Vec<VolumeNode>,
    pub low_volume_nodes: Vec<VolumeNode>,
    pub total_volume: f64,
    pub value_area_volume: f64,
    pub value_area_percentage: f64,
}

/// Aggregated volume at one (rounded) bin midpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub volume: f64,
}

/// The histogram a profile is read from. `levels` is sorted by ascending price.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeDistribution {
    pub bin_width: f64,
    pub levels: Vec<PriceLevel>,
}

impl VolumeDistribution {
    pub fn total_volume(&self) -> f64 {
        self.levels.iter().map(|l| l.volume).sum()
    }
}

/// A stateless calculator for volume profiles.
#[derive(Debug, Clone)]
pub struct PriceBinProfiler {
    num_bins: usize,
    price_precision: u32,
}

impl Default for PriceBinProfiler {
    fn default() -> Self {
        Self {
            num_bins: 20,
            price_precision: 2,
        }
    }
}

impl PriceBinProfiler {
    pub fn new(num_bins: usize, price_precision: u32) -> Result<Self, AnalyticsError> {
        if num_bins == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "num_bins must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            num_bins,
            price_precision,
        })
    }

    /// Spreads every bar's volume over the bins its `[low, high]` interval touches.
    ///
    /// Bins are keyed by their rounded midpoint, so at coarse precisions neighbouring bins
    /// can collapse into one level. Volume is only ever moved, never created or dropped.
    pub fn distribute(&self, series: &BarSeries) -> Result<VolumeDistribution, AnalyticsError> {
        let (Some(price_min), Some(price_max)) = (series.min_low(), series.max_high()) else {
            return Err(AnalyticsError::EmptySeries);
        };
        if price_min >= price_max {
            return Err(AnalyticsError::DegenerateRange {
                low: price_min,
                high: price_max,
            });
        }

        let n = self.num_bins;
        let bin_width = (price_max - price_min) / n as f64;
        let mut edges: Vec<f64> = (0..=n).map(|i| price_min + bin_width * i as f64).collect();
        edges[n] = price_max;

        let mut by_price: BTreeMap<Decimal, f64> = BTreeMap::new();
        for bar in series.bars() {
            // First bin whose lower edge is at or below the low, last bin whose lower edge
            // is strictly below the high. Clamping keeps extreme bars inside the grid.
            let first = edges
                .partition_point(|&e| e <= bar.low)
                .saturating_sub(1)
                .min(n - 1);
            let last = edges
                .partition_point(|&e| e < bar.high)
                .saturating_sub(1)
                .min(n - 1)
                .max(first);

            let per_bin = bar.volume / (last - first + 1) as f64;
            for idx in first..=last {
                let midpoint = (edges[idx] + edges[idx + 1]) / 2.0;
                let key = price_key(midpoint, self.price_precision).ok_or_else(|| {
                    AnalyticsError::InvalidParameter(format!("unrepresentable price {}", midpoint))
                })?;
                *by_price.entry(key).or_insert(0.0) += per_bin;
            }
        }

        let levels = by_price
            .into_iter()
            .map(|(price, volume)| PriceLevel {
                price: price.to_f64().unwrap_or_default(),
                volume,
            })
            .collect();

        Ok(VolumeDistribution { bin_width, levels })
    }

    /// Computes POC, value area and volume nodes for the series.
    pub fn profile(&self, series: &BarSeries) -> Result<VolumeProfile, AnalyticsError> {
        let distribution = self.distribute(series)?;
        let levels = &distribution.levels;

        let total_volume = distribution.total_volume();
        if levels.is_empty() || total_volume <= 0.0 {
            tracing::debug!(bars = series.len(), "No volume to profile");
            return Err(AnalyticsError::NoVolume);
        }

        // Volume-descending; the sort is stable so ties keep ascending price order.
        let mut by_volume: Vec<PriceLevel> = levels.clone();
        by_volume.sort_by(|a, b| b.volume.total_cmp(&a.volume));

        let poc = by_volume[0];
        let poc_idx = levels
            .iter()
            .position(|l| l.price == poc.price)
            .unwrap_or_default();

        let (va_low_idx, va_high_idx, value_area_volume) =
            expand_value_area(levels, poc_idx, total_volume * VALUE_AREA_SHARE);

        let hvn_threshold = if by_volume.len() > 5 {
            by_volume[(by_volume.len() as f64 * 0.2) as usize].volume
        } else {
            by_volume[by_volume.len() - 1].volume
        };
        let lvn_threshold = if by_volume.len() > 5 {
            by_volume[(by_volume.len() as f64 * 0.8) as usize].volume
        } else {
            by_volume[0].volume
        };

        let high_volume_nodes = self.cluster_nodes(
            by_volume.iter(),
            |v| v >= hvn_threshold,
            f64::max,
            distribution.bin_width,
        );
        let low_volume_nodes = self.cluster_nodes(
            by_volume.iter().rev(),
            |v| v <= lvn_threshold,
            f64::min,
            distribution.bin_width,
        );

        let profile = VolumeProfile {
            point_of_control: round_to(poc.price, self.price_precision),
            value_area_high: round_to(levels[va_high_idx].price, self.price_precision),
            value_area_low: round_to(levels[va_low_idx].price, self.price_precision),
            high_volume_nodes,
            low_volume_nodes,
            total_volume,
            value_area_volume,
            value_area_percentage: round_to(value_area_volume / total_volume * 100.0, 2),
        };

        tracing::debug!(
            poc = profile.point_of_control,
            vah = profile.value_area_high,
            val = profile.value_area_low,
            va_pct = profile.value_area_percentage,
            "Volume profile computed"
        );

        Ok(profile)
    }

    /// Groups qualifying bins, visited in `order`, into at most [`MAX_NODES`] nodes.
    ///
    /// A bin joins the first existing node whose span lies within
    /// [`NODE_MERGE_DISTANCE`] bin-widths of its price; `keep` decides which volume the
    /// merged node reports.
    fn cluster_nodes<'a, I, Q, K>(
        &self,
        order: I,
        qualifies: Q,
        keep: K,
        bin_width: f64,
    ) -> Vec<VolumeNode>
    where
        I: Iterator<Item = &'a PriceLevel>,
        Q: Fn(f64) -> bool,
        K: Fn(f64, f64) -> f64,
    {
        let half = bin_width / 2.0;
        let mut nodes: Vec<VolumeNode> = Vec::new();

        for level in order.filter(|l| qualifies(l.volume)) {
            let start = round_to(level.price - half, self.price_precision);
            let end = round_to(level.price + half, self.price_precision);

            let existing = nodes.iter_mut().find(|node| {
                let distance = if level.price < node.range_start {
                    node.range_start - level.price
                } else if level.price > node.range_end {
                    level.price - node.range_end
                } else {
                    0.0
                };
                distance <= bin_width * NODE_MERGE_DISTANCE
            });

            match existing {
                Some(node) => {
                    node.range_start = node.range_start.min(start);
                    node.range_end = node.range_end.max(end);
                    node.volume = keep(node.volume, level.volume);
                }
                None => nodes.push(VolumeNode {
                    range_start: start,
                    range_end: end,
                    volume: level.volume,
                }),
            }
        }

        nodes.truncate(MAX_NODES);
        nodes
    }
}

/// Grows the value area outwards from the POC one bin at a time.
///
/// Each step compares the next bin below with the next bin above and takes the fuller one
/// (ties go below); once a side is exhausted the other side is forced. Stops as soon as
/// `target` volume is reached or every bin is included. Returns the inclusive index
/// bounds and the accumulated volume.
fn expand_value_area(levels: &[PriceLevel], poc_idx: usize, target: f64) -> (usize, usize, f64) {
    let mut low = poc_idx;
    let mut high = poc_idx;
    let mut accumulated = levels[poc_idx].volume;

    while accumulated < target {
        let below = low.checked_sub(1).map(|i| levels[i].volume);
        let above = levels.get(high + 1).map(|l| l.volume);

        match (below, above) {
            (Some(b), Some(a)) if b >= a => {
                low -= 1;
                accumulated += b;
            }
            (Some(b), None) => {
                low -= 1;
                accumulated += b;
            }
            (_, Some(a)) => {
                high += 1;
                accumulated += a;
            }
            (None, None) => break,
        }
    }

    (low, high, accumulated)
}
