//! Pressure zone detection: price levels whose quantity is a statistical outlier relative to the
//! current snapshot.
//!
//! threshold = max(μ + 1.2σ, t15), where σ is the population standard deviation and t15 is the
//! quantity at rank `floor(N × 0.15)` when sorted descending. A level is flagged only if its
//! quantity is strictly above the threshold, so uniform books flag nothing.
//!
//! t15 only takes part once the rank lands below the single largest quantity (N ≥ 7). For
//! smaller N the rank is 0, t15 would equal the maximum and the strict comparison could never
//! flag anything.

use crate::{num::round_dp, snapshot::Snapshot};
use serde::{Deserialize, Serialize};

/// Standard deviations above the mean before a quantity counts as pressure.
pub const STD_MULTIPLIER: f64 = 1.2;

/// Share of levels, from the top, that the percentile floor admits.
pub const TOP_SHARE: f64 = 0.15;

/// Descriptor of the threshold rule, reported in every [`PressureSummary`].
pub const PRESSURE_METHOD: &str = "max(mean+1.2*std, p85)";

/// Summary of the flagged levels in one snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PressureSummary {
    pub count: usize,
    /// `(min price, max price)` among flagged levels.
    pub price_range: Option<(f64, f64)>,
    /// Mean flagged quantity rounded to 4 dp, 0 if nothing is flagged.
    pub avg_quantity: f64,
    pub method: String,
}

impl Default for PressureSummary {
    fn default() -> Self {
        Self {
            count: 0,
            price_range: None,
            avg_quantity: 0.0,
            method: PRESSURE_METHOD.to_string(),
        }
    }
}

/// Slot-aligned pressure flags plus their summary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PressureZones {
    /// One flag per snapshot slot. Empty slots are never flagged.
    pub flags: Vec<bool>,
    pub summary: PressureSummary,
    pub threshold: Option<f64>,
}

impl PressureZones {
    pub fn detect(snapshot: &Snapshot) -> Self {
        let threshold = pressure_threshold(&snapshot.quantities());

        let flags: Vec<bool> = snapshot
            .slots()
            .iter()
            .map(|slot| match (slot, threshold) {
                (Some(level), Some(threshold)) => level.quantity > threshold,
                _ => false,
            })
            .collect();

        let flagged: Vec<_> = snapshot
            .present()
            .filter(|(index, _)| flags[*index])
            .map(|(_, level)| level)
            .collect();

        let summary = if flagged.is_empty() {
            PressureSummary::default()
        } else {
            let low = flagged
                .iter()
                .map(|level| level.price)
                .fold(f64::INFINITY, f64::min);
            let high = flagged
                .iter()
                .map(|level| level.price)
                .fold(f64::NEG_INFINITY, f64::max);
            let avg = flagged.iter().map(|level| level.quantity).sum::<f64>() / flagged.len() as f64;

            PressureSummary {
                count: flagged.len(),
                price_range: Some((low, high)),
                avg_quantity: round_dp(avg, 4),
                method: PRESSURE_METHOD.to_string(),
            }
        };

        Self {
            flags,
            summary,
            threshold,
        }
    }

    /// True if the slot is flagged.
    pub fn is_pressure(&self, slot: usize) -> bool {
        self.flags.get(slot).copied().unwrap_or(false)
    }
}

/// Outlier threshold for a set of quantities, `None` if empty.
pub fn pressure_threshold(quantities: &[f64]) -> Option<f64> {
    if quantities.is_empty() {
        return None;
    }

    let n = quantities.len() as f64;
    let mean = quantities.iter().sum::<f64>() / n;
    let variance = quantities
        .iter()
        .map(|quantity| (quantity - mean).powi(2))
        .sum::<f64>()
        / n;
    let statistical = mean + STD_MULTIPLIER * variance.sqrt();

    let rank = (n * TOP_SHARE).floor() as usize;
    if rank == 0 {
        return Some(statistical);
    }

    let mut sorted = quantities.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    Some(statistical.max(sorted[rank]))
}

/// Flag each quantity strictly above the pressure threshold. Output is aligned with input.
pub fn detect_pressure_zones(quantities: &[f64]) -> Vec<bool> {
    match pressure_threshold(quantities) {
        Some(threshold) => quantities
            .iter()
            .map(|quantity| *quantity > threshold)
            .collect(),
        None => Vec::new(),
    }
}
