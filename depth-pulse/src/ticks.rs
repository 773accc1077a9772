//! Sparse axis labels for the depth chart.

use crate::{num::round_dp, snapshot::Snapshot};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Number of X positions sampled across the present levels.
pub const X_TICK_SAMPLES: usize = 7;

/// Number of Y ticks, `0` through `max_quantity` inclusive.
pub const Y_TICK_COUNT: usize = 6;

/// Price label anchored at a slot's horizontal position.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XTick {
    pub slot_x: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSet {
    pub x_ticks: Vec<XTick>,
    pub y_ticks: Vec<f64>,
}

impl TickSet {
    pub fn generate(snapshot: &Snapshot, max_quantity: f64) -> Self {
        Self {
            x_ticks: price_ticks(snapshot),
            y_ticks: quantity_ticks(max_quantity),
        }
    }
}

/// Sample evenly spaced present levels, dropping zero prices and repeated prices.
fn price_ticks(snapshot: &Snapshot) -> Vec<XTick> {
    let candidates: Vec<XTick> = snapshot
        .present()
        .map(|(slot, level)| XTick {
            slot_x: snapshot.slot_x(slot),
            price: level.price,
        })
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let last = (candidates.len() - 1) as f64;
    let divisions = (X_TICK_SAMPLES - 1) as f64;

    (0..X_TICK_SAMPLES)
        .map(|i| (i as f64 * last / divisions).round() as usize)
        .map(|index| candidates[index])
        .filter(|tick| tick.price != 0.0)
        .unique_by(|tick| tick.price.to_bits())
        .collect()
}

/// `max_quantity × i / 5` for `i` in `0..=5`, rounded to 3 dp.
fn quantity_ticks(max_quantity: f64) -> Vec<f64> {
    let divisions = (Y_TICK_COUNT - 1) as f64;
    (0..Y_TICK_COUNT)
        .map(|i| round_dp(max_quantity * i as f64 / divisions, 3))
        .collect()
}
