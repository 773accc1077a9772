//! Dynamic visual scale derived from a single snapshot.
//!
//! No smoothing across snapshots: the scale may jump between updates. Any easing belongs in the
//! renderer.

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

/// Visual height the largest quantity maps to.
pub const TARGET_HEIGHT: f64 = 7.0;

/// Floor applied to the maximum quantity so sparse early books are not over-amplified.
pub const MIN_MAX_QUANTITY: f64 = 2.5;

/// Floor applied to every bar so near-zero quantities stay visible.
pub const MIN_BAR_HEIGHT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scale {
    /// Largest present quantity, floored at [`MIN_MAX_QUANTITY`].
    pub max_quantity: f64,
    /// `TARGET_HEIGHT / max_quantity`
    pub factor: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self::from_quantities(&[])
    }
}

impl Scale {
    pub fn from_quantities(quantities: &[f64]) -> Self {
        let max_quantity = quantities
            .iter()
            .copied()
            .fold(MIN_MAX_QUANTITY, f64::max);

        Self {
            max_quantity,
            factor: TARGET_HEIGHT / max_quantity,
        }
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self::from_quantities(&snapshot.quantities())
    }

    /// Visual height of a bar for `quantity`.
    pub fn bar_height(&self, quantity: f64) -> f64 {
        (quantity * self.factor).max(MIN_BAR_HEIGHT)
    }
}
