//! Fixed-shape, slot-stable view of the order book at one point in time.
//!
//! Layout for depth `D` (`2 × D` slots):
//!
//! ```text
//!  slot:   0 ........ D-1 | D ........ 2D-1
//!  side:   bids (asc)     | asks (asc)
//!                 best bid ^ ^ best ask
//! ```
//!
//! Slot indices are stable across snapshots and drive bar positioning and hover lookup, so a
//! missing level is an empty slot rather than a shorter sequence.

use crate::types::{PriceLevel, Side};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of price levels retained per side.
pub const DEPTH: usize = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    depth: usize,
    slots: Vec<Option<PriceLevel>>,
    received_at: DateTime<Utc>,
}

// `received_at` is display metadata; identical input must compare equal.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.slots == other.slots
    }
}

impl Snapshot {
    /// Build from already ranked slots. `slots` must hold exactly `2 × depth` entries.
    pub(crate) fn from_slots(
        depth: usize,
        slots: Vec<Option<PriceLevel>>,
        received_at: DateTime<Utc>,
    ) -> Self {
        debug_assert_eq!(slots.len(), depth * 2);
        Self {
            depth,
            slots,
            received_at,
        }
    }

    /// Snapshot with every slot empty.
    pub fn empty(depth: usize) -> Self {
        Self::from_slots(depth, vec![None; depth * 2], Utc::now())
    }

    /// Synthetic snapshot shown before the first live update: a zero-priced V shape with
    /// quantity `0.1 + |i - depth|`, bids left of centre and asks right of it.
    pub fn placeholder(depth: usize) -> Self {
        let slots = (0..depth * 2)
            .map(|index| {
                let side = if index < depth { Side::Bid } else { Side::Ask };
                let quantity = 0.1 + index.abs_diff(depth) as f64;
                Some(PriceLevel::new(0.0, quantity, side))
            })
            .collect();

        Self::from_slots(depth, slots, Utc::now())
    }

    /// Levels per side.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Total slot count, always `2 × depth`.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no slot holds a level.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn slots(&self) -> &[Option<PriceLevel>] {
        &self.slots
    }

    /// Level at `slot`, `None` if the slot is empty or out of range.
    pub fn get(&self, slot: usize) -> Option<&PriceLevel> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Present levels with their slot index, left to right.
    pub fn present(&self) -> impl Iterator<Item = (usize, &PriceLevel)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|level| (index, level)))
    }

    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Quantities of present levels, left to right.
    pub fn quantities(&self) -> Vec<f64> {
        self.present().map(|(_, level)| level.quantity).collect()
    }

    /// Sum of present quantities.
    pub fn total_quantity(&self) -> f64 {
        self.present().map(|(_, level)| level.quantity).sum()
    }

    /// Canonical horizontal position of a slot: `slot - depth + 0.5`.
    pub fn slot_x(&self, slot: usize) -> f64 {
        slot as f64 - self.depth as f64 + 0.5
    }

    /// Best bid sits immediately left of the spread.
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.depth.checked_sub(1).and_then(|slot| self.get(slot))
    }

    /// Best ask sits immediately right of the spread.
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.get(self.depth)
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }
}
