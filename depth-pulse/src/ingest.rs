//! Ingestion normaliser: raw depth update -> fixed-shape [`Snapshot`].
//!
//! The feed's own best-to-worst ranking is trusted: each side is truncated to `depth` entries,
//! never re-sorted. Bids are reversed to read ascending and left-padded so the best bid stays
//! adjacent to the best ask; asks are right-padded.

use crate::{
    error::DepthError,
    num::parse_finite,
    snapshot::Snapshot,
    types::{PriceLevel, RawDepthUpdate, RawLevel, Side},
};
use chrono::Utc;

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub snapshot: Snapshot,
    /// Ranked entries dropped because a price or quantity was not a finite number.
    pub excluded: usize,
}

/// Deserialise inbound JSON text into a [`RawDepthUpdate`].
pub fn parse_update(text: &str) -> Result<RawDepthUpdate, DepthError> {
    serde_json::from_str(text).map_err(DepthError::from)
}

/// Normalise a raw update into a `2 × depth` slot [`Snapshot`].
///
/// Rejects the whole update if either side list is missing. Entries whose price or quantity does
/// not parse to a finite number keep their rank but become empty slots.
pub fn normalize(raw: &RawDepthUpdate, depth: usize) -> Result<Normalized, DepthError> {
    let bids = raw
        .bids
        .as_deref()
        .ok_or(DepthError::MissingSide(Side::Bid))?;
    let asks = raw
        .asks
        .as_deref()
        .ok_or(DepthError::MissingSide(Side::Ask))?;

    let bids = rank_side(bids, depth, Side::Bid);
    let asks = rank_side(asks, depth, Side::Ask);

    let excluded = bids
        .iter()
        .chain(asks.iter())
        .filter(|slot| slot.is_none())
        .count();

    let mut slots = Vec::with_capacity(depth * 2);
    slots.resize(depth - bids.len(), None);
    slots.extend(bids.into_iter().rev());
    slots.extend(asks);
    slots.resize(depth * 2, None);

    Ok(Normalized {
        snapshot: Snapshot::from_slots(depth, slots, Utc::now()),
        excluded,
    })
}

/// Truncate one side to `depth` ranked entries, best first.
fn rank_side(levels: &[RawLevel], depth: usize, side: Side) -> Vec<Option<PriceLevel>> {
    levels
        .iter()
        .take(depth)
        .map(|level| parse_level(level, side))
        .collect()
}

fn parse_level(level: &RawLevel, side: Side) -> Option<PriceLevel> {
    let price = parse_finite(&level.price)?;
    let quantity = parse_finite(&level.quantity)?;
    Some(PriceLevel::new(price, quantity, side))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_side(levels: &[(&str, &str)]) -> Vec<RawLevel> {
        levels
            .iter()
            .map(|(price, quantity)| RawLevel::new(*price, *quantity))
            .collect()
    }

    fn prices(snapshot: &Snapshot) -> Vec<Option<f64>> {
        snapshot
            .slots()
            .iter()
            .map(|slot| slot.map(|level| level.price))
            .collect()
    }

    #[test]
    fn test_normalize_orders_and_pads() {
        let raw = RawDepthUpdate::new(
            raw_side(&[("100", "1"), ("99", "2")]),
            raw_side(&[("101", "3")]),
        );

        let Normalized { snapshot, excluded } = normalize(&raw, 3).unwrap();

        assert_eq!(excluded, 0);
        assert_eq!(
            prices(&snapshot),
            vec![None, Some(99.0), Some(100.0), Some(101.0), None, None]
        );
        assert_eq!(snapshot.best_bid().unwrap().quantity, 1.0);
        assert_eq!(snapshot.best_ask().unwrap().side, Side::Ask);
        assert_eq!(snapshot.get(1).unwrap().side, Side::Bid);
    }

    #[test]
    fn test_normalize_truncates_without_resorting() {
        // Feed ranking is trusted even when it is not monotonic
        let raw = RawDepthUpdate::new(
            raw_side(&[("100", "1"), ("98", "1"), ("99", "1"), ("97", "1")]),
            raw_side(&[("101", "1"), ("103", "1"), ("102", "1"), ("104", "1")]),
        );

        let Normalized { snapshot, .. } = normalize(&raw, 3).unwrap();

        assert_eq!(
            prices(&snapshot),
            vec![
                Some(99.0),
                Some(98.0),
                Some(100.0),
                Some(101.0),
                Some(103.0),
                Some(102.0)
            ]
        );
    }

    #[test]
    fn test_normalize_full_depth() {
        let bids: Vec<RawLevel> = (0..25)
            .map(|i| RawLevel::new(format!("{}", 1000 - i), "1"))
            .collect();
        let asks: Vec<RawLevel> = (0..25)
            .map(|i| RawLevel::new(format!("{}", 1001 + i), "1"))
            .collect();

        let Normalized { snapshot, .. } =
            normalize(&RawDepthUpdate::new(bids, asks), crate::DEPTH).unwrap();

        assert_eq!(snapshot.len(), 40);
        assert_eq!(snapshot.present_count(), 40);
        assert_eq!(snapshot.get(0).unwrap().price, 981.0);
        assert_eq!(snapshot.get(19).unwrap().price, 1000.0);
        assert_eq!(snapshot.get(20).unwrap().price, 1001.0);
        assert_eq!(snapshot.get(39).unwrap().price, 1020.0);
    }

    #[test]
    fn test_normalize_excludes_non_numeric_levels() {
        let raw = RawDepthUpdate::new(
            raw_side(&[("100", "abc"), ("99", "2")]),
            raw_side(&[("NaN", "3"), ("102", "4")]),
        );

        let Normalized { snapshot, excluded } = normalize(&raw, 2).unwrap();

        assert_eq!(excluded, 2);
        assert_eq!(
            prices(&snapshot),
            vec![Some(99.0), None, None, Some(102.0)]
        );
        assert!(snapshot.present().all(|(_, level)| level.quantity.is_finite()));
    }

    #[test]
    fn test_normalize_keeps_finite_values_outside_decimal_range() {
        let raw = RawDepthUpdate::new(
            raw_side(&[("100", "1e30"), ("99", "0.000000000000000000000000000012345")]),
            raw_side(&[("79228162514264337593543950336", "1e-30")]),
        );

        let Normalized { snapshot, excluded } = normalize(&raw, 2).unwrap();

        assert_eq!(excluded, 0);
        assert_eq!(snapshot.present_count(), 3);
        assert_eq!(snapshot.best_bid().unwrap().quantity, 1e30);
        assert_eq!(snapshot.get(0).unwrap().quantity, 1.2345e-29);
        assert_eq!(snapshot.best_ask().unwrap().price, 2f64.powi(96));
        assert_eq!(snapshot.best_ask().unwrap().quantity, 1e-30);
    }

    #[test]
    fn test_normalize_empty_sides() {
        let Normalized { snapshot, excluded } =
            normalize(&RawDepthUpdate::new(vec![], vec![]), 2).unwrap();

        assert_eq!(excluded, 0);
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_normalize_rejects_missing_side() {
        struct TestCase {
            input: RawDepthUpdate,
            expected: DepthError,
        }

        let tests = vec![
            TestCase {
                // TC0: missing bids
                input: RawDepthUpdate {
                    last_update_id: None,
                    bids: None,
                    asks: Some(vec![]),
                },
                expected: DepthError::MissingSide(Side::Bid),
            },
            TestCase {
                // TC1: missing asks
                input: RawDepthUpdate {
                    last_update_id: None,
                    bids: Some(vec![]),
                    asks: None,
                },
                expected: DepthError::MissingSide(Side::Ask),
            },
            TestCase {
                // TC2: missing both reports bids first
                input: RawDepthUpdate::default(),
                expected: DepthError::MissingSide(Side::Bid),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = normalize(&test.input, 20).unwrap_err();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_parse_update() {
        let update = parse_update(r#"{"bids":[["1.5","2"]],"asks":[]}"#).unwrap();
        assert_eq!(update.bids, Some(vec![RawLevel::new("1.5", "2")]));

        let error = parse_update("not json").unwrap_err();
        assert!(matches!(error, DepthError::Json(_)));
        assert!(error.is_recoverable());
    }
}
