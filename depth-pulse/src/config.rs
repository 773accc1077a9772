/// Engine configuration
///
/// Defaults match the exchange's 20-level partial depth stream at a 100ms cadence. Every field
/// can be overridden from the environment:
/// - `DEPTH_LEVELS`: levels retained per side (default: 20)
/// - `HISTORY_CAPACITY`: ghost-trail length in snapshots (default: 30)
/// - `HISTORY_POLICY`: `reset` or `retain` history across reconnects (default: reset)

use crate::{error::DepthError, history::HISTORY_CAPACITY, snapshot::DEPTH};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Upper bound on levels per side; keeps `2 × depth` slots addressable by a terminal column.
pub const MAX_DEPTH: usize = 1000;

/// What happens to the ghost-trail history when the feed reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Clear history so the trail never bridges a gap in the feed.
    #[default]
    ResetOnReconnect,
    /// Keep history across the gap.
    Retain,
}

impl FromStr for HistoryPolicy {
    type Err = DepthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" | "reset_on_reconnect" => Ok(HistoryPolicy::ResetOnReconnect),
            "retain" => Ok(HistoryPolicy::Retain),
            _ => Err(DepthError::Config {
                key: "HISTORY_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Price levels retained per side
    pub depth: usize,
    /// Snapshots kept in the ghost-trail history
    pub history_capacity: usize,
    /// History handling across reconnects
    pub history_policy: HistoryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depth: DEPTH,
            history_capacity: HISTORY_CAPACITY,
            history_policy: HistoryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Set levels per side (clamped to `1..=MAX_DEPTH`)
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth.clamp(1, MAX_DEPTH);
        self
    }

    /// Set history capacity (minimum 1)
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    /// Set reconnect history policy
    pub fn with_history_policy(mut self, policy: HistoryPolicy) -> Self {
        self.history_policy = policy;
        self
    }

    /// Defaults overridden by `DEPTH_LEVELS`, `HISTORY_CAPACITY` and `HISTORY_POLICY`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let history_policy = match var("HISTORY_POLICY") {
            Some(value) => value.parse().unwrap_or_else(|error| {
                warn!(%error, "ignoring HISTORY_POLICY, using default");
                defaults.history_policy
            }),
            None => defaults.history_policy,
        };

        defaults
            .with_depth(parse_or(var("DEPTH_LEVELS"), DEPTH))
            .with_history_capacity(parse_or(var("HISTORY_CAPACITY"), HISTORY_CAPACITY))
            .with_history_policy(history_policy)
    }
}

/// Parse an optional override, falling back to `default` when absent or invalid.
fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
