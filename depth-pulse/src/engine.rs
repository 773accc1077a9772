//! The depth engine: one explicit instance owning the current snapshot, the ghost-trail history
//! and every value derived from the snapshot.
//!
//! Each accepted update runs the whole pipeline under `&mut self`:
//!
//! ```text
//! raw -> normalize -> Snapshot -> { pressure, scale, ticks } -> history.append
//! ```
//!
//! Readers therefore never observe a snapshot paired with derived values from another snapshot.
//! Across tasks, share it as a [`SharedEngine`] and hold the lock for the whole update.

use crate::{
    config::{EngineConfig, HistoryPolicy},
    error::DepthError,
    history::HistoryBuffer,
    ingest::{normalize, parse_update, Normalized},
    pressure::{PressureSummary, PressureZones},
    scaling::Scale,
    snapshot::Snapshot,
    ticks::TickSet,
    types::{ConnectionStatus, PriceLevel, RawDepthUpdate},
};
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Engine shared between the feed pump and the renderer.
pub type SharedEngine = Arc<Mutex<DepthEngine>>;

/// Running counters since the engine was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub updates_applied: u64,
    pub updates_rejected: u64,
    pub levels_excluded: u64,
    pub history_resets: u64,
}

/// Values recomputed from the current snapshot on every accepted update.
#[derive(Debug, Clone)]
struct Derived {
    zones: PressureZones,
    scale: Scale,
    ticks: TickSet,
}

impl Derived {
    fn compute(snapshot: &Snapshot) -> Self {
        let zones = PressureZones::detect(snapshot);
        let scale = Scale::from_snapshot(snapshot);
        let ticks = TickSet::generate(snapshot, scale.max_quantity);

        Self {
            zones,
            scale,
            ticks,
        }
    }

    /// Derived values for the placeholder: scale and ticks follow its shape, but its synthetic
    /// levels are never reported as pressure.
    fn placeholder(snapshot: &Snapshot) -> Self {
        let zones = PressureZones {
            flags: vec![false; snapshot.len()],
            summary: PressureSummary::default(),
            threshold: None,
        };

        Self {
            zones,
            ..Self::compute(snapshot)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepthEngine {
    config: EngineConfig,
    current: Snapshot,
    derived: Derived,
    history: HistoryBuffer,
    status: ConnectionStatus,
    has_live_data: bool,
    was_live: bool,
    stats: EngineStats,
}

impl Default for DepthEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DepthEngine {
    /// Create an engine showing the placeholder snapshot with an empty history.
    pub fn new(config: EngineConfig) -> Self {
        // Fields are public, re-apply the builder bounds
        let config = EngineConfig::default()
            .with_depth(config.depth)
            .with_history_capacity(config.history_capacity)
            .with_history_policy(config.history_policy);
        let current = Snapshot::placeholder(config.depth);
        let derived = Derived::placeholder(&current);
        let history = HistoryBuffer::new(config.history_capacity);

        Self {
            config,
            current,
            derived,
            history,
            status: ConnectionStatus::default(),
            has_live_data: false,
            was_live: false,
            stats: EngineStats::default(),
        }
    }

    /// Create a shareable engine.
    pub fn shared(config: EngineConfig) -> SharedEngine {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Parse inbound JSON text and apply it.
    ///
    /// Malformed text is rejected like a malformed update: state is left untouched.
    pub fn process_text(&mut self, text: &str) -> Result<(), DepthError> {
        match parse_update(text) {
            Ok(raw) => self.apply(&raw),
            Err(error) => {
                self.reject(&error);
                Err(error)
            }
        }
    }

    /// Normalise `raw`, replace the current snapshot, recompute derived values and append a
    /// copy to history.
    ///
    /// On error the previous snapshot, derived values and history are retained.
    pub fn apply(&mut self, raw: &RawDepthUpdate) -> Result<(), DepthError> {
        let Normalized { snapshot, excluded } = match normalize(raw, self.config.depth) {
            Ok(normalized) => normalized,
            Err(error) => {
                self.reject(&error);
                return Err(error);
            }
        };

        if excluded > 0 {
            debug!(
                excluded,
                last_update_id = ?raw.last_update_id,
                "excluded non-numeric price levels"
            );
        }

        self.derived = Derived::compute(&snapshot);
        self.history.append(&snapshot);
        self.current = snapshot;
        self.has_live_data = true;

        self.stats.updates_applied += 1;
        self.stats.levels_excluded += excluded as u64;

        Ok(())
    }

    fn reject(&mut self, error: &DepthError) {
        self.stats.updates_rejected += 1;
        debug!(%error, "depth update rejected, keeping last snapshot");
    }

    /// Record a feed connection transition.
    ///
    /// Re-entering [`ConnectionStatus::Live`] after an earlier live period applies the configured
    /// [`HistoryPolicy`]. The current snapshot and derived values are always kept.
    pub fn set_status(&mut self, status: ConnectionStatus) {
        if status == self.status {
            return;
        }

        info!(from = self.status.label(), to = status.label(), "depth feed status changed");

        if status.is_live() {
            if self.was_live && self.config.history_policy == HistoryPolicy::ResetOnReconnect {
                info!(dropped = self.history.len(), "resetting history after reconnect");
                self.history.clear();
                self.stats.history_resets += 1;
            }
            self.was_live = true;
        }

        self.status = status;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// False until the first update is accepted; the current snapshot is the placeholder.
    pub fn has_live_data(&self) -> bool {
        self.has_live_data
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }

    pub fn pressure_flags(&self) -> &[bool] {
        &self.derived.zones.flags
    }

    pub fn pressure_zones(&self) -> &PressureZones {
        &self.derived.zones
    }

    pub fn pressure_summary(&self) -> &PressureSummary {
        &self.derived.zones.summary
    }

    pub fn scale(&self) -> Scale {
        self.derived.scale
    }

    pub fn scale_factor(&self) -> f64 {
        self.derived.scale.factor
    }

    pub fn max_quantity(&self) -> f64 {
        self.derived.scale.max_quantity
    }

    pub fn ticks(&self) -> &TickSet {
        &self.derived.ticks
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Snapshot `k` updates behind the most recent accepted one.
    pub fn history_at(&self, k: usize) -> Option<&Snapshot> {
        self.history.read_from_most_recent(k)
    }

    /// Hover query: the level drawn at `slot`, `None` if empty or out of range.
    pub fn level_at(&self, slot: usize) -> Option<PriceLevel> {
        self.current.get(slot).copied()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Per-slot render view of the current snapshot and its derived values.
    pub fn view(&self) -> DepthView {
        let scale = self.derived.scale;

        let slots = self
            .current
            .slots()
            .iter()
            .enumerate()
            .map(|(index, level)| SlotView {
                index,
                slot_x: self.current.slot_x(index),
                level: *level,
                pressure: self.derived.zones.is_pressure(index),
                height: level.map_or(0.0, |level| scale.bar_height(level.quantity)),
            })
            .collect();

        DepthView {
            slots,
            summary: self.derived.zones.summary.clone(),
            scale,
            ticks: self.derived.ticks.clone(),
            status: self.status,
            live: self.has_live_data,
        }
    }
}

/// One drawable slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub index: usize,
    pub slot_x: f64,
    /// `None` for an empty (hidden) slot
    pub level: Option<PriceLevel>,
    pub pressure: bool,
    /// Scaled bar height, 0 for empty slots
    pub height: f64,
}

/// Owned render view, safe to hand to a renderer after releasing the engine lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthView {
    pub slots: Vec<SlotView>,
    pub summary: PressureSummary,
    pub scale: Scale,
    pub ticks: TickSet,
    pub status: ConnectionStatus,
    pub live: bool,
}

/// Samples the pressure summary at a lower rate than updates arrive.
#[derive(Debug, Clone)]
pub struct SummarySampler {
    interval: Duration,
    last_sample: Option<Instant>,
    cached: PressureSummary,
}

impl Default for SummarySampler {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl SummarySampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sample: None,
            cached: PressureSummary::default(),
        }
    }

    pub fn sample(&mut self, engine: &DepthEngine) -> &PressureSummary {
        self.sample_at(engine, Instant::now())
    }

    /// Refresh the cached summary if `interval` has passed since the last refresh.
    pub fn sample_at(&mut self, engine: &DepthEngine, now: Instant) -> &PressureSummary {
        let due = self
            .last_sample
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);

        if due {
            self.cached = engine.pressure_summary().clone();
            self.last_sample = Some(now);
        }

        &self.cached
    }

    pub fn cached(&self) -> &PressureSummary {
        &self.cached
    }
}
