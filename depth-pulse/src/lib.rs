/// Depth Pulse - order book depth statistics for real-time visualisation
///
/// Turns streaming partial-depth updates into a fixed-shape view the renderer can draw directly:
/// - Ranked, slot-stable price levels (bids ascending left of the spread, asks ascending right)
/// - Statistical pressure zones (outlier quantities) and a summary of them
/// - A dynamic per-snapshot scale factor and bar heights
/// - A bounded ghost-trail history of past snapshots
/// - Sparse, deduplicated axis ticks
///
/// The derivation core (`ingest`, `pressure`, `scaling`, `history`, `ticks`) is pure and
/// synchronous. [`DepthEngine`] owns the current snapshot, the history and the derived values.
/// The `feed` module is an optional WebSocket collaborator that pushes raw frames into an engine.
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod history;
pub mod ingest;
pub mod pressure;
pub mod scaling;
pub mod snapshot;
pub mod ticks;
pub mod types;

mod num;

// Re-export commonly used types for convenience
pub use config::{EngineConfig, HistoryPolicy, MAX_DEPTH};
pub use engine::{DepthEngine, DepthView, EngineStats, SharedEngine, SlotView, SummarySampler};
pub use error::DepthError;
pub use feed::{pump, DepthFeed, FeedConfig, FeedEvent, ReconnectPolicy, MIN_PING_INTERVAL};
pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use ingest::{normalize, parse_update, Normalized};
pub use pressure::{detect_pressure_zones, pressure_threshold, PressureSummary, PressureZones};
pub use scaling::Scale;
pub use snapshot::{Snapshot, DEPTH};
pub use ticks::{TickSet, XTick};
pub use types::{ConnectionStatus, PriceLevel, RawDepthUpdate, RawLevel, Side};
