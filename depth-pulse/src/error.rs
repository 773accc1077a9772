use crate::types::Side;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `depth-pulse`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DepthError {
    #[error("depth update rejected: missing {0} side")]
    MissingSide(Side),

    #[error("failed to deserialise depth update: {0}")]
    Json(String),

    #[error("invalid configuration value for {key}: {value}")]
    Config { key: String, value: String },

    #[error("SocketError: {0}")]
    Socket(String),
}

impl DepthError {
    /// Determine if an error is an input-side failure the engine recovers from locally by
    /// keeping its last good state.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_recoverable(&self) -> bool {
        match self {
            DepthError::MissingSide(_) | DepthError::Json(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DepthError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DepthError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}
