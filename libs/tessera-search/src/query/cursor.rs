//! Point-in-time paging cursor

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Page size of point-in-time paging.
pub const PIT_PAGE_SIZE: usize = 10_000;

/// Lifetime of a point in time between two pages.
pub const PIT_KEEP_ALIVE: &str = "1m";

/// Position of a point-in-time iteration, exchanged with callers as an opaque token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    pub pit_id: String,
    /// Sort values of the last hit of the previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_after: Option<Vec<JsonValue>>,
}

impl PageCursor {
    pub fn start(pit_id: impl Into<String>) -> Self {
        Self {
            pit_id: pit_id.into(),
            search_after: None,
        }
    }

    /// Encode as base64url JSON.
    pub fn encode(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::InvalidSkipToken(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidSkipToken(e.to_string()))
    }
}
