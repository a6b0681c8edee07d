use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::models::SortKey;
use crate::pagination::CursorError;

const CURSOR_VERSION: u32 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
pub enum Direction {
    #[serde(rename = "f")]
    Forward,
    #[serde(rename = "b")]
    Backward
}

impl Direction {
    fn code(&self) -> &'static str {
        match self {
            Direction::Forward => "f",
            Direction::Backward => "b"
        }
    }
}

/// Decoded pagination position: the sort key of a boundary row and which way to page from it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cursor {
    pub direction: Direction,
    pub key: SortKey
}

#[derive(Deserialize)]
struct CursorToken {
    v: u32,
    d: Direction,
    date: NaiveDate,
    id: String
}

#[derive(Deserialize)]
struct VersionProbe {
    v: u32
}

impl Cursor {
    pub fn forward(key: SortKey) -> Self {
        Self { direction: Direction::Forward, key }
    }

    pub fn backward(key: SortKey) -> Self {
        Self { direction: Direction::Backward, key }
    }

    /// Opaque, URL-safe token. Clients must not interpret it.
    pub fn encode(&self) -> String {
        let token = json!({
            "v": CURSOR_VERSION,
            "d": self.direction.code(),
            "date": self.key.date.format(DATE_FORMAT).to_string(),
            "id": self.key.transaction_id
        });

        URL_SAFE_NO_PAD.encode(token.to_string())
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim())?;

        let probe: VersionProbe = serde_json::from_slice(&bytes)?;
        if probe.v != CURSOR_VERSION {
            return Err(CursorError::UnsupportedVersion(probe.v));
        }

        let token: CursorToken = serde_json::from_slice(&bytes)?;

        Ok(Self {
            direction: token.d,
            key: SortKey::new(token.date, token.id)
        })
    }
}
