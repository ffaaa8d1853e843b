//! Backend wire messages and fetch interface
//!
//! The backend process owns real command execution and PTY streams; this
//! module is the engine's view of it. Pushed messages arrive as JSON;
//! historical output is fetched through [`BackendClient`] for backfill.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CmdStatus, LineId, TermOpts};

/// Maximum accepted PTY payload per push message (1 MB)
const MAX_PTY_DATA_SIZE: u64 = 1024 * 1024;

/// Wire decoding errors
#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload length mismatch: header says {expected}, got {got}")]
    LengthMismatch { expected: u64, got: u64 },

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u64, max: u64 },
}

/// Pushed PTY data update for one line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtyDataMsg {
    pub line_id: LineId,

    /// Byte offset of this chunk within the line's stream
    pub pos: u64,

    /// Base64-encoded payload
    pub data: String,

    /// Decoded payload length, for validation
    pub data_len: u64,
}

impl PtyDataMsg {
    /// Parse a pushed JSON message.
    pub fn parse(json: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode and validate the payload.
    pub fn decode_data(&self) -> Result<Vec<u8>, WireError> {
        if self.data_len > MAX_PTY_DATA_SIZE {
            return Err(WireError::PayloadTooLarge {
                size: self.data_len,
                max: MAX_PTY_DATA_SIZE,
            });
        }
        let bytes = BASE64.decode(&self.data)?;
        if bytes.len() as u64 != self.data_len {
            return Err(WireError::LengthMismatch {
                expected: self.data_len,
                got: bytes.len() as u64,
            });
        }
        Ok(bytes)
    }

    /// Build a message from raw bytes (the encoding direction).
    pub fn from_bytes(line_id: LineId, pos: u64, bytes: &[u8]) -> Self {
        Self {
            line_id,
            pos,
            data: BASE64.encode(bytes),
            data_len: bytes.len() as u64,
        }
    }
}

/// Pushed command status update
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmdStatusMsg {
    pub line_id: LineId,
    pub status: CmdStatus,

    #[serde(default)]
    pub term_opts: Option<TermOpts>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_ts: Option<u64>,
}

impl CmdStatusMsg {
    /// Parse a pushed JSON message.
    pub fn parse(json: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Backfill fetch failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendFetchError {
    #[error("backend returned HTTP {status}")]
    Http { status: u16 },

    #[error("IO error talking to backend: {0}")]
    Io(String),

    #[error("backend response malformed: {0}")]
    Malformed(String),
}

/// Fetches historical PTY output for backfill.
///
/// Implementations wrap the backend's ptyout endpoint; the engine only
/// needs the full byte stream for one line from offset 0.
pub trait BackendClient {
    fn fetch_pty_history(&mut self, line_id: LineId) -> Result<Vec<u8>, BackendFetchError>;
}
