//! PTY stream ordering
//!
//! Applies pushed PTY output chunks to a terminal buffer in strict byte
//! offset order. The transport is assumed to deliver in order; an offset
//! that does not match is a desync, not a gap, and the owning instance
//! must recover by replaying the full history from offset 0.

use thiserror::Error;

use crate::buffer::VirtualTerminalBuffer;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyOrderError {
    #[error("PTY chunk offset mismatch: expected {expected}, got {got}")]
    OffsetMismatch { expected: u64, got: u64 },
}

/// Stream cursor for one command line's PTY output.
///
/// Tracks the next expected byte offset. The offset only ever advances by
/// exactly the length of an applied chunk, so buffer content is always a
/// prefix-complete replay of the backend's stream.
#[derive(Debug, Default)]
pub struct PtyStreamBuffer {
    /// Next expected byte offset
    position: u64,
}

impl PtyStreamBuffer {
    pub fn new() -> Self {
        Self { position: 0 }
    }

    /// Next expected byte offset.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Apply one pushed chunk starting at byte offset `pos`.
    ///
    /// On success the data is written into `buf` and the expected offset
    /// advances by `data.len()`; returns the buffer's used-row count.
    /// A mismatched offset fails without mutating either the cursor or the
    /// buffer; the caller must treat that as fatal to this instance and
    /// reload from offset 0.
    pub fn apply_chunk(
        &mut self,
        pos: u64,
        data: &[u8],
        buf: &mut VirtualTerminalBuffer,
    ) -> Result<u32, PtyOrderError> {
        if pos != self.position {
            tracing::warn!(
                expected = self.position,
                got = pos,
                len = data.len(),
                "rejecting out-of-order PTY chunk"
            );
            return Err(PtyOrderError::OffsetMismatch {
                expected: self.position,
                got: pos,
            });
        }

        let used = buf.write(data);
        self.position += data.len() as u64;
        Ok(used)
    }

    /// Replay a full historical stream from offset 0.
    ///
    /// Clears the buffer, resets the cursor, and applies `data` as the
    /// complete prefix of the stream. Used at initial load and as
    /// offset-mismatch recovery. Returns the used-row count.
    pub fn replay(&mut self, data: &[u8], buf: &mut VirtualTerminalBuffer) -> u32 {
        buf.clear();
        let used = buf.write(data);
        self.position = data.len() as u64;
        tracing::debug!(len = data.len(), used, "replayed PTY history");
        used
    }
}
