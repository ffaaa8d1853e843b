//! Virtual terminal buffers for command output
//!
//! This crate provides the terminal side of line virtualization: a
//! character-grid buffer that reports how many rows its content actually
//! uses, and a stream cursor that applies PTY output chunks in strict
//! byte-offset order.

pub mod buffer;
pub mod rows;
pub mod stream;

pub use buffer::{TermBufError, VirtualTerminalBuffer};
pub use rows::{RowTracker, MIN_FLEX_ROWS};
pub use stream::{PtyOrderError, PtyStreamBuffer};
