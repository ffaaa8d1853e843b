//! Line virtualization engine
//!
//! Decides which command lines have a live terminal buffer, keeps pushed
//! PTY output in order, and holds the scroll position steady while line
//! heights change underneath it.
//!
//! # Modules
//!
//! - `model`: command lines, status mirror, per-screen line registry
//! - `backend`: wire messages and the backfill fetch interface
//! - `instance`: per-line terminal buffer lifecycle (load/unload/backfill)
//! - `visibility`: viewport visibility tracking with flap suppression
//! - `anchor`: scroll anchoring across height changes
//! - `view`: the root context wiring the pieces together
//! - `config`: runtime tuning values

pub mod anchor;
pub mod backend;
pub mod config;
pub mod geometry;
pub mod instance;
pub mod model;
pub mod view;
pub mod visibility;

pub use anchor::{AnchorReason, ScrollAnchor, ScrollAnchorController};
pub use backend::{BackendClient, BackendFetchError, CmdStatusMsg, PtyDataMsg, WireError};
pub use config::{ConfigError, ViewConfig};
pub use geometry::{ContainerGeom, LineGeom};
pub use instance::{
    BackfillRequest, CompletionOutcome, PtyApplyOutcome, RowsChange, TermInstance,
    TerminalInstanceManager,
};
pub use model::{CmdState, CmdStatus, CommandLine, LineId, ScreenLines, TermOpts};
pub use view::{Effect, LineView};
pub use visibility::ViewportVisibilityTracker;
