//! Command line model and status mirror
//!
//! Local mirror of backend-owned command state. The backend is the source
//! of truth; pushed status updates are applied here with the transition
//! rules enforced so a reordered push cannot resurrect a finished command.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Unique identifier for a command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub u64);

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal sizing options for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermOpts {
    pub rows: u16,
    pub cols: u16,

    /// Grow the visible row count with content instead of fixing it
    #[serde(default)]
    pub flexrows: bool,
}

impl Default for TermOpts {
    fn default() -> Self {
        Self {
            rows: 24,
            cols: 80,
            flexrows: false,
        }
    }
}

/// Command execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmdStatus {
    Running,
    Detached,
    Done,
    Hangup,
    Error,
}

impl CmdStatus {
    /// Whether this is a final state (no further output expected)
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Done | Self::Hangup | Self::Error)
    }

    /// Whether a pushed transition to `next` is legal.
    ///
    /// Transitions are monotonic toward a final state, with the single
    /// exception of detached<->running reattachment.
    pub fn can_transition_to(&self, next: CmdStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Running => true,
            Self::Detached => true,
            Self::Done | Self::Hangup | Self::Error => false,
        }
    }
}

/// Mutable status of a running/finished command, mirrored from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdState {
    pub status: CmdStatus,
    pub term_opts: TermOpts,
    pub exit_code: Option<i32>,
    pub restart_ts: Option<u64>,
}

impl CmdState {
    pub fn new(term_opts: TermOpts) -> Self {
        Self {
            status: CmdStatus::Running,
            term_opts,
            exit_code: None,
            restart_ts: None,
        }
    }

    /// Apply a pushed status update.
    ///
    /// Returns false (and leaves the state untouched) if the transition is
    /// not legal.
    pub fn apply_status(&mut self, status: CmdStatus, exit_code: Option<i32>) -> bool {
        if !self.status.can_transition_to(status) {
            tracing::warn!(
                from = ?self.status,
                to = ?status,
                "rejecting non-monotonic status transition"
            );
            return false;
        }
        self.status = status;
        if exit_code.is_some() {
            self.exit_code = exit_code;
        }
        true
    }
}

/// One executed command's output line.
///
/// Immutable after creation except for `archived` and line-number
/// finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub line_id: LineId,
    pub screen_id: String,
    pub window_id: String,

    /// Ordering key, monotonic within a container
    pub line_num: i64,

    /// Set while the line number is provisional (command submitted but not
    /// yet acknowledged); cleared by finalization
    pub provisional: bool,

    pub archived: bool,
}

/// Lines of one screen, ordered by line number
#[derive(Debug, Default)]
pub struct ScreenLines {
    lines: Vec<CommandLine>,
    states: HashMap<LineId, CmdState>,
}

impl ScreenLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a line keeping line-number order.
    ///
    /// Re-adding a known line (component remount) moves it to its slot
    /// without clobbering the live status mirror.
    pub fn add_line(&mut self, line: CommandLine, state: CmdState) {
        self.states.entry(line.line_id).or_insert(state);
        if let Some(idx) = self.lines.iter().position(|l| l.line_id == line.line_id) {
            self.lines.remove(idx);
        }
        let idx = self
            .lines
            .partition_point(|existing| existing.line_num <= line.line_num);
        self.lines.insert(idx, line);
    }

    /// Replace a provisional line number with its final value.
    pub fn finalize_line_num(&mut self, line_id: LineId, line_num: i64) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.line_id == line_id) {
            line.line_num = line_num;
            line.provisional = false;
            self.lines.sort_by_key(|l| l.line_num);
        }
    }

    pub fn set_archived(&mut self, line_id: LineId, archived: bool) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.line_id == line_id) {
            line.archived = archived;
        }
    }

    /// Remove a line and its state.
    pub fn remove_line(&mut self, line_id: LineId) -> Option<CommandLine> {
        self.states.remove(&line_id);
        let idx = self.lines.iter().position(|l| l.line_id == line_id)?;
        Some(self.lines.remove(idx))
    }

    pub fn line(&self, line_id: LineId) -> Option<&CommandLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    pub fn state(&self, line_id: LineId) -> Option<&CmdState> {
        self.states.get(&line_id)
    }

    pub fn state_mut(&mut self, line_id: LineId) -> Option<&mut CmdState> {
        self.states.get_mut(&line_id)
    }

    /// Apply a pushed status update for one line.
    pub fn apply_status(&mut self, line_id: LineId, status: CmdStatus, exit_code: Option<i32>) -> bool {
        match self.states.get_mut(&line_id) {
            Some(state) => state.apply_status(status, exit_code),
            None => {
                tracing::debug!(line_id = line_id.0, "status push for unknown line");
                false
            }
        }
    }

    /// Lines in line-number order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandLine> {
        self.lines.iter()
    }

    /// Ids of the last `n` lines (nearest the bottom of the screen).
    ///
    /// Used as the initial-visibility hint when a screen mounts.
    pub fn last_line_ids(&self, n: usize) -> Vec<LineId> {
        let start = self.lines.len().saturating_sub(n);
        self.lines[start..].iter().map(|l| l.line_id).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
