//! Terminal instance lifecycle
//!
//! Owns the mapping from line id to at most one live terminal buffer and
//! drives the Unloaded -> Loading -> Loaded -> Unloaded transitions from
//! visibility signals. Backfill is a request/completion pair: `load`
//! hands the host a fetch request tagged with a generation, and a
//! completion carrying a stale generation is dropped, so an unload racing
//! an in-flight fetch can never resurrect a disposed buffer.

use std::collections::HashMap;

use termbuf::{PtyOrderError, PtyStreamBuffer, TermBufError, VirtualTerminalBuffer};

use crate::backend::BackendFetchError;
use crate::model::{CmdStatus, LineId, TermOpts};

/// Request for the host to fetch a line's full historical stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillRequest {
    pub line_id: LineId,

    /// Load generation; completions must echo it back
    pub generation: u64,
}

/// Row-count change for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsChange {
    pub line_id: LineId,
    pub old_rows: u32,
    pub new_rows: u32,
}

/// Result of completing a backfill fetch
#[derive(Debug)]
pub enum CompletionOutcome {
    /// Buffer materialized and history replayed
    Loaded(RowsChange),

    /// Completion carried a stale generation (line unloaded or reloaded
    /// meanwhile); deliberately dropped, not an error
    StaleDiscarded,

    /// Fetch failed; the caller retries with backoff while attempts remain
    FetchFailed { attempts: u32, will_retry: bool },
}

/// Result of applying a pushed PTY chunk
#[derive(Debug)]
pub enum PtyApplyOutcome {
    /// Chunk applied in order; Some if the used-row count changed
    Applied(Option<RowsChange>),

    /// Line has no live buffer; chunk ignored
    NotLoaded,

    /// Offset desync; the instance was dropped and a full reload issued
    Desync {
        error: PtyOrderError,
        reload: BackfillRequest,
    },
}

/// A materialized terminal: grid buffer plus stream cursor
pub struct TermInstance {
    pub buffer: VirtualTerminalBuffer,
    stream: PtyStreamBuffer,
    opts: TermOpts,
}

impl TermInstance {
    /// Next expected stream offset.
    pub fn stream_position(&self) -> u64 {
        self.stream.position()
    }
}

enum Slot {
    /// Backfill fetch in flight; the buffer is built but empty
    Loading {
        generation: u64,
        opts: TermOpts,
        attempts: u32,
        buffer: VirtualTerminalBuffer,
    },

    /// Live buffer attached to the view
    Loaded { inst: TermInstance },

    /// Backfill failed; line shows a placeholder of reserved height
    Failed { attempts: u32, reserved_rows: u32 },
}

/// Manages all materialized terminals for one screen.
///
/// INVARIANT: at most one live buffer per line id. `load` is idempotent
/// and concurrent loads collapse into the single in-flight fetch.
pub struct TerminalInstanceManager {
    slots: HashMap<LineId, Slot>,

    /// Last observed used rows for lines that are no longer loaded
    last_known_rows: HashMap<LineId, u32>,

    /// Generation counter for stale-completion detection
    next_generation: u64,

    /// Fetch attempts before a line is parked as Failed
    max_attempts: u32,
}

impl TerminalInstanceManager {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            slots: HashMap::new(),
            last_known_rows: HashMap::new(),
            next_generation: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Begin loading a line.
    ///
    /// Returns the fetch request the host must execute, or None if the
    /// line is already loading/loaded (the at-most-one-buffer guarantee)
    /// or has exhausted its fetch attempts. Invalid terminal dimensions
    /// fail fast.
    pub fn load(
        &mut self,
        line_id: LineId,
        opts: TermOpts,
    ) -> Result<Option<BackfillRequest>, TermBufError> {
        let attempts = match self.slots.get(&line_id) {
            Some(Slot::Loading { .. }) | Some(Slot::Loaded { .. }) => {
                tracing::debug!(line_id = line_id.0, "load collapsed into existing instance");
                return Ok(None);
            }
            Some(Slot::Failed { attempts, .. }) => {
                if *attempts >= self.max_attempts {
                    tracing::debug!(
                        line_id = line_id.0,
                        attempts,
                        "load refused, fetch attempts exhausted"
                    );
                    return Ok(None);
                }
                *attempts
            }
            None => 0,
        };

        let request = self.begin_load(line_id, opts, attempts)?;
        Ok(Some(request))
    }

    fn begin_load(
        &mut self,
        line_id: LineId,
        opts: TermOpts,
        attempts: u32,
    ) -> Result<BackfillRequest, TermBufError> {
        let buffer = VirtualTerminalBuffer::new(opts.rows, opts.cols, opts.flexrows)?;
        let generation = self.next_generation;
        self.next_generation += 1;

        self.slots.insert(
            line_id,
            Slot::Loading {
                generation,
                opts,
                attempts,
                buffer,
            },
        );

        tracing::debug!(
            line_id = line_id.0,
            generation,
            attempts,
            rows = opts.rows,
            cols = opts.cols,
            flexrows = opts.flexrows,
            "terminal load started"
        );
        Ok(BackfillRequest {
            line_id,
            generation,
        })
    }

    /// Unload a line, disposing its buffer.
    ///
    /// No-op if already unloaded. Safe to call mid-backfill: the in-flight
    /// fetch is cancelled via the generation check on completion.
    pub fn unload(&mut self, line_id: LineId) {
        match self.slots.remove(&line_id) {
            None => {
                tracing::debug!(line_id = line_id.0, "unload of already-unloaded line");
            }
            Some(Slot::Loaded { inst }) => {
                self.last_known_rows.insert(line_id, inst.buffer.used_rows());
                tracing::debug!(
                    line_id = line_id.0,
                    rows = inst.buffer.used_rows(),
                    "terminal unloaded"
                );
            }
            Some(Slot::Loading { generation, .. }) => {
                tracing::debug!(
                    line_id = line_id.0,
                    generation,
                    "unload cancelled in-flight backfill"
                );
            }
            Some(Slot::Failed { .. }) => {}
        }
    }

    /// Complete a backfill fetch.
    ///
    /// The generation must match the in-flight load; anything else is a
    /// late response for a cancelled or superseded load and is dropped.
    pub fn complete_backfill(
        &mut self,
        line_id: LineId,
        generation: u64,
        result: Result<Vec<u8>, BackendFetchError>,
    ) -> CompletionOutcome {
        match self.slots.remove(&line_id) {
            Some(Slot::Loading {
                generation: current,
                opts,
                attempts,
                mut buffer,
            }) if current == generation => match result {
                Ok(bytes) => {
                    let mut stream = PtyStreamBuffer::new();
                    let new_rows = stream.replay(&bytes, &mut buffer);
                    let old_rows = self.last_known_rows.get(&line_id).copied().unwrap_or(0);

                    self.slots.insert(
                        line_id,
                        Slot::Loaded {
                            inst: TermInstance {
                                buffer,
                                stream,
                                opts,
                            },
                        },
                    );
                    tracing::debug!(
                        line_id = line_id.0,
                        generation,
                        bytes = bytes.len(),
                        rows = new_rows,
                        "terminal loaded from backfill"
                    );
                    CompletionOutcome::Loaded(RowsChange {
                        line_id,
                        old_rows,
                        new_rows,
                    })
                }
                Err(err) => {
                    let attempts = attempts + 1;
                    let will_retry = attempts < self.max_attempts;
                    let reserved_rows = self
                        .last_known_rows
                        .get(&line_id)
                        .copied()
                        .unwrap_or(1)
                        .max(1);
                    tracing::warn!(
                        line_id = line_id.0,
                        attempts,
                        will_retry,
                        error = %err,
                        "backfill fetch failed"
                    );
                    self.slots.insert(
                        line_id,
                        Slot::Failed {
                            attempts,
                            reserved_rows,
                        },
                    );
                    CompletionOutcome::FetchFailed {
                        attempts,
                        will_retry,
                    }
                }
            },
            Some(other) => {
                // Slot exists but the load was superseded; put it back
                self.slots.insert(line_id, other);
                tracing::debug!(
                    line_id = line_id.0,
                    generation,
                    "discarding stale backfill completion"
                );
                CompletionOutcome::StaleDiscarded
            }
            None => {
                tracing::debug!(
                    line_id = line_id.0,
                    generation,
                    "discarding backfill completion for unloaded line"
                );
                CompletionOutcome::StaleDiscarded
            }
        }
    }

    /// Apply a pushed PTY chunk to a line's live buffer.
    ///
    /// An offset mismatch is a desync: the instance is dropped and a
    /// fresh backfill from offset 0 issued (no repair attempted).
    pub fn apply_pty_data(&mut self, line_id: LineId, pos: u64, data: &[u8]) -> PtyApplyOutcome {
        let Some(Slot::Loaded { inst }) = self.slots.get_mut(&line_id) else {
            tracing::trace!(line_id = line_id.0, pos, "PTY data for line with no buffer");
            return PtyApplyOutcome::NotLoaded;
        };

        let old_rows = inst.buffer.used_rows();
        match inst.stream.apply_chunk(pos, data, &mut inst.buffer) {
            Ok(new_rows) => {
                let change = (new_rows != old_rows).then_some(RowsChange {
                    line_id,
                    old_rows,
                    new_rows,
                });
                PtyApplyOutcome::Applied(change)
            }
            Err(error) => {
                // Desync: dispose the instance and reload from scratch,
                // reusing the existing grid allocation
                let Some(Slot::Loaded { inst }) = self.slots.remove(&line_id) else {
                    return PtyApplyOutcome::NotLoaded;
                };
                let TermInstance {
                    mut buffer, opts, ..
                } = inst;
                buffer.clear();

                let generation = self.next_generation;
                self.next_generation += 1;
                self.slots.insert(
                    line_id,
                    Slot::Loading {
                        generation,
                        opts,
                        attempts: 0,
                        buffer,
                    },
                );
                tracing::warn!(
                    line_id = line_id.0,
                    generation,
                    error = %error,
                    "PTY stream desync, forcing full reload"
                );
                PtyApplyOutcome::Desync {
                    error,
                    reload: BackfillRequest {
                        line_id,
                        generation,
                    },
                }
            }
        }
    }

    /// Reflow every loaded buffer to a new column count.
    ///
    /// Text re-wraps, so used rows are re-derived per line; the returned
    /// changes tell the host which lines changed height. A reflow
    /// failure is confined to its line.
    pub fn resize_cols(&mut self, cols: u16) -> Vec<RowsChange> {
        let mut changes = Vec::new();
        for (line_id, slot) in &mut self.slots {
            let Slot::Loaded { inst } = slot else {
                continue;
            };
            let (rows, old_cols) = inst.buffer.dimensions();
            if old_cols == cols {
                continue;
            }

            let old_rows = inst.buffer.used_rows();
            match inst.buffer.resize(rows, cols) {
                Ok(()) => {
                    inst.opts.cols = cols;
                    let new_rows = inst.buffer.used_rows();
                    if new_rows != old_rows {
                        changes.push(RowsChange {
                            line_id: *line_id,
                            old_rows,
                            new_rows,
                        });
                    }
                }
                Err(err) => {
                    tracing::error!(line_id = line_id.0, cols, error = %err, "terminal reflow failed");
                }
            }
        }
        changes.sort_by_key(|change| change.line_id);
        changes
    }

    pub fn is_loaded(&self, line_id: LineId) -> bool {
        matches!(self.slots.get(&line_id), Some(Slot::Loaded { .. }))
    }

    pub fn is_loading(&self, line_id: LineId) -> bool {
        matches!(self.slots.get(&line_id), Some(Slot::Loading { .. }))
    }

    pub fn has_failed(&self, line_id: LineId) -> bool {
        matches!(self.slots.get(&line_id), Some(Slot::Failed { .. }))
    }

    /// Number of live buffers.
    pub fn loaded_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Loaded { .. }))
            .count()
    }

    /// Access a loaded instance (tests and host rendering).
    pub fn instance(&self, line_id: LineId) -> Option<&TermInstance> {
        match self.slots.get(&line_id) {
            Some(Slot::Loaded { inst }) => Some(inst),
            _ => None,
        }
    }

    /// Used rows for layout, loaded or not.
    ///
    /// Unloaded lines report their last known height so scroll geometry
    /// stays stable; lines never seen before fall back to a status-based
    /// default (1 row while output may still arrive, 0 once finished).
    pub fn used_rows(&self, line_id: LineId, status: Option<CmdStatus>) -> u32 {
        match self.slots.get(&line_id) {
            Some(Slot::Loaded { inst }) => inst.buffer.used_rows(),
            Some(Slot::Failed { reserved_rows, .. }) => *reserved_rows,
            _ => self
                .last_known_rows
                .get(&line_id)
                .copied()
                .unwrap_or_else(|| match status {
                    Some(CmdStatus::Running) | Some(CmdStatus::Detached) | None => 1,
                    Some(_) => 0,
                }),
        }
    }

    /// Seed the last-known height for a line (from persisted backend
    /// metadata), so layout is right before any load happens.
    pub fn set_last_known_rows(&mut self, line_id: LineId, rows: u32) {
        self.last_known_rows.insert(line_id, rows);
    }

    /// Forget a line entirely (line removed from the screen).
    pub fn forget(&mut self, line_id: LineId) {
        self.unload(line_id);
        self.last_known_rows.remove(&line_id);
    }
}
