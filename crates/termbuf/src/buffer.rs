//! Virtual terminal buffer
//!
//! Wraps alacritty_terminal with used-rows tracking. The grid is allocated
//! at the line's full row cap; the used-row count reported to layout grows
//! with content (see [`crate::rows`]).

use std::sync::mpsc;

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::Line;
use alacritty_terminal::term::{Config as TermConfig, Term};
use alacritty_terminal::vte::ansi;

use thiserror::Error;

use crate::rows::RowTracker;

#[derive(Error, Debug)]
pub enum TermBufError {
    #[error("invalid terminal dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: u16, cols: u16 },
}

/// Event listener for terminal events
struct EventProxy {
    sender: mpsc::Sender<Event>,
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

/// Simple size struct implementing Dimensions
struct Size {
    cols: usize,
    rows: usize,
}

impl Dimensions for Size {
    fn total_lines(&self) -> usize {
        self.rows
    }

    fn screen_lines(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.cols
    }
}

/// A virtual terminal buffer for one command line's output.
///
/// There is no PTY behind this buffer: bytes are fed in by the stream layer
/// and grid mutation is independent of whether any rendering sink is
/// attached. Terminal query responses the emulator wants to write back
/// (cursor position reports and the like) have nowhere to go and are
/// discarded.
pub struct VirtualTerminalBuffer {
    /// Terminal state from alacritty
    term: Term<EventProxy>,

    /// VTE parser
    parser: ansi::Processor,

    /// Used-rows accounting
    rows_tracker: RowTracker,

    /// Allocated grid rows
    rows: u16,

    /// Columns
    cols: u16,

    /// Whether this terminal grows with content
    flexrows: bool,

    /// Emulator events; drained and dropped, there is no PTY to answer
    events: mpsc::Receiver<Event>,
}

impl VirtualTerminalBuffer {
    /// Create a buffer with a `rows` x `cols` grid.
    ///
    /// For flexrows terminals `rows` is the growth cap; the reported
    /// used-row count starts at the minimum and grows with content.
    pub fn new(rows: u16, cols: u16, flexrows: bool) -> Result<Self, TermBufError> {
        if rows == 0 || cols == 0 {
            return Err(TermBufError::InvalidDimensions { rows, cols });
        }

        let (sender, receiver) = mpsc::channel();
        let event_proxy = EventProxy { sender };

        let config = TermConfig::default();
        let size = Size {
            cols: cols as usize,
            rows: rows as usize,
        };

        let term = Term::new(config, &size, event_proxy);
        let parser = ansi::Processor::new();

        Ok(Self {
            term,
            parser,
            rows_tracker: RowTracker::new(rows, flexrows),
            rows,
            cols,
            flexrows,
            events: receiver,
        })
    }

    /// Feed bytes through the VTE parser and recompute used rows.
    ///
    /// Returns the used-row count after the write.
    pub fn write(&mut self, data: &[u8]) -> u32 {
        for &byte in data {
            self.parser.advance(&mut self.term, byte);
        }
        self.drain_events();
        self.recompute_used_rows()
    }

    /// Current used-row count.
    pub fn used_rows(&self) -> u32 {
        self.rows_tracker.used()
    }

    /// Whether a flexrows terminal has reached its row cap.
    pub fn at_row_max(&self) -> bool {
        self.rows_tracker.at_max()
    }

    /// Allocated grid dimensions (rows, cols).
    pub fn dimensions(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }

    /// Whether this terminal grows with content.
    pub fn flexrows(&self) -> bool {
        self.flexrows
    }

    /// Resize the grid, reflowing content, and re-derive used rows.
    ///
    /// This is the one operation (besides [`clear`](Self::clear)) allowed
    /// to lower the used-row count.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), TermBufError> {
        if rows == 0 || cols == 0 {
            return Err(TermBufError::InvalidDimensions { rows, cols });
        }

        let size = Size {
            cols: cols as usize,
            rows: rows as usize,
        };
        self.term.resize(size);
        self.rows = rows;
        self.cols = cols;

        let last = self.last_content_row();
        self.rows_tracker.rederive(last, rows);
        tracing::debug!(rows, cols, used = self.rows_tracker.used(), "resized terminal buffer");
        Ok(())
    }

    /// Discard all grid content and reset used-rows tracking.
    ///
    /// Used by backfill: the replacement history is replayed from offset 0
    /// into an empty grid.
    pub fn clear(&mut self) {
        let (sender, receiver) = mpsc::channel();
        let event_proxy = EventProxy { sender };
        let size = Size {
            cols: self.cols as usize,
            rows: self.rows as usize,
        };
        self.term = Term::new(TermConfig::default(), &size, event_proxy);
        self.parser = ansi::Processor::new();
        self.events = receiver;
        self.rows_tracker = RowTracker::new(self.rows, self.flexrows);
    }

    /// Get the last grid row with non-empty content (0-indexed).
    ///
    /// Scans backward from the cursor; None if every row is empty.
    pub fn last_content_row(&self) -> Option<u32> {
        let grid = self.term.grid();
        let cursor_line = grid.cursor.point.line.0.max(0) as u32;

        for line_idx in (0..=cursor_line).rev() {
            let line = &grid[Line(line_idx as i32)];
            let has_content = line.into_iter().any(|cell| {
                let c = cell.c;
                c != ' ' && c != '\0'
            });
            if has_content {
                return Some(line_idx);
            }
        }

        None
    }

    /// Get one grid row as text, trailing blanks trimmed.
    pub fn row_text(&self, row: u32) -> String {
        let grid = self.term.grid();
        if row as usize >= self.term.screen_lines() {
            return String::new();
        }

        let line = &grid[Line(row as i32)];
        let mut text = String::new();
        for cell in line.into_iter() {
            let c = cell.c;
            if c == '\0' {
                text.push(' ');
            } else {
                text.push(c);
            }
        }
        text.trim_end().to_string()
    }

    /// Text of every grid row up to the last one containing content.
    pub fn content_lines(&self) -> Vec<String> {
        match self.last_content_row() {
            Some(last) => (0..=last).map(|row| self.row_text(row)).collect(),
            None => Vec::new(),
        }
    }

    fn recompute_used_rows(&mut self) -> u32 {
        if !self.flexrows || self.rows_tracker.at_max() {
            return self.rows_tracker.used();
        }
        match self.last_content_row() {
            Some(last) => self.rows_tracker.observe_content_row(last),
            None => self.rows_tracker.used(),
        }
    }

    fn drain_events(&mut self) {
        for _ in self.events.try_iter() {}
    }
}
