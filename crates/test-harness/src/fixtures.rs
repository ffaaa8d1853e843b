//! Test fixtures for common test scenarios

use std::collections::HashMap;
use std::sync::Once;

use lineview::{
    BackendClient, BackendFetchError, CmdState, CommandLine, LineId, TermOpts, ViewConfig,
};

/// Standard test viewport dimensions
pub const TEST_WIDTH: f64 = 800.0;
pub const TEST_HEIGHT: f64 = 400.0;

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing output for tests (idempotent).
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Backend stub with canned per-line history and a fetch counter
#[derive(Default)]
pub struct MockBackend {
    history: HashMap<LineId, Vec<u8>>,
    failures: HashMap<LineId, BackendFetchError>,
    pub fetch_count: HashMap<LineId, u32>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the historical PTY stream served for a line.
    pub fn set_history(&mut self, line_id: LineId, bytes: impl Into<Vec<u8>>) {
        self.failures.remove(&line_id);
        self.history.insert(line_id, bytes.into());
    }

    /// Make fetches for a line fail.
    pub fn set_failure(&mut self, line_id: LineId, error: BackendFetchError) {
        self.failures.insert(line_id, error);
    }

    /// Current canned history for a line (empty if unset).
    pub fn history_of(&self, line_id: LineId) -> Vec<u8> {
        self.history.get(&line_id).cloned().unwrap_or_default()
    }

    pub fn fetches(&self, line_id: LineId) -> u32 {
        self.fetch_count.get(&line_id).copied().unwrap_or(0)
    }
}

impl BackendClient for MockBackend {
    fn fetch_pty_history(&mut self, line_id: LineId) -> Result<Vec<u8>, BackendFetchError> {
        *self.fetch_count.entry(line_id).or_insert(0) += 1;
        if let Some(error) = self.failures.get(&line_id) {
            return Err(error.clone());
        }
        Ok(self.history.get(&line_id).cloned().unwrap_or_default())
    }
}

/// A command line on the default screen.
pub fn line(id: u64, num: i64) -> CommandLine {
    CommandLine {
        line_id: LineId(id),
        screen_id: "screen-1".to_string(),
        window_id: "window-1".to_string(),
        line_num: num,
        provisional: false,
        archived: false,
    }
}

/// Running command with an auto-growing terminal.
pub fn flex_state() -> CmdState {
    CmdState::new(TermOpts {
        rows: 50,
        cols: 80,
        flexrows: true,
    })
}

/// Running command with a fixed-size terminal.
pub fn fixed_state(rows: u16, cols: u16) -> CmdState {
    CmdState::new(TermOpts {
        rows,
        cols,
        flexrows: false,
    })
}

/// Config with test-friendly tuning (real debounce, no recompute throttle).
pub fn test_config() -> ViewConfig {
    ViewConfig {
        visibility_recompute_ms: 0,
        ..ViewConfig::default()
    }
}
