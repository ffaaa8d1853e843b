//! Headless view host
//!
//! Owns a [`LineView`] plus a mock backend and a manual clock, and plays
//! the host's role: effects returned by the engine are executed
//! immediately (backfill fetches answered from the mock, scroll writes
//! recorded) until the engine goes quiet.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use lineview::{
    BackendClient, CmdState, CmdStatusMsg, CommandLine, Effect, LineId, LineView, PtyDataMsg,
    ViewConfig,
};

use crate::fixtures::{self, MockBackend};

/// In-memory host for one screen's view engine.
pub struct TestView {
    pub view: LineView,
    pub backend: MockBackend,

    /// Scroll positions the engine asked the host to write
    pub scroll_writes: Vec<f64>,

    /// Height-change notifications (line, old px, new px)
    pub height_changes: Vec<(LineId, f64, f64)>,

    /// Committed visibility flips
    pub visibility_changes: Vec<(LineId, bool)>,

    clock: Instant,

    /// Authoritative per-line stream length, mirroring the backend
    stream_len: HashMap<LineId, u64>,
}

impl TestView {
    pub fn new() -> Self {
        Self::with_config(fixtures::test_config())
    }

    pub fn with_config(config: ViewConfig) -> Self {
        fixtures::init_logging();
        Self {
            view: LineView::new(config),
            backend: MockBackend::new(),
            scroll_writes: Vec::new(),
            height_changes: Vec::new(),
            visibility_changes: Vec::new(),
            clock: Instant::now(),
            stream_len: HashMap::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.clock
    }

    pub fn scroll_top(&self) -> f64 {
        self.view.container().scroll_top
    }

    /// Advance the clock and let due timers fire.
    pub fn advance(&mut self, ms: u64) {
        self.clock += Duration::from_millis(ms);
        let effects = self.view.tick(self.clock);
        self.pump(effects);
    }

    pub fn mount(&mut self, scroll_top: f64, width: f64, height: f64) {
        let effects = self.view.mount(scroll_top, width, height, self.clock);
        self.pump(effects);
    }

    pub fn attach(&mut self, line: CommandLine, state: CmdState, visible: bool) {
        let effects = self.view.attach_line(line, state, visible, self.clock);
        self.pump(effects);
    }

    pub fn scroll_to(&mut self, scroll_top: f64) {
        let effects = self.view.handle_scroll(scroll_top, self.clock);
        self.pump(effects);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        let effects = self.view.handle_resize(width, height, self.clock);
        self.pump(effects);
    }

    /// Seed a line's historical stream on the backend.
    pub fn seed_history(&mut self, line_id: LineId, bytes: &[u8]) {
        self.backend.set_history(line_id, bytes.to_vec());
        self.stream_len.insert(line_id, bytes.len() as u64);
    }

    /// Emit new PTY output for a line: append to the backend's history
    /// and push it to the view at the correct stream offset.
    pub fn push_output(&mut self, line_id: LineId, bytes: &[u8]) {
        let pos = self.stream_len.get(&line_id).copied().unwrap_or(0);
        let msg = PtyDataMsg::from_bytes(line_id, pos, bytes);

        let mut history = self.backend.history_of(line_id);
        history.extend_from_slice(bytes);
        self.backend.set_history(line_id, history);
        self.stream_len.insert(line_id, pos + bytes.len() as u64);

        let effects = self.view.handle_pty_push(&msg).expect("valid push");
        self.pump(effects);
    }

    /// Push a chunk at an explicit (possibly wrong) offset without
    /// touching the backend history.
    pub fn push_raw(&mut self, line_id: LineId, pos: u64, bytes: &[u8]) {
        let msg = PtyDataMsg::from_bytes(line_id, pos, bytes);
        let effects = self.view.handle_pty_push(&msg).expect("valid push");
        self.pump(effects);
    }

    pub fn push_status(&mut self, msg: &CmdStatusMsg) {
        self.view.handle_status_push(msg);
    }

    /// Rendered text of a loaded line's terminal.
    pub fn line_text(&self, line_id: LineId) -> Option<Vec<String>> {
        self.view
            .manager()
            .instance(line_id)
            .map(|inst| inst.buffer.content_lines())
    }

    /// Execute engine effects until it goes quiet.
    fn pump(&mut self, effects: Vec<Effect>) {
        let mut queue = effects;
        while !queue.is_empty() {
            let mut next = Vec::new();
            for effect in queue {
                match effect {
                    Effect::FetchBackfill(req) => {
                        let result = self.backend.fetch_pty_history(req.line_id);
                        next.extend(self.view.handle_backfill_response(
                            req.line_id,
                            req.generation,
                            result,
                        ));
                    }
                    Effect::SetScrollTop(scroll_top) => {
                        self.scroll_writes.push(scroll_top);
                        next.extend(self.view.handle_scroll(scroll_top, self.clock));
                    }
                    Effect::HeightChanged {
                        line_id,
                        old_px,
                        new_px,
                    } => {
                        self.height_changes.push((line_id, old_px, new_px));
                    }
                    Effect::VisibilityChanged { line_id, visible } => {
                        self.visibility_changes.push((line_id, visible));
                    }
                }
            }
            queue = next;
        }
    }
}

impl Default for TestView {
    fn default() -> Self {
        Self::new()
    }
}
