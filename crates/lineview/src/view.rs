//! Root view engine
//!
//! Owns the line registry, instance manager, visibility tracker and
//! anchor controller for one screen, wired together behind an
//! event-style API. Every entry point is a synchronous method that runs
//! to completion and returns [`Effect`]s for the host to execute; the
//! engine never performs IO itself.

use std::time::{Duration, Instant};

use crate::anchor::{AnchorReason, ScrollAnchorController};
use crate::backend::{CmdStatusMsg, PtyDataMsg, WireError};
use crate::config::ViewConfig;
use crate::geometry::{ContainerGeom, LineGeom};
use crate::instance::{
    BackfillRequest, CompletionOutcome, PtyApplyOutcome, TerminalInstanceManager,
};
use crate::model::{CmdState, CommandLine, LineId, ScreenLines};
use crate::visibility::ViewportVisibilityTracker;

/// Side effect for the host to execute
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Fetch the line's full PTY history and feed the result back
    /// through [`LineView::handle_backfill_response`]
    FetchBackfill(BackfillRequest),

    /// Write the container's scroll position
    SetScrollTop(f64),

    /// A line's rendered height changed
    HeightChanged {
        line_id: LineId,
        old_px: f64,
        new_px: f64,
    },

    /// A line's debounced visibility flipped
    VisibilityChanged { line_id: LineId, visible: bool },
}

/// View engine for one screen of command lines.
pub struct LineView {
    config: ViewConfig,
    lines: ScreenLines,
    manager: TerminalInstanceManager,
    tracker: ViewportVisibilityTracker,
    anchor: ScrollAnchorController,
    container: ContainerGeom,
}

impl LineView {
    pub fn new(config: ViewConfig) -> Self {
        let tracker = ViewportVisibilityTracker::new(
            Duration::from_millis(config.debounce_ms),
            config.load_padding_px,
            Duration::from_millis(config.visibility_recompute_ms),
        );
        let anchor = ScrollAnchorController::new(
            config.follow_offset_px,
            Duration::from_millis(config.width_resize_throttle_ms),
        );
        let manager = TerminalInstanceManager::new(config.max_backfill_attempts);

        Self {
            config,
            lines: ScreenLines::new(),
            manager,
            tracker,
            anchor,
            container: ContainerGeom {
                scroll_top: 0.0,
                height: 0.0,
                width: 0.0,
                content_height: 0.0,
            },
        }
    }

    pub fn lines(&self) -> &ScreenLines {
        &self.lines
    }

    pub fn manager(&self) -> &TerminalInstanceManager {
        &self.manager
    }

    pub fn container(&self) -> ContainerGeom {
        self.container
    }

    /// Earliest timer deadline, for host wakeup scheduling.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tracker.next_deadline()
    }

    /// Set the viewport geometry at mount and compute the initial anchor.
    pub fn mount(&mut self, scroll_top: f64, width: f64, height: f64, now: Instant) -> Vec<Effect> {
        self.container.width = width;
        self.container.height = height;

        let mut effects = self.reflow_to_width(width);
        self.refresh_content_height();
        self.container.scroll_top = self.container.clamp_scroll(scroll_top);

        let geoms = self.line_geoms();
        self.anchor
            .compute_anchor(&self.container, &geoms, AnchorReason::Mount);
        self.tracker.recompute_now(&self.container, &geoms, now);
        effects.extend(self.commit_flips(now));
        effects
    }

    /// Register a line with the view.
    ///
    /// Lines hinted visible load eagerly so mount never flashes empty
    /// terminals. A load failure is confined to this line.
    pub fn attach_line(
        &mut self,
        line: CommandLine,
        state: CmdState,
        initially_visible: bool,
        now: Instant,
    ) -> Vec<Effect> {
        let line_id = line.line_id;
        self.lines.add_line(line, state);
        self.tracker.observe(line_id, initially_visible);
        self.refresh_content_height();

        let mut effects = Vec::new();
        if initially_visible {
            effects.extend(self.start_load(line_id));
        }
        let geoms = self.line_geoms();
        self.anchor
            .compute_anchor(&self.container, &geoms, AnchorReason::LineCountChange);
        self.tracker.recompute_now(&self.container, &geoms, now);
        effects.extend(self.commit_flips(now));
        effects
    }

    /// Unmount a line's rendering without forgetting it.
    pub fn detach_line(&mut self, line_id: LineId) {
        self.tracker.unobserve(line_id);
        self.manager.unload(line_id);
    }

    /// Remove a line from the screen entirely.
    pub fn remove_line(&mut self, line_id: LineId, now: Instant) -> Vec<Effect> {
        self.tracker.unobserve(line_id);
        self.manager.forget(line_id);
        self.lines.remove_line(line_id);
        self.refresh_content_height();

        let geoms = self.line_geoms();
        self.anchor
            .compute_anchor(&self.container, &geoms, AnchorReason::LineCountChange);
        let mut effects = Vec::new();
        effects.extend(self.restore_scroll());
        self.tracker.recompute_now(&self.container, &geoms, now);
        effects.extend(self.commit_flips(now));
        effects
    }

    /// Route a pushed PTY data message.
    pub fn handle_pty_push(&mut self, msg: &PtyDataMsg) -> Result<Vec<Effect>, WireError> {
        let bytes = msg.decode_data()?;
        let mut effects = Vec::new();

        match self.manager.apply_pty_data(msg.line_id, msg.pos, &bytes) {
            PtyApplyOutcome::Applied(Some(change)) => {
                effects.push(self.height_effect(change.line_id, change.old_rows, change.new_rows));
                self.refresh_content_height();
                effects.extend(self.restore_scroll());
            }
            PtyApplyOutcome::Applied(None) | PtyApplyOutcome::NotLoaded => {}
            PtyApplyOutcome::Desync { reload, .. } => {
                effects.push(Effect::FetchBackfill(reload));
            }
        }
        Ok(effects)
    }

    /// Route a pushed status update.
    pub fn handle_status_push(&mut self, msg: &CmdStatusMsg) {
        if let Some(state) = self.lines.state_mut(msg.line_id) {
            if let Some(opts) = msg.term_opts {
                state.term_opts = opts;
            }
            if msg.restart_ts.is_some() {
                state.restart_ts = msg.restart_ts;
            }
        }
        self.lines.apply_status(msg.line_id, msg.status, msg.exit_code);
    }

    /// Complete a backfill fetch issued by a [`Effect::FetchBackfill`].
    ///
    /// On failure a retry request is issued while attempts remain; the
    /// host applies `backfill_backoff_ms` before executing it.
    pub fn handle_backfill_response(
        &mut self,
        line_id: LineId,
        generation: u64,
        result: Result<Vec<u8>, crate::backend::BackendFetchError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.manager.complete_backfill(line_id, generation, result) {
            CompletionOutcome::Loaded(change) => {
                if change.new_rows != change.old_rows {
                    effects.push(self.height_effect(line_id, change.old_rows, change.new_rows));
                }
                self.refresh_content_height();
                effects.extend(self.restore_scroll());
            }
            CompletionOutcome::StaleDiscarded => {}
            CompletionOutcome::FetchFailed { will_retry, .. } => {
                if will_retry {
                    effects.extend(self.start_load(line_id));
                }
            }
        }
        effects
    }

    /// Handle a container scroll event.
    ///
    /// Synthetic events from our own scroll writes only update the
    /// recorded position; real user scrolls also re-anchor and feed the
    /// visibility recompute.
    pub fn handle_scroll(&mut self, scroll_top: f64, now: Instant) -> Vec<Effect> {
        self.container.scroll_top = self.container.clamp_scroll(scroll_top);
        if !self.anchor.on_scroll_event() {
            return Vec::new();
        }

        let geoms = self.line_geoms();
        self.anchor
            .compute_anchor(&self.container, &geoms, AnchorReason::UserScroll);
        self.tracker.recompute(&self.container, &geoms, now);
        self.commit_flips(now)
    }

    /// Handle a container resize.
    ///
    /// A width change re-wraps the text of every loaded terminal before
    /// the anchor is restored, so the restore already sees the reflowed
    /// heights.
    pub fn handle_resize(&mut self, width: f64, height: f64, now: Instant) -> Vec<Effect> {
        let old = self.container;
        self.container.width = width;
        self.container.height = height;

        let mut effects = Vec::new();
        if width != old.width {
            effects.extend(self.reflow_to_width(width));
            self.refresh_content_height();
        }

        let geoms = self.line_geoms();
        if let Some(scroll_top) = self
            .anchor
            .adjust_for_resize(&old, &self.container, &geoms, now)
        {
            if scroll_top != self.container.scroll_top {
                self.anchor.will_write_scroll();
                self.container.scroll_top = scroll_top;
                effects.push(Effect::SetScrollTop(scroll_top));
            }
        }
        self.tracker.recompute_now(&self.container, &geoms, now);
        effects.extend(self.commit_flips(now));
        effects
    }

    /// Timer tick: commit debounced visibility flips.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        self.commit_flips(now)
    }

    /// Pin the anchor to a specific line (user navigated to it) and
    /// scroll the minimum distance that brings it fully into view.
    pub fn select_line(&mut self, line_id: LineId) -> Vec<Effect> {
        let geoms = self.line_geoms();
        self.anchor.select_line(line_id, &self.container, &geoms);
        self.restore_scroll().into_iter().collect()
    }

    /// Synthesized layout of all lines, stacked in line-number order.
    pub fn line_geoms(&self) -> Vec<LineGeom> {
        let cell = self.config.cell_height_px as f64;
        let mut top = 0.0;
        self.lines
            .iter()
            .map(|line| {
                let status = self.lines.state(line.line_id).map(|s| s.status);
                let rows = self.manager.used_rows(line.line_id, status);
                let geom = LineGeom {
                    line_id: line.line_id,
                    line_num: line.line_num,
                    top,
                    height: rows as f64 * cell,
                };
                top += geom.height;
                geom
            })
            .collect()
    }

    fn refresh_content_height(&mut self) {
        self.container.content_height = self
            .line_geoms()
            .last()
            .map(|geom| geom.bottom())
            .unwrap_or(0.0);
    }

    fn height_effect(&self, line_id: LineId, old_rows: u32, new_rows: u32) -> Effect {
        let cell = self.config.cell_height_px as f64;
        Effect::HeightChanged {
            line_id,
            old_px: old_rows as f64 * cell,
            new_px: new_rows as f64 * cell,
        }
    }

    fn restore_scroll(&mut self) -> Option<Effect> {
        let geoms = self.line_geoms();
        let scroll_top = self.anchor.restore_anchor(&self.container, &geoms)?;
        if scroll_top == self.container.scroll_top {
            return None;
        }
        self.anchor.will_write_scroll();
        self.container.scroll_top = scroll_top;
        Some(Effect::SetScrollTop(scroll_top))
    }

    /// Column count the container width affords.
    fn cols_for_width(&self, width: f64) -> u16 {
        ((width / self.config.cell_width_px as f64).floor() as u16).max(2)
    }

    /// Re-wrap all loaded terminals to the container width.
    fn reflow_to_width(&mut self, width: f64) -> Vec<Effect> {
        if width <= 0.0 {
            return Vec::new();
        }
        let cols = self.cols_for_width(width);
        self.manager
            .resize_cols(cols)
            .into_iter()
            .map(|change| self.height_effect(change.line_id, change.old_rows, change.new_rows))
            .collect()
    }

    fn start_load(&mut self, line_id: LineId) -> Option<Effect> {
        let mut opts = self
            .lines
            .state(line_id)
            .map(|state| state.term_opts)
            .unwrap_or_default();
        // Wrap at the width the line will actually render at
        if self.container.width > 0.0 {
            opts.cols = self.cols_for_width(self.container.width);
        }
        match self.manager.load(line_id, opts) {
            Ok(Some(request)) => Some(Effect::FetchBackfill(request)),
            Ok(None) => None,
            Err(err) => {
                // Bad persisted dimensions poison only this line
                tracing::error!(line_id = line_id.0, error = %err, "cannot build terminal");
                None
            }
        }
    }

    /// Apply committed visibility flips: visible lines load, invisible
    /// lines unload, and the host is told either way.
    fn commit_flips(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        for (line_id, visible) in self.tracker.poll(now) {
            effects.push(Effect::VisibilityChanged { line_id, visible });
            if visible {
                effects.extend(self.start_load(line_id));
            } else {
                self.manager.unload(line_id);
            }
        }
        effects
    }
}
