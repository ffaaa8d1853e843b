//! Viewport visibility tracking with flap suppression
//!
//! Decides which lines count as visible (and therefore loaded). Raw
//! intersection events are noisy during fast scrolls, so each flip is
//! held for a debounce interval before it commits; a line that leaves
//! and re-enters the viewport within the interval produces no event at
//! all. Deadlines are plain `Instant`s the host polls against, no
//! background timers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::geometry::{ContainerGeom, LineGeom};
use crate::model::LineId;

struct Entry {
    /// Committed visibility, as last reported to the host
    visible: bool,

    /// Flip held back by the debounce: target state and commit deadline
    pending: Option<(bool, Instant)>,
}

/// Debounced visibility state for the lines of one screen.
pub struct ViewportVisibilityTracker {
    entries: HashMap<LineId, Entry>,
    debounce: Duration,

    /// Padding radius around the viewport that still counts as visible
    padding: f64,

    /// Throttle for geometry-based recomputes
    recompute_interval: Duration,
    last_recompute: Option<Instant>,
}

impl ViewportVisibilityTracker {
    pub fn new(debounce: Duration, padding: f64, recompute_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            debounce,
            padding,
            recompute_interval,
            last_recompute: None,
        }
    }

    /// Register a line with an initial visibility hint.
    ///
    /// The hint commits immediately, so lines known to be on screen at
    /// mount never flash through an unloaded state. Re-observing keeps
    /// the existing state.
    pub fn observe(&mut self, line_id: LineId, initially_visible: bool) {
        self.entries.entry(line_id).or_insert(Entry {
            visible: initially_visible,
            pending: None,
        });
    }

    /// Remove a line, dropping any pending flip.
    pub fn unobserve(&mut self, line_id: LineId) {
        self.entries.remove(&line_id);
    }

    /// Committed visibility of a line.
    pub fn is_visible(&self, line_id: LineId) -> bool {
        self.entries
            .get(&line_id)
            .map(|e| e.visible)
            .unwrap_or(false)
    }

    /// Feed a raw intersection event.
    ///
    /// A disagreeing event arms a flip for `now + debounce`; an agreeing
    /// event cancels a pending flip back; a repeat of the pending target
    /// leaves the armed deadline alone (the flip fires from the FIRST
    /// disagreement, not the last).
    pub fn on_intersection(&mut self, line_id: LineId, intersecting: bool, now: Instant) {
        let Some(entry) = self.entries.get_mut(&line_id) else {
            tracing::trace!(line_id = line_id.0, "intersection event for unobserved line");
            return;
        };

        if intersecting == entry.visible {
            if entry.pending.take().is_some() {
                tracing::trace!(
                    line_id = line_id.0,
                    visible = entry.visible,
                    "visibility flap suppressed"
                );
            }
            return;
        }

        match entry.pending {
            Some((target, _)) if target == intersecting => {}
            _ => {
                entry.pending = Some((intersecting, now + self.debounce));
            }
        }
    }

    /// Commit pending flips whose deadline has passed.
    ///
    /// Returned in line-id order so the host's load/unload sequence is
    /// deterministic.
    pub fn poll(&mut self, now: Instant) -> Vec<(LineId, bool)> {
        let mut flips = Vec::new();
        for (line_id, entry) in &mut self.entries {
            if let Some((target, deadline)) = entry.pending {
                if deadline <= now {
                    entry.pending = None;
                    entry.visible = target;
                    flips.push((*line_id, target));
                }
            }
        }
        flips.sort_by_key(|(line_id, _)| *line_id);
        for (line_id, visible) in &flips {
            tracing::debug!(line_id = line_id.0, visible, "visibility flip committed");
        }
        flips
    }

    /// Earliest pending deadline, for host wakeup scheduling.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter_map(|e| e.pending.map(|(_, deadline)| deadline))
            .min()
    }

    /// Derive intersection events from explicit geometry.
    ///
    /// A line intersects if it overlaps the viewport extended by the
    /// padding radius on both sides. Throttled: returns false without
    /// looking at geometry when called again within the recompute
    /// interval (scroll-driven calls arrive far faster than padding
    /// membership actually changes).
    pub fn recompute(&mut self, container: &ContainerGeom, lines: &[LineGeom], now: Instant) -> bool {
        if let Some(last) = self.last_recompute {
            if now.duration_since(last) < self.recompute_interval {
                return false;
            }
        }
        self.last_recompute = Some(now);
        self.recompute_now(container, lines, now);
        true
    }

    /// Unthrottled recompute, for events that change geometry outright
    /// (resize, line add/remove).
    pub fn recompute_now(&mut self, container: &ContainerGeom, lines: &[LineGeom], now: Instant) {
        let band_top = container.scroll_top - self.padding;
        let band_bottom = container.visible_bottom() + self.padding;

        for line in lines {
            let intersecting = line.bottom() > band_top && line.top < band_bottom;
            self.on_intersection(line.line_id, intersecting, now);
        }
    }
}
