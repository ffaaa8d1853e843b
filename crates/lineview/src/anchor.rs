//! Scroll anchoring across reflows
//!
//! Keeps the user's reading position stable while line heights change
//! above and below the viewport. The anchor is one line plus the offset
//! of its bottom edge from the viewport's bottom edge; after any reflow
//! the controller recomputes the scroll top that re-establishes that
//! offset. Restoring an already-restored anchor is a no-op, so redundant
//! restore triggers are harmless.

use std::time::{Duration, Instant};

use crate::geometry::{ContainerGeom, LineGeom};
use crate::model::LineId;

/// What prompted an anchor recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorReason {
    Mount,
    HeightChange,
    LineCountChange,
    Selection,
    Resize,
    UserScroll,
}

/// The line the viewport is pinned to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    pub line_id: LineId,

    /// Distance from the anchor line's bottom edge to the viewport's
    /// bottom edge; 0 means the line bottom sits exactly at the viewport
    /// bottom (follow mode)
    pub bottom_offset: f64,

    pub reason: AnchorReason,
}

/// Computes and restores the scroll anchor for one screen.
pub struct ScrollAnchorController {
    anchor: Option<ScrollAnchor>,

    /// Offset forced below the last line in follow mode
    follow_offset: f64,

    /// Throttle for width-reflow restores
    width_throttle: Duration,
    last_width_restore: Option<Instant>,

    /// Set when we write scroll top programmatically; the resulting
    /// synthetic scroll event must not re-anchor
    ignore_next_scroll: bool,
}

impl ScrollAnchorController {
    pub fn new(follow_offset: f64, width_throttle: Duration) -> Self {
        Self {
            anchor: None,
            follow_offset,
            width_throttle,
            last_width_restore: None,
            ignore_next_scroll: false,
        }
    }

    pub fn anchor(&self) -> Option<ScrollAnchor> {
        self.anchor
    }

    /// Pin the anchor to a specific line (explicit selection).
    ///
    /// The stored offset is the line's current one clamped into the
    /// viewport, so restoring is a no-op for a line already in view and
    /// the minimum scroll for one that is not: a line below the
    /// viewport lands flush with the bottom edge, a line above it flush
    /// with the top.
    pub fn select_line(&mut self, line_id: LineId, container: &ContainerGeom, lines: &[LineGeom]) {
        let Some(line) = lines.iter().find(|l| l.line_id == line_id) else {
            tracing::debug!(line_id = line_id.0, "selection of unknown line ignored");
            return;
        };
        let current = container.visible_bottom() - line.bottom();
        let max_offset = (container.height - line.height).max(0.0);
        self.anchor = Some(ScrollAnchor {
            line_id,
            bottom_offset: current.clamp(0.0, max_offset),
            reason: AnchorReason::Selection,
        });
    }

    /// Recompute the anchor from the current viewport position.
    ///
    /// Scans from the last line upward and picks the lowest line settled
    /// in view: its bottom edge at or above the visible bottom, or its
    /// top edge at or below the scroll top (a line taller than the
    /// viewport anchors by its top). Falls back to the first line when
    /// the viewport is above all content.
    pub fn compute_anchor(
        &mut self,
        container: &ContainerGeom,
        lines: &[LineGeom],
        reason: AnchorReason,
    ) -> Option<ScrollAnchor> {
        let visible_bottom = container.visible_bottom();

        let line = lines
            .iter()
            .rev()
            .find(|l| l.bottom() <= visible_bottom || l.top <= container.scroll_top)
            .or_else(|| lines.first())?;

        let anchor = ScrollAnchor {
            line_id: line.line_id,
            bottom_offset: visible_bottom - line.bottom(),
            reason,
        };
        tracing::trace!(
            line_id = line.line_id.0,
            bottom_offset = anchor.bottom_offset,
            ?reason,
            "anchor recomputed"
        );
        self.anchor = Some(anchor);
        Some(anchor)
    }

    /// Scroll top that re-establishes the stored anchor offset, or None
    /// if there is no anchor or its line is gone.
    ///
    /// In follow mode (anchor on the last line, offset exactly 0) a
    /// small positive offset is forced so freshly appended output stays
    /// in view. The result is clamped to the valid scroll range; callers
    /// that apply it must treat the resulting scroll event as synthetic
    /// (see [`Self::will_write_scroll`]).
    pub fn restore_anchor(&mut self, container: &ContainerGeom, lines: &[LineGeom]) -> Option<f64> {
        let anchor = self.anchor?;
        let line = lines.iter().find(|l| l.line_id == anchor.line_id)?;

        let following = anchor.bottom_offset == 0.0
            && lines.last().map(|l| l.line_id) == Some(anchor.line_id);
        let offset = if following {
            self.follow_offset
        } else {
            anchor.bottom_offset
        };

        let scroll_top = container.clamp_scroll(line.bottom() + offset - container.height);
        Some(scroll_top)
    }

    /// Adjust for a container resize.
    ///
    /// A width change reflows every line, so the anchor is restored in
    /// full (throttled while a drag streams resize events). A pure
    /// height change keeps the content fixed relative to the viewport
    /// bottom by shifting scroll top by the height delta.
    pub fn adjust_for_resize(
        &mut self,
        old: &ContainerGeom,
        new: &ContainerGeom,
        lines: &[LineGeom],
        now: Instant,
    ) -> Option<f64> {
        if new.width != old.width {
            if let Some(last) = self.last_width_restore {
                if now.duration_since(last) < self.width_throttle {
                    return None;
                }
            }
            self.last_width_restore = Some(now);
            return self.restore_anchor(new, lines);
        }

        if new.height != old.height {
            let shifted = old.scroll_top + (old.height - new.height);
            return Some(new.clamp_scroll(shifted));
        }

        None
    }

    /// Mark the next scroll event as synthetic (we are about to write
    /// scroll top ourselves).
    pub fn will_write_scroll(&mut self) {
        self.ignore_next_scroll = true;
    }

    /// Filter an incoming scroll event.
    ///
    /// Returns true when the event is a real user scroll that should
    /// re-anchor; consumes the synthetic-scroll flag otherwise.
    pub fn on_scroll_event(&mut self) -> bool {
        if self.ignore_next_scroll {
            self.ignore_next_scroll = false;
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacked(heights: &[f64]) -> Vec<LineGeom> {
        let mut top = 0.0;
        heights
            .iter()
            .enumerate()
            .map(|(i, &height)| {
                let geom = LineGeom {
                    line_id: LineId(i as u64 + 1),
                    line_num: i as i64 + 1,
                    top,
                    height,
                };
                top += height;
                geom
            })
            .collect()
    }

    fn container(scroll_top: f64, height: f64, lines: &[LineGeom]) -> ContainerGeom {
        ContainerGeom {
            scroll_top,
            height,
            width: 800.0,
            content_height: lines.last().map(|l| l.bottom()).unwrap_or(0.0),
        }
    }

    fn controller() -> ScrollAnchorController {
        ScrollAnchorController::new(10.0, Duration::from_millis(100))
    }

    #[test]
    fn anchor_picks_lowest_settled_line() {
        let lines = stacked(&[100.0, 100.0, 100.0, 100.0]);
        // Viewport shows lines 2 and 3 fully, line 4 half cut off
        let geom = container(100.0, 250.0, &lines);

        let mut ctl = controller();
        let anchor = ctl
            .compute_anchor(&geom, &lines, AnchorReason::Mount)
            .expect("anchor");

        assert_eq!(anchor.line_id, LineId(3));
        assert_eq!(anchor.bottom_offset, 50.0);
    }

    #[test]
    fn line_taller_than_viewport_anchors_by_top() {
        let lines = stacked(&[100.0, 1000.0, 100.0]);
        // Mid-way through the tall line 2
        let geom = container(400.0, 300.0, &lines);

        let mut ctl = controller();
        let anchor = ctl
            .compute_anchor(&geom, &lines, AnchorReason::Mount)
            .expect("anchor");

        assert_eq!(anchor.line_id, LineId(2));
    }

    #[test]
    fn restore_compensates_growth_above() {
        let mut lines = stacked(&[100.0, 100.0, 100.0, 100.0]);
        let geom = container(100.0, 250.0, &lines);

        let mut ctl = controller();
        ctl.compute_anchor(&geom, &lines, AnchorReason::Mount);

        // Line 1 grows by 300px, pushing everything below it down
        lines = stacked(&[400.0, 100.0, 100.0, 100.0]);
        let geom = container(100.0, 250.0, &lines);
        let restored = ctl.restore_anchor(&geom, &lines).expect("scroll top");

        // Anchor line 3 bottom moved from 300 to 600; offset 50 preserved
        assert_eq!(restored, 400.0);

        // Restoring again from the restored position changes nothing
        let geom = container(restored, 250.0, &lines);
        assert_eq!(ctl.restore_anchor(&geom, &lines), Some(restored));
    }

    #[test]
    fn follow_mode_forces_offset_below_last_line() {
        let lines = stacked(&[100.0, 100.0, 100.0]);
        // Bottom of line 3 exactly at the viewport bottom
        let geom = ContainerGeom {
            scroll_top: 100.0,
            height: 200.0,
            width: 800.0,
            content_height: 320.0,
        };

        let mut ctl = controller();
        let anchor = ctl
            .compute_anchor(&geom, &lines, AnchorReason::HeightChange)
            .expect("anchor");
        assert_eq!(anchor.line_id, LineId(3));
        assert_eq!(anchor.bottom_offset, 0.0);

        let restored = ctl.restore_anchor(&geom, &lines).expect("scroll top");
        // 300 (line bottom) + 10 (follow offset) - 200 (height) = 110
        assert_eq!(restored, 110.0);
    }

    #[test]
    fn follow_offset_only_applies_to_last_line() {
        let lines = stacked(&[100.0, 100.0, 100.0]);
        // Bottom of line 2 exactly at the viewport bottom
        let geom = container(0.0, 200.0, &lines);

        let mut ctl = controller();
        let anchor = ctl
            .compute_anchor(&geom, &lines, AnchorReason::Mount)
            .expect("anchor");
        assert_eq!(anchor.line_id, LineId(2));
        assert_eq!(anchor.bottom_offset, 0.0);

        assert_eq!(ctl.restore_anchor(&geom, &lines), Some(0.0));
    }

    #[test]
    fn restore_clamps_to_scroll_range() {
        let lines = stacked(&[100.0, 100.0]);
        let geom = container(0.0, 150.0, &lines);

        let mut ctl = controller();
        ctl.compute_anchor(&geom, &lines, AnchorReason::Mount);

        // Content shrinks below the viewport height: scroll pins to 0
        let shrunk = stacked(&[50.0, 50.0]);
        let geom = container(0.0, 150.0, &shrunk);
        assert_eq!(ctl.restore_anchor(&geom, &shrunk), Some(0.0));
    }

    #[test]
    fn restore_without_anchor_or_line_is_none() {
        let lines = stacked(&[100.0]);
        let geom = container(0.0, 150.0, &lines);

        let mut ctl = controller();
        assert!(ctl.restore_anchor(&geom, &lines).is_none());

        ctl.compute_anchor(&geom, &lines, AnchorReason::Mount);
        // Anchor line removed from the screen
        assert!(ctl.restore_anchor(&geom, &[]).is_none());
    }

    #[test]
    fn height_resize_shifts_scroll_by_delta() {
        let lines = stacked(&[100.0; 10]);
        let old = container(300.0, 400.0, &lines);
        let mut new = old;
        new.height = 300.0;

        let mut ctl = controller();
        ctl.compute_anchor(&old, &lines, AnchorReason::Mount);

        let shifted = ctl
            .adjust_for_resize(&old, &new, &lines, Instant::now())
            .expect("scroll top");
        // Viewport lost 100px of height; bottom edge stays put
        assert_eq!(shifted, 400.0);
    }

    #[test]
    fn width_resize_restores_are_throttled() {
        let lines = stacked(&[100.0; 10]);
        let old = container(300.0, 400.0, &lines);
        let mut new = old;
        new.width = 600.0;

        let mut ctl = controller();
        ctl.compute_anchor(&old, &lines, AnchorReason::Mount);
        let start = Instant::now();

        assert!(ctl.adjust_for_resize(&old, &new, &lines, start).is_some());
        // Second event inside the throttle window is dropped
        assert!(ctl
            .adjust_for_resize(&old, &new, &lines, start + Duration::from_millis(50))
            .is_none());
        assert!(ctl
            .adjust_for_resize(&old, &new, &lines, start + Duration::from_millis(150))
            .is_some());
    }

    #[test]
    fn selection_scrolls_offscreen_lines_into_view() {
        let lines = stacked(&[100.0; 10]);
        let mut ctl = controller();

        // Line below the viewport lands flush with the bottom edge
        let geom = container(0.0, 400.0, &lines);
        ctl.select_line(LineId(8), &geom, &lines);
        assert_eq!(ctl.restore_anchor(&geom, &lines), Some(400.0));

        // Line above the viewport lands flush with the top edge
        let geom = container(600.0, 400.0, &lines);
        ctl.select_line(LineId(2), &geom, &lines);
        assert_eq!(ctl.restore_anchor(&geom, &lines), Some(100.0));
    }

    #[test]
    fn selecting_a_visible_line_does_not_scroll() {
        let lines = stacked(&[100.0; 10]);
        let geom = container(300.0, 400.0, &lines);

        let mut ctl = controller();
        ctl.select_line(LineId(5), &geom, &lines);
        assert_eq!(ctl.restore_anchor(&geom, &lines), Some(300.0));

        // Unknown line leaves the anchor alone
        let before = ctl.anchor();
        ctl.select_line(LineId(99), &geom, &lines);
        assert_eq!(ctl.anchor(), before);
    }

    #[test]
    fn synthetic_scroll_is_consumed_once() {
        let mut ctl = controller();
        assert!(ctl.on_scroll_event());

        ctl.will_write_scroll();
        assert!(!ctl.on_scroll_event());
        assert!(ctl.on_scroll_event());
    }
}
