//! Viewport and line geometry
//!
//! Explicit geometry structs standing in for DOM measurement. The host
//! layout layer produces these; the tracker and anchor controller only
//! ever do arithmetic on them.

use crate::model::LineId;

/// Geometry of the scrollable container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerGeom {
    /// Current scroll position (distance of the viewport top from the
    /// content top)
    pub scroll_top: f64,

    /// Viewport height
    pub height: f64,

    /// Viewport width
    pub width: f64,

    /// Total content height (sum of line heights plus any padding)
    pub content_height: f64,
}

impl ContainerGeom {
    /// Content-space position of the viewport's bottom edge.
    pub fn visible_bottom(&self) -> f64 {
        self.scroll_top + self.height
    }

    /// Largest valid scroll position.
    pub fn max_scroll(&self) -> f64 {
        (self.content_height - self.height).max(0.0)
    }

    /// Clamp a scroll position into the valid range.
    pub fn clamp_scroll(&self, scroll_top: f64) -> f64 {
        scroll_top.clamp(0.0, self.max_scroll())
    }
}

/// Geometry of one line element within the container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineGeom {
    pub line_id: LineId,
    pub line_num: i64,

    /// Content-space position of the line's top edge
    pub top: f64,

    pub height: f64,
}

impl LineGeom {
    /// Content-space position of the line's bottom edge.
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}
