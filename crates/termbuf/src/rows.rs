//! Used-rows accounting
//!
//! Explicit state for how many grid rows a terminal actually occupies.
//! Keeping the growth rules in one place prevents the shrink-while-running
//! bugs that come from recomputing heights ad hoc at every call site.

/// Minimum used rows for a flexrows terminal.
///
/// A flex terminal never reports fewer rows than this, so a line that has
/// produced a single byte of output still reserves a stable minimum height.
pub const MIN_FLEX_ROWS: u32 = 2;

/// Tracks the used-row count for one terminal buffer.
///
/// Fixed terminals are pinned at their allocated row count. Flex terminals
/// grow monotonically with content up to the allocated cap; once the cap is
/// reached growth stops and `at_max` latches. Only `rederive` (resize or
/// clear) may lower the count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTracker {
    /// Fixed-size terminal: used rows equals the allocated row count
    Fixed {
        /// Allocated rows
        rows: u32,
    },

    /// Auto-growing terminal: used rows tracks content up to a cap
    Flex {
        /// Current used rows
        used: u32,
        /// Growth cap (the allocated grid rows)
        max: u32,
        /// Latched once `used` reaches `max`
        at_max: bool,
    },
}

impl RowTracker {
    /// Create a tracker for a terminal allocated with `rows` grid rows.
    pub fn new(rows: u16, flexrows: bool) -> Self {
        let rows = rows as u32;
        if flexrows {
            let used = MIN_FLEX_ROWS.min(rows);
            Self::Flex {
                used,
                max: rows,
                at_max: used >= rows,
            }
        } else {
            Self::Fixed { rows }
        }
    }

    /// Current used-row count.
    pub fn used(&self) -> u32 {
        match self {
            Self::Fixed { rows } => *rows,
            Self::Flex { used, .. } => *used,
        }
    }

    /// Whether a flex terminal has saturated its growth cap.
    pub fn at_max(&self) -> bool {
        match self {
            Self::Fixed { .. } => false,
            Self::Flex { at_max, .. } => *at_max,
        }
    }

    /// Record that content reaches grid row `last_row` (0-indexed).
    ///
    /// Returns the used-row count after the observation. Growth is
    /// monotonic: observing a smaller row never shrinks the count.
    pub fn observe_content_row(&mut self, last_row: u32) -> u32 {
        match self {
            Self::Fixed { rows } => *rows,
            Self::Flex { used, max, at_max } => {
                if *at_max {
                    return *used;
                }
                let needed = (last_row + 1).max(MIN_FLEX_ROWS).min(*max);
                if needed > *used {
                    *used = needed;
                }
                if *used >= *max {
                    *at_max = true;
                }
                *used
            }
        }
    }

    /// Re-derive the count after a resize or clear.
    ///
    /// `last_row` is the last grid row containing content (None if the grid
    /// is empty), `rows` the new allocated row count. This is the only path
    /// that may lower a flex terminal's used rows.
    pub fn rederive(&mut self, last_row: Option<u32>, rows: u16) {
        let rows = rows as u32;
        match self {
            Self::Fixed { rows: fixed } => {
                *fixed = rows;
            }
            Self::Flex { used, max, at_max } => {
                let content = last_row.map(|r| r + 1).unwrap_or(0);
                *max = rows;
                *used = content.max(MIN_FLEX_ROWS).min(rows);
                *at_max = *used >= rows;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flex_starts_at_minimum() {
        let tracker = RowTracker::new(50, true);
        assert_eq!(tracker.used(), MIN_FLEX_ROWS);
        assert!(!tracker.at_max());
    }

    #[test]
    fn fixed_is_pinned_at_allocated_rows() {
        let mut tracker = RowTracker::new(24, false);
        assert_eq!(tracker.used(), 24);

        tracker.observe_content_row(0);
        assert_eq!(tracker.used(), 24);

        tracker.observe_content_row(100);
        assert_eq!(tracker.used(), 24);
        assert!(!tracker.at_max());
    }

    #[test]
    fn flex_grows_with_content() {
        let mut tracker = RowTracker::new(50, true);

        // Content reaching row 3 (0-indexed) uses 4 rows
        assert_eq!(tracker.observe_content_row(3), 4);

        // Content reaching row 10 uses 11 rows
        assert_eq!(tracker.observe_content_row(10), 11);
    }

    #[test]
    fn flex_never_shrinks_on_observation() {
        let mut tracker = RowTracker::new(50, true);
        tracker.observe_content_row(10);

        // A later, smaller observation does not reduce the count
        assert_eq!(tracker.observe_content_row(2), 11);
        assert_eq!(tracker.used(), 11);
    }

    #[test]
    fn flex_saturates_at_cap() {
        let mut tracker = RowTracker::new(50, true);

        assert_eq!(tracker.observe_content_row(49), 50);
        assert!(tracker.at_max());

        // Further observations are no-ops once saturated
        assert_eq!(tracker.observe_content_row(5), 50);
        assert_eq!(tracker.used(), 50);
    }

    #[test]
    fn flex_monotonic_across_any_observations() {
        let mut tracker = RowTracker::new(30, true);
        let mut last = tracker.used();

        for row in [0u32, 5, 3, 12, 1, 29, 2, 40] {
            let used = tracker.observe_content_row(row);
            assert!(used >= last, "used rows shrank: {} -> {}", last, used);
            assert!(used <= 30);
            last = used;
        }
    }

    #[test]
    fn rederive_can_shrink_after_resize() {
        let mut tracker = RowTracker::new(50, true);
        tracker.observe_content_row(40);
        assert_eq!(tracker.used(), 41);

        // Resize re-derives from actual content
        tracker.rederive(Some(9), 50);
        assert_eq!(tracker.used(), 10);
        assert!(!tracker.at_max());

        // Clearing an empty grid falls back to the floor
        tracker.rederive(None, 50);
        assert_eq!(tracker.used(), MIN_FLEX_ROWS);
    }

    #[test]
    fn tiny_cap_clamps_the_floor() {
        let tracker = RowTracker::new(1, true);
        assert_eq!(tracker.used(), 1);
        assert!(tracker.at_max());
    }
}
