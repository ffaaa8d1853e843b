//! Common test assertions

use lineview::LineId;

use crate::headless::TestView;

/// Assert a line is loaded and its terminal shows exactly `expected`.
pub fn assert_line_text(tv: &TestView, line_id: LineId, expected: &[&str]) {
    let actual = tv
        .line_text(line_id)
        .unwrap_or_else(|| panic!("line {line_id} has no loaded terminal"));
    assert_eq!(
        actual, expected,
        "terminal content mismatch for line {line_id}"
    );
}

/// Assert a scroll position within float tolerance.
pub fn assert_scroll_near(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.5,
        "scroll position {actual} not near {expected}"
    );
}

/// Assert exactly which lines currently hold live buffers.
pub fn assert_loaded_lines(tv: &TestView, expected: &[LineId]) {
    for line_id in expected {
        assert!(
            tv.view.manager().is_loaded(*line_id),
            "line {line_id} should be loaded"
        );
    }
    assert_eq!(
        tv.view.manager().loaded_count(),
        expected.len(),
        "unexpected extra loaded lines"
    );
}
