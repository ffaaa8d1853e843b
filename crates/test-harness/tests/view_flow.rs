//! End-to-end lazy loading: lines materialize when scrolled into view
//! and dissolve when scrolled away, without losing their height.

use lineview::{CmdStatus, LineId};
use test_harness::assertions::assert_line_text;
use test_harness::fixtures::{flex_state, line, TEST_HEIGHT, TEST_WIDTH};
use test_harness::TestView;

fn screen_with_200_lines() -> TestView {
    let mut tv = TestView::new();
    for i in 1..=200 {
        tv.attach(line(i, i as i64), flex_state(), false);
    }
    tv
}

#[test]
fn far_line_loads_only_after_scrolling_to_it() {
    let mut tv = screen_with_200_lines();
    tv.seed_history(LineId(200), b"$ make\r\nok");
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);

    // Lines near the top load after the debounce; the far line does not
    tv.advance(300);
    assert!(tv.view.manager().is_loaded(LineId(1)));
    assert!(!tv.view.manager().is_loaded(LineId(200)));
    assert_eq!(tv.backend.fetches(LineId(200)), 0);

    // Scrolling to the bottom arms the flip but commits nothing yet
    let max = tv.view.container().max_scroll();
    tv.scroll_to(max);
    assert!(!tv.view.manager().is_loaded(LineId(200)));

    tv.advance(300);
    assert_line_text(&tv, LineId(200), &["$ make", "ok"]);
    assert_eq!(tv.backend.fetches(LineId(200)), 1);
}

#[test]
fn scrolling_away_unloads_but_keeps_height() {
    let mut tv = screen_with_200_lines();
    tv.seed_history(LineId(200), b"one\r\ntwo\r\nthree");
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);
    tv.advance(300);

    tv.scroll_to(tv.view.container().max_scroll());
    tv.advance(300);
    assert!(tv.view.manager().is_loaded(LineId(200)));
    let loaded_rows = tv
        .view
        .manager()
        .used_rows(LineId(200), Some(CmdStatus::Running));
    assert_eq!(loaded_rows, 3);

    tv.scroll_to(0.0);
    tv.advance(300);
    assert!(!tv.view.manager().is_loaded(LineId(200)));

    // Layout still reserves the line's last rendered height
    assert_eq!(
        tv.view
            .manager()
            .used_rows(LineId(200), Some(CmdStatus::Running)),
        loaded_rows
    );
}

#[test]
fn pushed_output_renders_on_loaded_line() {
    let mut tv = TestView::new();
    tv.seed_history(LineId(1), b"$ tail -f log\r\n");
    tv.attach(line(1, 1), flex_state(), true);
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);

    tv.push_output(LineId(1), b"first event\r\n");
    tv.push_output(LineId(1), b"second event");

    assert_line_text(
        &tv,
        LineId(1),
        &["$ tail -f log", "first event", "second event"],
    );
}

#[test]
fn pushed_output_for_unloaded_line_is_dropped_until_reload() {
    let mut tv = TestView::new();
    tv.attach(line(1, 1), flex_state(), false);
    tv.seed_history(LineId(1), b"early");
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);

    // No buffer yet: the push only lands in the backend's history
    tv.push_output(LineId(1), b" and late");
    assert!(tv.line_text(LineId(1)).is_none());

    // Once the line loads, backfill returns the complete stream
    tv.advance(300);
    assert_line_text(&tv, LineId(1), &["early and late"]);
}
