//! Instance lifecycle under hostile timing: scroll flicker, stream
//! desync and backend failures.

use lineview::{BackendFetchError, LineId};
use test_harness::assertions::assert_line_text;
use test_harness::fixtures::{flex_state, line, TEST_HEIGHT, TEST_WIDTH};
use test_harness::TestView;

#[test]
fn scroll_flicker_within_debounce_causes_no_churn() {
    let mut tv = TestView::new();
    for i in 1..=200 {
        tv.attach(line(i, i as i64), flex_state(), false);
    }
    tv.seed_history(LineId(200), b"expensive to load");
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);
    tv.advance(300);
    assert!(tv.view.manager().is_loaded(LineId(1)));

    // Overshoot to the bottom and flick back within the debounce window
    let max = tv.view.container().max_scroll();
    tv.scroll_to(max);
    tv.advance(100);
    tv.scroll_to(0.0);
    tv.advance(400);

    // Neither flip committed for the endpoints: no fetch for the far
    // line, no unload of the near one
    assert_eq!(tv.backend.fetches(LineId(200)), 0);
    assert!(tv.view.manager().is_loaded(LineId(1)));
    assert_eq!(tv.backend.fetches(LineId(1)), 1);
}

#[test]
fn offset_desync_recovers_via_full_reload() {
    let mut tv = TestView::new();
    tv.seed_history(LineId(1), b"abc");
    tv.attach(line(1, 1), flex_state(), true);
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);
    assert_eq!(tv.backend.fetches(LineId(1)), 1);

    // A chunk arrives with a gap in the stream; meanwhile the backend
    // has the authoritative bytes
    tv.seed_history(LineId(1), b"abcdefgap");
    tv.push_raw(LineId(1), 99, b"gap");

    // The harness answered the forced reload synchronously
    assert_eq!(tv.backend.fetches(LineId(1)), 2);
    assert!(tv.view.manager().is_loaded(LineId(1)));
    assert_line_text(&tv, LineId(1), &["abcdefgap"]);

    // The stream cursor is back in sync with the backend
    tv.push_output(LineId(1), b"!");
    assert_line_text(&tv, LineId(1), &["abcdefgap!"]);
}

#[test]
fn backend_failures_retry_then_park_the_line() {
    let mut tv = TestView::new();
    tv.backend
        .set_failure(LineId(1), BackendFetchError::Http { status: 502 });
    tv.seed_history(LineId(2), b"fine");
    tv.attach(line(1, 1), flex_state(), true);
    tv.attach(line(2, 2), flex_state(), true);
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);

    // Default config: three attempts, then the line is parked
    assert_eq!(tv.backend.fetches(LineId(1)), 3);
    assert!(tv.view.manager().has_failed(LineId(1)));

    // The sibling loaded normally; the failure did not spread
    assert_line_text(&tv, LineId(2), &["fine"]);

    // The parked line still occupies layout space
    assert!(tv.view.manager().used_rows(LineId(1), None) >= 1);
}

#[test]
fn detach_reattach_reuses_single_fetch_per_load() {
    let mut tv = TestView::new();
    tv.seed_history(LineId(1), b"hello");
    tv.attach(line(1, 1), flex_state(), true);
    tv.mount(0.0, TEST_WIDTH, TEST_HEIGHT);
    assert_eq!(tv.backend.fetches(LineId(1)), 1);

    tv.view.detach_line(LineId(1));
    assert!(!tv.view.manager().is_loaded(LineId(1)));

    // Reattach: exactly one more fetch, identical content
    tv.attach(line(1, 1), flex_state(), true);
    assert_eq!(tv.backend.fetches(LineId(1)), 2);
    assert_line_text(&tv, LineId(1), &["hello"]);
    assert_eq!(tv.view.lines().len(), 1);
}
