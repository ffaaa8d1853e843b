//! Property tests for the stream-ordering and used-rows invariants.

use proptest::prelude::*;

use termbuf::{PtyOrderError, PtyStreamBuffer, VirtualTerminalBuffer};

fn chunk() -> impl Strategy<Value = Vec<u8>> {
    // Printable ASCII plus CR/LF, the bytes that move the cursor around
    prop::collection::vec(
        prop_oneof![32u8..127, Just(b'\r'), Just(b'\n')],
        0..64,
    )
}

proptest! {
    /// Chunks applied at exactly the expected offset always succeed and
    /// advance the position by their length.
    #[test]
    fn in_order_chunks_always_apply(chunks in prop::collection::vec(chunk(), 0..20)) {
        let mut buf = VirtualTerminalBuffer::new(50, 80, true).unwrap();
        let mut stream = PtyStreamBuffer::new();

        let mut pos = 0u64;
        for bytes in &chunks {
            prop_assert!(stream.apply_chunk(pos, bytes, &mut buf).is_ok());
            pos += bytes.len() as u64;
            prop_assert_eq!(stream.position(), pos);
        }
    }

    /// A mismatched offset is rejected without touching the stream
    /// position or the terminal content.
    #[test]
    fn offset_mismatch_never_mutates(
        prefix in chunk(),
        stray in chunk(),
        gap in 1u64..10_000,
    ) {
        let mut buf = VirtualTerminalBuffer::new(50, 80, true).unwrap();
        let mut stream = PtyStreamBuffer::new();
        stream.apply_chunk(0, &prefix, &mut buf).unwrap();

        let content_before = buf.content_lines();
        let rows_before = buf.used_rows();
        let expected = prefix.len() as u64;

        let err = stream.apply_chunk(expected + gap, &stray, &mut buf).unwrap_err();
        prop_assert_eq!(err, PtyOrderError::OffsetMismatch { expected, got: expected + gap });
        prop_assert_eq!(stream.position(), expected);
        prop_assert_eq!(buf.content_lines(), content_before);
        prop_assert_eq!(buf.used_rows(), rows_before);
    }

    /// Used rows only ever grow for a flexrows terminal, between the
    /// floor of 2 and the configured maximum.
    #[test]
    fn flex_used_rows_grow_monotonically(chunks in prop::collection::vec(chunk(), 1..20)) {
        let mut buf = VirtualTerminalBuffer::new(50, 80, true).unwrap();

        let mut prev = buf.used_rows();
        prop_assert_eq!(prev, 2);
        for bytes in &chunks {
            buf.write(bytes);
            let used = buf.used_rows();
            prop_assert!(used >= prev, "used rows shrank: {} -> {}", prev, used);
            prop_assert!((2..=50).contains(&used), "used rows out of range: {}", used);
            prev = used;
        }
    }
}
