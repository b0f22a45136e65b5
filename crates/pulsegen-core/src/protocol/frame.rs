//! Incremental extraction of `<...>` frames from a streaming receive buffer.
//!
//! Serial data arrives in arbitrary chunks: a single read may carry half a
//! message, several messages, or line noise between messages.  The receive
//! buffer therefore grows as bytes arrive, and [`extract_frame`] is called
//! repeatedly (for example on a polling cadence) to pull complete messages
//! out of the front of it.

use tracing::trace;

/// Extracts the first complete `<...>` frame from `buf`, if one exists.
///
/// Scans for the leftmost `<` and the leftmost `>` after it.  When both are
/// present, returns the text strictly between them and removes everything
/// from the start of the buffer through the consumed `>` inclusive; any
/// junk preceding the `<` is discarded along with the frame.  First-found
/// wins: with interleaved delimiters like `<a<b>`, the payload is `a<b`.
///
/// When no complete frame exists yet (no `<`, or a `<` with no `>` after
/// it), returns `None` and leaves the buffer untouched so a partial message
/// survives until more bytes arrive.  Calling this again with no new data is
/// a no-op.
///
/// Frames are yielded in the order their closing `>` appears: two buffered
/// frames `<a><b>` come back as `a` then `b` over two calls.
pub fn extract_frame(buf: &mut String) -> Option<String> {
    let start = buf.find('<')?;
    let end_rel = buf[start + 1..].find('>')?;
    let end = start + 1 + end_rel;

    let payload = buf[start + 1..end].to_string();
    if start > 0 {
        trace!(discarded = start, "dropping bytes before frame start");
    }
    buf.drain(..=end);
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_frame_is_extracted_and_buffer_emptied() {
        let mut buf = String::from("<VERSION:1.1.0>");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("VERSION:1.1.0"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let mut buf = String::new();
        assert_eq!(extract_frame(&mut buf), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_is_left_untouched() {
        let mut buf = String::from("<VERSIO");
        assert_eq!(extract_frame(&mut buf), None);
        assert_eq!(buf, "<VERSIO");

        // Repeated calls with no new data stay a no-op.
        assert_eq!(extract_frame(&mut buf), None);
        assert_eq!(buf, "<VERSIO");
    }

    #[test]
    fn test_partial_frame_completes_when_more_bytes_arrive() {
        let mut buf = String::from("<VERSIO");
        assert_eq!(extract_frame(&mut buf), None);
        buf.push_str("N:1.1.0>\n");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("VERSION:1.1.0"));
        assert_eq!(buf, "\n");
    }

    #[test]
    fn test_two_frames_come_back_in_order() {
        let mut buf = String::from("<a><b>");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("a"));
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("b"));
        assert_eq!(extract_frame(&mut buf), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_junk_before_frame_is_discarded_with_it() {
        let mut buf = String::from("noise\r\n<OK>tail");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("OK"));
        assert_eq!(buf, "tail");
    }

    #[test]
    fn test_close_delimiter_before_any_open_is_not_a_frame() {
        let mut buf = String::from(">stray<rest");
        assert_eq!(extract_frame(&mut buf), None);
        assert_eq!(buf, ">stray<rest");
    }

    #[test]
    fn test_close_only_counts_after_the_open() {
        // The '>' before the '<' must not pair with it.
        let mut buf = String::from("a>b<payload>");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("payload"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_interleaved_open_delimiters_first_found_wins() {
        let mut buf = String::from("<a<b>");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("a<b"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_frame_yields_empty_payload() {
        let mut buf = String::from("<>");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some(""));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_trailing_partial_frame_survives_extraction() {
        let mut buf = String::from("<first><seco");
        assert_eq!(extract_frame(&mut buf).as_deref(), Some("first"));
        assert_eq!(buf, "<seco");
        assert_eq!(extract_frame(&mut buf), None);
        assert_eq!(buf, "<seco");
    }
}
