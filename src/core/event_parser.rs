//! Incremental decoder for the `data:` line framing of the chat stream.
//!
//! Network chunks split lines (and UTF-8 sequences) arbitrarily, so bytes are
//! buffered until a newline arrives. Each complete line is decoded lazily as
//! the returned iterator is advanced.

use memchr::memchr;
use tracing::debug;

use crate::api::StreamEvent;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Strip the `data:` marker, tolerating `data:{..}` and `data: {..}`.
pub fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX).map(str::trim)
}

/// Decode one trimmed line. Lines without the marker, the sentinel, empty
/// payloads and payloads that are not a valid event all yield `None`.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let payload = extract_data_payload(line)?;
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(error = %err, payload, "dropping malformed stream line");
            None
        }
    }
}

#[derive(Default, Debug)]
pub struct EventLineParser {
    buffer: Vec<u8>,
    /// Bytes before this index were already handed out as lines.
    consumed: usize,
}

impl EventLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> ParsedEvents<'_> {
        self.compact();
        self.buffer.extend_from_slice(chunk);
        ParsedEvents {
            parser: self,
            flush: false,
        }
    }

    /// Iterate over the remaining events at end of stream, including an
    /// unterminated final line.
    pub fn finish(&mut self) -> ParsedEvents<'_> {
        self.compact();
        ParsedEvents {
            parser: self,
            flush: true,
        }
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.consumed..]
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    fn next_line(&mut self, flush: bool) -> Option<Option<String>> {
        let rest = &self.buffer[self.consumed..];
        let (line_bytes, advance) = match memchr(b'\n', rest) {
            Some(newline_pos) => (&rest[..newline_pos], newline_pos + 1),
            None if flush && !rest.is_empty() => (rest, rest.len()),
            None => return None,
        };

        let line = match std::str::from_utf8(line_bytes) {
            Ok(text) => Some(text.trim().to_string()),
            Err(err) => {
                debug!(error = %err, "dropping stream line with invalid UTF-8");
                None
            }
        };
        self.consumed += advance;
        Some(line)
    }
}

/// Lazy sequence of events decoded from the parser's buffer.
pub struct ParsedEvents<'a> {
    parser: &'a mut EventLineParser,
    flush: bool,
}

impl Iterator for ParsedEvents<'_> {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        while let Some(line) = self.parser.next_line(self.flush) {
            if let Some(event) = line.as_deref().and_then(decode_line) {
                return Some(event);
            }
        }

        if self.flush {
            self.parser.buffer.clear();
            self.parser.consumed = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = concat!(
        "data: {\"task_id\":42,\"subtask_id\":100,\"content\":\"\",\"done\":false}\n\n",
        "data: {\"offset\":0,\"content\":\"H\u{e9}\",\"done\":false}\n\n",
        ": keep-alive\n",
        "data:{\"offset\":2,\"content\":\"llo \u{4e16}\u{754c}\",\"done\":false}\r\n\r\n",
        "data: {\"offset\":8,\"content\":\"\",\"done\":true,\"result\":{\"value\":\"H\u{e9}llo \u{4e16}\u{754c}\"}}\n\n",
        "data: [DONE]\n\n",
    );

    fn parse_whole(input: &[u8]) -> Vec<StreamEvent> {
        let mut parser = EventLineParser::new();
        let mut events: Vec<_> = parser.feed(input).collect();
        events.extend(parser.finish());
        events
    }

    fn parse_split(input: &[u8], cuts: &[usize]) -> Vec<StreamEvent> {
        let mut parser = EventLineParser::new();
        let mut events = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            events.extend(parser.feed(&input[start..cut]));
            start = cut;
        }
        events.extend(parser.feed(&input[start..]));
        events.extend(parser.finish());
        events
    }

    #[test]
    fn decodes_full_transcript_in_order() {
        let events = parse_whole(TRANSCRIPT.as_bytes());
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].task_id, Some(42));
        assert_eq!(events[0].subtask_id, Some(100));
        assert_eq!(events[1].content_str(), "H\u{e9}");
        assert_eq!(events[2].offset, Some(2));
        assert!(events[3].done);
        assert_eq!(
            events[3].result.as_ref().and_then(|r| r.get("value")),
            Some(&serde_json::json!("H\u{e9}llo \u{4e16}\u{754c}"))
        );
    }

    #[test]
    fn every_single_split_point_matches_whole_feed() {
        let input = TRANSCRIPT.as_bytes();
        let expected = parse_whole(input);
        for cut in 0..=input.len() {
            assert_eq!(parse_split(input, &[cut]), expected, "split at byte {cut}");
        }
    }

    #[test]
    fn byte_at_a_time_matches_whole_feed() {
        let input = TRANSCRIPT.as_bytes();
        let cuts: Vec<usize> = (1..input.len()).collect();
        assert_eq!(parse_split(input, &cuts), parse_whole(input));
    }

    #[test]
    fn holds_back_partial_line_until_newline() {
        let mut parser = EventLineParser::new();
        assert_eq!(parser.feed(b"data: {\"content\":\"a").count(), 0);
        assert_eq!(parser.pending(), b"data: {\"content\":\"a");

        let events: Vec<_> = parser.feed(b"b\"}\n").collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content_str(), "ab");
        assert!(parser.pending().is_empty());
    }

    #[test]
    fn malformed_lines_do_not_affect_neighbours() {
        let input = concat!(
            "data: {\"content\":\"one\"}\n",
            "data: {\"content\":\n",
            "event: message\n",
            "data: not json at all\n",
            "data: {\"content\":\"two\"}\n",
        );
        let contents: Vec<String> = parse_whole(input.as_bytes())
            .into_iter()
            .map(|event| event.content.unwrap_or_default())
            .collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn invalid_utf8_drops_only_that_line() {
        let mut input = b"data: {\"content\":\"\xff\xfe\"}\n".to_vec();
        input.extend_from_slice(b"data: {\"content\":\"ok\"}\n");
        let events = parse_whole(&input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content_str(), "ok");
    }

    #[test]
    fn finish_decodes_unterminated_final_line() {
        let mut parser = EventLineParser::new();
        assert_eq!(parser.feed(b"data: {\"content\":\"tail\",\"done\":true}").count(), 0);
        let events: Vec<_> = parser.finish().collect();
        assert_eq!(events.len(), 1);
        assert!(events[0].done);
        assert!(parser.pending().is_empty());
    }

    #[test]
    fn finish_ignores_unprefixed_remainder() {
        let mut parser = EventLineParser::new();
        assert_eq!(parser.feed(b"{\"content\":\"x\"}").count(), 0);
        assert_eq!(parser.finish().count(), 0);
    }

    #[test]
    fn empty_stream_yields_no_events() {
        let mut parser = EventLineParser::new();
        assert_eq!(parser.feed(b"").count(), 0);
        assert_eq!(parser.finish().count(), 0);
    }

    #[test]
    fn done_sentinel_is_discarded() {
        assert!(decode_line("data: [DONE]").is_none());
        assert!(decode_line("data:[DONE]").is_none());
        assert!(decode_line("data:").is_none());
    }

    #[test]
    fn partially_consumed_iterator_keeps_remaining_lines() {
        let mut parser = EventLineParser::new();
        let mut events = parser.feed(b"data: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\n");
        assert_eq!(events.next().map(|e| e.content_str().to_string()), Some("a".into()));
        drop(events);

        let rest: Vec<_> = parser.feed(b"").collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].content_str(), "b");
    }
}
