/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, empty when the server sent none.
    pub event: String,
    /// Concatenated `data:` lines, joined with `\n`.
    pub data: String,
}

/// Incremental parser for a `text/event-stream` byte stream.
///
/// The transport delivers arbitrary chunk boundaries, so the parser buffers
/// input and only emits an event once its terminating blank line has
/// arrived. Field handling follows the eventsource format: `event:` and
/// `data:` are honored, one optional leading space after the colon is
/// stripped, multiple `data:` lines are joined with newlines, comment lines
/// (leading `:`) and unknown fields (`id:`, `retry:`, ...) are skipped.
/// Both `\n` and `\r\n` line endings are accepted.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: SseEvent,
    has_data: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns every event completed by it.
    ///
    /// Bytes are buffered raw and decoded one complete line at a time:
    /// transport chunks split at arbitrary byte boundaries, including the
    /// middle of a multi-byte UTF-8 character, and decoding a partial chunk
    /// would mangle it. A `\n` byte never occurs inside a multi-byte
    /// sequence, so a complete line is always complete UTF-8; genuinely
    /// invalid bytes in a line decode lossily rather than failing the
    /// stream.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut completed = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(event) = self.take_event() {
                    completed.push(event);
                }
            } else {
                self.field_line(line);
            }
        }
        completed
    }

    /// Flushes a trailing record that was never terminated by a blank line
    /// (some servers close the connection right after the last `data:`).
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                self.field_line(line);
            }
        }
        self.take_event()
    }

    fn field_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return; // comment
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event.event = value.to_string(),
            "data" => {
                if self.has_data {
                    self.event.data.push('\n');
                }
                self.event.data.push_str(value);
                self.has_data = true;
            }
            _ => {}
        }
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if !self.has_data && self.event.event.is_empty() {
            return None;
        }
        self.has_data = false;
        Some(std::mem::take(&mut self.event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: message\ndata: {\"msg\":\"hi\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"msg\":\"hi\"}");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: mes").is_empty());
        assert!(parser.push(b"sage\ndata: par").is_empty());
        let events = parser.push(b"tial\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let record = "data: {\"msg\":\"你好\"}\n\n".as_bytes();
        // Every split point, including the ones inside a three-byte
        // character, must reassemble to the same text.
        for split in 1..record.len() {
            let mut parser = SseParser::new();
            let mut events = parser.push(&record[..split]);
            events.extend(parser.push(&record[split..]));
            assert_eq!(events.len(), 1, "split at byte {}", split);
            assert_eq!(events[0].data, "{\"msg\":\"你好\"}", "split at byte {}", split);
        }
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: one\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn test_multi_data_lines_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_crlf_and_ignored_fields() {
        let mut parser = SseParser::new();
        let events = parser.push(b"id: 7\r\n: keepalive\r\nevent: message\r\ndata: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_blank_lines_without_fields_emit_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"\n\n\n").is_empty());
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_finish_flushes_unterminated_record() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: tail").is_empty());
        let event = parser.finish().unwrap();
        assert_eq!(event.data, "tail");
        assert!(parser.finish().is_none());
    }
}
