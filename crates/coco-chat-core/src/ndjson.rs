//! Line-buffered NDJSON reader
//!
//! Turns the raw fragments of a streamed HTTP body into parsed JSON values,
//! one per newline-terminated line. Lines may span any number of fragments,
//! and multi-byte UTF-8 characters may be split across byte chunks.

use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct NdjsonReader {
    /// Decoded text not yet terminated by a newline
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
}

impl NdjsonReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text fragment and return every line it completes.
    ///
    /// The last, possibly incomplete, segment stays buffered for the next
    /// fragment. Returned lines have their `\n` (and any `\r`) stripped.
    pub fn split_lines(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);

        let mut lines = Vec::new();
        while let Some(idx) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=idx).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Append a text fragment and parse every line it completes.
    ///
    /// Malformed lines are logged and dropped; they never poison the buffer.
    pub fn push_str(&mut self, fragment: &str) -> Vec<Value> {
        self.split_lines(fragment)
            .into_iter()
            .filter_map(|line| parse_line(&line))
            .collect()
    }

    /// Append raw bytes from the transport and parse every line they complete.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Value> {
        self.pending.extend_from_slice(bytes);
        let text = self.decode_pending();
        self.push_str(&text)
    }

    /// Unterminated text still waiting for its newline
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// End of stream. The unterminated tail is not parsed; it is handed back
    /// to the caller if there is one.
    pub fn finish(self) -> Option<String> {
        let mut tail = self.buffer;
        if !self.pending.is_empty() {
            tail.push(char::REPLACEMENT_CHARACTER);
        }
        if tail.trim().is_empty() {
            return None;
        }
        debug!(len = tail.len(), "stream ended with an unterminated line");
        Some(tail)
    }

    /// Decode as much of `pending` as forms complete UTF-8, keeping an
    /// incomplete trailing sequence for the next chunk.
    fn decode_pending(&mut self) -> String {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match err.error_len() {
                        None => {
                            self.pending.drain(..valid_up_to);
                            return out;
                        }
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid);
                        }
                    }
                }
            }
        }
    }
}

fn parse_line(line: &str) -> Option<Value> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, line, "skipping malformed stream line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRANSCRIPT: &str = concat!(
        "{\"chunk_type\":\"think\",\"message_chunk\":\"Anal\"}\n",
        "{\"chunk_type\":\"think\",\"message_chunk\":\"yzing\"}\n",
        "{\"chunk_type\":\"response\",\"message_chunk\":\"Coco AI is...\"}\n",
    );

    #[test]
    fn test_complete_lines_parsed_and_tail_retained() {
        let mut reader = NdjsonReader::new();
        let lines = reader.split_lines("{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n{\"d\":");
        assert_eq!(lines.len(), 3);
        assert_eq!(reader.remainder(), "{\"d\":");

        let values = reader.push_str("4}\n");
        assert_eq!(values, vec![json!({"d": 4})]);
        assert_eq!(reader.remainder(), "");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let mut reader = NdjsonReader::new();
        let values = reader.push_str("{\"a\":1}\nnot json\n{\"b\":\n{\"c\":3}\n");
        assert_eq!(values, vec![json!({"a": 1}), json!({"c": 3})]);
        assert_eq!(reader.remainder(), "");
    }

    #[test]
    fn test_split_position_does_not_change_output() {
        let mut whole = NdjsonReader::new();
        let expected = whole.push_str(TRANSCRIPT);
        assert_eq!(expected.len(), 3);

        for size in 1..TRANSCRIPT.len() {
            let mut reader = NdjsonReader::new();
            let mut values = Vec::new();
            for piece in TRANSCRIPT.as_bytes().chunks(size) {
                values.extend(reader.push_bytes(piece));
            }
            assert_eq!(values, expected, "chunk size {size}");
        }
    }

    #[test]
    fn test_multibyte_characters_split_across_chunks() {
        let line = "{\"chunk_type\":\"response\",\"message_chunk\":\"héllo 🌍 你好\"}\n";
        let mut reader = NdjsonReader::new();
        let mut values = Vec::new();
        for byte in line.as_bytes() {
            values.extend(reader.push_bytes(std::slice::from_ref(byte)));
        }
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["message_chunk"], "héllo 🌍 你好");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut reader = NdjsonReader::new();
        let values = reader.push_bytes(b"{\"t\":\"a\xffb\"}\n");
        assert_eq!(values, vec![json!({"t": "a\u{FFFD}b"})]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let mut reader = NdjsonReader::new();
        let values = reader.push_str("{\"a\":1}\r\n\r\n\n{\"b\":2}\r\n");
        assert_eq!(values, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_unterminated_tail_is_not_parsed() {
        let mut reader = NdjsonReader::new();
        let values = reader.push_str("{\"a\":1}\n{\"b\":2}");
        assert_eq!(values, vec![json!({"a": 1})]);
        assert_eq!(reader.finish().as_deref(), Some("{\"b\":2}"));

        let reader = NdjsonReader::new();
        assert_eq!(reader.finish(), None);
    }
}
