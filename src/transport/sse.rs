//! `text/event-stream` framing.
//!
//! [`SseCodec`] splits an event-stream byte stream into the `data` payloads
//! of dispatched events, following the browser `EventSource` rules for the
//! default `message` event type: `data:` lines accumulate, comments and
//! `id`/`retry` fields are ignored, and a blank line dispatches the event.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::TransportError;

/// Default cap on a single event-stream line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Decoder yielding the `data` payload of each `message` event.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use pagestream::transport::SseCodec;
/// use tokio_util::codec::Decoder;
///
/// let mut codec = SseCodec::default();
/// let mut buf = BytesMut::from("data: {}\n\n");
/// assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{}"));
/// ```
#[derive(Debug)]
pub struct SseCodec {
    max_line_length: usize,
    data: Option<String>,
    event_type: String,
    // Bytes of the current partial line already scanned for a terminator.
    scanned: usize,
}

impl Default for SseCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_LINE_LENGTH) }
}

impl SseCodec {
    /// Create a codec rejecting lines longer than `max_line_length` bytes.
    #[must_use]
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            data: None,
            event_type: String::new(),
            scanned: 0,
        }
    }

    /// Take the next complete line (without terminator) from `src`.
    fn next_line(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = src.len();
            if src.len() > self.max_line_length {
                return Err(TransportError::LineTooLong {
                    max: self.max_line_length,
                });
            }
            return Ok(None);
        };
        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_line_length {
            return Err(TransportError::LineTooLong {
                max: self.max_line_length,
            });
        }

        let mut line = src.split_to(end);
        src.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|_| TransportError::InvalidUtf8)
    }

    /// Process one line; returns a payload when it dispatches an event.
    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            let event_type = std::mem::take(&mut self.event_type);
            let data = self.data.take()?;
            if event_type.is_empty() || event_type == "message" {
                return Some(data);
            }
            tracing::trace!(event_type, "ignoring non-message event");
            return None;
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            },
            "event" => value.clone_into(&mut self.event_type),
            _ => {}
        }
        None
    }
}

impl Decoder for SseCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.next_line(src)? {
            if let Some(data) = self.process_line(&line) {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(data) = self.decode(src)? {
            return Ok(Some(data));
        }
        // An event not terminated by a blank line is never dispatched.
        src.clear();
        self.scanned = 0;
        self.data = None;
        self.event_type.clear();
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn decode_all(codec: &mut SseCodec, input: &str) -> Vec<String> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(item) = codec.decode(&mut buf).expect("decode") {
            out.push(item);
        }
        out
    }

    #[test]
    fn decodes_consecutive_events() {
        let mut codec = SseCodec::default();
        let out = decode_all(
            &mut codec,
            "data: {\"idx\": 0}\n\ndata: {\"idx\": 1}\n\ndata: {}\n\n",
        );
        assert_eq!(out, vec!["{\"idx\": 0}", "{\"idx\": 1}", "{}"]);
    }

    #[rstest]
    #[case::crlf("data: a\r\n\r\n", "a")]
    #[case::no_space("data:a\n\n", "a")]
    #[case::two_spaces("data:  a\n\n", " a")]
    #[case::multi_line("data: a\ndata: b\n\n", "a\nb")]
    #[case::comment(": keep-alive\ndata: a\n\n", "a")]
    #[case::ignored_fields("id: 7\nretry: 100\ndata: a\n\n", "a")]
    #[case::explicit_message("event: message\ndata: a\n\n", "a")]
    fn handles_field_variants(#[case] input: &str, #[case] want: &str) {
        let mut codec = SseCodec::default();
        assert_eq!(decode_all(&mut codec, input), vec![want.to_owned()]);
    }

    #[test]
    fn skips_named_events() {
        let mut codec = SseCodec::default();
        let out = decode_all(&mut codec, "event: ping\ndata: x\n\ndata: y\n\n");
        assert_eq!(out, vec!["y"]);
    }

    #[test]
    fn blank_lines_without_data_dispatch_nothing() {
        let mut codec = SseCodec::default();
        assert!(decode_all(&mut codec, "\n\n: c\n\n").is_empty());
    }

    #[test]
    fn resumes_across_partial_reads() {
        let mut codec = SseCodec::default();
        let mut buf = BytesMut::from("data: {\"idx\"");
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
        buf.extend_from_slice(b": 3}\n");
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
        buf.extend_from_slice(b"\n");
        assert_eq!(
            codec.decode(&mut buf).expect("decode").as_deref(),
            Some("{\"idx\": 3}")
        );
    }

    #[test]
    fn incomplete_event_at_eof_is_discarded() {
        let mut codec = SseCodec::default();
        let mut buf = BytesMut::from("data: {}\n");
        assert_eq!(codec.decode_eof(&mut buf).expect("eof"), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut codec = SseCodec::default();
        let mut buf = BytesMut::from(&b"data: {\"pic_path\": \"p\xff\xfe\"}\n\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::InvalidUtf8)
        ));
    }

    #[rstest]
    #[case::unterminated("data: 0123456789abcdef")]
    #[case::terminated("data: 0123456789abcdef\n")]
    fn rejects_overlong_lines(#[case] input: &str) {
        let mut codec = SseCodec::new(8);
        let mut buf = BytesMut::from(input);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::LineTooLong { max: 8 })
        ));
    }
}
