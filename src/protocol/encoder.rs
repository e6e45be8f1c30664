//! SSE wire encoder
//!
//! Field order within a block is `id`, `event`, `retry`, comments, `data`.
//! Payload and comments are split on every line break (CRLF, CR or LF) and
//! emitted one line per field, so no blank line ever appears inside a block.

use super::WireEvent;
use crate::error::EncodeError;
use crate::types::Event;

/// Encode a stream event as one SSE block
pub fn encode(event: &Event) -> Result<String, EncodeError> {
    encode_wire(&WireEvent::from(event))
}

/// Encode a wire event as one SSE block
pub fn encode_wire(event: &WireEvent) -> Result<String, EncodeError> {
    let mut out = String::with_capacity(event.data.len() + 64);

    if let Some(id) = event.id {
        push_field(&mut out, "id", &id.to_string());
    }

    if let Some(event_type) = &event.event_type {
        if event_type.contains(['\r', '\n', '\0']) {
            return Err(EncodeError::InvalidEventType(event_type.clone()));
        }
        push_field(&mut out, "event", event_type);
    }

    if let Some(retry_ms) = event.retry_ms {
        push_field(&mut out, "retry", &retry_ms.to_string());
    }

    for comment in &event.comments {
        for line in split_lines(comment) {
            push_field(&mut out, "", line);
        }
    }

    for line in split_lines(&event.data) {
        push_field(&mut out, "data", line);
    }

    out.push('\n');
    Ok(out)
}

/// Encode a comment-only block, ignored by decoders except as activity
pub fn encode_comment(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for line in split_lines(text) {
        push_field(&mut out, "", line);
    }
    out.push('\n');
    out
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

/// Split on CRLF, CR and LF; always yields at least one (possibly empty) line
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&text[start..]);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, NewEvent, StreamId};
    use std::time::Duration;

    fn event(id: u64, draft: NewEvent) -> Event {
        Event::from_draft(StreamId::generate(), EventId::new(id), draft)
    }

    #[test]
    fn test_encode_minimal_event() {
        let encoded = encode(&event(0, NewEvent::new("hello"))).unwrap();
        assert_eq!(encoded, "id: 0\ndata: hello\n\n");
    }

    #[test]
    fn test_encode_all_fields_in_order() {
        let encoded = encode(&event(
            7,
            NewEvent::new("payload")
                .with_type("price")
                .with_comment("note")
                .with_retry(Duration::from_millis(2500)),
        ))
        .unwrap();

        assert_eq!(
            encoded,
            "id: 7\nevent: price\nretry: 2500\n: note\ndata: payload\n\n"
        );
    }

    #[test]
    fn test_multiline_payload_uses_one_data_line_per_line() {
        let encoded = encode(&event(1, NewEvent::new("a\nb\r\nc\rd"))).unwrap();
        assert_eq!(encoded, "id: 1\ndata: a\ndata: b\ndata: c\ndata: d\n\n");
    }

    #[test]
    fn test_blank_lines_in_payload_stay_inside_the_block() {
        let encoded = encode(&event(1, NewEvent::new("a\n\nb\n"))).unwrap();
        assert_eq!(encoded, "id: 1\ndata: a\ndata: \ndata: b\ndata: \n\n");
        // Exactly one terminating blank line
        assert_eq!(encoded.matches("\n\n").count(), 1);
    }

    #[test]
    fn test_empty_payload_still_has_data_field() {
        let encoded = encode(&event(2, NewEvent::new(""))).unwrap();
        assert_eq!(encoded, "id: 2\ndata: \n\n");
    }

    #[test]
    fn test_multiline_comment() {
        let encoded = encode(&event(3, NewEvent::new("x").with_comment("one\ntwo"))).unwrap();
        assert_eq!(encoded, "id: 3\n: one\n: two\ndata: x\n\n");
    }

    #[test]
    fn test_event_type_with_newline_is_rejected() {
        let err = encode(&event(4, NewEvent::new("x").with_type("bad\ntype"))).unwrap_err();
        assert_eq!(err, EncodeError::InvalidEventType("bad\ntype".to_string()));
    }

    #[test]
    fn test_anonymous_wire_event_omits_id() {
        let wire = WireEvent {
            data: "hi".to_string(),
            ..Default::default()
        };
        assert_eq!(encode_wire(&wire).unwrap(), "data: hi\n\n");
    }

    #[test]
    fn test_encode_comment_block() {
        assert_eq!(encode_comment("keep-alive"), ": keep-alive\n\n");
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines(""), vec![""]);
        assert_eq!(split_lines("a"), vec!["a"]);
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\rb"), vec!["a", "", "b"]);
        assert_eq!(split_lines("é\nü"), vec!["é", "ü"]);
    }
}
