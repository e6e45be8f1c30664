//! Incremental SSE decoder
//!
//! Bytes may arrive in arbitrary chunks; lines are terminated by CRLF, CR or
//! LF (a CR at the end of one chunk followed by LF at the start of the next is
//! one terminator). A blank line dispatches the accumulated block.

use std::time::Duration;

use super::WireEvent;
use crate::types::EventId;

/// Fields collected for the block currently being parsed
#[derive(Debug, Default)]
struct PendingBlock {
    id: Option<EventId>,
    event_type: Option<String>,
    data_lines: Vec<String>,
    comments: Vec<String>,
    retry_ms: Option<u64>,
}

/// Stateful decoder for one connection
#[derive(Debug, Default)]
pub struct Decoder {
    line: Vec<u8>,
    pending_cr: bool,
    seen_first_line: bool,
    block: PendingBlock,
    retry: Option<Duration>,
    last_event_id: Option<EventId>,
    lines_seen: u64,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every event completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<WireEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' | b'\r' => {
                    self.pending_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                _ => self.line.push(byte),
            }
        }

        events
    }

    /// End of input: an unterminated block is discarded
    pub fn finish(&mut self) {
        self.line.clear();
        self.pending_cr = false;
        self.block = PendingBlock::default();
    }

    /// Reconnection interval most recently announced by the server
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// ID of the most recently dispatched event that carried one
    pub fn last_event_id(&self) -> Option<EventId> {
        self.last_event_id
    }

    /// Number of complete lines processed, comments included
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<WireEvent> {
        self.lines_seen += 1;
        let decoded = String::from_utf8_lossy(raw);
        let mut line: &str = &decoded;
        if !self.seen_first_line {
            self.seen_first_line = true;
            line = line.strip_prefix('\u{FEFF}').unwrap_or(line);
        }

        if line.is_empty() {
            return self.dispatch();
        }

        if let Some(comment) = line.strip_prefix(':') {
            let comment = comment.strip_prefix(' ').unwrap_or(comment);
            self.block.comments.push(comment.to_string());
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.block.data_lines.push(value.to_string()),
            "event" => self.block.event_type = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    if let Ok(id) = value.parse::<u64>() {
                        self.block.id = Some(EventId::new(id));
                    }
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.block.retry_ms = Some(ms);
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            // Unknown fields are ignored for forward compatibility
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<WireEvent> {
        let block = std::mem::take(&mut self.block);
        if block.data_lines.is_empty() {
            return None;
        }

        if block.id.is_some() {
            self.last_event_id = block.id;
        }

        Some(WireEvent {
            id: block.id,
            event_type: block.event_type,
            data: block.data_lines.join("\n"),
            comments: block.comments,
            retry_ms: block.retry_ms,
        })
    }
}
