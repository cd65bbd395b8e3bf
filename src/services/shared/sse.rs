// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Server-Sent Events parser for streamed HTTP responses.
//!
//! Works on raw bytes so a multi-byte character split across two network
//! reads is reassembled before decoding. Multi-line `data:` fields of one
//! event are joined with `\n`; an empty line dispatches the event.

/// Incremental SSE decoder.
///
/// ```
/// use get_money_agent::services::shared::sse::SseParser;
///
/// let mut parser = SseParser::new();
/// assert!(parser.push(b"data: {\"a\":").is_empty());
/// assert_eq!(parser.push(b"1}\r\n\r\n"), vec!["{\"a\":1}".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(1024),
            data: Vec::new(),
        }
    }

    /// Feed a chunk of the body; returns the payloads of completed events.
    /// `[DONE]` sentinels are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.handle_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush an event left open when the stream closed without a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
            if let Some(event) = self.handle_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        // event:, id: and retry: carry nothing we use.
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        (payload != "[DONE]").then_some(payload)
    }
}
