// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Sentence aggregation over streamed LLM tokens.
//!
//! ```text
//! push("Hello,")  -> None
//! push(" world.") -> Some("Hello, world.")
//! ```

const SENTENCE_ENDINGS: &[char] = &['.', '!', '?', '\n'];

/// True if `text` ends on a sentence boundary (`.`, `!`, `?`, newline),
/// ignoring trailing spaces.
pub fn is_sentence_end(text: &str) -> bool {
    if text.ends_with('\n') {
        return true;
    }
    text.trim_end()
        .chars()
        .last()
        .is_some_and(|c| SENTENCE_ENDINGS.contains(&c))
}

/// Buffers tokens until they form a complete sentence.
#[derive(Debug, Default, Clone)]
pub struct SentenceBuffer {
    aggregation: String,
}

impl SentenceBuffer {
    pub fn new() -> Self {
        Self {
            aggregation: String::with_capacity(256),
        }
    }

    /// Append a token; returns the completed sentence, if any.
    pub fn push(&mut self, token: &str) -> Option<String> {
        self.aggregation.push_str(token);
        if is_sentence_end(&self.aggregation) {
            return self.take();
        }
        None
    }

    /// Return whatever is buffered, trimmed, leaving the buffer empty.
    pub fn take(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.aggregation);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub fn clear(&mut self) {
        self.aggregation.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.aggregation
    }
}
