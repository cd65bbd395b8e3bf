// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Placeholder templates.
//!
//! A template is literal text with `{Name}` tokens drawn from the closed set
//! in [`Placeholder`]. A token may carry the highlight marker `🔶 ` in front
//! of it; the marker is consumed together with the token. `{{` and `}}` are
//! literal braces. Rendering is a single pass over the parsed template, so
//! braces inside substituted values are copied verbatim.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Highlight marker that may precede a token.
pub const MARKER: &str = "🔶 ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("no value supplied for placeholder {{{0}}}")]
    MissingPlaceholder(String),
    #[error("empty value for placeholder {{{0}}}")]
    EmptyValue(String),
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("unbalanced brace at byte offset {offset}")]
    UnbalancedBrace { offset: usize },
}

/// The recognized placeholder keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    CustomerName,
    CompanyName,
    DesiredResolution,
    AccountNumber,
    ProductOrService,
    IssueDescription,
    Proof,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Self::CustomerName,
        Self::CompanyName,
        Self::DesiredResolution,
        Self::AccountNumber,
        Self::ProductOrService,
        Self::IssueDescription,
        Self::Proof,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::CustomerName => "CustomerName",
            Self::CompanyName => "CompanyName",
            Self::DesiredResolution => "DesiredResolution",
            Self::AccountNumber => "AccountNumber",
            Self::ProductOrService => "ProductOrService",
            Self::IssueDescription => "IssueDescription",
            Self::Proof => "Proof",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Placeholder {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token { key: Placeholder, marked: bool },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let bytes = source.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    literal.push('{');
                    i += 2;
                }
                b'}' if bytes.get(i + 1) == Some(&b'}') => {
                    literal.push('}');
                    i += 2;
                }
                b'{' => {
                    let rest = &source[i + 1..];
                    let Some(close) = rest.find(['}', '{']).filter(|&c| rest.as_bytes()[c] == b'}') else {
                        return Err(TemplateError::UnbalancedBrace { offset: i });
                    };
                    let name = &rest[..close];
                    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(TemplateError::UnbalancedBrace { offset: i });
                    }
                    let key: Placeholder = name.parse()?;
                    let marked = literal.ends_with(MARKER);
                    if marked {
                        literal.truncate(literal.len() - MARKER.len());
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Token { key, marked });
                    i += close + 2;
                }
                b'}' => return Err(TemplateError::UnbalancedBrace { offset: i }),
                _ => {
                    // Copy the whole UTF-8 sequence starting here.
                    let ch_len = source[i..].chars().next().map_or(1, char::len_utf8);
                    literal.push_str(&source[i..i + ch_len]);
                    i += ch_len;
                }
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Number of tokens for `key`, marked or not.
    pub fn placeholder_count(&self, key: &str) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Token { key: k, .. } if k.key() == key))
            .count()
    }

    /// Number of tokens carrying the highlight marker.
    pub fn marked_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Token { marked: true, .. }))
            .count()
    }

    /// Distinct keys used by the template, in first-use order.
    pub fn placeholders(&self) -> Vec<Placeholder> {
        let mut keys = Vec::new();
        for segment in &self.segments {
            if let Segment::Token { key, .. } = segment {
                if !keys.contains(key) {
                    keys.push(*key);
                }
            }
        }
        keys
    }

    /// Substitute every token. Fails on the first token whose key is absent
    /// from `values` or maps to an empty string.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token { key, .. } => {
                    let value = values
                        .get(key.key())
                        .ok_or_else(|| TemplateError::MissingPlaceholder(key.key().to_string()))?;
                    if value.trim().is_empty() {
                        return Err(TemplateError::EmptyValue(key.key().to_string()));
                    }
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
