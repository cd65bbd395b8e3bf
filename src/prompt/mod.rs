// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! System prompt construction.
//!
//! The prompt is built once per call by substituting the call parameters into
//! [`script::SYSTEM_PROMPT`]. Pure: no state, no I/O.

pub mod script;
pub mod template;

use std::collections::HashMap;

pub use script::SYSTEM_PROMPT;
pub use template::{Placeholder, Template, TemplateError, MARKER};

use crate::agent::CallParameters;

/// The parsed negotiation script.
pub fn system_prompt_template() -> Result<Template, TemplateError> {
    Template::parse(SYSTEM_PROMPT)
}

/// Render the negotiation script from a key/value mapping. Keys are the
/// [`Placeholder`] names (`CustomerName`, `CompanyName`, ...).
pub fn render_system_prompt(values: &HashMap<String, String>) -> Result<String, TemplateError> {
    system_prompt_template()?.render(values)
}

/// Render the negotiation script for one call.
pub fn build_system_prompt(params: &CallParameters) -> Result<String, TemplateError> {
    let prompt = render_system_prompt(&params.prompt_values())?;
    tracing::debug!(chars = prompt.len(), "system prompt built");
    Ok(prompt)
}
