// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Conversation context shared by the aggregators and the LLM.
//!
//! Messages are stored in OpenAI-compatible JSON (`{"role", "content"}`,
//! assistant `tool_calls`, `tool` results). Providers convert from this
//! shape when building requests.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::adapters::schemas::ToolsSchema;
use crate::frames::FunctionCallFromLLM;

/// Context shared between the user aggregator, the LLM and the assistant
/// aggregator.
pub type SharedContext = Arc<Mutex<LLMContext>>;

/// Ordered, role-tagged message history plus the registered tools.
///
/// ```
/// use get_money_agent::processors::aggregators::llm_context::LLMContext;
///
/// let mut context = LLMContext::new();
/// context.add_system_message("You are calling Acme Cable.");
/// context.add_user_message("Hello, how can I help?");
/// assert_eq!(context.message_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LLMContext {
    messages: Vec<Value>,
    tools: ToolsSchema,
}

impl LLMContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Value>, tools: ToolsSchema) -> Self {
        Self { messages, tools }
    }

    /// Wrap the context for sharing across processors.
    pub fn into_shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    pub fn add_message(&mut self, role: &str, content: &str) {
        self.messages.push(json!({
            "role": role,
            "content": content,
        }));
    }

    /// Append a message with a structure other than role/content.
    pub fn add_message_value(&mut self, message: Value) {
        self.messages.push(message);
    }

    pub fn add_system_message(&mut self, text: &str) {
        self.add_message("system", text);
    }

    pub fn add_user_message(&mut self, text: &str) {
        self.add_message("user", text);
    }

    pub fn add_assistant_message(&mut self, text: &str) {
        self.add_message("assistant", text);
    }

    /// Record the function calls the model requested, as one assistant
    /// message with a `tool_calls` array.
    pub fn add_tool_calls(&mut self, calls: &[FunctionCallFromLLM]) {
        if calls.is_empty() {
            return;
        }
        let tool_calls: Vec<Value> = calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.tool_call_id,
                    "type": "function",
                    "function": {
                        "name": call.function_name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
        self.messages.push(json!({
            "role": "assistant",
            "tool_calls": tool_calls,
        }));
    }

    /// Record a function result as a `tool` message.
    pub fn add_tool_result(&mut self, tool_call_id: &str, result: &Value) {
        let content = match result {
            Value::String(s) => s.clone(),
            Value::Null => "COMPLETED".to_string(),
            other => other.to_string(),
        };
        self.messages.push(json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }));
    }

    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    pub fn set_tools(&mut self, tools: ToolsSchema) {
        self.tools = tools;
    }

    pub fn tools(&self) -> &ToolsSchema {
        &self.tools
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Content of the first system message, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m["role"] == "system")
            .and_then(|m| m["content"].as_str())
    }

    /// Arguments recorded for a tool call id, if that call is in the history.
    pub fn tool_call(&self, tool_call_id: &str) -> Option<&Value> {
        self.messages
            .iter()
            .filter_map(|m| m["tool_calls"].as_array())
            .flatten()
            .find(|c| c["id"] == tool_call_id)
    }
}
