// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Provider-neutral tool schemas.
//!
//! Tools are declared once as [`FunctionSchema`]s and rendered to whatever
//! shape a provider expects: OpenAI-style `{"type": "function", ...}` entries
//! for the context, Gemini `functionDeclarations` for Google.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A single callable function exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of each parameter, keyed by parameter name.
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl FunctionSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// Add a parameter; `required` parameters are listed in the schema's
    /// `required` array.
    pub fn with_property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    /// JSON schema object describing the parameters.
    pub fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        })
    }

    /// OpenAI-compatible tool entry.
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters(),
            }
        })
    }

    /// Gemini function declaration. Gemini rejects empty `properties`
    /// objects, so parameterless functions omit `parameters` entirely.
    pub fn to_gemini(&self) -> Value {
        let mut decl = json!({
            "name": self.name,
            "description": self.description,
        });
        if !self.properties.is_empty() {
            decl["parameters"] = self.parameters();
        }
        decl
    }
}

/// The set of tools registered on a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsSchema {
    pub standard_tools: Vec<FunctionSchema>,
}

impl ToolsSchema {
    pub fn new(standard_tools: Vec<FunctionSchema>) -> Self {
        Self { standard_tools }
    }

    pub fn len(&self) -> usize {
        self.standard_tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standard_tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSchema> {
        self.standard_tools.iter().find(|f| f.name == name)
    }

    pub fn to_openai(&self) -> Vec<Value> {
        self.standard_tools.iter().map(FunctionSchema::to_openai).collect()
    }

    /// Gemini `tools` array: one entry holding all function declarations.
    pub fn to_gemini(&self) -> Vec<Value> {
        if self.standard_tools.is_empty() {
            return Vec::new();
        }
        let declarations: Vec<Value> = self.standard_tools.iter().map(FunctionSchema::to_gemini).collect();
        vec![json!({ "functionDeclarations": declarations })]
    }
}
