// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Google Gemini streaming LLM service.
//!
//! Runs one `streamGenerateContent` request per `LLMContextFrame`, reading
//! the shared context at that moment. Output frames:
//!
//! ```text
//! LLMFullResponseStartFrame
//! LLMTextFrame*               one per text part
//! FunctionCallsStartedFrame   only if the model called functions
//! LLMFullResponseEndFrame
//! ```
//!
//! Function calls are then dispatched to the service's [`FunctionRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::frames::{
    ErrorFrame, FrameEnum, FunctionCallFromLLM, FunctionCallsStartedFrame, LLMFullResponseEndFrame,
    LLMFullResponseStartFrame, LLMTextFrame,
};
use crate::impl_name_display;
use crate::processors::aggregators::{LLMContext, SharedContext};
use crate::processors::{FrameDirection, Processor, ProcessorContext, ProcessorWeight};
use crate::services::llm::{FrameQueue, FunctionRegistry};
use crate::services::shared::{http_client, sse::SseParser};
use crate::services::{AIService, LLMService};
use crate::utils::obj_id;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Gemini-backed LLM stage.
pub struct GoogleLLMService {
    id: u64,
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
    functions: FunctionRegistry,
}

impl GoogleLLMService {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    /// An empty `model` selects [`Self::DEFAULT_MODEL`].
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let model = if model.is_empty() {
            Self::DEFAULT_MODEL.to_string()
        } else {
            model
        };
        Self {
            id: obj_id(),
            name: format!("GoogleLLMService({model})"),
            api_key: api_key.into(),
            model,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            client: http_client(Duration::from_secs(90)),
            temperature: None,
            max_tokens: None,
            functions: FunctionRegistry::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn stream_url(&self) -> String {
        format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.model)
    }

    /// Convert OpenAI-shaped messages into Gemini contents plus the system
    /// instruction. Tool results are matched to their call by id to recover
    /// the function name Gemini requires.
    fn convert_messages(messages: &[Value]) -> (Vec<GeminiContent>, Option<GeminiSystemInstruction>) {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();
        let mut call_names: HashMap<String, String> = HashMap::new();

        for msg in messages {
            match msg["role"].as_str().unwrap_or("user") {
                "system" => {
                    if let Some(text) = msg["content"].as_str() {
                        system_parts.push(GeminiPart::text(text));
                    }
                }
                "assistant" => {
                    let parts = match msg["tool_calls"].as_array() {
                        Some(calls) => calls
                            .iter()
                            .map(|call| {
                                let name = call["function"]["name"].as_str().unwrap_or_default().to_string();
                                if let Some(id) = call["id"].as_str() {
                                    call_names.insert(id.to_string(), name.clone());
                                }
                                let args = call["function"]["arguments"]
                                    .as_str()
                                    .and_then(|a| serde_json::from_str(a).ok())
                                    .unwrap_or_else(|| json!({}));
                                GeminiPart {
                                    function_call: Some(GeminiFunctionCall { name, args }),
                                    ..GeminiPart::default()
                                }
                            })
                            .collect(),
                        None => Self::text_parts(&msg["content"]),
                    };
                    if !parts.is_empty() {
                        contents.push(GeminiContent {
                            role: "model".to_string(),
                            parts,
                        });
                    }
                }
                "tool" => {
                    let id = msg["tool_call_id"].as_str().unwrap_or_default();
                    let name = call_names.get(id).cloned().unwrap_or_else(|| "unknown".to_string());
                    let content = msg["content"].as_str().unwrap_or("{}");
                    let response = serde_json::from_str::<Value>(content)
                        .ok()
                        .filter(Value::is_object)
                        .unwrap_or_else(|| json!({ "result": content }));
                    contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts: vec![GeminiPart {
                            function_response: Some(GeminiFunctionResponse { name, response }),
                            ..GeminiPart::default()
                        }],
                    });
                }
                _ => {
                    let parts = Self::text_parts(&msg["content"]);
                    if !parts.is_empty() {
                        contents.push(GeminiContent {
                            role: "user".to_string(),
                            parts,
                        });
                    }
                }
            }
        }

        let system_instruction = (!system_parts.is_empty()).then_some(GeminiSystemInstruction { parts: system_parts });
        (contents, system_instruction)
    }

    fn text_parts(content: &Value) -> Vec<GeminiPart> {
        match content {
            Value::String(text) if !text.is_empty() => vec![GeminiPart::text(text.as_str())],
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item["text"].as_str())
                .map(GeminiPart::text)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn build_request(&self, context: &LLMContext) -> GeminiRequest {
        let (contents, system_instruction) = Self::convert_messages(context.messages());
        let generation_config = (self.temperature.is_some() || self.max_tokens.is_some()).then(|| {
            GeminiGenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: self.temperature,
            }
        });
        GeminiRequest {
            contents,
            system_instruction,
            generation_config,
            tools: context.tools().to_gemini(),
        }
    }

    /// Emit frames for one SSE payload; collects function calls.
    fn handle_chunk(&self, data: &str, ctx: &ProcessorContext, calls: &mut Vec<FunctionCallFromLLM>) {
        let chunk: GeminiStreamChunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to parse Gemini stream chunk");
                return;
            }
        };
        for candidate in chunk.candidates {
            if let Some(reason) = candidate.finish_reason.as_deref() {
                debug!(processor = %self.name, reason, "Gemini candidate finished");
            }
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    ctx.send_downstream(LLMTextFrame::new(text).into());
                }
                if let Some(fc) = part.function_call {
                    calls.push(FunctionCallFromLLM {
                        function_name: fc.name,
                        tool_call_id: format!("call_{}", obj_id()),
                        arguments: fc.args,
                    });
                }
            }
        }
    }

    async fn run_inference(&mut self, context: &SharedContext, ctx: &ProcessorContext) {
        let body = {
            let context = context.lock().await;
            debug!(processor = %self.name, messages = context.message_count(), "starting Gemini inference");
            self.build_request(&context)
        };

        let response = match self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(processor = %self.name, error = %e, "Gemini request failed");
                ctx.send_upstream(ErrorFrame::new(format!("Gemini request failed: {e}"), true).into());
                return;
            }
        };
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(processor = %self.name, %status, body = %detail, "Gemini API error");
            ctx.send_upstream(ErrorFrame::new(format!("Gemini API error (HTTP {status}): {detail}"), true).into());
            return;
        }

        ctx.send_downstream(LLMFullResponseStartFrame::new().into());

        let mut parser = SseParser::new();
        let mut calls = Vec::new();
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.interruption_token().cancelled() => {
                    debug!(processor = %self.name, "Gemini stream interrupted");
                    return;
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(bytes)) => {
                    for data in parser.push(&bytes) {
                        self.handle_chunk(&data, ctx, &mut calls);
                    }
                }
                Some(Err(e)) => {
                    error!(processor = %self.name, error = %e, "Gemini stream read failed");
                    ctx.send_upstream(ErrorFrame::new(format!("Gemini stream read failed: {e}"), true).into());
                    return;
                }
                None => break,
            }
        }
        if let Some(data) = parser.finish() {
            self.handle_chunk(&data, ctx, &mut calls);
        }

        if !calls.is_empty() {
            debug!(processor = %self.name, count = calls.len(), "model requested function calls");
            ctx.send_downstream(FunctionCallsStartedFrame::new(calls.clone()).into());
        }
        ctx.send_downstream(LLMFullResponseEndFrame::new().into());

        if !calls.is_empty() {
            self.functions
                .dispatch(calls, context, &FrameQueue::from_context(ctx))
                .await;
        }
    }
}

impl fmt::Debug for GoogleLLMService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleLLMService")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("functions", &self.functions)
            .finish()
    }
}

impl_name_display!(GoogleLLMService);

#[async_trait]
impl Processor for GoogleLLMService {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Heavy
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            // Upstream context frames come from function results asking for
            // another turn.
            FrameEnum::LLMContext(f) => self.run_inference(&f.context, ctx).await,
            other => ctx.send(other, direction),
        }
    }
}

impl AIService for GoogleLLMService {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }
}

impl LLMService for GoogleLLMService {
    fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }
}
