// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Recording fakes for the transport, model and synthesis stages.

#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use get_money_agent::frames::{
    ErrorFrame, FrameEnum, FunctionCallFromLLM, FunctionCallsStartedFrame, LLMFullResponseEndFrame, LLMFullResponseStartFrame,
    LLMTextFrame, TextFrame, TranscriptionFrame,
};
use get_money_agent::prelude::*;
use get_money_agent::processors::aggregators::SharedContext;
use get_money_agent::services::{FrameQueue, FunctionRegistry};
use get_money_agent::transports::TransportError;

pub const PHONE_NUMBER: &str = "+15555550123";
pub const REP: &str = "pstn-1";

pub fn jane_doe() -> CallParameters {
    CallParameters::builder()
        .phone_number(PHONE_NUMBER)
        .company_name("Acme Cable")
        .customer_name("Jane Doe")
        .account_number("A-1029")
        .desired_resolution("full refund of $120")
        .product_or_service("cable service")
        .issue_description("three-day outage not credited")
        .proof("outage ticket #55219")
        .build()
        .unwrap()
}

pub fn agent() -> Agent {
    let config = AgentConfig::from_lookup(|key| Some(format!("test-{}", key.to_lowercase()))).unwrap();
    Agent::new(jane_doe(), config).unwrap()
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Test-side controls for a [`FakeTransport`].
#[derive(Clone)]
pub struct TransportRemote {
    calls: Arc<Mutex<Vec<String>>>,
    spoken: Arc<Mutex<Vec<String>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    media: mpsc::UnboundedSender<FrameEnum>,
}

impl TransportRemote {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn emit(&self, event: TransportEvent) {
        self.events.send(event).unwrap();
    }

    /// The representative says `text`.
    pub fn say(&self, text: &str) {
        self.media
            .send(TranscriptionFrame::new(text, REP, "0.000Z").into())
            .unwrap();
    }

    pub fn close_events(&mut self) {
        let (closed, _) = mpsc::unbounded_channel();
        self.events = closed;
    }
}

pub struct FakeTransport {
    calls: Arc<Mutex<Vec<String>>>,
    spoken: Arc<Mutex<Vec<String>>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    media: Arc<Mutex<Option<mpsc::UnboundedReceiver<FrameEnum>>>>,
    fail_join: bool,
}

impl FakeTransport {
    pub fn new() -> (Self, TransportRemote) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            calls: calls.clone(),
            spoken: spoken.clone(),
            events: Mutex::new(Some(events_rx)),
            media: Arc::new(Mutex::new(Some(media_rx))),
            fail_join: false,
        };
        let remote = TransportRemote {
            calls,
            spoken,
            events: events_tx,
            media: media_tx,
        };
        (transport, remote)
    }

    pub fn failing_join() -> (Self, TransportRemote) {
        let (mut transport, remote) = Self::new();
        transport.fail_join = true;
        (transport, remote)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CallTransport for FakeTransport {
    fn input(&self) -> Box<dyn Processor> {
        Box::new(FakeInput {
            media: self.media.clone(),
            reader: None,
        })
    }

    fn output(&self) -> Box<dyn Processor> {
        Box::new(FakeOutput {
            spoken: self.spoken.clone(),
        })
    }

    async fn join(&self) -> Result<(), TransportError> {
        self.record("join".into());
        if self.fail_join {
            return Err(TransportError::Api {
                endpoint: "/rooms/test".into(),
                status: 404,
                body: "not found".into(),
            });
        }
        Ok(())
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.record("leave".into());
        Ok(())
    }

    async fn start_dialout(&self, settings: &DialoutSettings) -> Result<(), TransportError> {
        self.record(format!("dialout {}", settings.phone_number));
        Ok(())
    }

    async fn capture_participant_transcription(&self, participant_id: &str) -> Result<(), TransportError> {
        self.record(format!("capture {participant_id}"));
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events.lock().unwrap().take()
    }
}

pub struct FakeInput {
    media: Arc<Mutex<Option<mpsc::UnboundedReceiver<FrameEnum>>>>,
    reader: Option<JoinHandle<()>>,
}

impl fmt::Debug for FakeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FakeInput")
    }
}

impl fmt::Display for FakeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FakeInput")
    }
}

#[async_trait]
impl Processor for FakeInput {
    fn name(&self) -> &str {
        "FakeInput"
    }

    fn id(&self) -> u64 {
        1
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        let start = matches!(frame, FrameEnum::Start(_));
        let stop = matches!(frame, FrameEnum::End(_) | FrameEnum::Cancel(_));
        ctx.send(frame, direction);
        if start {
            if let Some(mut media) = self.media.lock().unwrap().take() {
                let downstream = ctx.downstream_sender();
                self.reader = Some(tokio::spawn(async move {
                    while let Some(frame) = media.recv().await {
                        if downstream.send(frame).is_err() {
                            break;
                        }
                    }
                }));
            }
        }
        if stop {
            if let Some(reader) = self.reader.take() {
                reader.abort();
            }
        }
    }
}

/// Records spoken text and passes everything on.
pub struct FakeOutput {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl fmt::Debug for FakeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FakeOutput")
    }
}

impl fmt::Display for FakeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FakeOutput")
    }
}

#[async_trait]
impl Processor for FakeOutput {
    fn name(&self) -> &str {
        "FakeOutput"
    }

    fn id(&self) -> u64 {
        2
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        if let FrameEnum::Text(t) = &frame {
            if t.spoken {
                self.spoken.lock().unwrap().push(t.text.clone());
            }
        }
        ctx.send(frame, direction);
    }
}

// ---------------------------------------------------------------------------
// Model and synthesis
// ---------------------------------------------------------------------------

/// Answers every user turn with `Reply to: <turn>` and calls
/// `terminate_call` when the turn says goodbye.
pub struct FakeLLM {
    functions: FunctionRegistry,
    context: Arc<Mutex<Option<SharedContext>>>,
    turns: Arc<Mutex<Vec<String>>>,
    failure: Option<String>,
}

#[derive(Clone)]
pub struct LLMRecorder {
    context: Arc<Mutex<Option<SharedContext>>>,
    turns: Arc<Mutex<Vec<String>>>,
}

impl LLMRecorder {
    /// User turns the model was asked to answer.
    pub fn turns(&self) -> Vec<String> {
        self.turns.lock().unwrap().clone()
    }

    /// Current conversation messages.
    pub fn messages(&self) -> Vec<Value> {
        let Some(context) = self.context.lock().unwrap().clone() else {
            return Vec::new();
        };
        let messages = match context.try_lock() {
            Ok(context) => context.messages().to_vec(),
            Err(_) => Vec::new(),
        };
        messages
    }

    pub fn roles(&self) -> Vec<String> {
        self.messages()
            .iter()
            .map(|m| m["role"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl FakeLLM {
    pub fn new() -> (Self, LLMRecorder) {
        let context = Arc::new(Mutex::new(None));
        let turns = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                functions: FunctionRegistry::new(),
                context: context.clone(),
                turns: turns.clone(),
                failure: None,
            },
            LLMRecorder { context, turns },
        )
    }

    /// Fails every request like an unreachable model API.
    pub fn failing(error: &str) -> (Self, LLMRecorder) {
        let (mut llm, recorder) = Self::new();
        llm.failure = Some(error.to_string());
        (llm, recorder)
    }
}

impl fmt::Debug for FakeLLM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeLLM").field("functions", &self.functions.len()).finish()
    }
}

impl fmt::Display for FakeLLM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FakeLLM")
    }
}

#[async_trait]
impl Processor for FakeLLM {
    fn name(&self) -> &str {
        "FakeLLM"
    }

    fn id(&self) -> u64 {
        3
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        let f = match frame {
            FrameEnum::LLMContext(f) => f,
            other => {
                ctx.send(other, direction);
                return;
            }
        };
        *self.context.lock().unwrap() = Some(f.context.clone());
        let turn = {
            let context = f.context.lock().await;
            context
                .messages()
                .iter()
                .rev()
                .find(|m| m["role"] == "user")
                .and_then(|m| m["content"].as_str())
                .unwrap_or_default()
                .to_string()
        };
        self.turns.lock().unwrap().push(turn.clone());
        if let Some(error) = &self.failure {
            ctx.send_upstream(ErrorFrame::new(error.clone(), true).into());
            return;
        }

        ctx.send_downstream(LLMFullResponseStartFrame::new().into());
        ctx.send_downstream(LLMTextFrame::new(format!("Reply to: {turn}")).into());
        let calls = if turn.to_lowercase().contains("goodbye") {
            vec![FunctionCallFromLLM {
                function_name: "terminate_call".into(),
                tool_call_id: "call_1".into(),
                arguments: json!({}),
            }]
        } else {
            Vec::new()
        };
        if !calls.is_empty() {
            ctx.send_downstream(FunctionCallsStartedFrame::new(calls.clone()).into());
        }
        ctx.send_downstream(LLMFullResponseEndFrame::new().into());
        self.functions
            .dispatch(calls, &f.context, &FrameQueue::from_context(ctx))
            .await;
    }
}

impl AIService for FakeLLM {
    fn model(&self) -> Option<&str> {
        Some("fake")
    }
}

impl LLMService for FakeLLM {
    fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }
}

/// Marks every LLM token as spoken text.
#[derive(Debug, Default)]
pub struct FakeTTS;

impl fmt::Display for FakeTTS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FakeTTS")
    }
}

#[async_trait]
impl Processor for FakeTTS {
    fn name(&self) -> &str {
        "FakeTTS"
    }

    fn id(&self) -> u64 {
        4
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            FrameEnum::LLMText(t) => ctx.send(TextFrame::spoken(t.text).into(), direction),
            other => ctx.send(other, direction),
        }
    }
}

/// Fails every sentence like an unreachable synthesis API.
#[derive(Debug)]
pub struct FailingTTS {
    pub error: String,
}

impl fmt::Display for FailingTTS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FailingTTS")
    }
}

#[async_trait]
impl Processor for FailingTTS {
    fn name(&self) -> &str {
        "FailingTTS"
    }

    fn id(&self) -> u64 {
        5
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            FrameEnum::LLMText(_) => ctx.send_upstream(ErrorFrame::new(self.error.clone(), true).into()),
            other => ctx.send(other, direction),
        }
    }
}
