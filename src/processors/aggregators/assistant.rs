// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Assistant turn aggregation.
//!
//! Sits after the transport output, so it only records what was actually
//! handed to the call. Spoken text between `LLMFullResponseStartFrame` and
//! `LLMFullResponseEndFrame` becomes one `assistant` message. Function calls
//! and their results are recorded as `tool_calls` / `tool` messages.

use std::fmt;

use async_trait::async_trait;

use crate::frames::{FrameEnum, LLMContextFrame};
use crate::impl_name_display;
use crate::processors::{FrameDirection, Processor, ProcessorContext};
use crate::utils::obj_id;

use super::llm_context::SharedContext;

pub struct LLMAssistantAggregator {
    id: u64,
    name: String,
    context: SharedContext,
    aggregation: String,
    /// Nesting depth of response start/end frames.
    response_depth: u32,
}

impl LLMAssistantAggregator {
    pub fn new(context: SharedContext) -> Self {
        Self {
            id: obj_id(),
            name: "LLMAssistantAggregator".to_string(),
            context,
            aggregation: String::new(),
            response_depth: 0,
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    async fn push_aggregation(&mut self) {
        let text = std::mem::take(&mut self.aggregation);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.context.lock().await.add_assistant_message(text);
        tracing::debug!(processor = %self.name, text, "assistant turn committed");
    }
}

impl fmt::Debug for LLMAssistantAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMAssistantAggregator")
            .field("id", &self.id)
            .field("response_depth", &self.response_depth)
            .field("aggregation_len", &self.aggregation.len())
            .finish()
    }
}

impl_name_display!(LLMAssistantAggregator);

#[async_trait]
impl Processor for LLMAssistantAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            FrameEnum::LLMFullResponseStart(_) => {
                self.response_depth += 1;
            }
            FrameEnum::LLMFullResponseEnd(_) => {
                self.response_depth = self.response_depth.saturating_sub(1);
                if self.response_depth == 0 {
                    self.push_aggregation().await;
                }
            }
            FrameEnum::Text(t) => {
                if self.response_depth > 0 {
                    let text = t.text.trim();
                    if !text.is_empty() {
                        if !self.aggregation.is_empty() {
                            self.aggregation.push(' ');
                        }
                        self.aggregation.push_str(text);
                    }
                }
                ctx.send(t.into(), direction);
            }
            FrameEnum::Interruption(f) => {
                // Keep what was already spoken.
                self.push_aggregation().await;
                self.response_depth = 0;
                ctx.send(f.into(), direction);
            }
            FrameEnum::FunctionCallsStarted(f) => {
                self.context.lock().await.add_tool_calls(&f.function_calls);
                ctx.send(f.into(), direction);
            }
            FrameEnum::FunctionCallResult(result) => {
                {
                    let mut context = self.context.lock().await;
                    context.add_tool_result(&result.tool_call_id, &result.result);
                }
                tracing::debug!(
                    processor = %self.name,
                    function = %result.function_name,
                    run_llm = result.run_llm,
                    "function result recorded"
                );
                if result.run_llm {
                    ctx.send_upstream(LLMContextFrame::new(self.context.clone()).into());
                }
            }
            FrameEnum::LLMSetTools(f) => {
                self.context.lock().await.set_tools(f.tools.clone());
                ctx.send(f.into(), direction);
            }
            other => ctx.send(other, direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::frames::{
        FunctionCallFromLLM, FunctionCallResultFrame, FunctionCallsStartedFrame, InterruptionFrame,
        LLMFullResponseEndFrame, LLMFullResponseStartFrame, TextFrame,
    };
    use crate::processors::aggregators::llm_context::LLMContext;

    struct Harness {
        agg: LLMAssistantAggregator,
        ctx: ProcessorContext,
        down: mpsc::UnboundedReceiver<FrameEnum>,
        up: mpsc::UnboundedReceiver<FrameEnum>,
    }

    fn harness() -> Harness {
        let (tx, down) = mpsc::unbounded_channel();
        let (utx, up) = mpsc::unbounded_channel();
        Harness {
            agg: LLMAssistantAggregator::new(LLMContext::new().into_shared()),
            ctx: ProcessorContext::detached(tx, utx),
            down,
            up,
        }
    }

    impl Harness {
        async fn feed(&mut self, frame: FrameEnum) {
            self.agg.process(frame, FrameDirection::Downstream, &self.ctx).await;
        }
    }

    #[tokio::test]
    async fn spoken_sentences_become_one_message() {
        let mut h = harness();
        h.feed(LLMFullResponseStartFrame::new().into()).await;
        h.feed(TextFrame::spoken("Hi, I'm calling for Jane Doe.").into()).await;
        h.feed(TextFrame::spoken("She is owed a refund.").into()).await;
        h.feed(LLMFullResponseEndFrame::new().into()).await;

        let context = h.agg.context().lock().await;
        assert_eq!(context.message_count(), 1);
        assert_eq!(context.messages()[0]["role"], "assistant");
        assert_eq!(
            context.messages()[0]["content"],
            "Hi, I'm calling for Jane Doe. She is owed a refund."
        );
        drop(context);
        assert!(matches!(h.down.try_recv(), Ok(FrameEnum::Text(_))));
    }

    #[tokio::test]
    async fn interruption_keeps_spoken_part() {
        let mut h = harness();
        h.feed(LLMFullResponseStartFrame::new().into()).await;
        h.feed(TextFrame::spoken("First sentence.").into()).await;
        h.feed(InterruptionFrame::new().into()).await;
        h.feed(LLMFullResponseEndFrame::new().into()).await;

        let context = h.agg.context().lock().await;
        assert_eq!(context.message_count(), 1);
        assert_eq!(context.messages()[0]["content"], "First sentence.");
    }

    #[tokio::test]
    async fn text_outside_response_is_not_recorded() {
        let mut h = harness();
        h.feed(TextFrame::new("stray").into()).await;
        assert!(h.agg.context().lock().await.is_empty());
    }

    #[tokio::test]
    async fn function_result_with_run_llm_retriggers_upstream() {
        let mut h = harness();
        h.feed(
            FunctionCallsStartedFrame::new(vec![FunctionCallFromLLM {
                function_name: "lookup".into(),
                tool_call_id: "call_1".into(),
                arguments: json!({}),
            }])
            .into(),
        )
        .await;
        h.feed(FunctionCallResultFrame::new("lookup", "call_1", json!({}), json!({"ok": true}), true).into())
            .await;

        let context = h.agg.context().lock().await;
        assert_eq!(context.message_count(), 2);
        assert_eq!(context.messages()[1]["role"], "tool");
        assert_eq!(context.messages()[1]["tool_call_id"], "call_1");
        drop(context);
        assert!(matches!(h.up.try_recv(), Ok(FrameEnum::LLMContext(_))));
    }

    #[tokio::test]
    async fn function_result_without_run_llm_stays_quiet() {
        let mut h = harness();
        h.feed(FunctionCallResultFrame::new("f", "call_2", json!({}), serde_json::Value::Null, false).into())
            .await;
        assert!(h.up.try_recv().is_err());
    }
}
