// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! User turn aggregation.
//!
//! Final transcriptions collected during a turn become one `user` message in
//! the shared context, followed by an `LLMContextFrame` that asks the LLM to
//! respond. The turn closes on `UserStoppedSpeakingFrame`; a transcription
//! that arrives while no turn is open (late STT results) is committed on its
//! own.

use std::fmt;

use async_trait::async_trait;

use crate::frames::{FrameEnum, LLMContextFrame};
use crate::impl_name_display;
use crate::processors::{FrameDirection, Processor, ProcessorContext, ProcessorWeight};
use crate::utils::obj_id;

use super::llm_context::SharedContext;

pub struct LLMUserAggregator {
    id: u64,
    name: String,
    context: SharedContext,
    aggregation: String,
    user_speaking: bool,
}

impl LLMUserAggregator {
    pub fn new(context: SharedContext) -> Self {
        Self {
            id: obj_id(),
            name: "LLMUserAggregator".to_string(),
            context,
            aggregation: String::new(),
            user_speaking: false,
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Text collected so far for the open turn.
    pub fn aggregation(&self) -> &str {
        &self.aggregation
    }

    async fn push_aggregation(&mut self, ctx: &ProcessorContext) {
        let text = std::mem::take(&mut self.aggregation);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.context.lock().await.add_user_message(text);
        tracing::debug!(processor = %self.name, text, "user turn committed");
        ctx.send_downstream(LLMContextFrame::new(self.context.clone()).into());
    }
}

impl fmt::Debug for LLMUserAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMUserAggregator")
            .field("id", &self.id)
            .field("user_speaking", &self.user_speaking)
            .field("aggregation_len", &self.aggregation.len())
            .finish()
    }
}

impl_name_display!(LLMUserAggregator);

#[async_trait]
impl Processor for LLMUserAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Standard
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            FrameEnum::UserStartedSpeaking(f) => {
                self.user_speaking = true;
                ctx.send(f.into(), direction);
            }
            FrameEnum::UserStoppedSpeaking(f) => {
                self.user_speaking = false;
                ctx.send(f.into(), direction);
                self.push_aggregation(ctx).await;
            }
            FrameEnum::Transcription(t) => {
                let text = t.text.trim();
                if !text.is_empty() {
                    if !self.aggregation.is_empty() {
                        self.aggregation.push(' ');
                    }
                    self.aggregation.push_str(text);
                }
                if !self.user_speaking {
                    self.push_aggregation(ctx).await;
                }
            }
            FrameEnum::InterimTranscription(_) => {}
            FrameEnum::LLMSetTools(f) => {
                self.context.lock().await.set_tools(f.tools.clone());
                ctx.send(f.into(), direction);
            }
            other => ctx.send(other, direction),
        }
    }
}
