// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Common re-exports.
//!
//! ```
//! use get_money_agent::prelude::*;
//! ```

pub use std::sync::Arc;

pub use crate::adapters::schemas::{FunctionSchema, ToolsSchema};
pub use crate::agent::{Agent, CallOutcome, CallParameters, CallParametersBuilder, CallParametersError, CallState};
pub use crate::config::{AgentConfig, ConfigError};
pub use crate::error::AgentError;
pub use crate::frames::{
    CancelFrame, EndFrame, EndTaskFrame, ErrorFrame, FrameEnum, FrameKind, InputAudioRawFrame,
    InterimTranscriptionFrame, InterruptionFrame, LLMContextFrame, LLMFullResponseEndFrame,
    LLMFullResponseStartFrame, LLMTextFrame, OutputAudioRawFrame, StartFrame, TTSStartedFrame, TTSStoppedFrame,
    TextFrame, TranscriptionFrame, UserStartedSpeakingFrame, UserStoppedSpeakingFrame,
};
pub use crate::pipeline::{ChannelPipeline, PipelineParams, PipelineTask, PipelineTaskHandle, StopReason};
pub use crate::processors::aggregators::{LLMContext, LLMContextAggregatorPair, SharedContext};
pub use crate::processors::{FrameDirection, Processor, ProcessorContext, ProcessorWeight};
pub use crate::prompt::{build_system_prompt, TemplateError};
pub use crate::services::{
    AIService, ElevenLabsTTSService, FunctionCallParams, FunctionHandler, GoogleLLMService, LLMService,
};
pub use crate::transports::{
    CallTransport, DailyMediaBridge, DailyParams, DailyTransport, DialoutSettings, MediaEvent, OutboundMedia,
    TransportError, TransportEvent, VADParams,
};
