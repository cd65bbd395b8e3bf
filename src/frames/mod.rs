// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Frame definitions for the call pipeline.
//!
//! Everything that moves through the pipeline is a frame. Frames flow
//! **downstream** (transport input towards transport output) or **upstream**
//! (errors and task requests travelling back towards the pipeline head).
//!
//! # Frame categories
//!
//! - **System**: delivered on the priority lane, never discarded by an
//!   interruption (start, cancel, errors, speaking events, task requests).
//! - **Data**: ordered content that an interruption may discard (text,
//!   audio, transcriptions, LLM context).
//! - **Control**: ordered signals such as end-of-pipeline and response
//!   boundaries.
//!
//! Some data/control frames are *uninterruptible* (see
//! [`FrameEnum::is_uninterruptible`]): `EndFrame` and function call results
//! must survive an interruption flush.

pub mod frame_enum;
pub use frame_enum::FrameEnum;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::processors::aggregators::llm_context::SharedContext;
use crate::utils::obj_id;

/// Categorizes a frame into one of the processing categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    System,
    Data,
    Control,
}

/// Common fields carried by every frame.
#[derive(Debug, Clone)]
pub struct FrameFields {
    pub id: u64,
    /// Presentation timestamp in nanoseconds, when known.
    pub pts: Option<u64>,
}

impl FrameFields {
    pub fn new() -> Self {
        Self {
            id: obj_id(),
            pts: None,
        }
    }
}

impl Default for FrameFields {
    fn default() -> Self {
        Self::new()
    }
}

/// PCM audio payload shared by the input and output audio frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRawData {
    /// 16-bit signed little-endian samples.
    pub audio: Vec<u8>,
    pub sample_rate: u32,
    pub num_channels: u32,
}

impl AudioRawData {
    pub fn new(audio: Vec<u8>, sample_rate: u32, num_channels: u32) -> Self {
        Self {
            audio,
            sample_rate,
            num_channels,
        }
    }

    /// Number of sample frames in the payload.
    pub fn num_frames(&self) -> usize {
        let bytes_per_frame = (self.num_channels as usize).saturating_mul(2);
        if bytes_per_frame == 0 {
            return 0;
        }
        self.audio.len() / bytes_per_frame
    }
}

/// A function call requested by the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallFromLLM {
    pub function_name: String,
    pub tool_call_id: String,
    pub arguments: serde_json::Value,
}

/// Declares a frame struct with no payload besides [`FrameFields`].
macro_rules! declare_simple_frame {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name {
            pub fields: FrameFields,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    fields: FrameFields::new(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.fields.id)
            }
        }
    };
}

// =========================================================================
// SYSTEM FRAMES
// =========================================================================

/// First frame pushed through a pipeline; carries the audio configuration.
#[derive(Debug)]
pub struct StartFrame {
    pub fields: FrameFields,
    pub audio_in_sample_rate: u32,
    pub audio_out_sample_rate: u32,
    pub allow_interruptions: bool,
}

impl StartFrame {
    pub fn new(audio_in_sample_rate: u32, audio_out_sample_rate: u32, allow_interruptions: bool) -> Self {
        Self {
            fields: FrameFields::new(),
            audio_in_sample_rate,
            audio_out_sample_rate,
            allow_interruptions,
        }
    }
}

impl Default for StartFrame {
    fn default() -> Self {
        Self::new(16000, 16000, true)
    }
}

impl fmt::Display for StartFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StartFrame(in: {}Hz, out: {}Hz, interruptions: {})",
            self.audio_in_sample_rate, self.audio_out_sample_rate, self.allow_interruptions
        )
    }
}

/// Immediate cancellation travelling downstream.
#[derive(Debug, Default)]
pub struct CancelFrame {
    pub fields: FrameFields,
    pub reason: Option<String>,
}

impl CancelFrame {
    pub fn new(reason: Option<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            reason,
        }
    }
}

impl fmt::Display for CancelFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancelFrame(reason: {:?})", self.reason)
    }
}

/// Error notification, usually sent upstream. A fatal error ends the call.
#[derive(Debug)]
pub struct ErrorFrame {
    pub fields: FrameFields,
    pub error: String,
    pub fatal: bool,
}

impl ErrorFrame {
    pub fn new(error: impl Into<String>, fatal: bool) -> Self {
        Self {
            fields: FrameFields::new(),
            error: error.into(),
            fatal,
        }
    }
}

impl fmt::Display for ErrorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorFrame(error: {}, fatal: {})", self.error, self.fatal)
    }
}

declare_simple_frame!(
    /// The remote party started talking over the bot.
    InterruptionFrame
);
declare_simple_frame!(
    /// The remote party started a turn (from the transport's VAD).
    UserStartedSpeakingFrame
);
declare_simple_frame!(
    /// The remote party finished a turn.
    UserStoppedSpeakingFrame
);
declare_simple_frame!(
    /// The transport started playing bot audio.
    BotStartedSpeakingFrame
);
declare_simple_frame!(
    /// The transport finished playing bot audio.
    BotStoppedSpeakingFrame
);

/// Audio captured from the call.
#[derive(Debug)]
pub struct InputAudioRawFrame {
    pub fields: FrameFields,
    pub audio: AudioRawData,
    pub participant_id: Option<String>,
}

impl InputAudioRawFrame {
    pub fn new(audio: Vec<u8>, sample_rate: u32, num_channels: u32) -> Self {
        Self {
            fields: FrameFields::new(),
            audio: AudioRawData::new(audio, sample_rate, num_channels),
            participant_id: None,
        }
    }
}

impl fmt::Display for InputAudioRawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InputAudioRawFrame(bytes: {}, rate: {})",
            self.audio.audio.len(),
            self.audio.sample_rate
        )
    }
}

/// Upstream request asking the pipeline task to end gracefully.
#[derive(Debug, Default)]
pub struct EndTaskFrame {
    pub fields: FrameFields,
    pub reason: Option<String>,
}

impl EndTaskFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            reason: Some(reason.into()),
        }
    }
}

impl fmt::Display for EndTaskFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndTaskFrame(reason: {:?})", self.reason)
    }
}

/// Upstream request asking the pipeline task to cancel immediately.
#[derive(Debug, Default)]
pub struct CancelTaskFrame {
    pub fields: FrameFields,
    pub reason: Option<String>,
}

impl CancelTaskFrame {
    pub fn new(reason: Option<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            reason,
        }
    }
}

impl fmt::Display for CancelTaskFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancelTaskFrame(reason: {:?})", self.reason)
    }
}

/// The LLM requested one or more function calls.
#[derive(Debug)]
pub struct FunctionCallsStartedFrame {
    pub fields: FrameFields,
    pub function_calls: Vec<FunctionCallFromLLM>,
}

impl FunctionCallsStartedFrame {
    pub fn new(function_calls: Vec<FunctionCallFromLLM>) -> Self {
        Self {
            fields: FrameFields::new(),
            function_calls,
        }
    }
}

impl fmt::Display for FunctionCallsStartedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .function_calls
            .iter()
            .map(|c| c.function_name.as_str())
            .collect();
        write!(f, "FunctionCallsStartedFrame({})", names.join(", "))
    }
}

// =========================================================================
// DATA FRAMES
// =========================================================================

/// A chunk of text. After TTS it carries the sentence that was spoken.
#[derive(Debug)]
pub struct TextFrame {
    pub fields: FrameFields,
    pub text: String,
    /// Set by TTS once the text has been synthesized.
    pub spoken: bool,
}

impl TextFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            text: text.into(),
            spoken: false,
        }
    }

    pub fn spoken(text: impl Into<String>) -> Self {
        Self {
            spoken: true,
            ..Self::new(text)
        }
    }
}

impl fmt::Display for TextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextFrame(text: [{}])", self.text)
    }
}

/// A token streamed by the LLM.
#[derive(Debug)]
pub struct LLMTextFrame {
    pub fields: FrameFields,
    pub text: String,
}

impl LLMTextFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            text: text.into(),
        }
    }
}

impl fmt::Display for LLMTextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LLMTextFrame(text: [{}])", self.text)
    }
}

/// Audio to be played on the call.
#[derive(Debug)]
pub struct OutputAudioRawFrame {
    pub fields: FrameFields,
    pub audio: AudioRawData,
}

impl OutputAudioRawFrame {
    pub fn new(audio: Vec<u8>, sample_rate: u32, num_channels: u32) -> Self {
        Self {
            fields: FrameFields::new(),
            audio: AudioRawData::new(audio, sample_rate, num_channels),
        }
    }
}

impl fmt::Display for OutputAudioRawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OutputAudioRawFrame(bytes: {}, rate: {})",
            self.audio.audio.len(),
            self.audio.sample_rate
        )
    }
}

/// Final transcription of remote speech.
#[derive(Debug)]
pub struct TranscriptionFrame {
    pub fields: FrameFields,
    pub text: String,
    pub user_id: String,
    pub timestamp: String,
}

impl TranscriptionFrame {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            text: text.into(),
            user_id: user_id.into(),
            timestamp: timestamp.into(),
        }
    }
}

impl fmt::Display for TranscriptionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TranscriptionFrame(user: {}, text: [{}])", self.user_id, self.text)
    }
}

/// Partial transcription; never added to the context.
#[derive(Debug)]
pub struct InterimTranscriptionFrame {
    pub fields: FrameFields,
    pub text: String,
    pub user_id: String,
}

impl InterimTranscriptionFrame {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            text: text.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for InterimTranscriptionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterimTranscriptionFrame(user: {}, text: [{}])", self.user_id, self.text)
    }
}

/// Requests an LLM turn over the shared conversation context.
#[derive(Debug)]
pub struct LLMContextFrame {
    pub fields: FrameFields,
    pub context: SharedContext,
}

impl LLMContextFrame {
    pub fn new(context: SharedContext) -> Self {
        Self {
            fields: FrameFields::new(),
            context,
        }
    }
}

impl fmt::Display for LLMContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LLMContextFrame#{}", self.fields.id)
    }
}

/// Replaces the tool definitions held in the shared context.
#[derive(Debug)]
pub struct LLMSetToolsFrame {
    pub fields: FrameFields,
    pub tools: crate::adapters::schemas::ToolsSchema,
}

impl LLMSetToolsFrame {
    pub fn new(tools: crate::adapters::schemas::ToolsSchema) -> Self {
        Self {
            fields: FrameFields::new(),
            tools,
        }
    }
}

impl fmt::Display for LLMSetToolsFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LLMSetToolsFrame(tools: {})", self.tools.len())
    }
}

/// Result of a function call, delivered back to the assistant aggregator.
#[derive(Debug)]
pub struct FunctionCallResultFrame {
    pub fields: FrameFields,
    pub function_name: String,
    pub tool_call_id: String,
    pub arguments: serde_json::Value,
    pub result: serde_json::Value,
    /// Whether the LLM should run again once the result is in the context.
    pub run_llm: bool,
}

impl FunctionCallResultFrame {
    pub fn new(
        function_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        arguments: serde_json::Value,
        result: serde_json::Value,
        run_llm: bool,
    ) -> Self {
        Self {
            fields: FrameFields::new(),
            function_name: function_name.into(),
            tool_call_id: tool_call_id.into(),
            arguments,
            result,
            run_llm,
        }
    }
}

impl fmt::Display for FunctionCallResultFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FunctionCallResultFrame(function: {}, tool_call_id: {})",
            self.function_name, self.tool_call_id
        )
    }
}

// =========================================================================
// CONTROL FRAMES
// =========================================================================

declare_simple_frame!(
    /// Graceful end of the pipeline. Queued behind pending data.
    EndFrame
);
declare_simple_frame!(
    /// Start of a complete LLM response.
    LLMFullResponseStartFrame
);
declare_simple_frame!(
    /// End of a complete LLM response.
    LLMFullResponseEndFrame
);

/// TTS began synthesizing an utterance.
#[derive(Debug, Default)]
pub struct TTSStartedFrame {
    pub fields: FrameFields,
    pub context_id: Option<String>,
}

impl TTSStartedFrame {
    pub fn new(context_id: Option<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            context_id,
        }
    }
}

impl fmt::Display for TTSStartedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TTSStartedFrame(context: {:?})", self.context_id)
    }
}

/// TTS finished an utterance.
#[derive(Debug, Default)]
pub struct TTSStoppedFrame {
    pub fields: FrameFields,
    pub context_id: Option<String>,
}

impl TTSStoppedFrame {
    pub fn new(context_id: Option<String>) -> Self {
        Self {
            fields: FrameFields::new(),
            context_id,
        }
    }
}

impl fmt::Display for TTSStoppedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TTSStoppedFrame(context: {:?})", self.context_id)
    }
}
