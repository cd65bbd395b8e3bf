// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! The closed set of frames used by a call.
//!
//! Processors match on [`FrameEnum`] exhaustively instead of downcasting.

use std::fmt;

use super::*;

/// Generates the enum together with its accessors, `Display` and `From`
/// conversions so every variant is listed exactly once.
macro_rules! frame_enum {
    ($($(#[$meta:meta])* $variant:ident($frame:ident)),+ $(,)?) => {
        /// Concrete enum of all frame types in the pipeline.
        #[derive(Debug)]
        pub enum FrameEnum {
            $($(#[$meta])* $variant($frame),)+
        }

        impl FrameEnum {
            /// Common fields of the wrapped frame.
            pub fn fields(&self) -> &FrameFields {
                match self {
                    $(Self::$variant(f) => &f.fields,)+
                }
            }

            pub fn fields_mut(&mut self) -> &mut FrameFields {
                match self {
                    $(Self::$variant(f) => &mut f.fields,)+
                }
            }

            /// Static type name of the wrapped frame, e.g. `"TextFrame"`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => stringify!($frame),)+
                }
            }
        }

        impl fmt::Display for FrameEnum {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant(inner) => inner.fmt(f),)+
                }
            }
        }

        $(
            impl From<$frame> for FrameEnum {
                fn from(f: $frame) -> Self {
                    Self::$variant(f)
                }
            }
        )+
    };
}

frame_enum! {
    // ===================== SYSTEM FRAMES =====================
    /// Initial frame to start pipeline processing.
    Start(StartFrame),
    /// Pipeline cancellation.
    Cancel(CancelFrame),
    /// Error notification (may be fatal).
    Error(ErrorFrame),
    /// The remote party talked over the bot.
    Interruption(InterruptionFrame),
    UserStartedSpeaking(UserStartedSpeakingFrame),
    UserStoppedSpeaking(UserStoppedSpeakingFrame),
    BotStartedSpeaking(BotStartedSpeakingFrame),
    BotStoppedSpeaking(BotStoppedSpeakingFrame),
    /// Raw audio input from the transport.
    InputAudioRaw(InputAudioRawFrame),
    /// Graceful task closure request (upstream).
    EndTask(EndTaskFrame),
    /// Task cancellation request (upstream).
    CancelTask(CancelTaskFrame),
    FunctionCallsStarted(FunctionCallsStartedFrame),

    // ===================== DATA FRAMES =====================
    Text(TextFrame),
    LLMText(LLMTextFrame),
    /// Audio output for the transport.
    OutputAudioRaw(OutputAudioRawFrame),
    /// Final STT transcription.
    Transcription(TranscriptionFrame),
    /// Interim (partial) STT transcription.
    InterimTranscription(InterimTranscriptionFrame),
    /// Run the LLM over the shared context.
    LLMContext(LLMContextFrame),
    LLMSetTools(LLMSetToolsFrame),
    FunctionCallResult(FunctionCallResultFrame),

    // ===================== CONTROL FRAMES =====================
    /// Graceful end of the pipeline.
    End(EndFrame),
    LLMFullResponseStart(LLMFullResponseStartFrame),
    LLMFullResponseEnd(LLMFullResponseEndFrame),
    TTSStarted(TTSStartedFrame),
    TTSStopped(TTSStoppedFrame),
}

impl FrameEnum {
    pub fn id(&self) -> u64 {
        self.fields().id
    }

    /// Returns the frame kind (System, Data, or Control).
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Start(_)
            | Self::Cancel(_)
            | Self::Error(_)
            | Self::Interruption(_)
            | Self::UserStartedSpeaking(_)
            | Self::UserStoppedSpeaking(_)
            | Self::BotStartedSpeaking(_)
            | Self::BotStoppedSpeaking(_)
            | Self::InputAudioRaw(_)
            | Self::EndTask(_)
            | Self::CancelTask(_)
            | Self::FunctionCallsStarted(_) => FrameKind::System,

            Self::Text(_)
            | Self::LLMText(_)
            | Self::OutputAudioRaw(_)
            | Self::Transcription(_)
            | Self::InterimTranscription(_)
            | Self::LLMContext(_)
            | Self::LLMSetTools(_)
            | Self::FunctionCallResult(_) => FrameKind::Data,

            Self::End(_)
            | Self::LLMFullResponseStart(_)
            | Self::LLMFullResponseEnd(_)
            | Self::TTSStarted(_)
            | Self::TTSStopped(_) => FrameKind::Control,
        }
    }

    /// Returns true if this frame should not be discarded during interruptions.
    pub fn is_uninterruptible(&self) -> bool {
        matches!(
            self,
            Self::Start(_) | Self::End(_) | Self::FunctionCallResult(_)
        )
    }

    pub fn is_system_frame(&self) -> bool {
        self.kind() == FrameKind::System
    }

    pub fn is_data_frame(&self) -> bool {
        self.kind() == FrameKind::Data
    }

    pub fn is_control_frame(&self) -> bool {
        self.kind() == FrameKind::Control
    }

    /// True for the frames that terminate a pipeline run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End(_) | Self::Cancel(_))
    }
}
