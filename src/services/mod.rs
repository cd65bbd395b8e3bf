// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Hosted AI services used by the call: Gemini for language, ElevenLabs
//! for speech.

pub mod elevenlabs;
pub mod google;
pub mod llm;
pub mod shared;

pub use elevenlabs::ElevenLabsTTSService;
pub use google::GoogleLLMService;
pub use llm::{FrameQueue, FunctionCallParams, FunctionHandler, FunctionRegistry};

use crate::processors::Processor;

/// A pipeline stage backed by a hosted model.
pub trait AIService: Processor {
    fn model(&self) -> Option<&str> {
        None
    }
}

/// A language model stage that can run registered functions.
pub trait LLMService: AIService {
    fn functions_mut(&mut self) -> &mut FunctionRegistry;

    fn register_function(&mut self, name: &str, handler: FunctionHandler) {
        self.functions_mut().register(name, handler);
    }
}
