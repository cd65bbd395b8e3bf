// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Conversation context and the aggregators that maintain it.

pub mod assistant;
pub mod context_aggregator_pair;
pub mod llm_context;
pub mod user;

pub use assistant::LLMAssistantAggregator;
pub use context_aggregator_pair::LLMContextAggregatorPair;
pub use llm_context::{LLMContext, SharedContext};
pub use user::LLMUserAggregator;
