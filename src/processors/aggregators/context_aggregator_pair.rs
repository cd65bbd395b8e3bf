// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Paired user/assistant aggregators over one shared [`LLMContext`].
//!
//! ```
//! use get_money_agent::processors::aggregators::context_aggregator_pair::LLMContextAggregatorPair;
//! use get_money_agent::processors::aggregators::llm_context::LLMContext;
//!
//! let pair = LLMContextAggregatorPair::new(LLMContext::new());
//! let (user, assistant) = pair.into_parts();
//! // `user` goes right after transport input, `assistant` after transport output.
//! # drop((user, assistant));
//! ```

use super::assistant::LLMAssistantAggregator;
use super::llm_context::{LLMContext, SharedContext};
use super::user::LLMUserAggregator;

pub struct LLMContextAggregatorPair {
    pub context: SharedContext,
    pub user_aggregator: LLMUserAggregator,
    pub assistant_aggregator: LLMAssistantAggregator,
}

impl LLMContextAggregatorPair {
    pub fn new(context: LLMContext) -> Self {
        Self::from_shared(context.into_shared())
    }

    pub fn from_shared(context: SharedContext) -> Self {
        Self {
            user_aggregator: LLMUserAggregator::new(context.clone()),
            assistant_aggregator: LLMAssistantAggregator::new(context.clone()),
            context,
        }
    }

    pub fn into_parts(self) -> (LLMUserAggregator, LLMAssistantAggregator) {
        (self.user_aggregator, self.assistant_aggregator)
    }
}
