// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Function calling support shared by LLM services.
//!
//! A [`FunctionRegistry`] maps function names to async handlers. When the
//! model requests a call the service builds a [`FunctionCallParams`] and
//! awaits the handler. Handlers push frames through the params' queue and
//! optionally report a result, which travels downstream as a
//! `FunctionCallResultFrame` to the assistant aggregator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::frames::{FrameEnum, FunctionCallFromLLM, FunctionCallResultFrame};
use crate::processors::aggregators::SharedContext;
use crate::processors::{FrameDirection, ProcessorContext};

/// Async function call handler.
pub type FunctionHandler = Arc<dyn Fn(FunctionCallParams) -> BoxFuture<'static, ()> + Send + Sync>;

/// Lets a handler push frames into the pipeline from the LLM's position.
#[derive(Clone)]
pub struct FrameQueue {
    downstream: mpsc::UnboundedSender<FrameEnum>,
    upstream: mpsc::UnboundedSender<FrameEnum>,
}

impl FrameQueue {
    pub fn new(downstream: mpsc::UnboundedSender<FrameEnum>, upstream: mpsc::UnboundedSender<FrameEnum>) -> Self {
        Self { downstream, upstream }
    }

    pub fn from_context(ctx: &ProcessorContext) -> Self {
        Self::new(ctx.downstream_sender(), ctx.upstream_sender())
    }

    pub fn queue_frame(&self, frame: FrameEnum, direction: FrameDirection) {
        let tx = match direction {
            FrameDirection::Downstream => &self.downstream,
            FrameDirection::Upstream => &self.upstream,
        };
        if tx.send(frame).is_err() {
            tracing::warn!(?direction, "FrameQueue: pipeline closed, frame lost");
        }
    }
}

impl fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("closed", &(self.downstream.is_closed() || self.upstream.is_closed()))
            .finish()
    }
}

/// Everything a handler gets for one function call.
#[derive(Debug, Clone)]
pub struct FunctionCallParams {
    pub function_name: String,
    pub tool_call_id: String,
    pub arguments: Value,
    pub context: SharedContext,
    pub llm: FrameQueue,
}

impl FunctionCallParams {
    /// Report the call's result. `run_llm` asks for another inference once
    /// the result is recorded in the context.
    pub fn result_callback(&self, result: Value, run_llm: bool) {
        self.llm.queue_frame(
            FunctionCallResultFrame::new(
                self.function_name.clone(),
                self.tool_call_id.clone(),
                self.arguments.clone(),
                result,
                run_llm,
            )
            .into(),
            FrameDirection::Downstream,
        );
    }
}

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, FunctionHandler>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A second registration under the same name
    /// replaces the first.
    pub fn register(&mut self, name: impl Into<String>, handler: FunctionHandler) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(function = %name, "replacing registered function handler");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handlers for `calls` in order. Unknown names are skipped.
    pub async fn dispatch(&self, calls: Vec<FunctionCallFromLLM>, context: &SharedContext, queue: &FrameQueue) {
        for call in calls {
            let Some(handler) = self.handlers.get(&call.function_name) else {
                tracing::warn!(function = %call.function_name, "model called an unregistered function");
                continue;
            };
            tracing::info!(function = %call.function_name, tool_call_id = %call.tool_call_id, "running function call");
            let params = FunctionCallParams {
                function_name: call.function_name,
                tool_call_id: call.tool_call_id,
                arguments: call.arguments,
                context: context.clone(),
                llm: queue.clone(),
            };
            handler(params).await;
        }
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}
