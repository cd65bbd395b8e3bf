// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Tools the model may call during a call.

use std::fmt;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::adapters::schemas::{FunctionSchema, ToolsSchema};
use crate::frames::EndTaskFrame;
use crate::processors::FrameDirection;
use crate::services::{FunctionCallParams, FunctionHandler, LLMService};

pub const TERMINATE_CALL: &str = "terminate_call";

/// One row of the tool table: what the model sees and what runs.
#[derive(Clone)]
pub struct ToolEntry {
    pub schema: FunctionSchema,
    pub handler: FunctionHandler,
}

impl ToolEntry {
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEntry").field("name", &self.schema.name).finish()
    }
}

/// Ends the call gracefully: the `EndTaskFrame` travels upstream to the
/// pipeline task, whose `EndFrame` then queues behind any speech still in
/// flight.
fn terminate_call(params: FunctionCallParams) -> futures_util::future::BoxFuture<'static, ()> {
    async move {
        tracing::info!(tool_call_id = %params.tool_call_id, "model requested call termination");
        params.llm.queue_frame(
            EndTaskFrame::with_reason(TERMINATE_CALL).into(),
            FrameDirection::Upstream,
        );
    }
    .boxed()
}

/// The call's tool table.
pub fn call_tools() -> Vec<ToolEntry> {
    vec![ToolEntry {
        schema: FunctionSchema::new(TERMINATE_CALL, "Call this function to terminate the call."),
        handler: Arc::new(terminate_call),
    }]
}

pub fn tools_schema(tools: &[ToolEntry]) -> ToolsSchema {
    ToolsSchema::new(tools.iter().map(|t| t.schema.clone()).collect())
}

/// Register every handler of `tools` with `llm`.
pub fn register_tools<L: LLMService + ?Sized>(llm: &mut L, tools: &[ToolEntry]) {
    for tool in tools {
        llm.register_function(tool.name(), tool.handler.clone());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use super::*;
    use crate::frames::FrameEnum;
    use crate::processors::aggregators::LLMContext;
    use crate::services::FrameQueue;

    #[test]
    fn single_zero_argument_tool() {
        let tools = call_tools();
        assert_eq!(tools.len(), 1);
        let schema = tools_schema(&tools);
        let terminate = schema.get(TERMINATE_CALL).unwrap();
        assert_eq!(terminate.description, "Call this function to terminate the call.");
        assert_eq!(terminate.parameters()["properties"], json!({}));
        assert_eq!(
            terminate.parameters()["required"].as_array().map(Vec::len).unwrap_or(0),
            0
        );
    }

    #[tokio::test]
    async fn terminate_queues_end_task_upstream_without_result() {
        let (down_tx, mut down_rx) = mpsc::unbounded_channel();
        let (up_tx, mut up_rx) = mpsc::unbounded_channel();
        let params = FunctionCallParams {
            function_name: TERMINATE_CALL.into(),
            tool_call_id: "call_1".into(),
            arguments: Value::Object(Default::default()),
            context: LLMContext::new().into_shared(),
            llm: FrameQueue::new(down_tx, up_tx),
        };
        let handler = call_tools().remove(0).handler;
        handler(params).await;

        match up_rx.try_recv() {
            Ok(FrameEnum::EndTask(f)) => assert_eq!(f.reason.as_deref(), Some(TERMINATE_CALL)),
            other => panic!("expected EndTaskFrame, got {other:?}"),
        }
        assert!(down_rx.try_recv().is_err());
    }
}
