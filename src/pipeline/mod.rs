// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Pipeline orchestration.
//!
//! [`ChannelPipeline`] runs each processor on its own tokio task with
//! priority channels; [`PipelineTask`] drives one pipeline through a call and
//! owns its termination.

pub mod channel;
pub mod task;

pub use channel::{priority_channel, ChannelPipeline, DirectedFrame, PriorityReceiver, PrioritySender};
pub use task::{PipelineParams, PipelineTask, PipelineTaskHandle, StopReason};
