// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Pipeline task: runs a [`ChannelPipeline`] from `StartFrame` to its end.
//!
//! A call ends exactly once. The first termination request wins, whether it
//! comes from [`PipelineTaskHandle::end`], [`PipelineTaskHandle::cancel`],
//! an upstream `EndTaskFrame` / `CancelTaskFrame`, or a fatal `ErrorFrame`.
//! Later requests are logged and ignored.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;

use crate::frames::{CancelFrame, EndFrame, FrameEnum, StartFrame};
use crate::pipeline::ChannelPipeline;
use crate::processors::Processor;

/// Parameters applied to the `StartFrame`.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub allow_interruptions: bool,
    pub audio_in_sample_rate: u32,
    pub audio_out_sample_rate: u32,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            allow_interruptions: true,
            audio_in_sample_rate: 16000,
            audio_out_sample_rate: 16000,
        }
    }
}

/// Why a pipeline task stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Graceful end: queued frames drained before the task stopped.
    Ended(Option<String>),
    /// Immediate cancellation.
    Cancelled(Option<String>),
    /// A fatal error frame reached the pipeline head.
    Fatal(String),
    /// The pipeline's channels closed without a termination request.
    Closed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ended(Some(r)) => write!(f, "ended: {r}"),
            Self::Ended(None) => write!(f, "ended"),
            Self::Cancelled(Some(r)) => write!(f, "cancelled: {r}"),
            Self::Cancelled(None) => write!(f, "cancelled"),
            Self::Fatal(e) => write!(f, "fatal error: {e}"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug)]
enum TaskCommand {
    End,
    Cancel,
}

struct HandleInner {
    stop: OnceLock<StopReason>,
    commands: mpsc::UnboundedSender<TaskCommand>,
}

/// Cloneable control handle for a running [`PipelineTask`].
#[derive(Clone)]
pub struct PipelineTaskHandle {
    inner: Arc<HandleInner>,
}

impl PipelineTaskHandle {
    /// Request a graceful end. `EndFrame` is queued behind pending frames.
    /// Returns `false` if the task was already terminating.
    pub fn end(&self, reason: Option<String>) -> bool {
        self.request(StopReason::Ended(reason), TaskCommand::End)
    }

    /// Request immediate cancellation. Returns `false` if the task was
    /// already terminating.
    pub fn cancel(&self, reason: Option<String>) -> bool {
        self.request(StopReason::Cancelled(reason), TaskCommand::Cancel)
    }

    fn fatal(&self, error: String) -> bool {
        self.request(StopReason::Fatal(error), TaskCommand::Cancel)
    }

    fn request(&self, reason: StopReason, command: TaskCommand) -> bool {
        if let Err(rejected) = self.inner.stop.set(reason) {
            tracing::debug!(
                requested = %rejected,
                current = ?self.inner.stop.get(),
                "PipelineTask: termination already requested, ignoring"
            );
            return false;
        }
        tracing::info!(command = ?command, "PipelineTask: termination requested");
        if self.inner.commands.send(command).is_err() {
            tracing::debug!("PipelineTask: task already finished");
        }
        true
    }

    /// True once any termination request has been accepted.
    pub fn is_terminating(&self) -> bool {
        self.inner.stop.get().is_some()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.inner.stop.get().cloned()
    }
}

impl fmt::Debug for PipelineTaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineTaskHandle")
            .field("stop", &self.inner.stop.get())
            .finish()
    }
}

/// Owns a pipeline and drives it until a terminal frame leaves the tail.
pub struct PipelineTask {
    pipeline: ChannelPipeline,
    params: PipelineParams,
    handle: PipelineTaskHandle,
    commands: mpsc::UnboundedReceiver<TaskCommand>,
}

impl PipelineTask {
    pub fn new(processors: Vec<Box<dyn Processor>>, params: PipelineParams) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            pipeline: ChannelPipeline::new(processors),
            params,
            handle: PipelineTaskHandle {
                inner: Arc::new(HandleInner {
                    stop: OnceLock::new(),
                    commands: tx,
                }),
            },
            commands: rx,
        }
    }

    pub fn handle(&self) -> PipelineTaskHandle {
        self.handle.clone()
    }

    /// Run until the pipeline ends, then shut every processor down.
    pub async fn run(mut self) -> StopReason {
        let (Some(mut output), Some(mut upstream)) = (self.pipeline.take_output(), self.pipeline.take_upstream())
        else {
            tracing::error!("PipelineTask: pipeline endpoints already taken");
            self.pipeline.shutdown().await;
            return StopReason::Closed;
        };

        self.pipeline
            .send(
                StartFrame::new(
                    self.params.audio_in_sample_rate,
                    self.params.audio_out_sample_rate,
                    self.params.allow_interruptions,
                )
                .into(),
            )
            .await;
        tracing::debug!("PipelineTask: started");

        loop {
            tokio::select! {
                biased;
                Some(command) = self.commands.recv() => {
                    let frame: FrameEnum = match command {
                        TaskCommand::End => EndFrame::new().into(),
                        TaskCommand::Cancel => CancelFrame::new(self.handle.stop_reason().map(|r| r.to_string())).into(),
                    };
                    tracing::debug!(frame = %frame, "PipelineTask: pushing terminal frame");
                    self.pipeline.send(frame).await;
                }
                Some(directed) = upstream.recv() => match directed.frame {
                    FrameEnum::EndTask(f) => {
                        self.handle.end(f.reason);
                    }
                    FrameEnum::CancelTask(f) => {
                        self.handle.cancel(f.reason);
                    }
                    FrameEnum::Error(f) if f.fatal => {
                        tracing::error!(error = %f.error, "PipelineTask: fatal error");
                        self.handle.fatal(f.error);
                    }
                    FrameEnum::Error(f) => {
                        tracing::warn!(error = %f.error, "PipelineTask: error");
                    }
                    other => tracing::trace!(frame = %other, "PipelineTask: upstream frame reached head"),
                },
                Some(directed) = output.recv() => {
                    if directed.frame.is_terminal() {
                        tracing::debug!(frame = %directed.frame, "PipelineTask: terminal frame reached tail");
                        break;
                    }
                    tracing::trace!(frame = %directed.frame, "PipelineTask: frame reached tail");
                }
                else => break,
            }
        }

        self.pipeline.shutdown().await;
        let reason = self.handle.stop_reason().unwrap_or(StopReason::Closed);
        tracing::info!(reason = %reason, "PipelineTask: finished");
        reason
    }
}
