// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Channel-based pipeline where each processor runs on its own tokio task.
//!
//! - **Priority lane**: system frames (start, cancel, interruption, task
//!   requests, errors) travel on an unbounded channel that is always polled
//!   first via `select! { biased; ... }`.
//! - **Data lane**: data and control frames share one bounded FIFO channel,
//!   sized by processor weight, so LLM tokens can never overtake
//!   `LLMFullResponseEnd` and `EndFrame` queues behind pending speech.
//! - **Interruptions**: when an `InterruptionFrame` reaches a processor its
//!   queued interruptible data frames are discarded. Heavy processors race
//!   `process()` against the priority lane and have their interruption token
//!   cancelled so long-running work stops early.
//! - **Panics**: a panicking processor emits a fatal `ErrorFrame` upstream
//!   and degrades to a pass-through so terminal frames still reach the tail.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::pin::pin;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::frames::{ErrorFrame, FrameEnum};
use crate::processors::{FrameDirection, Processor, ProcessorContext, ProcessorWeight};

/// Capacity of the pipeline's own output and upstream lanes.
const ENDPOINT_CAPACITY: usize = 64;

/// A frame tagged with its flow direction.
#[derive(Debug)]
pub struct DirectedFrame {
    pub frame: FrameEnum,
    pub direction: FrameDirection,
}

/// Sender half of a priority channel pair.
#[derive(Clone)]
pub struct PrioritySender {
    priority_tx: mpsc::UnboundedSender<DirectedFrame>,
    data_tx: mpsc::Sender<DirectedFrame>,
}

impl PrioritySender {
    /// Route a frame to the priority lane (system frames) or the data lane.
    /// Waits for room on the data lane.
    pub async fn send(&self, frame: FrameEnum, direction: FrameDirection) {
        let directed = DirectedFrame { frame, direction };
        if directed.frame.is_system_frame() {
            if self.priority_tx.send(directed).is_err() {
                tracing::warn!("PrioritySender: priority receiver dropped, frame lost");
            }
        } else if self.data_tx.send(directed).await.is_err() {
            tracing::warn!("PrioritySender: data receiver dropped, frame lost");
        }
    }
}

/// Receiver half of a priority channel pair.
pub struct PriorityReceiver {
    priority_rx: mpsc::UnboundedReceiver<DirectedFrame>,
    data_rx: mpsc::Receiver<DirectedFrame>,
}

impl PriorityReceiver {
    /// Next frame, preferring the priority lane.
    pub async fn recv(&mut self) -> Option<DirectedFrame> {
        tokio::select! {
            biased;
            Some(frame) = self.priority_rx.recv() => Some(frame),
            Some(frame) = self.data_rx.recv() => Some(frame),
            else => None,
        }
    }

    /// Next frame from the priority lane only.
    pub async fn recv_priority(&mut self) -> Option<DirectedFrame> {
        self.priority_rx.recv().await
    }

    /// Empty the data lane. Uninterruptible frames are returned in order,
    /// the rest are counted and dropped.
    pub fn drain_data_selective(&mut self) -> (Vec<DirectedFrame>, usize) {
        let mut preserved = Vec::new();
        let mut discarded = 0usize;
        while let Ok(directed) = self.data_rx.try_recv() {
            if directed.frame.is_uninterruptible() {
                preserved.push(directed);
            } else {
                discarded += 1;
            }
        }
        (preserved, discarded)
    }
}

/// Create a priority channel pair with the given data lane capacity.
pub fn priority_channel(data_capacity: usize) -> (PrioritySender, PriorityReceiver) {
    let (priority_tx, priority_rx) = mpsc::unbounded_channel();
    let (data_tx, data_rx) = mpsc::channel(data_capacity);
    (
        PrioritySender {
            priority_tx,
            data_tx,
        },
        PriorityReceiver {
            priority_rx,
            data_rx,
        },
    )
}

/// A pipeline where each processor runs on its own tokio task.
///
/// ```text
/// input --> [proc 0] --> [proc 1] --> ... --> [proc N-1] --> output
///  upstream <--'            <--'                  <--'
/// ```
pub struct ChannelPipeline {
    input_tx: PrioritySender,
    output_rx: Option<PriorityReceiver>,
    upstream_rx: Option<PriorityReceiver>,
    join_set: JoinSet<()>,
    cancel_token: CancellationToken,
}

impl ChannelPipeline {
    /// Spawn one task per processor and wire adjacent processors together.
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        let cancel_token = CancellationToken::new();
        let mut join_set = JoinSet::new();

        if processors.is_empty() {
            let (input_tx, output_rx) = priority_channel(ENDPOINT_CAPACITY);
            // Nothing can send upstream; the receiver reports closed.
            let (_, upstream_rx) = priority_channel(1);
            return Self {
                input_tx,
                output_rx: Some(output_rx),
                upstream_rx: Some(upstream_rx),
                join_set,
                cancel_token,
            };
        }

        // Downstream lane i feeds processor i; the last lane is the output.
        let mut down: Vec<(PrioritySender, Option<PriorityReceiver>)> = processors
            .iter()
            .map(|p| p.weight().data_lane_capacity())
            .chain(std::iter::once(ENDPOINT_CAPACITY))
            .map(|cap| {
                let (tx, rx) = priority_channel(cap);
                (tx, Some(rx))
            })
            .collect();
        // Upstream lane i + 1 feeds processor i; lane 0 is the pipeline head.
        let mut up: Vec<(PrioritySender, Option<PriorityReceiver>)> = (0..=processors.len())
            .map(|_| {
                let (tx, rx) = priority_channel(ENDPOINT_CAPACITY);
                (tx, Some(rx))
            })
            .collect();

        let input_tx = down[0].0.clone();
        let output_rx = down.last_mut().and_then(|(_, rx)| rx.take());
        let upstream_rx = up[0].1.take();

        for (i, processor) in processors.into_iter().enumerate() {
            let (Some(down_rx), Some(up_rx)) = (down[i].1.take(), up[i + 1].1.take()) else {
                tracing::error!(index = i, "ChannelPipeline: lane already taken");
                continue;
            };
            let links = Links {
                down_rx,
                up_rx,
                downstream_tx: down[i + 1].0.clone(),
                upstream_tx: up[i].0.clone(),
            };
            join_set.spawn(run_processor(processor, links, cancel_token.clone()));
        }

        Self {
            input_tx,
            output_rx,
            upstream_rx,
            join_set,
            cancel_token,
        }
    }

    pub fn input(&self) -> &PrioritySender {
        &self.input_tx
    }

    /// Take the receiver for frames leaving the last processor. Once only.
    pub fn take_output(&mut self) -> Option<PriorityReceiver> {
        self.output_rx.take()
    }

    /// Take the receiver for frames the first processor sent upstream. Once only.
    pub fn take_upstream(&mut self) -> Option<PriorityReceiver> {
        self.upstream_rx.take()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Send a frame downstream into the first processor.
    pub async fn send(&self, frame: FrameEnum) {
        self.input_tx.send(frame, FrameDirection::Downstream).await;
    }

    /// Stop every processor task and wait for their cleanup.
    pub async fn shutdown(mut self) {
        drop(self.input_tx);
        self.cancel_token.cancel();
        while let Some(result) = self.join_set.join_next().await {
            if let Err(e) = result {
                tracing::error!("ChannelPipeline: processor task failed during shutdown: {e}");
            }
        }
    }
}

/// Channels connecting one processor task to its neighbours.
struct Links {
    down_rx: PriorityReceiver,
    up_rx: PriorityReceiver,
    downstream_tx: PrioritySender,
    upstream_tx: PrioritySender,
}

enum Dispatch {
    Completed,
    /// An interruption (or cancellation) frame arrived during `process()`.
    Preempted(DirectedFrame),
    Cancelled,
    Panicked(String),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Processor task body.
async fn run_processor(mut processor: Box<dyn Processor>, links: Links, token: CancellationToken) {
    let Links {
        mut down_rx,
        mut up_rx,
        downstream_tx,
        upstream_tx,
    } = links;

    let (ctx_down_tx, mut ctx_down_rx) = mpsc::unbounded_channel::<FrameEnum>();
    let (ctx_up_tx, mut ctx_up_rx) = mpsc::unbounded_channel::<FrameEnum>();
    let mut ctx = ProcessorContext::new(ctx_down_tx, ctx_up_tx, token.clone());

    let is_heavy = processor.weight() == ProcessorWeight::Heavy;
    let name = processor.name().to_string();
    let mut backlog: VecDeque<DirectedFrame> = VecDeque::new();
    let mut poisoned = false;

    processor.setup().await;
    tracing::debug!(processor = %name, weight = %processor.weight(), "Pipeline: processor started");

    loop {
        let directed = match backlog.pop_front() {
            Some(d) => d,
            None => tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(d) = down_rx.recv() => d,
                Some(d) = up_rx.recv() => d,
                Some(frame) = ctx_down_rx.recv() => {
                    downstream_tx.send(frame, FrameDirection::Downstream).await;
                    continue;
                }
                Some(frame) = ctx_up_rx.recv() => {
                    upstream_tx.send(frame, FrameDirection::Upstream).await;
                    continue;
                }
                else => break,
            },
        };

        if poisoned {
            match directed.direction {
                FrameDirection::Downstream => downstream_tx.send(directed.frame, directed.direction).await,
                FrameDirection::Upstream => upstream_tx.send(directed.frame, directed.direction).await,
            }
            continue;
        }

        if matches!(directed.frame, FrameEnum::Interruption(_)) {
            let (preserved, discarded) = down_rx.drain_data_selective();
            if discarded > 0 {
                tracing::debug!(
                    processor = %name,
                    discarded,
                    preserved = preserved.len(),
                    "Pipeline: drained stale data frames"
                );
            }
            backlog.extend(preserved);
        }

        tracing::trace!(
            processor = %name,
            frame = %directed.frame,
            direction = ?directed.direction,
            "Pipeline: dispatching"
        );

        let mut buffered_priority: Vec<DirectedFrame> = Vec::new();
        let outcome = if is_heavy {
            let interrupt_token = CancellationToken::new();
            ctx.set_interruption_token(interrupt_token.clone());
            let mut process_fut =
                pin!(AssertUnwindSafe(processor.process(directed.frame, directed.direction, &ctx)).catch_unwind());
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break Dispatch::Cancelled,
                    result = &mut process_fut => {
                        break match result {
                            Ok(()) => Dispatch::Completed,
                            Err(payload) => Dispatch::Panicked(panic_message(payload)),
                        };
                    }
                    Some(pf) = down_rx.recv_priority() => {
                        if matches!(pf.frame, FrameEnum::Interruption(_) | FrameEnum::Cancel(_)) {
                            tracing::debug!(processor = %name, frame = %pf.frame, "Pipeline: preempting running process()");
                            interrupt_token.cancel();
                            let result = process_fut.await;
                            break match result {
                                Ok(()) => Dispatch::Preempted(pf),
                                Err(payload) => Dispatch::Panicked(panic_message(payload)),
                            };
                        }
                        buffered_priority.push(pf);
                    }
                    // Stream output while the call is still producing it.
                    Some(frame) = ctx_down_rx.recv() => {
                        downstream_tx.send(frame, FrameDirection::Downstream).await;
                    }
                    Some(frame) = ctx_up_rx.recv() => {
                        upstream_tx.send(frame, FrameDirection::Upstream).await;
                    }
                }
            }
        } else {
            match AssertUnwindSafe(processor.process(directed.frame, directed.direction, &ctx))
                .catch_unwind()
                .await
            {
                Ok(()) => Dispatch::Completed,
                Err(payload) => Dispatch::Panicked(panic_message(payload)),
            }
        };

        match outcome {
            Dispatch::Cancelled => break,
            Dispatch::Panicked(msg) => {
                tracing::error!(processor = %name, "Processor panicked: {msg}");
                upstream_tx
                    .send(
                        ErrorFrame::new(format!("Processor {name} panicked: {msg}"), true).into(),
                        FrameDirection::Upstream,
                    )
                    .await;
                poisoned = true;
            }
            Dispatch::Preempted(frame) => {
                let mut dropped = 0usize;
                while let Ok(out) = ctx_down_rx.try_recv() {
                    if out.is_uninterruptible() || out.is_system_frame() {
                        downstream_tx.send(out, FrameDirection::Downstream).await;
                    } else {
                        dropped += 1;
                    }
                }
                if dropped > 0 {
                    tracing::debug!(processor = %name, dropped, "Pipeline: dropped output of preempted process()");
                }
                ctx.set_interruption_token(CancellationToken::new());
                for pf in buffered_priority.drain(..).rev() {
                    backlog.push_front(pf);
                }
                backlog.push_front(frame);
            }
            Dispatch::Completed => {
                for pf in buffered_priority.drain(..).rev() {
                    backlog.push_front(pf);
                }
            }
        }

        // Forward everything produced by this frame before taking the next.
        while let Ok(frame) = ctx_down_rx.try_recv() {
            downstream_tx.send(frame, FrameDirection::Downstream).await;
        }
        while let Ok(frame) = ctx_up_rx.try_recv() {
            upstream_tx.send(frame, FrameDirection::Upstream).await;
        }
    }

    processor.cleanup().await;
    tracing::debug!(processor = %name, "Pipeline: processor stopped");
}
