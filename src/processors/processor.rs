// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Processor trait with explicit context passing.
//!
//! A [`Processor`] receives one [`FrameEnum`] at a time and emits frames
//! through the [`ProcessorContext`] it is handed. Processors carry no base
//! struct; the pipeline owns the channels and the task that drives them.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::frames::FrameEnum;
use crate::processors::FrameDirection;

/// Computational cost of a processor. Sizes its inbound data lane and
/// decides whether `process()` is raced against interruptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessorWeight {
    /// Pass-through, filters, transport edges.
    Light,
    /// Aggregators and state machines.
    #[default]
    Standard,
    /// Network-bound work such as LLM inference and TTS synthesis.
    Heavy,
}

impl ProcessorWeight {
    /// Capacity of the bounded data lane feeding a processor of this weight.
    pub fn data_lane_capacity(self) -> usize {
        match self {
            Self::Light => 32,
            Self::Standard => 64,
            Self::Heavy => 128,
        }
    }
}

impl fmt::Display for ProcessorWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "Light"),
            Self::Standard => write!(f, "Standard"),
            Self::Heavy => write!(f, "Heavy"),
        }
    }
}

/// Context provided to processors during frame processing.
pub struct ProcessorContext {
    downstream_tx: mpsc::UnboundedSender<FrameEnum>,
    upstream_tx: mpsc::UnboundedSender<FrameEnum>,
    /// Cancelled when the pipeline shuts down.
    cancel_token: CancellationToken,
    /// Cancelled when an `InterruptionFrame` reaches this processor while
    /// `process()` is running. Replaced with a fresh token afterwards.
    interruption_token: CancellationToken,
}

impl ProcessorContext {
    pub fn new(
        downstream_tx: mpsc::UnboundedSender<FrameEnum>,
        upstream_tx: mpsc::UnboundedSender<FrameEnum>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            downstream_tx,
            upstream_tx,
            cancel_token,
            interruption_token: CancellationToken::new(),
        }
    }

    /// Context wired to two plain channels, for driving a processor by hand.
    pub fn detached(
        downstream_tx: mpsc::UnboundedSender<FrameEnum>,
        upstream_tx: mpsc::UnboundedSender<FrameEnum>,
    ) -> Self {
        Self::new(downstream_tx, upstream_tx, CancellationToken::new())
    }

    /// Send a frame downstream. Never blocks.
    pub fn send_downstream(&self, frame: FrameEnum) {
        if self.downstream_tx.send(frame).is_err() {
            tracing::warn!("ProcessorContext: downstream receiver dropped, frame lost");
        }
    }

    /// Send a frame upstream. Never blocks.
    pub fn send_upstream(&self, frame: FrameEnum) {
        if self.upstream_tx.send(frame).is_err() {
            tracing::warn!("ProcessorContext: upstream receiver dropped, frame lost");
        }
    }

    pub fn send(&self, frame: FrameEnum, direction: FrameDirection) {
        match direction {
            FrameDirection::Downstream => self.send_downstream(frame),
            FrameDirection::Upstream => self.send_upstream(frame),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Long-running `process()` calls (SSE streaming, TTS sockets) select on
    /// this token to stop early when the remote party barges in.
    pub fn interruption_token(&self) -> &CancellationToken {
        &self.interruption_token
    }

    pub fn is_interrupted(&self) -> bool {
        self.interruption_token.is_cancelled()
    }

    pub(crate) fn set_interruption_token(&mut self, token: CancellationToken) {
        self.interruption_token = token;
    }

    /// Clone of the downstream sender for background tasks (socket readers,
    /// media bridges) that push frames outside of `process()`.
    pub fn downstream_sender(&self) -> mpsc::UnboundedSender<FrameEnum> {
        self.downstream_tx.clone()
    }

    pub fn upstream_sender(&self) -> mpsc::UnboundedSender<FrameEnum> {
        self.upstream_tx.clone()
    }
}

impl fmt::Debug for ProcessorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorContext")
            .field("cancelled", &self.cancel_token.is_cancelled())
            .field("interrupted", &self.interruption_token.is_cancelled())
            .finish()
    }
}

/// A pipeline stage.
///
/// ```ignore
/// #[async_trait]
/// impl Processor for Passthrough {
///     fn name(&self) -> &str { "Passthrough" }
///     fn id(&self) -> u64 { self.id }
///
///     async fn process(&mut self, frame: FrameEnum, dir: FrameDirection, ctx: &ProcessorContext) {
///         ctx.send(frame, dir);
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync + fmt::Debug + fmt::Display {
    fn name(&self) -> &str;

    fn id(&self) -> u64;

    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Standard
    }

    /// Handle one frame. Frames the processor does not consume must be
    /// forwarded in their original direction.
    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext);

    /// Called once before the first frame.
    async fn setup(&mut self) {}

    /// Called once after the last frame.
    async fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{EndFrame, TextFrame};

    #[test]
    fn weight_default_and_capacity() {
        assert_eq!(ProcessorWeight::default(), ProcessorWeight::Standard);
        assert_eq!(ProcessorWeight::Light.data_lane_capacity(), 32);
        assert_eq!(ProcessorWeight::Standard.data_lane_capacity(), 64);
        assert_eq!(ProcessorWeight::Heavy.data_lane_capacity(), 128);
        assert_eq!(format!("{}", ProcessorWeight::Heavy), "Heavy");
    }

    #[tokio::test]
    async fn send_by_direction() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (utx, mut urx) = mpsc::unbounded_channel();
        let ctx = ProcessorContext::detached(tx, utx);

        ctx.send(FrameEnum::End(EndFrame::new()), FrameDirection::Downstream);
        ctx.send(TextFrame::new("up").into(), FrameDirection::Upstream);

        assert!(matches!(rx.recv().await.unwrap(), FrameEnum::End(_)));
        assert!(matches!(urx.recv().await.unwrap(), FrameEnum::Text(_)));
    }

    #[test]
    fn send_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (utx, _urx) = mpsc::unbounded_channel();
        let ctx = ProcessorContext::detached(tx, utx);
        drop(rx);
        ctx.send_downstream(EndFrame::new().into());
    }

    #[test]
    fn cancellation_and_interruption_tokens() {
        let (tx, _rx) = mpsc::unbounded_channel::<FrameEnum>();
        let (utx, _urx) = mpsc::unbounded_channel::<FrameEnum>();
        let cancel = CancellationToken::new();
        let mut ctx = ProcessorContext::new(tx, utx, cancel.clone());

        assert!(!ctx.is_cancelled());
        cancel.cancel();
        assert!(ctx.is_cancelled());

        ctx.interruption_token().clone().cancel();
        assert!(ctx.is_interrupted());
        ctx.set_interruption_token(CancellationToken::new());
        assert!(!ctx.is_interrupted());

        let debug = format!("{ctx:?}");
        assert!(debug.contains("interrupted"));
    }
}
