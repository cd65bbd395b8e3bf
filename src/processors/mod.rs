// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Frame processors.
//!
//! Processors are chained inside a [`ChannelPipeline`](crate::pipeline::ChannelPipeline).
//! Each one implements [`Processor`] and receives frames together with the
//! direction they are travelling in.

pub mod aggregators;
pub mod processor;

pub use processor::{Processor, ProcessorContext, ProcessorWeight};

/// Direction of frame flow in the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameDirection {
    /// Frames flowing from input to output.
    Downstream,
    /// Frames flowing back from output to input.
    Upstream,
}

impl FrameDirection {
    pub fn reverse(self) -> Self {
        match self {
            Self::Downstream => Self::Upstream,
            Self::Upstream => Self::Downstream,
        }
    }
}

/// Implement `Display` for a processor that keeps its name in a `name` field.
#[macro_export]
macro_rules! impl_name_display {
    ($struct_name:ident) => {
        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.name)
            }
        }
    };
}
