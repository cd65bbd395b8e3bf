// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Crate-level error type.

use crate::agent::CallParametersError;
use crate::config::ConfigError;
use crate::prompt::TemplateError;
use crate::transports::TransportError;

/// Errors that can stop a call from starting or end it early.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("prompt error: {0}")]
    Template(#[from] TemplateError),
    #[error("invalid call parameters: {0}")]
    Parameters(#[from] CallParametersError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("transport events already consumed")]
    EventsTaken,
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;
