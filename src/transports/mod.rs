// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Call transports.
//!
//! A [`CallTransport`] supplies the two pipeline edges (input and output
//! processors), the room/telephony operations the call flow drives, and a
//! stream of [`TransportEvent`]s describing the call lifecycle.

pub mod daily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::processors::Processor;

pub use daily::{DailyMediaBridge, DailyRestClient, DailyTransport, MediaEvent, OutboundMedia};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("invalid room URL: {0}")]
    InvalidRoomUrl(String),
    #[error("transport is not joined")]
    NotJoined,
}

/// Where to dial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialoutSettings {
    pub phone_number: String,
}

impl DialoutSettings {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
        }
    }

    /// Request body for the dial-out endpoint.
    pub fn to_json(&self) -> Value {
        json!({ "phoneNumber": self.phone_number })
    }
}

/// Call lifecycle events raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Joined { room: String },
    DialoutConnected { session_id: Option<String> },
    /// The callee picked up. `participant_id` is the dial-out session id,
    /// which is the id transcription capture must target.
    DialoutAnswered { participant_id: String },
    DialoutError { error: String },
    FirstParticipantJoined { participant_id: String },
    ParticipantLeft { participant_id: String, reason: Option<String> },
}

impl TransportEvent {
    /// Every handler name, in declaration order.
    pub const HANDLER_NAMES: [&'static str; 6] = [
        "on_joined",
        "on_dialout_connected",
        "on_dialout_answered",
        "on_dialout_error",
        "on_first_participant_joined",
        "on_participant_left",
    ];

    pub fn handler_name(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "on_joined",
            Self::DialoutConnected { .. } => "on_dialout_connected",
            Self::DialoutAnswered { .. } => "on_dialout_answered",
            Self::DialoutError { .. } => "on_dialout_error",
            Self::FirstParticipantJoined { .. } => "on_first_participant_joined",
            Self::ParticipantLeft { .. } => "on_participant_left",
        }
    }
}

/// Voice activity detection tuning handed to the media plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VADParams {
    /// Silence before a turn is considered finished.
    pub stop_secs: f32,
    /// Speech before a turn is considered started.
    pub start_secs: f32,
    pub confidence: f32,
}

impl Default for VADParams {
    fn default() -> Self {
        Self {
            stop_secs: 0.2,
            start_secs: 0.2,
            confidence: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyParams {
    pub audio_in_enabled: bool,
    pub audio_out_enabled: bool,
    pub transcription_enabled: bool,
    pub vad_params: VADParams,
}

impl Default for DailyParams {
    fn default() -> Self {
        Self {
            audio_in_enabled: true,
            audio_out_enabled: true,
            transcription_enabled: true,
            vad_params: VADParams::default(),
        }
    }
}

/// The operations the call flow needs from a voice transport.
#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Pipeline head. Call once per pipeline.
    fn input(&self) -> Box<dyn Processor>;

    /// Pipeline edge that plays audio on the call. Call once per pipeline.
    fn output(&self) -> Box<dyn Processor>;

    async fn join(&self) -> Result<(), TransportError>;

    async fn leave(&self) -> Result<(), TransportError>;

    async fn start_dialout(&self, settings: &DialoutSettings) -> Result<(), TransportError>;

    /// Start forwarding transcriptions of `participant_id` into the pipeline.
    async fn capture_participant_transcription(&self, participant_id: &str) -> Result<(), TransportError>;

    /// Lifecycle event stream. Returns `None` once taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}
