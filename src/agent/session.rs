// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Call lifecycle.
//!
//! ```text
//!  Idle -> WaitingForJoin -(on_joined: dial)-> Dialing -(answered: capture)-> Active
//!                 \______________ participant left / dial-out error ______________\-> Terminated
//! ```
//!
//! Transport events are handled one at a time, in arrival order. Every
//! handler is a no-op once the call is terminated, and ending the call goes
//! through [`PipelineTaskHandle`], so concurrent termination triggers effect
//! a single shutdown.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AgentError;
use crate::pipeline::{PipelineTaskHandle, StopReason};
use crate::transports::{CallTransport, DialoutSettings, TransportEvent};
use crate::utils::events::{EventHandler, EventHandlers, HandlerFuture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Idle,
    WaitingForJoin,
    Dialing,
    Active,
    Terminated,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub final_state: CallState,
    pub reason: StopReason,
}

/// Shared per-call context handed to every event handler.
#[derive(Clone)]
pub struct CallFlow {
    transport: Arc<dyn CallTransport>,
    task: PipelineTaskHandle,
    dialout: DialoutSettings,
    state: Arc<Mutex<CallState>>,
    dialed: Arc<AtomicBool>,
    captured: Arc<AtomicBool>,
}

impl CallFlow {
    pub fn new(transport: Arc<dyn CallTransport>, task: PipelineTaskHandle, dialout: DialoutSettings) -> Self {
        Self {
            transport,
            task,
            dialout,
            state: Arc::new(Mutex::new(CallState::Idle)),
            dialed: Arc::new(AtomicBool::new(false)),
            captured: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> CallState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == CallState::Terminated
    }

    pub fn task(&self) -> &PipelineTaskHandle {
        &self.task
    }

    pub fn transport(&self) -> &Arc<dyn CallTransport> {
        &self.transport
    }

    /// Move to `next`. Terminated is sticky.
    pub fn transition(&self, next: CallState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == CallState::Terminated || *state == next {
            return;
        }
        tracing::debug!(from = %*state, to = %next, "call state");
        *state = next;
    }

    /// Ask the pipeline to stop now and mark the call terminated. Returns
    /// `false` if some other trigger already ended it.
    pub fn terminate(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let effected = self.task.cancel(Some(reason.clone()));
        if effected {
            tracing::info!(%reason, "cancelling call");
        } else {
            tracing::debug!(%reason, "call already terminating");
        }
        self.transition(CallState::Terminated);
        effected
    }

    /// Request the dial-out. Only the first request of a call is sent.
    pub async fn dial_out(&self) -> Result<(), AgentError> {
        if self.dialed.swap(true, Ordering::SeqCst) {
            tracing::debug!("dial-out already requested");
            return Ok(());
        }
        tracing::info!(phone_number = %self.dialout.phone_number, "dialing out");
        self.transition(CallState::Dialing);
        self.transport.start_dialout(&self.dialout).await?;
        Ok(())
    }

    /// Start transcribing the remote party. Only the first request of a call
    /// reaches the transport.
    pub async fn capture(&self, participant_id: &str) -> Result<(), AgentError> {
        if self.captured.swap(true, Ordering::SeqCst) {
            tracing::debug!(participant = %participant_id, "transcription already captured, ignoring");
            return Ok(());
        }
        self.transport.capture_participant_transcription(participant_id).await?;
        tracing::info!(participant = %participant_id, "capturing transcription");
        self.transition(CallState::Active);
        Ok(())
    }
}

impl fmt::Debug for CallFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFlow")
            .field("state", &self.state())
            .field("dialed", &self.dialed.load(Ordering::SeqCst))
            .field("captured", &self.captured.load(Ordering::SeqCst))
            .finish()
    }
}

pub type CallEventHandlers = EventHandlers<CallFlow, TransportEvent, AgentError>;

fn handler<F, Fut>(f: F) -> EventHandler<CallFlow, TransportEvent, AgentError>
where
    F: Fn(CallFlow, TransportEvent) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), AgentError>> + Send + 'static,
{
    Arc::new(move |flow: CallFlow, event: TransportEvent| -> HandlerFuture<AgentError> { Box::pin(f(flow, event)) })
}

async fn on_joined(flow: CallFlow, event: TransportEvent) -> Result<(), AgentError> {
    if let TransportEvent::Joined { room } = &event {
        tracing::info!(%room, "bot joined the room");
    }
    flow.dial_out().await
}

async fn on_dialout_connected(_flow: CallFlow, event: TransportEvent) -> Result<(), AgentError> {
    if let TransportEvent::DialoutConnected { session_id } = event {
        tracing::info!(?session_id, "dial-out connected");
    }
    Ok(())
}

async fn on_answered(flow: CallFlow, event: TransportEvent) -> Result<(), AgentError> {
    match event {
        TransportEvent::DialoutAnswered { participant_id } => {
            tracing::info!(participant = %participant_id, "dial-out answered");
            flow.capture(&participant_id).await
        }
        TransportEvent::FirstParticipantJoined { participant_id } => {
            tracing::info!(participant = %participant_id, "first participant joined");
            flow.capture(&participant_id).await
        }
        _ => Ok(()),
    }
}

async fn on_dialout_error(flow: CallFlow, event: TransportEvent) -> Result<(), AgentError> {
    if let TransportEvent::DialoutError { error } = event {
        tracing::error!(%error, "dial-out failed");
        flow.terminate(format!("dial-out error: {error}"));
    }
    Ok(())
}

async fn on_participant_left(flow: CallFlow, event: TransportEvent) -> Result<(), AgentError> {
    if let TransportEvent::ParticipantLeft { participant_id, reason } = event {
        tracing::info!(participant = %participant_id, ?reason, "participant left");
        flow.terminate("participant left");
    }
    Ok(())
}

/// The call's event table.
pub fn call_event_handlers() -> CallEventHandlers {
    let mut handlers = CallEventHandlers::new("CallSession");
    for name in TransportEvent::HANDLER_NAMES {
        handlers.register_event(name);
    }
    handlers.add_event_handler("on_joined", handler(on_joined));
    handlers.add_event_handler("on_dialout_connected", handler(on_dialout_connected));
    handlers.add_event_handler("on_dialout_answered", handler(on_answered));
    handlers.add_event_handler("on_first_participant_joined", handler(on_answered));
    handlers.add_event_handler("on_dialout_error", handler(on_dialout_error));
    handlers.add_event_handler("on_participant_left", handler(on_participant_left));
    handlers
}

/// Drives one call: dispatches transport events until the pipeline task
/// finishes.
pub struct CallSession {
    flow: CallFlow,
    handlers: CallEventHandlers,
}

impl CallSession {
    pub fn new(flow: CallFlow) -> Self {
        Self {
            flow,
            handlers: call_event_handlers(),
        }
    }

    pub fn flow(&self) -> &CallFlow {
        &self.flow
    }

    /// Attach an extra handler, run after the built-in ones.
    pub fn add_event_handler(&mut self, event_name: &'static str, handler: EventHandler<CallFlow, TransportEvent, AgentError>) {
        self.handlers.add_event_handler(event_name, handler);
    }

    async fn dispatch(&self, event: TransportEvent) {
        let name = event.handler_name();
        if self.flow.is_terminated() {
            tracing::debug!(event = name, "call terminated, ignoring event");
            return;
        }
        tracing::debug!(event = name, state = %self.flow.state(), "transport event");
        if let Err(e) = self.handlers.call_event_handler(name, &self.flow, &event).await {
            tracing::error!(event = name, error = %e, "event handler failed");
            self.flow.terminate(format!("{name} failed: {e}"));
        }
    }

    /// Run until `task` finishes, then leave the room.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut task: JoinHandle<StopReason>,
    ) -> CallOutcome {
        let mut events_open = true;
        let reason = loop {
            tokio::select! {
                result = &mut task => break match result {
                    Ok(reason) => reason,
                    Err(e) => {
                        tracing::error!(error = %e, "pipeline task failed");
                        StopReason::Fatal(e.to_string())
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        events_open = false;
                        if !self.flow.is_terminated() {
                            tracing::warn!("transport event stream closed");
                            self.flow.terminate("transport event stream closed");
                        }
                    }
                },
            }
        };

        self.flow.transition(CallState::Terminated);
        if let Err(e) = self.flow.transport.leave().await {
            tracing::warn!(error = %e, "failed to leave the room");
        }
        tracing::info!(%reason, "call finished");
        CallOutcome {
            final_state: self.flow.state(),
            reason,
        }
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("flow", &self.flow)
            .field("handlers", &self.handlers)
            .finish()
    }
}
