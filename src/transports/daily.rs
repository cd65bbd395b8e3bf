// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Daily transport.
//!
//! The control plane (room lookup, dial-out, transcription) goes through the
//! Daily REST API. The media plane is supplied by the host through a
//! [`DailyMediaBridge`]: the host's WebRTC client pushes [`MediaEvent`]s in
//! and plays the [`OutboundMedia`] it receives.
//!
//! ```text
//!  host client --MediaEvent--> router --lifecycle--> TransportEvent stream
//!                                 '-----media-----> DailyInputProcessor --> pipeline
//!  host client <--OutboundMedia-- DailyOutputProcessor <-- pipeline
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::frames::{
    BotStartedSpeakingFrame, BotStoppedSpeakingFrame, FrameEnum, InputAudioRawFrame, InterimTranscriptionFrame,
    InterruptionFrame, TranscriptionFrame, UserStartedSpeakingFrame, UserStoppedSpeakingFrame,
};
use crate::impl_name_display;
use crate::processors::{FrameDirection, Processor, ProcessorContext, ProcessorWeight};
use crate::services::shared::http_client;
use crate::transports::{CallTransport, DailyParams, DialoutSettings, TransportError, TransportEvent};
use crate::utils::{now_iso8601, obj_id};

pub const DEFAULT_API_URL: &str = "https://api.daily.co/v1";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Room name from a room URL such as `https://acme.daily.co/support-line`.
pub fn room_name_from_url(room_url: &str) -> Result<String, TransportError> {
    let invalid = || TransportError::InvalidRoomUrl(room_url.to_string());
    let rest = room_url
        .strip_prefix("https://")
        .or_else(|| room_url.strip_prefix("http://"))
        .ok_or_else(invalid)?;
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    let (host, path) = path.split_once('/').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
        .ok_or_else(invalid)
}

// ---------------------------------------------------------------------------
// REST control plane
// ---------------------------------------------------------------------------

/// Minimal Daily REST client.
#[derive(Clone)]
pub struct DailyRestClient {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
}

impl DailyRestClient {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        let api_url = if api_url.is_empty() {
            DEFAULT_API_URL.to_string()
        } else {
            api_url.trim_end_matches('/').to_string()
        };
        Self {
            api_key: api_key.into(),
            api_url,
            client: http_client(Duration::from_secs(30)),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, TransportError> {
        let endpoint = format!("{}{}", self.api_url, path);
        tracing::debug!(%method, %endpoint, "Daily API request");
        let mut request = self.client.request(method, &endpoint).bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|source| TransportError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|source| TransportError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(TransportError::Api {
                endpoint,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    pub async fn get_room(&self, room_name: &str) -> Result<Value, TransportError> {
        self.request(Method::GET, &format!("/rooms/{room_name}"), None).await
    }

    pub async fn start_dialout(&self, room_name: &str, settings: &DialoutSettings) -> Result<Value, TransportError> {
        self.request(
            Method::POST,
            &format!("/rooms/{room_name}/dialOut/start"),
            Some(settings.to_json()),
        )
        .await
    }

    pub async fn start_transcription(&self, room_name: &str) -> Result<(), TransportError> {
        self.request(Method::POST, &format!("/rooms/{room_name}/transcription/start"), None)
            .await
            .map(|_| ())
    }

    pub async fn stop_transcription(&self, room_name: &str) -> Result<(), TransportError> {
        self.request(Method::POST, &format!("/rooms/{room_name}/transcription/stop"), None)
            .await
            .map(|_| ())
    }
}

impl fmt::Debug for DailyRestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyRestClient").field("api_url", &self.api_url).finish()
    }
}

// ---------------------------------------------------------------------------
// Media bridge
// ---------------------------------------------------------------------------

/// Everything the host's media client reports.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Audio {
        participant_id: String,
        audio: Vec<u8>,
        sample_rate: u32,
        num_channels: u32,
    },
    Transcript {
        participant_id: String,
        text: String,
        is_final: bool,
    },
    /// VAD detected the start of a remote turn.
    UserStartedSpeaking,
    UserStoppedSpeaking,
    ParticipantJoined {
        participant_id: String,
    },
    ParticipantLeft {
        participant_id: String,
        reason: Option<String>,
    },
    DialoutConnected {
        session_id: Option<String>,
    },
    /// Daily's `dialout-answered` event. The host sets `participant_id` to
    /// the event's `sessionId`; Daily keys the PSTN leg's transcription by it.
    DialoutAnswered {
        participant_id: String,
    },
    DialoutError {
        error: String,
    },
}

/// What the host's media client should play or do.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMedia {
    Audio {
        audio: Vec<u8>,
        sample_rate: u32,
        num_channels: u32,
    },
    /// Drop any audio queued for playback.
    Clear,
}

/// Host-side handle to a [`DailyTransport`]'s media plane.
#[derive(Clone)]
pub struct DailyMediaBridge {
    room_url: String,
    token: String,
    bot_name: String,
    params: DailyParams,
    inbound: mpsc::UnboundedSender<MediaEvent>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedReceiver<OutboundMedia>>>>,
}

impl DailyMediaBridge {
    pub fn room_url(&self) -> &str {
        &self.room_url
    }

    /// Meeting token the media client joins with.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn params(&self) -> &DailyParams {
        &self.params
    }

    /// Report an event from the media client. Returns `false` once the
    /// transport has left the room.
    pub fn push(&self, event: MediaEvent) -> bool {
        self.inbound.send(event).is_ok()
    }

    /// Receiver for audio to play. Once only.
    pub fn take_outbound(&self) -> Option<mpsc::UnboundedReceiver<OutboundMedia>> {
        lock(&self.outbound).take()
    }
}

impl fmt::Debug for DailyMediaBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyMediaBridge")
            .field("room_url", &self.room_url)
            .field("bot_name", &self.bot_name)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Daily room transport.
pub struct DailyTransport {
    room_url: String,
    room_name: String,
    bot_name: String,
    params: DailyParams,
    rest: DailyRestClient,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<MediaEvent>>>,
    media_tx: mpsc::UnboundedSender<MediaEvent>,
    media_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<MediaEvent>>>>,
    outbound_tx: mpsc::UnboundedSender<OutboundMedia>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    captured: Arc<Mutex<HashSet<String>>>,
    joined: AtomicBool,
    transcription_started: AtomicBool,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl DailyTransport {
    pub const DEFAULT_BOT_NAME: &'static str = "Get Money Bot";

    /// Build the transport and the bridge the host's media client drives.
    pub fn new(
        room_url: impl Into<String>,
        token: impl Into<String>,
        bot_name: impl Into<String>,
        params: DailyParams,
        rest: DailyRestClient,
    ) -> Result<(Self, DailyMediaBridge), TransportError> {
        let room_url = room_url.into();
        let room_name = room_name_from_url(&room_url)?;
        let bot_name = bot_name.into();

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let bridge = DailyMediaBridge {
            room_url: room_url.clone(),
            token: token.into(),
            bot_name: bot_name.clone(),
            params: params.clone(),
            inbound: inbound_tx,
            outbound: Arc::new(Mutex::new(Some(outbound_rx))),
        };
        let transport = Self {
            room_url,
            room_name,
            bot_name,
            params,
            rest,
            inbound: Mutex::new(Some(inbound_rx)),
            media_tx,
            media_rx: Arc::new(Mutex::new(Some(media_rx))),
            outbound_tx,
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: Mutex::new(Some(events_rx)),
            captured: Arc::new(Mutex::new(HashSet::new())),
            joined: AtomicBool::new(false),
            transcription_started: AtomicBool::new(false),
            router: Mutex::new(None),
        };
        Ok((transport, bridge))
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn room_url(&self) -> &str {
        &self.room_url
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    fn require_joined(&self) -> Result<(), TransportError> {
        if self.is_joined() {
            Ok(())
        } else {
            Err(TransportError::NotJoined)
        }
    }
}

impl fmt::Debug for DailyTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyTransport")
            .field("room_name", &self.room_name)
            .field("bot_name", &self.bot_name)
            .field("joined", &self.is_joined())
            .finish()
    }
}

/// Splits bridge events into lifecycle events and pipeline media.
async fn route_media(
    mut inbound: mpsc::UnboundedReceiver<MediaEvent>,
    media_tx: mpsc::UnboundedSender<MediaEvent>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    captured: Arc<Mutex<HashSet<String>>>,
) {
    let mut first_participant_seen = false;
    while let Some(event) = inbound.recv().await {
        let lifecycle = match event {
            MediaEvent::ParticipantJoined { participant_id } => {
                if first_participant_seen {
                    tracing::debug!(participant = %participant_id, "DailyTransport: participant joined");
                    continue;
                }
                first_participant_seen = true;
                TransportEvent::FirstParticipantJoined { participant_id }
            }
            MediaEvent::ParticipantLeft { participant_id, reason } => {
                TransportEvent::ParticipantLeft { participant_id, reason }
            }
            MediaEvent::DialoutConnected { session_id } => TransportEvent::DialoutConnected { session_id },
            MediaEvent::DialoutAnswered { participant_id } => TransportEvent::DialoutAnswered { participant_id },
            MediaEvent::DialoutError { error } => TransportEvent::DialoutError { error },
            MediaEvent::Transcript { ref participant_id, .. } if !lock(&captured).contains(participant_id) => {
                tracing::trace!(participant = %participant_id, "DailyTransport: transcript for uncaptured participant");
                continue;
            }
            media => {
                if media_tx.send(media).is_err() {
                    tracing::trace!("DailyTransport: input processor gone, media dropped");
                }
                continue;
            }
        };
        tracing::debug!(event = lifecycle.handler_name(), "DailyTransport: lifecycle event");
        if events_tx.send(lifecycle).is_err() {
            tracing::debug!("DailyTransport: event receiver dropped");
        }
    }
    tracing::debug!("DailyTransport: media bridge closed");
}

#[async_trait]
impl CallTransport for DailyTransport {
    fn input(&self) -> Box<dyn Processor> {
        Box::new(DailyInputProcessor::new(self.media_rx.clone(), self.params.clone()))
    }

    fn output(&self) -> Box<dyn Processor> {
        Box::new(DailyOutputProcessor::new(self.outbound_tx.clone(), self.params.audio_out_enabled))
    }

    async fn join(&self) -> Result<(), TransportError> {
        if self.is_joined() {
            return Ok(());
        }
        self.rest.get_room(&self.room_name).await?;

        let (Some(inbound), Some(events_tx)) = (lock(&self.inbound).take(), lock(&self.events_tx).take()) else {
            tracing::warn!(room = %self.room_name, "DailyTransport: already joined once");
            return Ok(());
        };
        // Handlers may dial out as soon as they see `Joined`.
        self.joined.store(true, Ordering::SeqCst);
        if events_tx
            .send(TransportEvent::Joined {
                room: self.room_name.clone(),
            })
            .is_err()
        {
            tracing::debug!("DailyTransport: event receiver dropped");
        }
        let router = tokio::spawn(route_media(inbound, self.media_tx.clone(), events_tx, self.captured.clone()));
        *lock(&self.router) = Some(router);
        tracing::info!(room = %self.room_name, bot = %self.bot_name, "DailyTransport: joined");
        Ok(())
    }

    async fn leave(&self) -> Result<(), TransportError> {
        if !self.joined.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(router) = lock(&self.router).take() {
            router.abort();
        }
        let result = if self.transcription_started.swap(false, Ordering::SeqCst) {
            self.rest.stop_transcription(&self.room_name).await
        } else {
            Ok(())
        };
        tracing::info!(room = %self.room_name, "DailyTransport: left");
        result
    }

    async fn start_dialout(&self, settings: &DialoutSettings) -> Result<(), TransportError> {
        self.require_joined()?;
        tracing::info!(room = %self.room_name, "DailyTransport: starting dial-out");
        self.rest.start_dialout(&self.room_name, settings).await?;
        Ok(())
    }

    async fn capture_participant_transcription(&self, participant_id: &str) -> Result<(), TransportError> {
        self.require_joined()?;
        if !lock(&self.captured).insert(participant_id.to_string()) {
            tracing::debug!(participant = %participant_id, "DailyTransport: already capturing");
            return Ok(());
        }
        if self.params.transcription_enabled && !self.transcription_started.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.rest.start_transcription(&self.room_name).await {
                self.transcription_started.store(false, Ordering::SeqCst);
                lock(&self.captured).remove(participant_id);
                return Err(e);
            }
        }
        tracing::info!(participant = %participant_id, "DailyTransport: capturing transcription");
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        lock(&self.events_rx).take()
    }
}

impl Drop for DailyTransport {
    fn drop(&mut self) {
        if let Some(router) = lock(&self.router).take() {
            router.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline edges
// ---------------------------------------------------------------------------

type SharedMediaReceiver = Arc<Mutex<Option<mpsc::UnboundedReceiver<MediaEvent>>>>;

/// Turns bridge media into frames.
fn media_to_frames(event: MediaEvent, allow_interruptions: bool, audio_in_enabled: bool) -> Vec<FrameEnum> {
    match event {
        MediaEvent::Audio {
            participant_id,
            audio,
            sample_rate,
            num_channels,
        } if audio_in_enabled => {
            let mut frame = InputAudioRawFrame::new(audio, sample_rate, num_channels);
            frame.participant_id = Some(participant_id);
            vec![frame.into()]
        }
        MediaEvent::Transcript {
            participant_id,
            text,
            is_final: true,
        } => vec![TranscriptionFrame::new(text, participant_id, now_iso8601()).into()],
        MediaEvent::Transcript {
            participant_id, text, ..
        } => vec![InterimTranscriptionFrame::new(text, participant_id).into()],
        MediaEvent::UserStartedSpeaking if allow_interruptions => {
            vec![UserStartedSpeakingFrame::new().into(), InterruptionFrame::new().into()]
        }
        MediaEvent::UserStartedSpeaking => vec![UserStartedSpeakingFrame::new().into()],
        MediaEvent::UserStoppedSpeaking => vec![UserStoppedSpeakingFrame::new().into()],
        _ => Vec::new(),
    }
}

/// Pipeline head: forwards bridge media once the pipeline has started.
pub struct DailyInputProcessor {
    id: u64,
    name: String,
    media_rx: SharedMediaReceiver,
    params: DailyParams,
    reader: Option<JoinHandle<()>>,
}

impl DailyInputProcessor {
    fn new(media_rx: SharedMediaReceiver, params: DailyParams) -> Self {
        Self {
            id: obj_id(),
            name: "DailyInputProcessor".to_string(),
            media_rx,
            params,
            reader: None,
        }
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl fmt::Debug for DailyInputProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyInputProcessor")
            .field("id", &self.id)
            .field("reading", &self.reader.is_some())
            .finish()
    }
}

impl_name_display!(DailyInputProcessor);

#[async_trait]
impl Processor for DailyInputProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Light
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            FrameEnum::Start(start) => {
                let allow_interruptions = start.allow_interruptions;
                ctx.send(start.into(), direction);
                let Some(mut media_rx) = lock(&self.media_rx).take() else {
                    tracing::warn!(processor = %self.name, "media already attached to another pipeline");
                    return;
                };
                let downstream = ctx.downstream_sender();
                let audio_in_enabled = self.params.audio_in_enabled;
                self.reader = Some(tokio::spawn(async move {
                    while let Some(event) = media_rx.recv().await {
                        for frame in media_to_frames(event, allow_interruptions, audio_in_enabled) {
                            if downstream.send(frame).is_err() {
                                return;
                            }
                        }
                    }
                }));
            }
            FrameEnum::End(_) | FrameEnum::Cancel(_) => {
                self.stop_reader();
                ctx.send(frame, direction);
            }
            other => ctx.send(other, direction),
        }
    }

    async fn cleanup(&mut self) {
        self.stop_reader();
    }
}

/// Plays synthesized audio through the bridge and passes everything else on.
pub struct DailyOutputProcessor {
    id: u64,
    name: String,
    outbound: mpsc::UnboundedSender<OutboundMedia>,
    audio_out_enabled: bool,
    speaking: bool,
}

impl DailyOutputProcessor {
    fn new(outbound: mpsc::UnboundedSender<OutboundMedia>, audio_out_enabled: bool) -> Self {
        Self {
            id: obj_id(),
            name: "DailyOutputProcessor".to_string(),
            outbound,
            audio_out_enabled,
            speaking: false,
        }
    }

    fn play(&self, media: OutboundMedia) {
        if self.outbound.send(media).is_err() {
            tracing::trace!(processor = %self.name, "no media client attached, output dropped");
        }
    }
}

impl fmt::Debug for DailyOutputProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyOutputProcessor")
            .field("id", &self.id)
            .field("speaking", &self.speaking)
            .finish()
    }
}

impl_name_display!(DailyOutputProcessor);

#[async_trait]
impl Processor for DailyOutputProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Light
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            FrameEnum::OutputAudioRaw(f) => {
                if !self.audio_out_enabled {
                    return;
                }
                if !self.speaking {
                    self.speaking = true;
                    ctx.send_upstream(BotStartedSpeakingFrame::new().into());
                }
                self.play(OutboundMedia::Audio {
                    audio: f.audio.audio,
                    sample_rate: f.audio.sample_rate,
                    num_channels: f.audio.num_channels,
                });
            }
            FrameEnum::TTSStopped(f) => {
                if std::mem::take(&mut self.speaking) {
                    ctx.send_upstream(BotStoppedSpeakingFrame::new().into());
                }
                ctx.send(f.into(), direction);
            }
            FrameEnum::Interruption(f) => {
                self.speaking = false;
                self.play(OutboundMedia::Clear);
                ctx.send(f.into(), direction);
            }
            other => ctx.send(other, direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::frames::{OutputAudioRawFrame, StartFrame, TTSStoppedFrame, TextFrame};

    type Requests = Arc<Mutex<Vec<String>>>;

    /// Local stand-in for the Daily API. Records `METHOD PATH BODY` per
    /// request and answers 404 for rooms named `missing`.
    async fn fake_daily() -> (String, Requests) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let log = log.clone();
                tokio::spawn(async move {
                    let mut raw = Vec::new();
                    let mut buf = [0u8; 4096];
                    let (head, body) = loop {
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        raw.extend_from_slice(&buf[..n]);
                        let text = String::from_utf8_lossy(&raw).to_string();
                        if let Some(end) = text.find("\r\n\r\n") {
                            let head = text[..end].to_string();
                            let length = head
                                .lines()
                                .filter_map(|l| l.split_once(':'))
                                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                                .unwrap_or(0);
                            if raw.len() >= end + 4 + length || n == 0 {
                                break (head, text[end + 4..].to_string());
                            }
                        } else if n == 0 {
                            return;
                        }
                    };
                    let request_line = head.lines().next().unwrap_or_default().to_string();
                    let mut parts = request_line.split_whitespace();
                    let method = parts.next().unwrap_or_default();
                    let path = parts.next().unwrap_or_default();
                    assert!(head.to_ascii_lowercase().contains("authorization: bearer daily-key"));
                    lock(&log).push(format!("{method} {path} {body}").trim_end().to_string());

                    let (status, payload) = if path.ends_with("/rooms/missing") {
                        ("404 Not Found", r#"{"error":"not-found"}"#)
                    } else {
                        ("200 OK", r#"{"ok":true}"#)
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
                        payload.len()
                    );
                    socket.write_all(response.as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                });
            }
        });
        (format!("http://{addr}/v1"), requests)
    }

    fn rest(api_url: &str) -> DailyRestClient {
        DailyRestClient::new("daily-key", api_url).with_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    async fn joined_transport(room: &str) -> (DailyTransport, DailyMediaBridge, Requests) {
        let (api_url, requests) = fake_daily().await;
        let (transport, bridge) = DailyTransport::new(
            format!("https://acme.daily.co/{room}"),
            "meeting-token",
            DailyTransport::DEFAULT_BOT_NAME,
            DailyParams::default(),
            rest(&api_url),
        )
        .unwrap();
        transport.join().await.unwrap();
        (transport, bridge, requests)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timeout")
            .expect("closed")
    }

    #[test]
    fn room_names() {
        assert_eq!(room_name_from_url("https://acme.daily.co/support").unwrap(), "support");
        assert_eq!(room_name_from_url("https://acme.daily.co/support/?t=1").unwrap(), "support");
        assert!(matches!(
            room_name_from_url("acme.daily.co/support"),
            Err(TransportError::InvalidRoomUrl(_))
        ));
        assert!(room_name_from_url("https://acme.daily.co/").is_err());
        assert!(room_name_from_url("https:///room").is_err());
    }

    #[test]
    fn empty_api_url_uses_default() {
        assert_eq!(DailyRestClient::new("k", "").api_url(), DEFAULT_API_URL);
        assert_eq!(DailyRestClient::new("k", "http://x/v1/").api_url(), "http://x/v1");
    }

    #[tokio::test]
    async fn join_verifies_room_and_emits_joined() {
        let (transport, _bridge, requests) = joined_transport("support").await;
        let mut events = transport.take_events().unwrap();
        assert!(transport.take_events().is_none());
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Joined {
                room: "support".into()
            }
        );
        assert_eq!(lock(&requests).as_slice(), ["GET /v1/rooms/support"]);
        assert_eq!(transport.bot_name(), "Get Money Bot");
    }

    #[tokio::test]
    async fn join_fails_for_unknown_room() {
        let (api_url, _requests) = fake_daily().await;
        let (transport, _bridge) = DailyTransport::new(
            "https://acme.daily.co/missing",
            "t",
            "bot",
            DailyParams::default(),
            rest(&api_url),
        )
        .unwrap();
        match transport.join().await {
            Err(TransportError::Api { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected API error, got {other:?}"),
        }
        assert!(!transport.is_joined());
        assert!(matches!(
            transport.start_dialout(&DialoutSettings::new("+1")).await,
            Err(TransportError::NotJoined)
        ));
    }

    #[tokio::test]
    async fn joined_handler_can_dial_out_immediately() {
        let (api_url, requests) = fake_daily().await;
        let (transport, _bridge) = DailyTransport::new(
            "https://acme.daily.co/support",
            "t",
            "bot",
            DailyParams::default(),
            rest(&api_url),
        )
        .unwrap();
        let transport = Arc::new(transport);
        let mut events = transport.take_events().unwrap();
        let handler = {
            let transport = transport.clone();
            tokio::spawn(async move {
                let event = next_event(&mut events).await;
                assert!(matches!(event, TransportEvent::Joined { .. }));
                transport.start_dialout(&DialoutSettings::new("+15555550123")).await
            })
        };
        transport.join().await.unwrap();

        handler.await.unwrap().unwrap();
        assert_eq!(lock(&requests).len(), 2);
    }

    #[tokio::test]
    async fn dialout_and_transcription_requests() {
        let (transport, _bridge, requests) = joined_transport("support").await;
        transport
            .start_dialout(&DialoutSettings::new("+15555550123"))
            .await
            .unwrap();
        transport.capture_participant_transcription("pstn-1").await.unwrap();
        transport.capture_participant_transcription("pstn-1").await.unwrap();
        transport.leave().await.unwrap();

        assert_eq!(
            lock(&requests).as_slice(),
            [
                "GET /v1/rooms/support",
                r#"POST /v1/rooms/support/dialOut/start {"phoneNumber":"+15555550123"}"#,
                "POST /v1/rooms/support/transcription/start",
                "POST /v1/rooms/support/transcription/stop",
            ]
        );
    }

    #[tokio::test]
    async fn bridge_lifecycle_events_and_transcript_filtering() {
        let (transport, bridge, _requests) = joined_transport("support").await;
        let mut events = transport.take_events().unwrap();
        next_event(&mut events).await;

        bridge.push(MediaEvent::DialoutAnswered {
            participant_id: "pstn-1".into(),
        });
        bridge.push(MediaEvent::ParticipantJoined {
            participant_id: "pstn-1".into(),
        });
        bridge.push(MediaEvent::ParticipantJoined {
            participant_id: "observer".into(),
        });
        bridge.push(MediaEvent::ParticipantLeft {
            participant_id: "pstn-1".into(),
            reason: Some("hangup".into()),
        });

        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::DialoutAnswered {
                participant_id: "pstn-1".into()
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::FirstParticipantJoined {
                participant_id: "pstn-1".into()
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::ParticipantLeft {
                participant_id: "pstn-1".into(),
                reason: Some("hangup".into())
            }
        );

        // Only captured participants reach the pipeline.
        let mut media = lock(&transport.media_rx).take().unwrap();
        bridge.push(MediaEvent::Transcript {
            participant_id: "pstn-1".into(),
            text: "ignored".into(),
            is_final: true,
        });
        bridge.push(MediaEvent::DialoutConnected { session_id: None });
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::DialoutConnected { session_id: None }
        );
        transport.capture_participant_transcription("pstn-1").await.unwrap();
        bridge.push(MediaEvent::Transcript {
            participant_id: "pstn-1".into(),
            text: "Acme billing, how can I help?".into(),
            is_final: true,
        });
        let forwarded = tokio::time::timeout(Duration::from_millis(500), media.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(forwarded, MediaEvent::Transcript { text, .. } if text == "Acme billing, how can I help?"));
    }

    #[test]
    fn media_frames() {
        let frames = media_to_frames(MediaEvent::UserStartedSpeaking, true, true);
        let names: Vec<&str> = frames.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["UserStartedSpeakingFrame", "InterruptionFrame"]);
        assert_eq!(media_to_frames(MediaEvent::UserStartedSpeaking, false, true).len(), 1);

        let interim = media_to_frames(
            MediaEvent::Transcript {
                participant_id: "p".into(),
                text: "Acme".into(),
                is_final: false,
            },
            true,
            true,
        );
        assert!(matches!(&interim[0], FrameEnum::InterimTranscription(t) if t.text == "Acme"));

        let audio = MediaEvent::Audio {
            participant_id: "p".into(),
            audio: vec![0; 320],
            sample_rate: 16000,
            num_channels: 1,
        };
        assert!(media_to_frames(audio.clone(), true, false).is_empty());
        assert!(matches!(
            &media_to_frames(audio, true, true)[0],
            FrameEnum::InputAudioRaw(f) if f.participant_id.as_deref() == Some("p")
        ));
    }

    #[tokio::test]
    async fn input_processor_starts_reading_on_start() {
        let (transport, bridge, _requests) = joined_transport("support").await;
        transport.capture_participant_transcription("pstn-1").await.unwrap();
        let mut input = transport.input();

        let (down_tx, mut down_rx) = mpsc::unbounded_channel();
        let (up_tx, _up_rx) = mpsc::unbounded_channel();
        let ctx = ProcessorContext::detached(down_tx, up_tx);
        input
            .process(StartFrame::default().into(), FrameDirection::Downstream, &ctx)
            .await;
        assert!(matches!(down_rx.recv().await, Some(FrameEnum::Start(_))));

        bridge.push(MediaEvent::Transcript {
            participant_id: "pstn-1".into(),
            text: "Hello?".into(),
            is_final: true,
        });
        let frame = tokio::time::timeout(Duration::from_millis(500), down_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(frame, FrameEnum::Transcription(t) if t.text == "Hello?" && t.user_id == "pstn-1"));
        input.cleanup().await;
    }

    #[tokio::test]
    async fn output_processor_plays_audio_and_clears_on_interruption() {
        let (transport, bridge, _requests) = joined_transport("support").await;
        let mut playback = bridge.take_outbound().unwrap();
        assert!(bridge.take_outbound().is_none());
        let mut output = transport.output();

        let (down_tx, mut down_rx) = mpsc::unbounded_channel();
        let (up_tx, mut up_rx) = mpsc::unbounded_channel();
        let ctx = ProcessorContext::detached(down_tx, up_tx);

        output
            .process(OutputAudioRawFrame::new(vec![1, 0], 16000, 1).into(), FrameDirection::Downstream, &ctx)
            .await;
        output
            .process(TextFrame::spoken("Hello.").into(), FrameDirection::Downstream, &ctx)
            .await;
        output
            .process(TTSStoppedFrame::new(None).into(), FrameDirection::Downstream, &ctx)
            .await;
        output
            .process(InterruptionFrame::new().into(), FrameDirection::Downstream, &ctx)
            .await;

        assert_eq!(
            playback.recv().await,
            Some(OutboundMedia::Audio {
                audio: vec![1, 0],
                sample_rate: 16000,
                num_channels: 1
            })
        );
        assert_eq!(playback.recv().await, Some(OutboundMedia::Clear));

        let down: Vec<&str> = std::iter::from_fn(|| down_rx.try_recv().ok()).map(|f| f.name()).collect();
        assert_eq!(down, ["TextFrame", "TTSStoppedFrame", "InterruptionFrame"]);
        let up: Vec<&str> = std::iter::from_fn(|| up_rx.try_recv().ok()).map(|f| f.name()).collect();
        assert_eq!(up, ["BotStartedSpeakingFrame", "BotStoppedSpeakingFrame"]);
    }
}
