// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! ElevenLabs streaming text-to-speech.
//!
//! LLM tokens are gathered into sentences. Each sentence is synthesized over
//! the `stream-input` WebSocket:
//!
//! 1. initial message `{"text": " ", "voice_settings": ..., "xi_api_key": ...}`
//! 2. `{"text": "<sentence> ", "flush": true}`
//! 3. end-of-input `{"text": ""}`
//! 4. read base64 `audio` chunks until `isFinal`
//!
//! The server closes the socket after end-of-input, so the next sentence
//! opens a fresh connection.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::frames::{ErrorFrame, FrameEnum, OutputAudioRawFrame, TTSStartedFrame, TTSStoppedFrame, TextFrame};
use crate::impl_name_display;
use crate::processors::{FrameDirection, Processor, ProcessorContext, ProcessorWeight};
use crate::services::AIService;
use crate::utils::text::SentenceBuffer;
use crate::utils::{decode_base64, obj_id};

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElevenLabsVoiceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

impl ElevenLabsVoiceSettings {
    fn is_empty(&self) -> bool {
        self.stability.is_none()
            && self.similarity_boost.is_none()
            && self.style.is_none()
            && self.use_speaker_boost.is_none()
    }
}

#[derive(Debug, Serialize)]
struct InitMessage<'a> {
    text: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_settings: Option<&'a ElevenLabsVoiceSettings>,
    xi_api_key: &'a str,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    flush: bool,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    audio: Option<String>,
    #[serde(default, rename = "isFinal")]
    is_final: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Sample rate for an ElevenLabs `pcm_*` output format.
fn sample_rate_from_output_format(format: &str) -> u32 {
    format
        .strip_prefix("pcm_")
        .and_then(|rate| rate.parse().ok())
        .unwrap_or(16000)
}

enum Utterance {
    /// The server finished the sentence after sending `chunks` audio chunks.
    Completed { chunks: usize },
    Interrupted,
    Failed(String),
}

/// ElevenLabs TTS stage.
pub struct ElevenLabsTTSService {
    id: u64,
    name: String,
    api_key: String,
    voice_id: String,
    model: String,
    output_format: String,
    sample_rate: u32,
    ws_url: String,
    voice_settings: ElevenLabsVoiceSettings,
    ws: Option<WsStream>,
    sentences: SentenceBuffer,
}

impl ElevenLabsTTSService {
    pub const DEFAULT_VOICE_ID: &'static str = "b7d50908-b17c-442d-ad8d-810c63997ed9";
    pub const DEFAULT_MODEL: &'static str = "eleven_turbo_v2_5";
    pub const DEFAULT_OUTPUT_FORMAT: &'static str = "pcm_16000";
    pub const DEFAULT_WS_URL: &'static str = "wss://api.elevenlabs.io";

    /// An empty `voice_id` selects [`Self::DEFAULT_VOICE_ID`].
    pub fn new(api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        let voice_id = voice_id.into();
        let voice_id = if voice_id.is_empty() {
            Self::DEFAULT_VOICE_ID.to_string()
        } else {
            voice_id
        };
        Self {
            id: obj_id(),
            name: "ElevenLabsTTSService".to_string(),
            api_key: api_key.into(),
            voice_id,
            model: Self::DEFAULT_MODEL.to_string(),
            output_format: Self::DEFAULT_OUTPUT_FORMAT.to_string(),
            sample_rate: sample_rate_from_output_format(Self::DEFAULT_OUTPUT_FORMAT),
            ws_url: Self::DEFAULT_WS_URL.to_string(),
            voice_settings: ElevenLabsVoiceSettings::default(),
            ws: None,
            sentences: SentenceBuffer::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self.sample_rate = sample_rate_from_output_format(&self.output_format);
        self
    }

    pub fn with_voice_settings(mut self, settings: ElevenLabsVoiceSettings) -> Self {
        self.voice_settings = settings;
        self
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}/stream-input?model_id={}&output_format={}",
            self.ws_url, self.voice_id, self.model, self.output_format
        )
    }

    async fn connect(&mut self) -> Result<(), String> {
        if self.ws.is_some() {
            return Ok(());
        }
        tracing::debug!(service = %self.name, voice = %self.voice_id, "connecting to ElevenLabs");
        match tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(self.stream_url())).await {
            Ok(Ok((stream, _))) => {
                self.ws = Some(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(format!("ElevenLabs connection failed: {e}")),
            Err(_) => Err(format!("ElevenLabs connection timed out after {}s", CONNECT_TIMEOUT.as_secs())),
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                tracing::debug!(service = %self.name, error = %e, "closing ElevenLabs socket");
            }
        }
    }

    /// Send the three input messages for one sentence.
    async fn send_sentence(&mut self, text: &str) -> Result<(), String> {
        let init = InitMessage {
            text: " ",
            voice_settings: (!self.voice_settings.is_empty()).then_some(&self.voice_settings),
            xi_api_key: &self.api_key,
        };
        let messages = [
            serde_json::to_string(&init),
            serde_json::to_string(&TextMessage {
                text: format!("{text} "),
                flush: true,
            }),
            serde_json::to_string(&TextMessage {
                text: String::new(),
                flush: false,
            }),
        ];
        let ws = self.ws.as_mut().ok_or_else(|| "ElevenLabs socket not connected".to_string())?;
        for message in messages {
            let message = message.map_err(|e| format!("failed to encode ElevenLabs message: {e}"))?;
            ws.send(WsMessage::Text(message))
                .await
                .map_err(|e| format!("ElevenLabs send failed: {e}"))?;
        }
        Ok(())
    }

    /// Read audio for the sentence just sent until the server marks it final.
    async fn receive_audio(&mut self, ctx: &ProcessorContext) -> Utterance {
        let sample_rate = self.sample_rate;
        let Some(ws) = self.ws.as_mut() else {
            return Utterance::Failed("ElevenLabs socket not connected".to_string());
        };
        let mut chunks = 0usize;
        loop {
            let msg = tokio::select! {
                biased;
                _ = ctx.interruption_token().cancelled() => return Utterance::Interrupted,
                msg = ws.next() => msg,
            };
            let text = match msg {
                Some(Ok(WsMessage::Text(text))) => text,
                // Audio already played counts; a close before any audio does not.
                Some(Ok(WsMessage::Close(_))) | None if chunks > 0 => return Utterance::Completed { chunks },
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    return Utterance::Failed(format!("ElevenLabs closed the stream before sending audio: {reason}"));
                }
                None => return Utterance::Failed("ElevenLabs stream ended before sending audio".to_string()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Utterance::Failed(format!("ElevenLabs receive failed: {e}")),
            };
            let response: StreamResponse = match serde_json::from_str(&text) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(service = %self.name, error = %e, "unparseable ElevenLabs message");
                    continue;
                }
            };
            if let Some(error) = response.error {
                return Utterance::Failed(format!("ElevenLabs error: {error}"));
            }
            if let Some(audio) = response.audio.as_deref().filter(|a| !a.is_empty()) {
                match decode_base64(audio) {
                    Some(bytes) if !bytes.is_empty() => {
                        chunks += 1;
                        ctx.send_downstream(OutputAudioRawFrame::new(bytes, sample_rate, 1).into());
                    }
                    Some(_) => {}
                    None => tracing::warn!(service = %self.name, "invalid base64 audio chunk"),
                }
            }
            if response.is_final == Some(true) {
                return Utterance::Completed { chunks };
            }
        }
    }

    async fn synthesize(&mut self, sentence: String, ctx: &ProcessorContext) {
        if let Err(e) = self.connect().await {
            tracing::error!(service = %self.name, error = %e, "TTS unavailable");
            ctx.send_upstream(ErrorFrame::new(e, true).into());
            return;
        }
        let context_id = format!("elevenlabs-ctx-{}", obj_id());
        tracing::debug!(service = %self.name, context_id = %context_id, text = %sentence, "synthesizing");

        if let Err(e) = self.send_sentence(&sentence).await {
            tracing::error!(service = %self.name, error = %e, "TTS unavailable");
            self.ws = None;
            ctx.send_upstream(ErrorFrame::new(e, true).into());
            return;
        }
        ctx.send_downstream(TTSStartedFrame::new(Some(context_id.clone())).into());

        let outcome = self.receive_audio(ctx).await;
        // The server ends the stream after end-of-input; never reuse it.
        self.disconnect().await;
        match outcome {
            Utterance::Interrupted => {
                tracing::debug!(service = %self.name, context_id = %context_id, "synthesis interrupted");
                return;
            }
            Utterance::Failed(e) => {
                tracing::error!(service = %self.name, error = %e, "synthesis failed");
                ctx.send_upstream(ErrorFrame::new(e, true).into());
            }
            Utterance::Completed { chunks: 0 } => {
                tracing::warn!(service = %self.name, context_id = %context_id, "sentence finished without audio");
            }
            Utterance::Completed { .. } => {
                ctx.send_downstream(TextFrame::spoken(sentence).into());
            }
        }
        ctx.send_downstream(TTSStoppedFrame::new(Some(context_id)).into());
    }
}

impl fmt::Debug for ElevenLabsTTSService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsTTSService")
            .field("id", &self.id)
            .field("voice_id", &self.voice_id)
            .field("model", &self.model)
            .field("output_format", &self.output_format)
            .field("connected", &self.ws.is_some())
            .field("buffered", &self.sentences.as_str().len())
            .finish()
    }
}

impl_name_display!(ElevenLabsTTSService);

#[async_trait]
impl Processor for ElevenLabsTTSService {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn weight(&self) -> ProcessorWeight {
        ProcessorWeight::Heavy
    }

    async fn process(&mut self, frame: FrameEnum, direction: FrameDirection, ctx: &ProcessorContext) {
        match frame {
            FrameEnum::LLMText(t) => {
                if let Some(sentence) = self.sentences.push(&t.text) {
                    self.synthesize(sentence, ctx).await;
                }
            }
            FrameEnum::Text(t) if !t.spoken && direction == FrameDirection::Downstream => {
                if let Some(sentence) = self.sentences.push(&t.text) {
                    self.synthesize(sentence, ctx).await;
                }
            }
            FrameEnum::LLMFullResponseEnd(f) => {
                if let Some(rest) = self.sentences.take() {
                    self.synthesize(rest, ctx).await;
                }
                ctx.send(f.into(), direction);
            }
            FrameEnum::Interruption(f) => {
                self.sentences.clear();
                self.disconnect().await;
                ctx.send(f.into(), direction);
            }
            FrameEnum::End(f) => {
                if let Some(rest) = self.sentences.take() {
                    self.synthesize(rest, ctx).await;
                }
                self.disconnect().await;
                ctx.send(f.into(), direction);
            }
            FrameEnum::Cancel(f) => {
                self.sentences.clear();
                self.disconnect().await;
                ctx.send(f.into(), direction);
            }
            other => ctx.send(other, direction),
        }
    }

    async fn cleanup(&mut self) {
        self.disconnect().await;
    }
}

impl AIService for ElevenLabsTTSService {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use super::*;
    use crate::frames::{InterruptionFrame, LLMFullResponseEndFrame, LLMTextFrame};

    fn harness() -> (ProcessorContext, mpsc::UnboundedReceiver<FrameEnum>, mpsc::UnboundedReceiver<FrameEnum>) {
        let (down_tx, down_rx) = mpsc::unbounded_channel();
        let (up_tx, up_rx) = mpsc::unbounded_channel();
        (ProcessorContext::detached(down_tx, up_tx), down_rx, up_rx)
    }

    /// Accepts connections forever; answers each end-of-input with one audio
    /// chunk and a final marker.
    async fn fake_elevenlabs() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        let WsMessage::Text(text) = msg else { continue };
                        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                        if value["text"] == "" {
                            let audio = base64::engine::general_purpose::STANDARD.encode([1u8, 0, 2, 0]);
                            let chunk = serde_json::json!({ "audio": audio }).to_string();
                            ws.send(WsMessage::Text(chunk)).await.unwrap();
                            let done = serde_json::json!({ "isFinal": true }).to_string();
                            ws.send(WsMessage::Text(done)).await.unwrap();
                        }
                    }
                });
            }
        });
        format!("ws://{addr}")
    }

    #[test]
    fn defaults() {
        let tts = ElevenLabsTTSService::new("key", "");
        assert_eq!(tts.voice_id(), ElevenLabsTTSService::DEFAULT_VOICE_ID);
        assert_eq!(tts.model(), Some("eleven_turbo_v2_5"));
        assert_eq!(tts.sample_rate(), 16000);
        assert_eq!(
            tts.stream_url(),
            "wss://api.elevenlabs.io/v1/text-to-speech/b7d50908-b17c-442d-ad8d-810c63997ed9/stream-input?model_id=eleven_turbo_v2_5&output_format=pcm_16000"
        );
        assert_eq!(sample_rate_from_output_format("pcm_24000"), 24000);
        assert_eq!(sample_rate_from_output_format("mp3_44100_128"), 16000);
    }

    #[test]
    fn end_of_input_message_has_empty_text() {
        let eos = serde_json::to_value(TextMessage {
            text: String::new(),
            flush: false,
        })
        .unwrap();
        assert_eq!(eos, serde_json::json!({ "text": "" }));
    }

    #[tokio::test]
    async fn interruption_drops_buffered_text() {
        let mut tts = ElevenLabsTTSService::new("key", "");
        let (ctx, mut down_rx, _up_rx) = harness();

        tts.process(LLMTextFrame::new("I'd like a full").into(), FrameDirection::Downstream, &ctx)
            .await;
        assert_eq!(tts.sentences.as_str(), "I'd like a full");
        tts.process(InterruptionFrame::new().into(), FrameDirection::Downstream, &ctx)
            .await;
        tts.process(LLMFullResponseEndFrame::new().into(), FrameDirection::Downstream, &ctx)
            .await;

        let names: Vec<&str> = std::iter::from_fn(|| down_rx.try_recv().ok()).map(|f| f.name()).collect();
        assert_eq!(names, vec!["InterruptionFrame", "LLMFullResponseEndFrame"]);
    }

    #[tokio::test]
    async fn connection_failure_is_reported_upstream() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut tts = ElevenLabsTTSService::new("key", "").with_ws_url(format!("ws://127.0.0.1:{port}"));
        let (ctx, _down_rx, mut up_rx) = harness();
        tts.process(LLMTextFrame::new("Hello there.").into(), FrameDirection::Downstream, &ctx)
            .await;
        assert!(matches!(up_rx.try_recv(), Ok(FrameEnum::Error(e)) if e.fatal));
    }

    #[tokio::test]
    async fn sentences_are_spoken_in_order() {
        let url = fake_elevenlabs().await;
        let mut tts = ElevenLabsTTSService::new("key", "").with_ws_url(url);
        let (ctx, mut down_rx, mut up_rx) = harness();

        for token in ["Hi, I'm calling", " about my bill.", " Thanks"] {
            tts.process(LLMTextFrame::new(token).into(), FrameDirection::Downstream, &ctx)
                .await;
        }
        tts.process(LLMFullResponseEndFrame::new().into(), FrameDirection::Downstream, &ctx)
            .await;

        let frames: Vec<FrameEnum> = std::iter::from_fn(|| down_rx.try_recv().ok()).collect();
        let names: Vec<&str> = frames.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "TTSStartedFrame",
                "OutputAudioRawFrame",
                "TextFrame",
                "TTSStoppedFrame",
                "TTSStartedFrame",
                "OutputAudioRawFrame",
                "TextFrame",
                "TTSStoppedFrame",
                "LLMFullResponseEndFrame",
            ]
        );
        let spoken: Vec<&str> = frames
            .iter()
            .filter_map(|f| match f {
                FrameEnum::Text(t) if t.spoken => Some(t.text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(spoken, vec!["Hi, I'm calling about my bill.", "Thanks"]);
        assert!(up_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_before_audio_is_fatal_and_not_spoken() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            // Drop the session as soon as the init message arrives.
            let _ = ws.next().await;
            let _ = ws.close(None).await;
            while let Some(Ok(_)) = ws.next().await {}
        });
        let mut tts = ElevenLabsTTSService::new("key", "").with_ws_url(format!("ws://{addr}"));
        let (ctx, mut down_rx, mut up_rx) = harness();

        tts.process(LLMTextFrame::new("Hello there.").into(), FrameDirection::Downstream, &ctx)
            .await;

        let frames: Vec<FrameEnum> = std::iter::from_fn(|| down_rx.try_recv().ok()).collect();
        assert!(!frames.iter().any(|f| matches!(f, FrameEnum::Text(t) if t.spoken)));
        assert!(!frames.iter().any(|f| matches!(f, FrameEnum::OutputAudioRaw(_))));
        assert!(matches!(up_rx.try_recv(), Ok(FrameEnum::Error(e)) if e.fatal));
        assert!(tts.ws.is_none());
    }
}
