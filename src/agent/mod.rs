// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! The outbound billing-negotiation agent.
//!
//! One [`Agent`] places one call:
//!
//! ```text
//! transport.input() -> user aggregator -> LLM -> TTS -> transport.output() -> assistant aggregator
//! ```
//!
//! The system prompt is rendered once in [`Agent::new`] and becomes the first
//! message of the shared context. After that the agent only reacts to
//! transport events (see [`session`]) and to the model's `terminate_call`
//! tool (see [`tools`]).

pub mod params;
pub mod session;
pub mod tools;

use std::sync::Arc;

pub use params::{CallParameters, CallParametersBuilder, CallParametersError};
pub use session::{CallFlow, CallOutcome, CallSession, CallState};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::pipeline::{PipelineParams, PipelineTask};
use crate::processors::aggregators::{LLMContext, LLMContextAggregatorPair};
use crate::processors::Processor;
use crate::prompt::build_system_prompt;
use crate::services::{ElevenLabsTTSService, GoogleLLMService, LLMService};
use crate::transports::{
    CallTransport, DailyMediaBridge, DailyParams, DailyRestClient, DailyTransport, DialoutSettings,
};

pub struct Agent {
    params: CallParameters,
    config: AgentConfig,
    system_prompt: String,
    pipeline_params: PipelineParams,
    daily_params: DailyParams,
}

impl Agent {
    /// Validate the configuration and render the system prompt.
    pub fn new(params: CallParameters, config: AgentConfig) -> Result<Self, AgentError> {
        let system_prompt = build_system_prompt(&params)?;
        tracing::info!(
            company = %params.company_name(),
            customer = %params.customer_name(),
            "agent ready"
        );
        Ok(Self {
            params,
            config,
            system_prompt,
            pipeline_params: PipelineParams::default(),
            daily_params: DailyParams::default(),
        })
    }

    pub fn with_pipeline_params(mut self, params: PipelineParams) -> Self {
        self.pipeline_params = params;
        self
    }

    pub fn with_daily_params(mut self, params: DailyParams) -> Self {
        self.daily_params = params;
        self
    }

    pub fn params(&self) -> &CallParameters {
        &self.params
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Build the Daily transport for `room_url` and the bridge the host's
    /// media client attaches to.
    pub fn create_transport(
        &self,
        room_url: &str,
        token: &str,
    ) -> Result<(DailyTransport, DailyMediaBridge), AgentError> {
        let rest = DailyRestClient::new(&self.config.daily_api_key, &self.config.daily_api_url);
        let (transport, bridge) = DailyTransport::new(
            room_url,
            token,
            &self.config.bot_name,
            self.daily_params.clone(),
            rest,
        )?;
        Ok((transport, bridge))
    }

    pub fn llm(&self) -> GoogleLLMService {
        GoogleLLMService::new(&self.config.google_api_key, &self.config.google_model)
    }

    pub fn tts(&self) -> ElevenLabsTTSService {
        ElevenLabsTTSService::new(&self.config.eleven_labs_api_key, &self.config.eleven_labs_voice_id)
    }

    /// Fresh conversation context: the system prompt and the tool schema.
    pub fn context(&self) -> LLMContext {
        let mut context = LLMContext::new();
        context.add_system_message(&self.system_prompt);
        context.set_tools(tools::tools_schema(&tools::call_tools()));
        context
    }

    /// Place the call with Gemini and ElevenLabs.
    pub async fn run<T>(&self, transport: T) -> Result<CallOutcome, AgentError>
    where
        T: CallTransport + 'static,
    {
        self.run_with(transport, self.llm(), self.tts()).await
    }

    /// Place the call with the given model and synthesis stages.
    pub async fn run_with<T, L, S>(&self, transport: T, mut llm: L, tts: S) -> Result<CallOutcome, AgentError>
    where
        T: CallTransport + 'static,
        L: LLMService + 'static,
        S: Processor + 'static,
    {
        let transport: Arc<dyn CallTransport> = Arc::new(transport);
        let events = transport.take_events().ok_or(AgentError::EventsTaken)?;

        let call_tools = tools::call_tools();
        tools::register_tools(&mut llm, &call_tools);

        let (user, assistant) = LLMContextAggregatorPair::new(self.context()).into_parts();
        let processors: Vec<Box<dyn Processor>> = vec![
            transport.input(),
            Box::new(user),
            Box::new(llm),
            Box::new(tts),
            transport.output(),
            Box::new(assistant),
        ];
        let task = PipelineTask::new(processors, self.pipeline_params.clone());
        let flow = CallFlow::new(
            transport.clone(),
            task.handle(),
            DialoutSettings::new(self.params.phone_number()),
        );
        let session = CallSession::new(flow.clone());
        let running = tokio::spawn(task.run());

        flow.transition(CallState::WaitingForJoin);
        if let Err(e) = transport.join().await {
            tracing::error!(error = %e, "failed to join the room");
            flow.terminate(format!("join failed: {e}"));
            if let Err(join_error) = running.await {
                tracing::error!(error = %join_error, "pipeline task failed");
            }
            return Err(e.into());
        }

        Ok(session.run(events, running).await)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("company", &self.params.company_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::TransportError;

    fn agent() -> Agent {
        let params = CallParameters::builder()
            .phone_number("+15555550123")
            .company_name("Acme Cable")
            .customer_name("Jane Doe")
            .account_number("A-1029")
            .desired_resolution("full refund of $120")
            .product_or_service("cable service")
            .issue_description("three-day outage not credited")
            .proof("outage ticket #55219")
            .build()
            .unwrap();
        let config = AgentConfig::from_lookup(|key| Some(format!("{key}-value"))).unwrap();
        Agent::new(params, config).unwrap()
    }

    #[tokio::test]
    async fn context_is_seeded_with_prompt_and_tool() {
        let agent = agent();
        let context = agent.context();
        assert_eq!(context.message_count(), 1);
        assert_eq!(context.system_prompt(), Some(agent.system_prompt()));
        assert!(context.tools().get(tools::TERMINATE_CALL).is_some());
        assert!(agent.system_prompt().contains("Acme Cable"));
    }

    #[test]
    fn transport_uses_configured_bot_name() {
        let agent = agent();
        let (transport, bridge) = agent.create_transport("https://acme.daily.co/billing", "tok").unwrap();
        assert_eq!(transport.room_name(), "billing");
        assert_eq!(bridge.bot_name(), "Get Money Bot");
        assert!(matches!(
            agent.create_transport("not a url", "tok"),
            Err(AgentError::Transport(TransportError::InvalidRoomUrl(_)))
        ));
    }
}
