// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! get-money-agent: an outbound phone agent that calls a company on a
//! customer's behalf and negotiates a billing resolution.
//!
//! The agent dials out through a Daily room, listens to the representative
//! through transport-side transcription, thinks with Gemini and speaks with
//! ElevenLabs. Everything runs as one frame pipeline:
//!
//! ```text
//! transport in -> user context -> LLM -> TTS -> transport out -> assistant context
//! ```
//!
//! ```no_run
//! use get_money_agent::prelude::*;
//!
//! # async fn place_call() -> Result<(), AgentError> {
//! get_money_agent::logging::init(None);
//! let config = AgentConfig::load_dotenv()?;
//! let params = CallParameters::builder()
//!     .phone_number("+15555550123")
//!     .company_name("Acme Cable")
//!     .customer_name("Jane Doe")
//!     .account_number("A-1029")
//!     .desired_resolution("full refund of $120")
//!     .product_or_service("cable service")
//!     .issue_description("three-day outage not credited")
//!     .proof("outage ticket #55219")
//!     .build()?;
//! let agent = Agent::new(params, config)?;
//! let (transport, _bridge) = agent.create_transport("https://acme.daily.co/billing", "token")?;
//! let outcome = agent.run(transport).await?;
//! println!("call finished: {}", outcome.reason);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod agent;
pub mod config;
pub mod error;
pub mod frames;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod processors;
pub mod prompt;
pub mod services;
pub mod transports;
pub mod utils;

pub use error::{AgentError, Result};
