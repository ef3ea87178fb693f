//! Threadrun: client-side run engine for assistant threads.
//!
//! Conducts one conversational turn against a remote assistant service:
//! opens the run's event stream, assembles streamed output into the
//! conversation, answers required actions (client function outputs and
//! human approvals) and recovers cleanly from cancellation, transport
//! failures and rate limiting.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use threadrun::prelude::*;
//!
//! # async fn example() -> threadrun::error::Result<()> {
//! let config = EngineConfig::load()?;
//! let api = Arc::new(HttpAssistantApi::new(&config)?);
//! let assistant = Assistant::new("asst_123");
//! let session = ChatSession::new(api, config, assistant);
//!
//! let outcome = session.send_message("Hello!", SendOptions::new()).await;
//! if let Some(reply) = session.messages().last() {
//!     println!("{}", reply.content());
//! }
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod prelude;
pub mod run_loop;
pub mod session;
pub mod stream;
pub mod tools;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
