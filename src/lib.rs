//! idflow — client SDK for server-driven identity flows.
//!
//! Drives multi-step authentication transactions (password login, email
//! magic link, registration, password recovery) against an
//! Identity-Engine-style provider. Each remote reply either completes the
//! flow with tokens, lists the inputs to collect next, or hands off to
//! out-of-band email confirmation with bounded, cancellable polling.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use idflow::prelude::*;
//!
//! # async fn example() -> Result<(), FlowError> {
//! let config = IdentityConfig::new(
//!     "https://id.example.com",
//!     "my-client-id",
//!     "https://app.example.com/callback",
//! );
//! let poll_policy = config.poll;
//! let machine = FlowStateMachine::new(
//!     Arc::new(HttpIdentityClient::new(config)),
//!     Arc::new(MemoryTokenStore::new()),
//! )
//! .with_poll_policy(poll_policy);
//! let request = FlowRequest::Authenticate(Credentials::password("user@example.com", "hunter2!"));
//! let transaction = machine.start(request).await?;
//! println!("next inputs: {:?}", transaction.step_inputs());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod poll;
pub mod prelude;
pub mod store;
