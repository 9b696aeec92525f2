//! Remote identity-provider interface.
//!
//! The flow machine and polling coordinator depend only on the
//! [`RemoteIdentityClient`] trait; [`HttpIdentityClient`] is the wire
//! implementation. Tests substitute scripted stubs.

pub mod http;

pub use http::HttpIdentityClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::flow::{FlowKind, RegistrationProfile, StepInputs};
use crate::store::TokenPair;

/// One named input the provider is currently waiting for.
///
/// Step shape is decided server-side per response, so fields are inspected
/// by name rather than deserialized into fixed structs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub secret: bool,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            secret: false,
            required: true,
        }
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Out-of-band authenticator advertised by the provider (e.g. an email
/// link whose completion is confirmed by polling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorHint {
    pub kind: String,
    pub poll_url: Option<String>,
}

/// Parsed reply to one proceed/register round-trip.
#[derive(Debug, Clone, Default)]
pub struct ProceedResponse {
    /// Handle for the next round-trip; may rotate between steps.
    pub state_handle: String,
    pub step_inputs: Vec<FieldDescriptor>,
    pub authenticator: Option<AuthenticatorHint>,
    /// Short-lived code to exchange for tokens (terminal success).
    pub interaction_code: Option<String>,
    /// Tokens delivered directly (terminal success without an exchange).
    pub tokens: Option<TokenPair>,
    /// Raw provider error messages, if the step was rejected.
    pub messages: Vec<String>,
}

/// PKCE material needed to exchange an interaction code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMeta {
    pub client_id: String,
    pub code_verifier: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Outcome of one request against a poll endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Confirmed { interaction_code: String },
}

/// Surface the orchestration core consumes from the identity provider.
#[async_trait]
pub trait RemoteIdentityClient: Send + Sync {
    /// Open a transaction and return its opaque state handle.
    async fn start_transaction(&self, flow: FlowKind) -> Result<String, ClientError>;

    /// Submit one step's inputs for an in-progress transaction.
    async fn proceed(
        &self,
        state_handle: &str,
        inputs: &StepInputs,
    ) -> Result<ProceedResponse, ClientError>;

    /// Create an account. Terminal replies carry tokens; rejected ones
    /// carry messages.
    async fn register(&self, profile: &RegistrationProfile)
        -> Result<ProceedResponse, ClientError>;

    /// PKCE material for the interaction-code exchange of a transaction.
    async fn transaction_meta(&self, state_handle: &str) -> Result<TransactionMeta, ClientError>;

    /// Exchange an interaction code for tokens (second half of a two-step
    /// completion).
    async fn exchange_code(
        &self,
        interaction_code: &str,
        meta: &TransactionMeta,
    ) -> Result<TokenPair, ClientError>;

    /// One poll request against `poll_url` for the given transaction.
    async fn poll_status(
        &self,
        poll_url: &str,
        state_handle: &str,
    ) -> Result<PollStatus, ClientError>;

    /// Whether a server-side session already exists for this client.
    async fn session_exists(&self) -> Result<bool, ClientError>;

    /// Silent token retrieval against an existing session, if any.
    async fn tokens_without_prompt(&self) -> Result<Option<TokenPair>, ClientError>;
}
