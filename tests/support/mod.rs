#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use idflow::client::{
    AuthenticatorHint, FieldDescriptor, PollStatus, ProceedResponse, RemoteIdentityClient,
    TransactionMeta,
};
use idflow::error::ClientError;
use idflow::flow::{FlowKind, RegistrationProfile, StepInputs};
use idflow::store::TokenPair;

pub fn pair(access_token: &str) -> TokenPair {
    TokenPair::new(access_token).with_refresh_token(format!("{access_token}-refresh"))
}

pub fn step_response(state_handle: &str, field_names: &[&str]) -> ProceedResponse {
    ProceedResponse {
        state_handle: state_handle.to_string(),
        step_inputs: field_names
            .iter()
            .map(|name| FieldDescriptor::new(*name))
            .collect(),
        ..Default::default()
    }
}

pub fn success_code_response(state_handle: &str, interaction_code: &str) -> ProceedResponse {
    ProceedResponse {
        state_handle: state_handle.to_string(),
        interaction_code: Some(interaction_code.to_string()),
        ..Default::default()
    }
}

pub fn tokens_response(state_handle: &str, tokens: TokenPair) -> ProceedResponse {
    ProceedResponse {
        state_handle: state_handle.to_string(),
        tokens: Some(tokens),
        ..Default::default()
    }
}

pub fn error_response(
    state_handle: &str,
    messages: &[&str],
    retained_fields: &[&str],
) -> ProceedResponse {
    ProceedResponse {
        state_handle: state_handle.to_string(),
        step_inputs: retained_fields
            .iter()
            .map(|name| FieldDescriptor::new(*name))
            .collect(),
        messages: messages.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    }
}

pub fn email_authenticator_response(state_handle: &str, poll_url: &str) -> ProceedResponse {
    ProceedResponse {
        state_handle: state_handle.to_string(),
        authenticator: Some(AuthenticatorHint {
            kind: "email".to_string(),
            poll_url: Some(poll_url.to_string()),
        }),
        ..Default::default()
    }
}

fn exhausted() -> ClientError {
    ClientError::InvalidResponse("stub script exhausted".to_string())
}

type PollHook = Box<dyn Fn() + Send + Sync>;

/// Scripted identity client: each call pops the next queued reply and
/// records what was asked, so tests can assert both the interpretation
/// and the exact remote traffic.
#[derive(Default)]
pub struct StubIdentityClient {
    start_replies: Mutex<VecDeque<Result<String, ClientError>>>,
    proceed_replies: Mutex<VecDeque<Result<ProceedResponse, ClientError>>>,
    register_replies: Mutex<VecDeque<Result<ProceedResponse, ClientError>>>,
    poll_replies: Mutex<VecDeque<Result<PollStatus, ClientError>>>,
    exchange_replies: Mutex<VecDeque<Result<TokenPair, ClientError>>>,
    silent_tokens: Mutex<Option<TokenPair>>,

    proceed_calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    register_calls: Mutex<Vec<String>>,
    poll_calls: Mutex<Vec<String>>,
    exchange_calls: Mutex<Vec<String>>,
    on_poll: Mutex<Option<PollHook>>,
}

impl StubIdentityClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_start(&self, reply: Result<&str, ClientError>) {
        self.start_replies
            .lock()
            .expect("stub lock poisoned")
            .push_back(reply.map(String::from));
    }

    pub fn queue_proceed(&self, reply: Result<ProceedResponse, ClientError>) {
        self.proceed_replies
            .lock()
            .expect("stub lock poisoned")
            .push_back(reply);
    }

    pub fn queue_register(&self, reply: Result<ProceedResponse, ClientError>) {
        self.register_replies
            .lock()
            .expect("stub lock poisoned")
            .push_back(reply);
    }

    pub fn queue_poll(&self, reply: Result<PollStatus, ClientError>) {
        self.poll_replies
            .lock()
            .expect("stub lock poisoned")
            .push_back(reply);
    }

    pub fn queue_exchange(&self, reply: Result<TokenPair, ClientError>) {
        self.exchange_replies
            .lock()
            .expect("stub lock poisoned")
            .push_back(reply);
    }

    pub fn set_silent_tokens(&self, tokens: Option<TokenPair>) {
        *self.silent_tokens.lock().expect("stub lock poisoned") = tokens;
    }

    /// Run `hook` after every recorded poll request (e.g. to cancel a
    /// token mid-loop at a deterministic point).
    pub fn set_poll_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_poll.lock().expect("stub lock poisoned") = Some(Box::new(hook));
    }

    pub fn proceed_calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.proceed_calls.lock().expect("stub lock poisoned").clone()
    }

    pub fn proceed_call_count(&self) -> usize {
        self.proceed_calls.lock().expect("stub lock poisoned").len()
    }

    pub fn register_call_count(&self) -> usize {
        self.register_calls.lock().expect("stub lock poisoned").len()
    }

    pub fn poll_call_count(&self) -> usize {
        self.poll_calls.lock().expect("stub lock poisoned").len()
    }

    pub fn exchange_call_count(&self) -> usize {
        self.exchange_calls.lock().expect("stub lock poisoned").len()
    }
}

#[async_trait]
impl RemoteIdentityClient for StubIdentityClient {
    async fn start_transaction(&self, _flow: FlowKind) -> Result<String, ClientError> {
        self.start_replies
            .lock()
            .expect("stub lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn proceed(
        &self,
        state_handle: &str,
        inputs: &StepInputs,
    ) -> Result<ProceedResponse, ClientError> {
        let recorded = inputs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.proceed_calls
            .lock()
            .expect("stub lock poisoned")
            .push((state_handle.to_string(), recorded));
        self.proceed_replies
            .lock()
            .expect("stub lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn register(
        &self,
        profile: &RegistrationProfile,
    ) -> Result<ProceedResponse, ClientError> {
        self.register_calls
            .lock()
            .expect("stub lock poisoned")
            .push(profile.email.clone());
        self.register_replies
            .lock()
            .expect("stub lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn transaction_meta(&self, _state_handle: &str) -> Result<TransactionMeta, ClientError> {
        Ok(TransactionMeta {
            client_id: "stub-client".to_string(),
            code_verifier: "stub-verifier".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scopes: vec!["openid".to_string()],
        })
    }

    async fn exchange_code(
        &self,
        interaction_code: &str,
        _meta: &TransactionMeta,
    ) -> Result<TokenPair, ClientError> {
        self.exchange_calls
            .lock()
            .expect("stub lock poisoned")
            .push(interaction_code.to_string());
        self.exchange_replies
            .lock()
            .expect("stub lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn poll_status(
        &self,
        poll_url: &str,
        _state_handle: &str,
    ) -> Result<PollStatus, ClientError> {
        self.poll_calls
            .lock()
            .expect("stub lock poisoned")
            .push(poll_url.to_string());
        if let Some(hook) = self.on_poll.lock().expect("stub lock poisoned").as_ref() {
            hook();
        }
        self.poll_replies
            .lock()
            .expect("stub lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn session_exists(&self) -> Result<bool, ClientError> {
        Ok(self
            .silent_tokens
            .lock()
            .expect("stub lock poisoned")
            .is_some())
    }

    async fn tokens_without_prompt(&self) -> Result<Option<TokenPair>, ClientError> {
        Ok(self.silent_tokens.lock().expect("stub lock poisoned").clone())
    }
}
