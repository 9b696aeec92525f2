//! `reqwest`-backed identity client.
//!
//! Speaks the provider's remediation envelope: every proceed-style reply
//! carries some combination of a state handle, remediation forms (field
//! descriptors), a current authenticator, a success object embedding an
//! interaction code, direct tokens, or error messages.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::config::IdentityConfig;
use crate::error::ClientError;
use crate::flow::{FlowKind, RegistrationProfile, StepInputs};
use crate::store::TokenPair;

use super::{
    AuthenticatorHint, FieldDescriptor, PollStatus, ProceedResponse, RemoteIdentityClient,
    TransactionMeta,
};

const SUCCESS_CODE_FIELD: &str = "interaction_code";

/// HTTP implementation of [`RemoteIdentityClient`].
///
/// Endpoints derive from the issuer URL; each can be overridden, which is
/// how tests point the client at a mock server.
///
/// A PKCE code verifier is generated per transaction at start and served
/// back from [`RemoteIdentityClient::transaction_meta`] for the
/// interaction-code exchange.
pub struct HttpIdentityClient {
    client: reqwest::Client,
    config: IdentityConfig,
    start_url: String,
    proceed_url: String,
    register_url: String,
    token_url: String,
    session_url: String,
    silent_token_url: String,
    verifiers: Mutex<HashMap<String, String>>,
}

impl HttpIdentityClient {
    pub fn new(config: IdentityConfig) -> Self {
        let base = config.issuer_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            start_url: format!("{base}/idp/idx/start"),
            proceed_url: format!("{base}/idp/idx/proceed"),
            register_url: format!("{base}/idp/idx/enroll"),
            token_url: format!("{base}/oauth2/v1/token"),
            session_url: format!("{base}/api/v1/sessions/me"),
            silent_token_url: format!("{base}/oauth2/v1/token/silent"),
            config,
            verifiers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = url.into();
        self
    }

    pub fn with_proceed_url(mut self, url: impl Into<String>) -> Self {
        self.proceed_url = url.into();
        self
    }

    pub fn with_register_url(mut self, url: impl Into<String>) -> Self {
        self.register_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_session_url(mut self, url: impl Into<String>) -> Self {
        self.session_url = url.into();
        self
    }

    pub fn with_silent_token_url(mut self, url: impl Into<String>) -> Self {
        self.silent_token_url = url.into();
        self
    }

    fn remember_verifier(&self, state_handle: &str, verifier: String) {
        if let Ok(mut guard) = self.verifiers.lock() {
            guard.insert(state_handle.to_string(), verifier);
        }
    }

    fn verifier_for(&self, state_handle: &str) -> Option<String> {
        self.verifiers.lock().ok()?.get(state_handle).cloned()
    }

    /// Parse a proceed-style reply. Rejected steps often come back with an
    /// error status but a well-formed envelope; surface those as responses
    /// so the flow layer can classify the messages.
    async fn read_envelope(
        &self,
        resp: reqwest::Response,
        fallback_handle: &str,
    ) -> Result<ProceedResponse, ClientError> {
        let status = resp.status();
        let text = resp.text().await?;
        if status.is_success() {
            let envelope: IdxEnvelope = serde_json::from_str(&text)?;
            return Ok(envelope.into_response(fallback_handle));
        }
        if let Ok(envelope) = serde_json::from_str::<IdxEnvelope>(&text) {
            if envelope.has_messages() {
                return Ok(envelope.into_response(fallback_handle));
            }
        }
        Err(ClientError::Http {
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl RemoteIdentityClient for HttpIdentityClient {
    async fn start_transaction(&self, flow: FlowKind) -> Result<String, ClientError> {
        let verifier = new_code_verifier();
        let challenge = code_challenge(&verifier);
        debug!(flow = %flow, "opening transaction");
        let resp = self
            .client
            .post(&self.start_url)
            .json(&json!({
                "flowType": flow.to_string(),
                "clientId": self.config.client_id,
                "redirectUri": self.config.redirect_uri,
                "scopes": self.config.scopes,
                "codeChallenge": challenge,
                "codeChallengeMethod": "S256",
            }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let payload: StartResponse = resp.json().await?;
        self.remember_verifier(&payload.state_handle, verifier);
        Ok(payload.state_handle)
    }

    async fn proceed(
        &self,
        state_handle: &str,
        inputs: &StepInputs,
    ) -> Result<ProceedResponse, ClientError> {
        let mut body = serde_json::Map::new();
        body.insert("stateHandle".to_string(), json!(state_handle));
        for (name, value) in inputs.iter() {
            body.insert(name.to_string(), json!(value));
        }
        let resp = self
            .client
            .post(&self.proceed_url)
            .json(&serde_json::Value::Object(body))
            .send()
            .await?;
        self.read_envelope(resp, state_handle).await
    }

    async fn register(
        &self,
        profile: &RegistrationProfile,
    ) -> Result<ProceedResponse, ClientError> {
        let resp = self
            .client
            .post(&self.register_url)
            .json(&json!({
                "firstName": profile.given_name,
                "lastName": profile.family_name,
                "email": profile.email,
                "password": profile.password,
            }))
            .send()
            .await?;
        self.read_envelope(resp, "").await
    }

    async fn transaction_meta(&self, state_handle: &str) -> Result<TransactionMeta, ClientError> {
        let code_verifier = self.verifier_for(state_handle).ok_or_else(|| {
            ClientError::InvalidResponse("no code verifier for this transaction".to_string())
        })?;
        Ok(TransactionMeta {
            client_id: self.config.client_id.clone(),
            code_verifier,
            redirect_uri: self.config.redirect_uri.clone(),
            scopes: self.config.scopes.clone(),
        })
    }

    async fn exchange_code(
        &self,
        interaction_code: &str,
        meta: &TransactionMeta,
    ) -> Result<TokenPair, ClientError> {
        let scope = meta.scopes.join(" ");
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "interaction_code"),
                ("interaction_code", interaction_code),
                ("client_id", meta.client_id.as_str()),
                ("code_verifier", meta.code_verifier.as_str()),
                ("redirect_uri", meta.redirect_uri.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let payload: WireTokens = resp.json().await?;
        Ok(payload.into_pair())
    }

    async fn poll_status(
        &self,
        poll_url: &str,
        state_handle: &str,
    ) -> Result<PollStatus, ClientError> {
        let resp = self
            .client
            .post(poll_url)
            .json(&json!({ "stateHandle": state_handle }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let envelope: IdxEnvelope = serde_json::from_str(&resp.text().await?)?;
        match envelope.interaction_code() {
            Some(interaction_code) => Ok(PollStatus::Confirmed { interaction_code }),
            None => Ok(PollStatus::Pending),
        }
    }

    async fn session_exists(&self) -> Result<bool, ClientError> {
        let resp = self.client.get(&self.session_url).send().await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::Http {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn tokens_without_prompt(&self) -> Result<Option<TokenPair>, ClientError> {
        let resp = self.client.get(&self.silent_token_url).send().await?;
        match resp.status() {
            StatusCode::OK => {
                let payload: WireTokens = resp.json().await?;
                Ok(Some(payload.into_pair()))
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status => Err(ClientError::Http {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

fn new_code_verifier() -> String {
    // two v4 uuids give 64 url-safe characters of entropy
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    format!("{}{}", a.simple(), b.simple())
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    state_handle: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IdxEnvelope {
    state_handle: Option<String>,
    remediation: Option<Collection<RemediationForm>>,
    current_authenticator: Option<Wrapped<AuthenticatorPayload>>,
    success_with_interaction_code: Option<Collection<NamedValue>>,
    tokens: Option<WireTokens>,
    messages: Option<Collection<WireMessage>>,
}

impl IdxEnvelope {
    fn has_messages(&self) -> bool {
        self.messages
            .as_ref()
            .is_some_and(|messages| !messages.value.is_empty())
    }

    fn interaction_code(&self) -> Option<String> {
        self.success_with_interaction_code
            .as_ref()?
            .value
            .iter()
            .find(|entry| entry.name == SUCCESS_CODE_FIELD)
            .and_then(|entry| entry.value.clone())
    }

    fn into_response(self, fallback_handle: &str) -> ProceedResponse {
        let interaction_code = self.interaction_code();
        ProceedResponse {
            state_handle: self
                .state_handle
                .unwrap_or_else(|| fallback_handle.to_string()),
            step_inputs: self
                .remediation
                .map(|forms| {
                    forms
                        .value
                        .into_iter()
                        .flat_map(|form| form.value)
                        .collect()
                })
                .unwrap_or_default(),
            authenticator: self.current_authenticator.map(|wrapped| AuthenticatorHint {
                kind: wrapped.value.kind,
                poll_url: wrapped.value.poll.map(|link| link.href),
            }),
            interaction_code,
            tokens: self.tokens.map(WireTokens::into_pair),
            messages: self
                .messages
                .map(|messages| {
                    messages
                        .value
                        .into_iter()
                        .map(|entry| entry.message)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Collection<T> {
    #[serde(default)]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    value: T,
}

#[derive(Debug, Default, Deserialize)]
struct RemediationForm {
    #[serde(default)]
    value: Vec<FieldDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
struct NamedValue {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatorPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    poll: Option<PollLink>,
}

#[derive(Debug, Deserialize)]
struct PollLink {
    href: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl WireTokens {
    fn into_pair(self) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}
