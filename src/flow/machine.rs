//! Server-directed flow orchestration.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{ProceedResponse, RemoteIdentityClient};
use crate::error::{ErrorKind, FlowError};
use crate::poll::{PollPolicy, PollingCoordinator};
use crate::store::{TokenPair, TokenStore};

use super::fields;
use super::transaction::{FlowRequest, FlowStatus, StepInputs, StepResult, TransactionState};
use super::validate;

/// Orchestrates multi-step identity flows against the remote provider.
///
/// The machine is agnostic to step shape: each reply either completes the
/// flow, lists the fields to collect next, or hands off to out-of-band
/// email confirmation. The provider decides the sequence at runtime; the
/// machine only interprets replies and never assumes a step is skippable.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use idflow::client::HttpIdentityClient;
/// use idflow::config::IdentityConfig;
/// use idflow::flow::{Credentials, FlowRequest, FlowStateMachine};
/// use idflow::store::MemoryTokenStore;
///
/// # async fn example() -> Result<(), idflow::error::FlowError> {
/// let config = IdentityConfig::new(
///     "https://id.example.com",
///     "my-client-id",
///     "https://app.example.com/callback",
/// );
/// let machine = FlowStateMachine::new(
///     Arc::new(HttpIdentityClient::new(config)),
///     Arc::new(MemoryTokenStore::new()),
/// );
/// let request = FlowRequest::Authenticate(Credentials::password("user@example.com", "hunter2!"));
/// let transaction = machine.start(request).await?;
/// # Ok(())
/// # }
/// ```
pub struct FlowStateMachine {
    client: Arc<dyn RemoteIdentityClient>,
    store: Arc<dyn TokenStore>,
    poll_policy: PollPolicy,
    completed: Mutex<HashSet<String>>,
}

impl FlowStateMachine {
    pub fn new(client: Arc<dyn RemoteIdentityClient>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            client,
            store,
            poll_policy: PollPolicy::default(),
            completed: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Open a flow and drive its initial round-trip.
    ///
    /// The returned transaction tells the caller what comes next: fields
    /// to collect ([`TransactionState::step_inputs`]), an awaited email
    /// confirmation ([`TransactionState::pending_confirmation`]), or a
    /// terminal status when the initial payload already completed the flow
    /// (tokens are then in the store).
    pub async fn start(&self, request: FlowRequest) -> Result<TransactionState, FlowError> {
        let kind = request.kind();
        debug!(flow = %kind, "starting flow");
        match request {
            FlowRequest::Authenticate(mut credentials) => {
                validate::check_identifier(&credentials.identifier)?;
                if matches!(credentials.secret.as_deref(), Some("")) {
                    credentials.wipe_secret();
                    return Err(FlowError::new(
                        ErrorKind::InvalidCredentials,
                        "secret must not be empty",
                    ));
                }
                let state_handle = self.client.start_transaction(kind).await?;
                let mut state = TransactionState::new(kind, state_handle);
                let mut inputs =
                    StepInputs::new().with(fields::IDENTIFIER, &credentials.identifier);
                match &credentials.secret {
                    Some(secret) => inputs.insert(fields::PASSWORD, secret),
                    // email-link login: no secret, ask for the email
                    // authenticator instead
                    None => inputs.insert(fields::AUTHENTICATOR, "email"),
                }
                let result = self.round_trip(&mut state, &inputs).await;
                credentials.wipe_secret();
                inputs.wipe();
                result.map(|_| state)
            }
            FlowRequest::Register(mut profile) => {
                validate::check_identifier(&profile.email)?;
                validate::check_new_password(&profile.password)?;
                let response = self.client.register(&profile).await;
                profile.wipe_password();
                let response = response?;
                let mut state =
                    TransactionState::new(kind, response.state_handle.clone());
                self.interpret(&mut state, response).await.map(|_| state)
            }
            FlowRequest::RecoverPassword { identifier } => {
                validate::check_identifier(&identifier)?;
                let state_handle = self.client.start_transaction(kind).await?;
                let mut state = TransactionState::new(kind, state_handle);
                let inputs = StepInputs::new().with(fields::IDENTIFIER, &identifier);
                self.round_trip(&mut state, &inputs).await.map(|_| state)
            }
        }
    }

    /// Submit one step's inputs for an in-progress transaction.
    ///
    /// Local validation runs first; a locally rejected step issues no
    /// remote request and leaves the transaction in progress so the user
    /// can re-enter the value. Remote rejections keep the transaction
    /// alive only when the provider left its remediation open; otherwise
    /// the status becomes `Failed` and the inputs are wiped.
    pub async fn submit(
        &self,
        state: &mut TransactionState,
        mut inputs: StepInputs,
    ) -> Result<StepResult, FlowError> {
        if state.status().is_terminal() {
            return Err(FlowError::new(
                ErrorKind::InvalidOrExpiredToken,
                "transaction already reached a terminal state",
            ));
        }
        validate::check_step_inputs(state.flow(), &inputs)?;
        let result = self.round_trip(state, &inputs).await;
        if state.status() == FlowStatus::Failed {
            inputs.wipe();
        }
        result
    }

    /// Wait out an awaited email confirmation and finish the transaction.
    ///
    /// Cancelling marks the transaction `Abandoned`; a timeout or exchange
    /// failure marks it `Failed`.
    pub async fn confirm(
        &self,
        state: &mut TransactionState,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, FlowError> {
        if state.status().is_terminal() {
            return Err(FlowError::new(
                ErrorKind::InvalidOrExpiredToken,
                "transaction already reached a terminal state",
            ));
        }
        let Some(handle) = state.pending_confirmation().cloned() else {
            return Err(FlowError::new(
                ErrorKind::Unknown,
                "transaction is not awaiting confirmation",
            ));
        };
        if self.is_completed(state.state_handle()) {
            state.finish(FlowStatus::Failed);
            return Err(duplicate_success_error());
        }
        let coordinator = PollingCoordinator::new(self.client.clone(), self.store.clone());
        match coordinator.poll_until_confirmed(&handle, cancel).await {
            Ok(pair) => {
                self.mark_completed(state.state_handle().to_string());
                state.finish(FlowStatus::Success);
                Ok(pair)
            }
            Err(error) => {
                match error.kind {
                    ErrorKind::Cancelled => state.finish(FlowStatus::Abandoned),
                    _ => state.finish(FlowStatus::Failed),
                }
                Err(error)
            }
        }
    }

    /// Mark an in-progress transaction abandoned.
    pub fn abandon(&self, state: &mut TransactionState) {
        if !state.status().is_terminal() {
            debug!(flow = %state.flow(), "flow abandoned");
            state.finish(FlowStatus::Abandoned);
        }
    }

    /// Silent session rehydration: no transaction, no steps.
    ///
    /// Returns tokens (committed to the store) when the provider still
    /// holds a live session for this client, `None` otherwise.
    pub async fn rehydrate(&self) -> Result<Option<TokenPair>, FlowError> {
        if !self.client.session_exists().await? {
            return Ok(None);
        }
        let Some(pair) = self.client.tokens_without_prompt().await? else {
            return Ok(None);
        };
        self.store.set_tokens(pair.clone());
        Ok(Some(pair))
    }

    async fn round_trip(
        &self,
        state: &mut TransactionState,
        inputs: &StepInputs,
    ) -> Result<StepResult, FlowError> {
        // transport failures leave the transaction in progress; the caller
        // decides whether to retry the same step
        let response = self.client.proceed(state.state_handle(), inputs).await?;
        self.interpret(state, response).await
    }

    /// Interpret one reply, in priority order: terminal success, provider
    /// error, fillable inputs, out-of-band authenticator. Fillable inputs
    /// outrank authenticator hints — the user can always supply data they
    /// already have.
    async fn interpret(
        &self,
        state: &mut TransactionState,
        response: ProceedResponse,
    ) -> Result<StepResult, FlowError> {
        if !response.state_handle.is_empty() {
            state.set_state_handle(response.state_handle.clone());
        }

        if response.tokens.is_some() || response.interaction_code.is_some() {
            let handle = state.state_handle().to_string();
            if !handle.is_empty() && self.is_completed(&handle) {
                state.finish(FlowStatus::Failed);
                return Err(duplicate_success_error());
            }
            let pair = match (response.tokens, response.interaction_code) {
                (Some(pair), _) => pair,
                (None, Some(code)) => match self.exchange(&handle, &code).await {
                    Ok(pair) => pair,
                    Err(error) => {
                        state.finish(FlowStatus::Failed);
                        return Err(error);
                    }
                },
                (None, None) => unreachable!("guarded above"),
            };
            if !handle.is_empty() {
                self.mark_completed(handle);
            }
            self.store.set_tokens(pair.clone());
            state.finish(FlowStatus::Success);
            debug!(flow = %state.flow(), "flow complete");
            return Ok(StepResult::Complete(pair));
        }

        if !response.messages.is_empty() {
            let error = FlowError::classified(response.messages.join("; "));
            warn!(flow = %state.flow(), kind = ?error.kind, "provider rejected step");
            if response.step_inputs.is_empty() {
                // remediation gone: the state handle is spent
                state.finish(FlowStatus::Failed);
            } else {
                // remediation retained: retry on the same handle
                state.advance(response.step_inputs);
            }
            return Err(error);
        }

        if !response.step_inputs.is_empty() {
            state.advance(response.step_inputs);
            debug!(flow = %state.flow(), "provider requires further input");
            return Ok(StepResult::InputRequired);
        }

        if let Some(authenticator) = response.authenticator {
            if let Some(poll_url) = authenticator.poll_url {
                let handle = self.poll_policy.handle_for(poll_url, state.state_handle());
                state.await_confirmation(handle.clone());
                debug!(flow = %state.flow(), "awaiting external confirmation");
                return Ok(StepResult::AwaitConfirmation(handle));
            }
        }

        state.finish(FlowStatus::Failed);
        Err(FlowError::new(
            ErrorKind::Unknown,
            "reply carried no step, success, or error",
        ))
    }

    async fn exchange(&self, state_handle: &str, code: &str) -> Result<TokenPair, FlowError> {
        let meta = self.client.transaction_meta(state_handle).await?;
        Ok(self.client.exchange_code(code, &meta).await?)
    }

    fn is_completed(&self, state_handle: &str) -> bool {
        self.completed
            .lock()
            .map(|set| set.contains(state_handle))
            .unwrap_or(false)
    }

    fn mark_completed(&self, state_handle: String) {
        if let Ok(mut set) = self.completed.lock() {
            set.insert(state_handle);
        }
    }
}

fn duplicate_success_error() -> FlowError {
    FlowError::new(
        ErrorKind::InvalidOrExpiredToken,
        "state handle already produced a token pair",
    )
}
