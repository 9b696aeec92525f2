use std::fmt;

use strum::{Display, EnumString};

use crate::client::FieldDescriptor;
use crate::poll::PollHandle;

/// Named authentication purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum FlowKind {
    Authenticate,
    Register,
    RecoverPassword,
}

/// Transaction status. Transitions only move forward: once terminal, a
/// transaction is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    InProgress,
    Success,
    Failed,
    Abandoned,
}

impl FlowStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Login credentials. The secret never appears in `Debug` output and is
/// wiped once the flow reaches a terminal state.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub secret: Option<String>,
}

impl Credentials {
    /// Password login.
    pub fn password(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: Some(secret.into()),
        }
    }

    /// Email-link login: no secret, the email authenticator confirms
    /// possession of the inbox instead.
    pub fn email_link(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: None,
        }
    }

    pub fn wipe_secret(&mut self) {
        self.secret = None;
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Profile submitted when creating an account.
#[derive(Clone)]
pub struct RegistrationProfile {
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub password: String,
}

impl RegistrationProfile {
    pub fn new(
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            given_name: given_name.into(),
            family_name: family_name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn wipe_password(&mut self) {
        self.password = String::new();
    }
}

impl fmt::Debug for RegistrationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationProfile")
            .field("given_name", &self.given_name)
            .field("family_name", &self.family_name)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Initial input for [`FlowStateMachine::start`].
///
/// [`FlowStateMachine::start`]: crate::flow::FlowStateMachine::start
#[derive(Debug, Clone)]
pub enum FlowRequest {
    Authenticate(Credentials),
    Register(RegistrationProfile),
    RecoverPassword { identifier: String },
}

impl FlowRequest {
    pub fn kind(&self) -> FlowKind {
        match self {
            Self::Authenticate(_) => FlowKind::Authenticate,
            Self::Register(_) => FlowKind::Register,
            Self::RecoverPassword { .. } => FlowKind::RecoverPassword,
        }
    }
}

/// Ordered field/value pairs answering one remote-directed step.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StepInputs {
    entries: Vec<(String, String)>,
}

impl StepInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing any earlier value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Drop all collected values so they are never retained for retry
    /// prefill after a terminal failure.
    pub fn wipe(&mut self) {
        for (_, value) in &mut self.entries {
            *value = String::new();
        }
        self.entries.clear();
    }
}

impl fmt::Debug for StepInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // field names only; values may be secrets
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

/// In-progress remote transaction, advanced one round-trip at a time.
#[derive(Debug, Clone)]
pub struct TransactionState {
    flow: FlowKind,
    state_handle: String,
    step_inputs: Vec<FieldDescriptor>,
    pending_confirmation: Option<PollHandle>,
    status: FlowStatus,
}

impl TransactionState {
    pub(crate) fn new(flow: FlowKind, state_handle: String) -> Self {
        Self {
            flow,
            state_handle,
            step_inputs: Vec::new(),
            pending_confirmation: None,
            status: FlowStatus::InProgress,
        }
    }

    pub fn flow(&self) -> FlowKind {
        self.flow
    }

    pub fn state_handle(&self) -> &str {
        &self.state_handle
    }

    pub fn status(&self) -> FlowStatus {
        self.status
    }

    /// Field descriptors the provider is currently waiting for.
    pub fn step_inputs(&self) -> &[FieldDescriptor] {
        &self.step_inputs
    }

    /// Whether the current step asks for the named field. Callers route on
    /// this: `verificationCode` sends the user to OTP capture, `password`
    /// to new-password capture.
    pub fn requires(&self, name: &str) -> bool {
        self.step_inputs.iter().any(|field| field.name == name)
    }

    /// Set while the flow waits on out-of-band email confirmation.
    pub fn pending_confirmation(&self) -> Option<&PollHandle> {
        self.pending_confirmation.as_ref()
    }

    pub(crate) fn set_state_handle(&mut self, state_handle: String) {
        self.state_handle = state_handle;
    }

    pub(crate) fn advance(&mut self, step_inputs: Vec<FieldDescriptor>) {
        self.step_inputs = step_inputs;
        self.pending_confirmation = None;
    }

    pub(crate) fn await_confirmation(&mut self, handle: PollHandle) {
        self.step_inputs = Vec::new();
        self.pending_confirmation = Some(handle);
    }

    pub(crate) fn finish(&mut self, status: FlowStatus) {
        debug_assert!(status.is_terminal());
        if !self.status.is_terminal() {
            self.status = status;
        }
    }
}

/// Outcome of submitting one step.
#[derive(Debug)]
pub enum StepResult {
    /// The provider wants more input; the transaction's
    /// [`TransactionState::step_inputs`] list the fields to collect next.
    InputRequired,
    /// Completion is out of band: poll until the email link is confirmed.
    AwaitConfirmation(PollHandle),
    /// Terminal success. The pair is already committed to the token store.
    Complete(crate::store::TokenPair),
}
