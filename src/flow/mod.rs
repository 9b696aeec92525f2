//! Flow orchestration: transactions, local validation, the state machine.

pub mod machine;
pub mod transaction;
pub mod validate;

pub use machine::FlowStateMachine;
pub use transaction::{
    Credentials, FlowKind, FlowRequest, FlowStatus, RegistrationProfile, StepInputs, StepResult,
    TransactionState,
};

/// Wire field names used in step descriptors.
pub mod fields {
    pub const IDENTIFIER: &str = "identifier";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirmPassword";
    pub const VERIFICATION_CODE: &str = "verificationCode";
    pub const AUTHENTICATOR: &str = "authenticator";
}
