//! Convenience re-exports for common use.

pub use crate::client::{HttpIdentityClient, RemoteIdentityClient};
pub use crate::config::IdentityConfig;
pub use crate::error::{ErrorKind, FlowError};
pub use crate::flow::{
    Credentials, FlowKind, FlowRequest, FlowStateMachine, FlowStatus, RegistrationProfile,
    StepInputs, StepResult, TransactionState,
};
pub use crate::poll::{PollDeadline, PollHandle, PollingCoordinator};
pub use crate::store::{MemoryTokenStore, TokenPair, TokenStore};
