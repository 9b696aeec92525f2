//! Local input validation, applied before any remote call.
//!
//! Malformed OTPs, short new passwords, and mismatched confirmations are
//! rejected here; they never reach the identity provider.

use crate::error::{ErrorKind, FlowError};

use super::fields;
use super::transaction::{FlowKind, StepInputs};

pub const OTP_LENGTH: usize = 6;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Check the fields of one step before submitting them.
///
/// The password-length rule applies only to flows that set a new password;
/// an existing login password is whatever the user chose historically.
pub fn check_step_inputs(flow: FlowKind, inputs: &StepInputs) -> Result<(), FlowError> {
    if let Some(code) = inputs.get(fields::VERIFICATION_CODE) {
        check_verification_code(code)?;
    }
    if let Some(password) = inputs.get(fields::PASSWORD) {
        if flow != FlowKind::Authenticate {
            check_new_password(password)?;
        }
        if let Some(confirmation) = inputs.get(fields::CONFIRM_PASSWORD) {
            if confirmation != password {
                return Err(FlowError::new(
                    ErrorKind::PasswordsDoNotMatch,
                    "passwords do not match",
                ));
            }
        }
    }
    Ok(())
}

pub fn check_verification_code(code: &str) -> Result<(), FlowError> {
    if code.len() != OTP_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FlowError::new(
            ErrorKind::InvalidVerificationCode,
            format!("verification code must be {OTP_LENGTH} digits"),
        ));
    }
    Ok(())
}

pub fn check_new_password(password: &str) -> Result<(), FlowError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(FlowError::new(
            ErrorKind::InvalidPasswordFormat,
            format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    Ok(())
}

pub fn check_identifier(identifier: &str) -> Result<(), FlowError> {
    if identifier.trim().is_empty() {
        return Err(FlowError::new(
            ErrorKind::InvalidCredentials,
            "identifier is required",
        ));
    }
    Ok(())
}
