//! Provider error-message classification.
//!
//! The provider reports failures as free-text messages. Rather than
//! scattering string checks across the flow code, every message passes
//! through one ordered rule table so the mapping stays centrally testable.

use serde::{Deserialize, Serialize};

/// Closed set of user-relevant error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCredentials,
    EmailAlreadyExists,
    InvalidPasswordFormat,
    InvalidVerificationCode,
    /// Local validation only; never produced by the provider.
    PasswordsDoNotMatch,
    InvalidOrExpiredToken,
    PolicyViolation,
    /// Poll deadline exceeded.
    Timeout,
    Cancelled,
    NetworkFailure,
    Unknown,
}

struct Rule {
    /// Every needle must appear (case-insensitively) for the rule to match.
    needles: &'static [&'static str],
    kind: ErrorKind,
}

/// Ordered rule table; the first matching rule wins. Specific rules come
/// before generic ones — "already exists" must beat the broad
/// invalid-password rule, and credential failures must beat it too.
const RULES: &[Rule] = &[
    Rule {
        needles: &["already exists"],
        kind: ErrorKind::EmailAlreadyExists,
    },
    Rule {
        needles: &["authentication failed"],
        kind: ErrorKind::InvalidCredentials,
    },
    Rule {
        needles: &["invalid credentials"],
        kind: ErrorKind::InvalidCredentials,
    },
    Rule {
        needles: &["incorrect", "password"],
        kind: ErrorKind::InvalidCredentials,
    },
    Rule {
        needles: &["unable to sign in"],
        kind: ErrorKind::InvalidCredentials,
    },
    Rule {
        needles: &["verification code", "invalid"],
        kind: ErrorKind::InvalidVerificationCode,
    },
    Rule {
        needles: &["code", "expired"],
        kind: ErrorKind::InvalidVerificationCode,
    },
    Rule {
        needles: &["token", "expired"],
        kind: ErrorKind::InvalidOrExpiredToken,
    },
    Rule {
        needles: &["token", "invalid"],
        kind: ErrorKind::InvalidOrExpiredToken,
    },
    Rule {
        needles: &["session", "expired"],
        kind: ErrorKind::InvalidOrExpiredToken,
    },
    Rule {
        needles: &["password requirements"],
        kind: ErrorKind::InvalidPasswordFormat,
    },
    Rule {
        needles: &["invalid", "password"],
        kind: ErrorKind::InvalidPasswordFormat,
    },
    Rule {
        needles: &["policy"],
        kind: ErrorKind::PolicyViolation,
    },
];

/// Map a raw provider message onto the closed taxonomy.
///
/// Unmatched messages classify as [`ErrorKind::Unknown`]; callers keep the
/// raw text as the error detail.
pub fn classify(raw: &str) -> ErrorKind {
    let haystack = raw.to_lowercase();
    for rule in RULES {
        if rule.needles.iter().all(|needle| haystack.contains(needle)) {
            return rule.kind;
        }
    }
    ErrorKind::Unknown
}
