use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued when a flow completes.
///
/// # Example
/// ```
/// use idflow::store::TokenPair;
///
/// let pair = TokenPair::new("access-abc").with_refresh_token("refresh-xyz");
/// assert_eq!(pair.access_token, "access-abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }
}
