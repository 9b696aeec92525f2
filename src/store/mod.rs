//! Token lifecycle after a successful flow.

pub mod token;

pub use token::TokenPair;

use std::sync::Mutex;

/// Holder for the current token pair.
///
/// Committed exactly once per successful flow; later flows overwrite the
/// pair whole (last writer wins). Implementations must never expose a
/// half-updated pair.
pub trait TokenStore: Send + Sync {
    /// Replace any previously held pair with `pair` in one step.
    fn set_tokens(&self, pair: TokenPair);
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn clear(&self);
}

/// Process-wide in-memory store.
///
/// Session persistence belongs to the identity provider, so nothing is
/// written to disk; dropping the store drops the tokens.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    current: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set_tokens(&self, pair: TokenPair) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(pair);
        }
    }

    fn access_token(&self) -> Option<String> {
        self.current
            .lock()
            .ok()?
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.current
            .lock()
            .ok()?
            .as_ref()
            .and_then(|pair| pair.refresh_token.clone())
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }
    }
}
