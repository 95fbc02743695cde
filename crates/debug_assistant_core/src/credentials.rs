//! crates/debug_assistant_core/src/credentials.rs
//!
//! Holds the user's model API key in memory. The key has no `Display` or
//! `Serialize` impl and its `Debug` output is redacted, so it cannot end up in
//! logs or response bodies by accident.

use std::fmt;

/// Prefix every OpenAI secret key starts with.
pub const KEY_PREFIX: &str = "sk-";

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key as typed by the user. Surrounding whitespace is dropped.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self(raw.trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the key has the shape of an OpenAI secret key.
    pub fn is_well_formed(&self) -> bool {
        self.0.starts_with(KEY_PREFIX) && self.0.len() > KEY_PREFIX.len()
    }

    /// The secret itself, for the Authorization header and nothing else.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
