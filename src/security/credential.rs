use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RelayError;

pub const API_KEY_ENV: &str = "API_KEY";

/// Opaque credential attached to every outbound message as `apiKey`.
///
/// The service validates it; this crate only checks that one is present.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, RelayError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(RelayError::Precondition("API key is empty".to_string()));
        }
        Ok(Self(raw))
    }

    /// Credential from the `API_KEY` environment variable.
    pub fn from_env() -> Result<Self, RelayError> {
        match std::env::var(API_KEY_ENV) {
            Ok(v) if !v.trim().is_empty() => Ok(Self(v)),
            _ => Err(RelayError::Precondition(format!(
                "please set the {} environment variable",
                API_KEY_ENV
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
