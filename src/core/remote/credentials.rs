//! Credential boundary.
//!
//! Token acquisition and refresh live outside this crate; the core only
//! asks for the current access token before each call.

/// Environment variable read by [`EnvToken`]
pub const TOKEN_ENV_VAR: &str = "DRIVE_DEDUP_TOKEN";

/// Supplies bearer tokens for drive calls
pub trait TokenProvider: Send + Sync {
    /// The current access token, or `None` when the user is signed out
    fn access_token(&self) -> Option<String>;
}

/// A fixed token, typically passed on the command line
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        if self.0.trim().is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}

/// Reads the token from [`TOKEN_ENV_VAR`] on every call
#[derive(Debug, Clone, Default)]
pub struct EnvToken;

impl TokenProvider for EnvToken {
    fn access_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Always signed out
#[derive(Debug, Clone, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn access_token(&self) -> Option<String> {
        None
    }
}
