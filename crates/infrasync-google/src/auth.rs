//! Access token resolution

use crate::error::{GoogleError, Result};
use crate::gcloud::Gcloud;

/// Environment variable holding a ready-to-use OAuth access token
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// OAuth bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(GoogleError::AuthenticationFailed(
                "empty access token".to_string(),
            ));
        }
        Ok(Self(token))
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Resolve a token from `GOOGLE_OAUTH_ACCESS_TOKEN`, falling back to
/// `gcloud auth print-access-token`.
// TODO: refresh the token when a run outlives its one hour lifetime
pub async fn resolve_token(gcloud: &Gcloud) -> Result<AccessToken> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV)
        && !token.trim().is_empty()
    {
        tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
        return AccessToken::new(token);
    }

    gcloud.print_access_token().await
}
