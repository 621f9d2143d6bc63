//! Identity provider capabilities consumed by the authorizer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Identity provider errors.
#[derive(Error, Debug)]
pub enum OidcError {
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("fetching signing keys failed: {0}")]
    Jwks(String),

    #[error("invalid identity token: {0}")]
    InvalidToken(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Claim set of an identity token whose signature, issuer, audience and
/// expiry have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub claims: Value,
}

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialPair {
    pub id_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
}

/// Validates identity tokens.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, OidcError>;
}

/// Talks to the provider's authorization and token endpoints.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Authorization endpoint URL carrying `state` verbatim.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<CredentialPair, OidcError>;

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, OidcError>;
}
