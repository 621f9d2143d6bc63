//! Typed identity claims.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Claims every signed-in session needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    pub email_verified: bool,
}

#[derive(Error, Debug)]
#[error("could not decode identity claims: {0}")]
pub struct ClaimsError(#[from] serde_json::Error);

impl IdentityClaims {
    /// Extract `email` and `email_verified` from a verified claim set.
    ///
    /// Both are required; other claims are ignored.
    pub fn decode(claims: &Value) -> Result<Self, ClaimsError> {
        Ok(Self::deserialize(claims)?)
    }
}
