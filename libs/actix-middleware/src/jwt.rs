//! Shared JWT validation for Trellis services.
//!
//! Tokens are issued by the identity service and validated here with its RSA
//! public key. RS256 only: accepting HS256 alongside an asymmetric key opens
//! the classic algorithm-confusion hole, so the validation set is pinned.
//!
//! Services must call [`initialize_validation`] once during startup before any
//! token is checked; the decoding key is immutable afterwards.

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Claims carried by identity-service access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token type: "access" or "refresh"
    pub token_type: String,
    /// Display username
    pub username: String,
}

static JWT_DECODING_KEY: OnceCell<DecodingKey> = OnceCell::new();

/// Install the identity service's public key (PEM).
///
/// Can only be called once; later calls fail rather than silently swapping
/// the trust anchor.
pub fn initialize_validation(public_key_pem: &str) -> Result<()> {
    let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| anyhow!("invalid RSA public key PEM: {e}"))?;

    JWT_DECODING_KEY
        .set(decoding_key)
        .map_err(|_| anyhow!("JWT validation key already initialized"))
}

/// Validate an access token and return its claims.
pub fn validate_token(token: &str) -> Result<TokenData<Claims>> {
    let decoding_key = JWT_DECODING_KEY
        .get()
        .ok_or_else(|| anyhow!("JWT validation key not initialized"))?;

    let validation = Validation::new(JWT_ALGORITHM);
    let token_data = decode::<Claims>(token, decoding_key, &validation)
        .map_err(|e| anyhow!("token validation failed: {e}"))?;

    if token_data.claims.token_type != "access" {
        return Err(anyhow!(
            "expected access token, got {}",
            token_data.claims.token_type
        ));
    }

    Ok(token_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_pem() {
        assert!(DecodingKey::from_rsa_pem(b"not a pem").is_err());
    }

    #[test]
    fn validate_without_initialization_fails() {
        // The OnceCell is process-global; this test only asserts behavior when
        // no key was installed, which holds for the lib's own test binary.
        let err = validate_token("xx.yy.zz").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not initialized") || msg.contains("validation failed"));
    }
}
