//! Bearer token presented to the distribution service.

use std::fmt;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use thiserror::Error;

use crate::config::DistributionConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid distribution signing key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign distribution token: {0}")]
    Signing(String),

    #[error("No distribution token configured")]
    Missing,
}

#[derive(Serialize)]
struct DistributionClaims<'a> {
    iss: &'a str,
    iat: i64,
    exp: i64,
    version: u32,
}

/// Source of the token attached to uploads and failure notifications.
///
/// With a signing key, every call to [`ServiceToken::issue`] mints a fresh
/// RS512 JWT so long-running jobs never present an expired token.
pub enum ServiceToken {
    Static(String),
    Signed {
        issuer: String,
        key: EncodingKey,
        ttl_secs: u64,
    },
}

impl ServiceToken {
    /// `signing_key` wins over `service_token` when both are set.
    pub fn from_config(config: &DistributionConfig) -> Result<Self, TokenError> {
        if let Some(pem) = &config.signing_key {
            let key = EncodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
            return Ok(Self::Signed {
                issuer: config.token_issuer.clone(),
                key,
                ttl_secs: config.token_ttl_secs,
            });
        }

        match config.service_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(Self::Static(token.to_string())),
            _ => Err(TokenError::Missing),
        }
    }

    pub fn issue(&self) -> Result<String, TokenError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Signed {
                issuer,
                key,
                ttl_secs,
            } => {
                let iat = chrono::Utc::now().timestamp();
                let claims = DistributionClaims {
                    iss: issuer,
                    iat,
                    exp: iat + *ttl_secs as i64,
                    version: 1,
                };
                encode(&Header::new(Algorithm::RS512), &claims, key)
                    .map_err(|e| TokenError::Signing(e.to_string()))
            }
        }
    }
}

impl fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("ServiceToken::Static(..)"),
            Self::Signed {
                issuer, ttl_secs, ..
            } => f
                .debug_struct("ServiceToken::Signed")
                .field("issuer", issuer)
                .field("ttl_secs", ttl_secs)
                .finish_non_exhaustive(),
        }
    }
}
