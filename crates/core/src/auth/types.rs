use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use super::AuthError;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Extract the token from an `Authorization: Bearer <token>` header.
    ///
    /// A missing header is `NotAuthenticated`; anything that is not exactly
    /// two space-separated parts starting with `Bearer` is `MalformedHeader`.
    pub fn bearer_token(&self) -> Result<&str, AuthError> {
        let header = self
            .headers
            .get("authorization")
            .ok_or(AuthError::NotAuthenticated)?;

        let mut parts = header.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::MalformedHeader),
        }
    }
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            claims: HashMap::new(),
        }
    }
}
