//! Bearer token validation against a fixed set of trusted JWT issuers.

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Claims are kept loosely typed; only `iss` (and `sub`, when present) matter.
type Claims = HashMap<String, serde_json::Value>;

/// Authenticator that accepts RSA-signed JWTs from known issuers.
///
/// The token's `iss` claim selects the public key. A token that does not
/// parse as a JWT is `MalformedToken`; an unknown issuer or a bad signature
/// is `InvalidCredentials`. `exp` is enforced when present.
pub struct JwtAuthenticator {
    keys: HashMap<String, DecodingKey>,
}

impl JwtAuthenticator {
    /// Build from an issuer → PEM public key map.
    pub fn new(issuers: &HashMap<String, String>) -> Result<Self, AuthError> {
        if issuers.is_empty() {
            return Err(AuthError::ConfigurationError(
                "at least one trusted issuer is required for JWT auth".to_string(),
            ));
        }

        let keys = issuers
            .iter()
            .map(|(issuer, pem)| {
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map(|key| (issuer.clone(), key))
                    .map_err(|e| {
                        AuthError::ConfigurationError(format!(
                            "invalid public key for issuer {}: {}",
                            issuer, e
                        ))
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self { keys })
    }

    /// Verify a raw token and return the identity it carries.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let issuer = peek_issuer(token)?;
        let key = self.keys.get(&issuer).ok_or_else(|| {
            AuthError::InvalidCredentials(format!("issuer '{}' is not accepted", issuer))
        })?;

        let mut validation = Validation::new(Algorithm::RS512);
        validation.algorithms = vec![Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.set_issuer(&[issuer.as_str()]);

        let data = decode::<Claims>(token, key, &validation)
            .map_err(|e| AuthError::InvalidCredentials(format!("token rejected: {}", e)))?;

        let user_id = data
            .claims
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&issuer)
            .to_string();
        debug!(issuer = %issuer, user_id = %user_id, "JWT accepted");

        Ok(Identity {
            user_id,
            method: "jwt".to_string(),
            claims: data.claims,
        })
    }
}

/// Read `iss` without checking the signature.
fn peek_issuer(token: &str) -> Result<String, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|_| AuthError::MalformedToken)?;

    Ok(data
        .claims
        .get("iss")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string())
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = request.bearer_token()?;
        self.verify(token)
    }

    fn method_name(&self) -> &'static str {
        "jwt"
    }
}
