//! OAuth token exchange for Google service account keys.

use std::time::Instant;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::observe_external_call;

use super::error::error_detail;
use super::PublishError;

const SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECS: i64 = 3600;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The subset of a service account JSON key needed to request a token.
#[derive(Debug, Deserialize)]
pub(crate) struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountKey {
    /// `None` when the credentials are not a service account key.
    pub(crate) fn from_credentials(credentials: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(credentials.clone()).ok()
    }

    fn assertion(&self) -> Result<String, PublishError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| PublishError::Credentials(format!("invalid private_key: {}", e)))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_TTL_SECS,
        };

        encode(&header, &claims, &key)
            .map_err(|e| PublishError::Credentials(format!("failed to sign assertion: {}", e)))
    }

    /// Trade a signed assertion for an access token at `token_uri`.
    pub(crate) async fn exchange(&self, client: &Client) -> Result<String, PublishError> {
        let assertion = self.assertion()?;

        let start = Instant::now();
        let result = client
            .post(&self.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = result.map_err(|e| {
            observe_external_call("oauth", "token_exchange", elapsed, false);
            PublishError::Credentials(format!("token exchange failed: {}", e))
        })?;

        let status = response.status();
        observe_external_call("oauth", "token_exchange", elapsed, status.is_success());
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Credentials(format!(
                "token exchange rejected with {}: {}",
                status.as_u16(),
                error_detail(&body)
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            PublishError::Credentials(format!("unreadable token response: {}", e))
        })?;
        debug!(client_email = %self.client_email, "Exchanged service account key for access token");

        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{self, TEST_RSA_PUBLIC_KEY};
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_from_credentials_requires_key_fields() {
        assert!(ServiceAccountKey::from_credentials(&json!({"access_token": "t"})).is_none());
        assert!(ServiceAccountKey::from_credentials(&json!({"client_email": "a@b"})).is_none());

        let key = ServiceAccountKey::from_credentials(&json!({
            "client_email": "a@b",
            "private_key": "pem",
        }))
        .unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(key.private_key_id, None);
    }

    #[test]
    fn test_assertion_claims() {
        let key = ServiceAccountKey::from_credentials(&fixtures::service_account(
            "https://oauth.example.com/token",
        ))
        .unwrap();

        let assertion = key.assertion().unwrap();

        let header = jsonwebtoken::decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("key-1"));

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://oauth.example.com/token"]);
        let claims = decode::<HashMap<String, serde_json::Value>>(
            &assertion,
            &DecodingKey::from_rsa_pem(TEST_RSA_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims["iss"], "signer@play-signer-test.iam.gserviceaccount.com");
        assert_eq!(claims["scope"], SCOPE);
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            ASSERTION_TTL_SECS
        );
    }

    #[test]
    fn test_invalid_private_key_is_credentials_error() {
        let key = ServiceAccountKey::from_credentials(&json!({
            "client_email": "a@b",
            "private_key": "not a pem",
        }))
        .unwrap();

        assert!(matches!(key.assertion(), Err(PublishError::Credentials(_))));
    }
}
