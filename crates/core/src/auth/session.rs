//! Bearer token validation against a remote session endpoint.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{AuthError, AuthRequest, Authenticator, Identity, JwtAuthenticator};

/// Authenticator that asks the distribution service whether a bearer token
/// belongs to a live session.
///
/// The token is forwarded unchanged to `GET <session_url>`. A 200 accepts the
/// request, anything else rejects it; statuses other than 200/401 are also
/// logged since they usually mean the session service itself is unhealthy.
///
/// With a JWT fallback configured, a token the session service rejects is
/// then checked as a JWT from a trusted issuer.
pub struct RemoteSessionAuthenticator {
    client: Client,
    session_url: String,
    fallback: Option<JwtAuthenticator>,
}

impl RemoteSessionAuthenticator {
    pub fn new(session_url: String, timeout_secs: u64) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AuthError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            client,
            session_url,
            fallback: None,
        })
    }

    /// Check session-rejected tokens against trusted JWT issuers.
    pub fn with_jwt_fallback(mut self, fallback: JwtAuthenticator) -> Self {
        self.fallback = Some(fallback);
        self
    }

    async fn check_session(&self, request: &AuthRequest, token: &str) -> Result<Identity, AuthError> {
        let response = self
            .client
            .get(&self.session_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                debug!(source_ip = %request.source_ip, "Session token accepted");
                Ok(Identity {
                    user_id: "session_user".to_string(),
                    method: "remote_session".to_string(),
                    claims: HashMap::new(),
                })
            }
            StatusCode::UNAUTHORIZED => Err(AuthError::InvalidCredentials(
                "Session rejected the token".to_string(),
            )),
            status => {
                warn!(%status, "Session endpoint returned unexpected status");
                Err(AuthError::InvalidCredentials(format!(
                    "Session endpoint returned {}",
                    status
                )))
            }
        }
    }
}

#[async_trait]
impl Authenticator for RemoteSessionAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = request.bearer_token()?;

        match (self.check_session(request, token).await, &self.fallback) {
            (Err(AuthError::InvalidCredentials(_)), Some(jwt)) => jwt.verify(token),
            (result, _) => result,
        }
    }

    fn method_name(&self) -> &'static str {
        "remote_session"
    }
}
