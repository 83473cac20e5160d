//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use playsigner_core::{AuthError, AuthRequest, Identity};

use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Authentication middleware that validates requests using the configured authenticator.
///
/// Runs before the handler reads the body, so a rejected caller never gets a
/// job created. Status mapping:
/// - no `Authorization` header: 401
/// - header not of the form `Bearer <token>`: 400
/// - token is not a JWT once the session rejected it: 400
/// - token rejected: 401
/// - session service unreachable or misconfigured: 500
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let authenticator = state.authenticator();

    // Skip auth check if using NoneAuthenticator, but still insert anonymous identity
    if authenticator.method_name() == "none" {
        let mut request = request;
        request.extensions_mut().insert(Identity::anonymous());
        return Ok(next.run(request).await);
    }

    // Extract headers into HashMap for AuthRequest
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    // Get source IP (default to localhost if not available)
    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            let mut request = request;
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["not_authenticated"]).inc();
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(AuthError::MalformedHeader) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["malformed_header"]).inc();
            Err(StatusCode::BAD_REQUEST)
        }
        Err(AuthError::MalformedToken) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["malformed_token"]).inc();
            Err(StatusCode::BAD_REQUEST)
        }
        Err(AuthError::InvalidCredentials(reason)) => {
            debug!(%source_ip, reason = %reason, "Rejected credentials");
            AUTH_FAILURES_TOTAL.with_label_values(&["invalid_credentials"]).inc();
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(_) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["internal_error"]).inc();
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Extractor for authenticated user ID.
///
/// Extracts the user_id from the Identity stored in request extensions.
/// Falls back to "anonymous" if no identity is present.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        http::header,
        middleware,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use playsigner_core::testing::{MockDistributor, MockPublisher};
    use playsigner_core::{
        create_dispatcher, Authenticator, Config, NoneAuthenticator, ServiceToken,
        SigningPipeline, TargetingSelection,
    };
    use tower::ServiceExt;

    /// Accepts only `Bearer good`; `Bearer down` simulates an unreachable session service
    /// and `Bearer opaque` a token that is not a JWT.
    struct StaticAuthenticator;

    #[async_trait]
    impl Authenticator for StaticAuthenticator {
        async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
            match request.bearer_token()? {
                "good" => Ok(Identity {
                    user_id: "user-1".to_string(),
                    method: "static".to_string(),
                    claims: HashMap::new(),
                }),
                "down" => Err(AuthError::ServiceUnavailable("session service down".to_string())),
                "opaque" => Err(AuthError::MalformedToken),
                _ => Err(AuthError::InvalidCredentials("unknown token".to_string())),
            }
        }

        fn method_name(&self) -> &'static str {
            "static"
        }
    }

    fn test_config() -> Config {
        playsigner_core::load_config_from_str(
            r#"
[auth]
method = "none"

[distribution]
uploader_url = "http://127.0.0.1:9/upload"
notifications_url = "http://127.0.0.1:9/notifications"
service_token = "svc"
"#,
        )
        .unwrap()
    }

    async fn user_handler(AuthUser(user_id): AuthUser) -> String {
        user_id
    }

    fn app(authenticator: Arc<dyn Authenticator>) -> Router {
        let config = test_config();
        let pipeline = SigningPipeline::new(
            Arc::new(MockPublisher::new()),
            Arc::new(MockDistributor::new()),
            TargetingSelection::from(&config.targeting),
        );
        let (queue, _pool) = create_dispatcher(Arc::new(pipeline), &config.dispatcher);
        let service_token = ServiceToken::from_config(&config.distribution).unwrap();
        let state = Arc::new(AppState::new(config, authenticator, queue, service_token));

        Router::new()
            .route("/test", get(user_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_none_auth_allows_all_as_anonymous() {
        let (status, user) = call(app(Arc::new(NoneAuthenticator::new())), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user, "anonymous");
    }

    #[tokio::test]
    async fn test_valid_token_passes_identity() {
        let (status, user) = call(app(Arc::new(StaticAuthenticator)), Some("Bearer good")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user, "user-1");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (status, _) = call(app(Arc::new(StaticAuthenticator)), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_header_is_bad_request() {
        for value in ["good", "Basic good", "Bearer", "Bearer a b"] {
            let (status, _) = call(app(Arc::new(StaticAuthenticator)), Some(value)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", value);
        }
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let (status, _) = call(app(Arc::new(StaticAuthenticator)), Some("Bearer bad")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_jwt_token_is_bad_request() {
        let (status, _) = call(app(Arc::new(StaticAuthenticator)), Some("Bearer opaque")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unavailable_session_service_is_internal_error() {
        let (status, _) = call(app(Arc::new(StaticAuthenticator)), Some("Bearer down")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
