//! Common test utilities for in-process API testing with mocks.
//!
//! The fixture wires the real router, auth middleware, dispatcher and
//! signing pipeline together, with the two remote services replaced by
//! the core's mock publisher and distributor.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use playsigner_core::testing::{MockDistributor, MockPublisher};
use playsigner_core::{
    create_authenticator, create_dispatcher, load_config_from_str, Authenticator, JobQueue,
    ServiceToken, SigningPipeline, TargetingSelection, WorkerPool,
};
use playsigner_server::state::AppState;

/// Re-export fixtures for test convenience
pub use playsigner_core::testing::fixtures;

const BOUNDARY: &str = "----playsigner-test-boundary";

/// Knobs for [`TestFixture::with_config`].
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Use `remote_session` auth against this URL instead of `none`.
    pub session_url: Option<String>,
    /// Trust JWTs from [`JWT_ISSUER`] signed with the test key.
    pub trust_jwt_issuer: bool,
    /// Mint distribution tokens with the test key instead of the static token.
    pub sign_distribution_tokens: bool,
}

/// Issuer accepted when `trust_jwt_issuer` is set.
pub const JWT_ISSUER: &str = "catappult.io";

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 8,
            session_url: None,
            trust_jwt_issuer: false,
            sign_distribution_tokens: false,
        }
    }
}

/// In-process server with controllable remote services.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new().await;
/// let response = fixture
///     .submit("/app/acc-1/com.example.app/42", Some(b"aab"), Some(r#"{"access_token":"t"}"#), None)
///     .await;
/// assert_eq!(response.status, 200);
/// ```
pub struct TestFixture {
    pub router: Router,
    pub publisher: MockPublisher,
    pub distributor: MockDistributor,
    pub queue: JobQueue,
    /// Where inbound bundles are staged
    pub temp_dir: TempDir,
    _workers: WorkerPool,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut auth = match &test_config.session_url {
            Some(url) => format!("method = \"remote_session\"\nsession_url = \"{}\"", url),
            None => "method = \"none\"".to_string(),
        };
        if test_config.trust_jwt_issuer {
            auth.push_str(&format!(
                "\n\n[auth.issuers]\n\"{}\" = '''\n{}'''",
                JWT_ISSUER,
                fixtures::TEST_RSA_PUBLIC_KEY
            ));
        }
        let token = if test_config.sign_distribution_tokens {
            format!("signing_key = '''\n{}'''", fixtures::TEST_RSA_PRIVATE_KEY)
        } else {
            format!("service_token = \"{}\"", fixtures::DISTRIBUTION_TOKEN)
        };
        let config = load_config_from_str(&format!(
            r#"
[auth]
{auth}

[server]
host = "127.0.0.1"
port = 8080
temp_dir = "{temp_dir}"

[distribution]
uploader_url = "http://127.0.0.1:9/upload"
notifications_url = "http://127.0.0.1:9/notifications"
{token}

[targeting]
densities = ["XHDPI"]
languages = ["ru"]

[dispatcher]
workers = {workers}
queue_capacity = {capacity}
"#,
            auth = auth,
            temp_dir = temp_dir.path().display(),
            token = token,
            workers = test_config.workers,
            capacity = test_config.queue_capacity,
        ))
        .expect("Failed to parse test config");

        let publisher = MockPublisher::new();
        let distributor = MockDistributor::new();
        publisher
            .set_manifest(fixtures::manifest(
                &[
                    fixtures::density_split("config.xhdpi", "XHDPI"),
                    fixtures::language_split("config.ru", "ru"),
                    fixtures::density_split("config.ldpi", "LDPI"),
                ],
                "dl-universal",
            ))
            .await;

        let pipeline = SigningPipeline::new(
            Arc::new(publisher.clone()),
            Arc::new(distributor.clone()),
            TargetingSelection::from(&config.targeting),
        );
        let (queue, workers) = create_dispatcher(Arc::new(pipeline), &config.dispatcher);

        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&config.auth).expect("Failed to create authenticator"));
        let service_token =
            ServiceToken::from_config(&config.distribution).expect("Failed to load service token");
        let state = Arc::new(AppState::new(
            config,
            authenticator,
            queue.clone(),
            service_token,
        ));
        let router = playsigner_server::api::create_router(state);

        Self {
            router,
            publisher,
            distributor,
            queue,
            temp_dir,
            _workers: workers,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart signing request. `None` leaves the field out.
    pub async fn submit(
        &self,
        path: &str,
        file: Option<&[u8]>,
        credentials: Option<&str>,
        authorization: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }

        let request = builder
            .body(Body::from(multipart_body(file, credentials)))
            .unwrap();
        self.send(request).await
    }

    /// Submit a valid bundle for the default app.
    pub async fn submit_default(&self) -> TestResponse {
        self.submit(
            &format!(
                "/app/{}/{}/{}",
                fixtures::DESTINATION_ID,
                fixtures::APP_ID,
                fixtures::VERSION_CODE
            ),
            Some(b"PK\x03\x04 bundle"),
            Some(r#"{"access_token": "ya29.test"}"#),
            None,
        )
        .await
    }

    /// Wait until the workers have finished `count` jobs.
    pub async fn wait_for_jobs(&self, count: u64) {
        for _ in 0..300 {
            if self.queue.status().total_processed >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {} jobs, status: {:?}",
            count,
            self.queue.status()
        );
    }

    /// Number of files currently staged.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse { status, body }
    }
}

fn multipart_body(file: Option<&[u8]>, credentials: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"app.aab\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    if let Some(text) = credentials {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"user_credentials\"\r\n\r\n{}\r\n",
                BOUNDARY, text
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
