//! Android Publisher v3 REST implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::PublisherConfig;
use crate::metrics::observe_external_call;
use crate::targeting::GeneratedArtifactSet;

use super::error::error_detail;
use super::service_account::ServiceAccountKey;
use super::{CommitOutcome, PublishError, PublishOperation, Publisher, PublisherConnector};

const SERVICE: &str = "publisher";

#[derive(Debug, Deserialize)]
struct EditResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedApksListResponse {
    #[serde(default)]
    generated_apks: Vec<GeneratedArtifactSet>,
}

/// Builds [`GooglePlayPublisher`] sessions from caller credentials.
///
/// The HTTP client (and its timeout) is created once and shared by every
/// session. Credentials are either a ready OAuth `access_token` or a service
/// account JSON key, which is exchanged for a token scoped to the publisher API.
pub struct GooglePlayConnector {
    client: Client,
    config: Arc<PublisherConfig>,
}

impl GooglePlayConnector {
    pub fn new(config: PublisherConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl PublisherConnector for GooglePlayConnector {
    async fn connect(
        &self,
        credentials: &serde_json::Value,
    ) -> Result<Arc<dyn Publisher>, PublishError> {
        let access_token = match credentials
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .filter(|token| !token.is_empty())
        {
            Some(token) => token.to_string(),
            None => match ServiceAccountKey::from_credentials(credentials) {
                Some(key) => key.exchange(&self.client).await?,
                None => {
                    return Err(PublishError::Credentials(
                        "credentials carry neither an access_token nor a service account key"
                            .to_string(),
                    ))
                }
            },
        };

        Ok(Arc::new(GooglePlayPublisher {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            access_token,
        }))
    }
}

/// A publishing session bound to one access token.
pub struct GooglePlayPublisher {
    client: Client,
    config: Arc<PublisherConfig>,
    access_token: String,
}

impl GooglePlayPublisher {
    fn app_url(&self, base: &str, app_id: &str) -> String {
        format!(
            "{}/androidpublisher/v3/applications/{}",
            base.trim_end_matches('/'),
            urlencoding::encode(app_id)
        )
    }

    fn edit_url(&self, app_id: &str, edit_id: &str) -> String {
        format!(
            "{}/edits/{}",
            self.app_url(&self.config.base_url, app_id),
            urlencoding::encode(edit_id)
        )
    }

    fn generated_url(&self, app_id: &str, version_code: u32) -> String {
        format!(
            "{}/generatedApks/{}",
            self.app_url(&self.config.base_url, app_id),
            version_code
        )
    }

    /// Send an authenticated request; any non-2xx status becomes an error.
    async fn send(
        &self,
        operation: PublishOperation,
        request: RequestBuilder,
    ) -> Result<Response, PublishError> {
        let start = Instant::now();
        let result = request.bearer_auth(&self.access_token).send().await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                observe_external_call(SERVICE, operation.as_str(), elapsed, false);
                return Err(PublishError::from_reqwest(operation, e));
            }
        };

        let status = response.status();
        observe_external_call(SERVICE, operation.as_str(), elapsed, status.is_success());
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PublishError::Http {
            operation,
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }
}

#[async_trait]
impl Publisher for GooglePlayPublisher {
    async fn open_edit(&self, app_id: &str) -> Result<String, PublishError> {
        let operation = PublishOperation::OpenEdit;
        let url = format!("{}/edits", self.app_url(&self.config.base_url, app_id));

        let edit: EditResponse = self
            .send(operation, self.client.post(&url).json(&json!({})))
            .await?
            .json()
            .await
            .map_err(|e| PublishError::UnexpectedResponse {
                operation,
                message: e.to_string(),
            })?;

        debug!(app_id, edit_id = %edit.id, "Opened edit");
        Ok(edit.id)
    }

    async fn upload_bundle(
        &self,
        app_id: &str,
        edit_id: &str,
        bundle: Vec<u8>,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/upload/androidpublisher/v3/applications/{}/edits/{}/bundles",
            self.config.upload_base_url.trim_end_matches('/'),
            urlencoding::encode(app_id),
            urlencoding::encode(edit_id)
        );
        let size = bundle.len();

        let request = self
            .client
            .post(&url)
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bundle);
        self.send(PublishOperation::UploadBundle, request).await?;

        debug!(app_id, edit_id, size, "Uploaded bundle");
        Ok(())
    }

    async fn assign_track(
        &self,
        app_id: &str,
        edit_id: &str,
        track: &str,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/tracks/{}",
            self.edit_url(app_id, edit_id),
            urlencoding::encode(track)
        );

        self.send(
            PublishOperation::AssignTrack,
            self.client.put(&url).json(&json!({ "track": track })),
        )
        .await?;

        debug!(app_id, edit_id, track, "Assigned track");
        Ok(())
    }

    async fn commit_edit(
        &self,
        app_id: &str,
        edit_id: &str,
    ) -> Result<CommitOutcome, PublishError> {
        let url = format!("{}:commit", self.edit_url(app_id, edit_id));

        match self
            .send(PublishOperation::CommitEdit, self.client.post(&url))
            .await
        {
            Ok(_) => {
                debug!(app_id, edit_id, "Committed edit");
                Ok(CommitOutcome::Committed)
            }
            Err(e) if e.is_commit_tolerated() => {
                warn!(app_id, edit_id, error = %e, "Commit answered 400, continuing as committed");
                Ok(CommitOutcome::Tolerated { detail: e.detail() })
            }
            Err(e) => Err(e),
        }
    }

    async fn list_generated_artifacts(
        &self,
        app_id: &str,
        version_code: u32,
    ) -> Result<GeneratedArtifactSet, PublishError> {
        let operation = PublishOperation::ListGeneratedArtifacts;
        let url = self.generated_url(app_id, version_code);

        let listing: GeneratedApksListResponse = self
            .send(operation, self.client.get(&url))
            .await?
            .json()
            .await
            .map_err(|e| PublishError::UnexpectedResponse {
                operation,
                message: e.to_string(),
            })?;

        listing
            .generated_apks
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::UnexpectedResponse {
                operation,
                message: format!("no generated APKs for version {}", version_code),
            })
    }

    async fn download_artifact(
        &self,
        app_id: &str,
        version_code: u32,
        download_id: &str,
    ) -> Result<Vec<u8>, PublishError> {
        let operation = PublishOperation::DownloadArtifact;
        let url = format!(
            "{}/downloads/{}:download",
            self.generated_url(app_id, version_code),
            urlencoding::encode(download_id)
        );

        let bytes = self
            .send(operation, self.client.get(&url).query(&[("alt", "media")]))
            .await?
            .bytes()
            .await
            .map_err(|e| PublishError::from_reqwest(operation, e))?;

        Ok(bytes.to_vec())
    }
}
