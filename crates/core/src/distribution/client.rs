//! reqwest implementation of [`Distributor`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{multipart, Client};
use tracing::{debug, error, warn};

use crate::config::DistributionConfig;
use crate::metrics::observe_external_call;

use super::{Artifact, DistributionError, Distributor, FailureNotice, UploadOutcome};

const SERVICE: &str = "distribution";

/// Distribution service client.
pub struct DistributionClient {
    client: Client,
    uploader_url: String,
    notifications_url: String,
}

impl DistributionClient {
    pub fn new(config: &DistributionConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            uploader_url: config.uploader_url.clone(),
            notifications_url: config.notifications_url.clone(),
        })
    }
}

#[async_trait]
impl Distributor for DistributionClient {
    async fn upload_artifact(
        &self,
        artifact: &Artifact,
        destination_id: &str,
        token: &str,
    ) -> Result<UploadOutcome, DistributionError> {
        let part = multipart::Part::bytes(artifact.bytes.clone())
            .file_name(artifact.file_name.clone())
            .mime_str("application/vnd.android.package-archive")?;
        let form = multipart::Form::new()
            .part("files[0]", part)
            .text("forceSignature", "true");

        let start = Instant::now();
        let result = self
            .client
            .post(&self.uploader_url)
            .query(&[("accountUid", destination_id)])
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                observe_external_call(SERVICE, "upload_artifact", elapsed, false);
                return Err(e.into());
            }
        };

        let status = response.status();
        observe_external_call(SERVICE, "upload_artifact", elapsed, status.is_success());

        if status.is_success() {
            debug!(
                file_name = %artifact.file_name,
                destination_id,
                size = artifact.bytes.len(),
                "Artifact accepted"
            );
            return Ok(UploadOutcome::Accepted);
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            file_name = %artifact.file_name,
            destination_id,
            status = status.as_u16(),
            body = %body,
            "Distribution service rejected artifact"
        );
        Ok(UploadOutcome::Rejected {
            status: status.as_u16(),
        })
    }

    async fn notify_failure(&self, notice: &FailureNotice, token: &str) {
        let version_code = notice.version_code.to_string();
        let params = [
            ("cauid", notice.destination_id.as_str()),
            ("package_name", notice.app_id.as_str()),
            ("version_code", version_code.as_str()),
            ("msg", notice.detail.as_str()),
        ];

        let start = Instant::now();
        let result = self
            .client
            .post(&self.notifications_url)
            .bearer_auth(token)
            .form(&params)
            .send()
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(_) => {
                observe_external_call(SERVICE, "notify_failure", elapsed, true);
                debug!(app_id = %notice.app_id, "Failure notification sent");
            }
            Err(e) => {
                observe_external_call(SERVICE, "notify_failure", elapsed, false);
                warn!(app_id = %notice.app_id, error = %e, "Failed to send failure notification");
            }
        }
    }
}
