//! Mock publisher for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::publisher::{
    CommitOutcome, PublishError, PublishOperation, Publisher, PublisherConnector,
};
use crate::targeting::GeneratedArtifactSet;

/// A recorded publisher call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherCall {
    Connect,
    OpenEdit { app_id: String },
    UploadBundle { edit_id: String, size: usize },
    AssignTrack { edit_id: String, track: String },
    CommitEdit { edit_id: String },
    ListGeneratedArtifacts { version_code: u32 },
    DownloadArtifact { download_id: String },
}

/// Mock implementation of both [`PublisherConnector`] and [`Publisher`].
///
/// Clones share state, so a test can keep one handle for assertions and
/// give another to the code under test.
///
/// - Every call is recorded in order
/// - Operations can be made to fail with an HTTP status
/// - Individual downloads can be made to fail
/// - Downloaded bytes are `apk:<download_id>`
///
/// # Example
///
/// ```rust,ignore
/// use playsigner_core::testing::{fixtures, MockPublisher};
///
/// let publisher = MockPublisher::new();
/// publisher.set_manifest(fixtures::manifest(&[], "d-universal")).await;
/// publisher.fail_operation(PublishOperation::CommitEdit, 500).await;
/// ```
#[derive(Debug, Clone)]
pub struct MockPublisher {
    calls: Arc<RwLock<Vec<PublisherCall>>>,
    manifest: Arc<RwLock<GeneratedArtifactSet>>,
    operation_failures: Arc<RwLock<HashMap<PublishOperation, u16>>>,
    download_failures: Arc<RwLock<HashMap<String, u16>>>,
    reject_credentials: Arc<RwLock<bool>>,
    /// Simulated latency of every call.
    latency: Arc<RwLock<Duration>>,
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            manifest: Arc::new(RwLock::new(GeneratedArtifactSet::default())),
            operation_failures: Arc::new(RwLock::new(HashMap::new())),
            download_failures: Arc::new(RwLock::new(HashMap::new())),
            reject_credentials: Arc::new(RwLock::new(false)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Manifest returned by `list_generated_artifacts`.
    pub async fn set_manifest(&self, manifest: GeneratedArtifactSet) {
        *self.manifest.write().await = manifest;
    }

    /// Make every call of `operation` answer with HTTP `status`.
    ///
    /// A 400 on commit behaves like the real client and is tolerated.
    pub async fn fail_operation(&self, operation: PublishOperation, status: u16) {
        self.operation_failures
            .write()
            .await
            .insert(operation, status);
    }

    /// Make downloads of `download_id` answer with HTTP `status`.
    pub async fn fail_download(&self, download_id: &str, status: u16) {
        self.download_failures
            .write()
            .await
            .insert(download_id.to_string(), status);
    }

    /// Make `connect` reject any credentials.
    pub async fn set_reject_credentials(&self, reject: bool) {
        *self.reject_credentials.write().await = reject;
    }

    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<PublisherCall> {
        self.calls.read().await.clone()
    }

    /// Download identifiers requested, in call order.
    pub async fn downloaded_ids(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                PublisherCall::DownloadArtifact { download_id } => Some(download_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of edits opened.
    pub async fn edit_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| matches!(call, PublisherCall::OpenEdit { .. }))
            .count()
    }

    async fn record(&self, operation: Option<PublishOperation>, call: PublisherCall) -> Result<(), PublishError> {
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.calls.write().await.push(call);

        let status = match operation {
            Some(operation) => self.operation_failures.read().await.get(&operation).copied(),
            None => None,
        };
        match (operation, status) {
            (Some(operation), Some(status)) => Err(PublishError::Http {
                operation,
                status,
                detail: format!("mock {} failure", operation),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PublisherConnector for MockPublisher {
    async fn connect(
        &self,
        _credentials: &serde_json::Value,
    ) -> Result<Arc<dyn Publisher>, PublishError> {
        self.record(None, PublisherCall::Connect).await?;
        if *self.reject_credentials.read().await {
            return Err(PublishError::Credentials("mock rejected credentials".to_string()));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn open_edit(&self, app_id: &str) -> Result<String, PublishError> {
        self.record(
            Some(PublishOperation::OpenEdit),
            PublisherCall::OpenEdit {
                app_id: app_id.to_string(),
            },
        )
        .await?;
        Ok(format!("edit-{}", self.edit_count().await))
    }

    async fn upload_bundle(
        &self,
        _app_id: &str,
        edit_id: &str,
        bundle: Vec<u8>,
    ) -> Result<(), PublishError> {
        self.record(
            Some(PublishOperation::UploadBundle),
            PublisherCall::UploadBundle {
                edit_id: edit_id.to_string(),
                size: bundle.len(),
            },
        )
        .await
    }

    async fn assign_track(
        &self,
        _app_id: &str,
        edit_id: &str,
        track: &str,
    ) -> Result<(), PublishError> {
        self.record(
            Some(PublishOperation::AssignTrack),
            PublisherCall::AssignTrack {
                edit_id: edit_id.to_string(),
                track: track.to_string(),
            },
        )
        .await
    }

    async fn commit_edit(
        &self,
        _app_id: &str,
        edit_id: &str,
    ) -> Result<CommitOutcome, PublishError> {
        let result = self
            .record(
                Some(PublishOperation::CommitEdit),
                PublisherCall::CommitEdit {
                    edit_id: edit_id.to_string(),
                },
            )
            .await;

        match result {
            Ok(()) => Ok(CommitOutcome::Committed),
            Err(e) if e.is_commit_tolerated() => Ok(CommitOutcome::Tolerated { detail: e.detail() }),
            Err(e) => Err(e),
        }
    }

    async fn list_generated_artifacts(
        &self,
        _app_id: &str,
        version_code: u32,
    ) -> Result<GeneratedArtifactSet, PublishError> {
        self.record(
            Some(PublishOperation::ListGeneratedArtifacts),
            PublisherCall::ListGeneratedArtifacts { version_code },
        )
        .await?;
        Ok(self.manifest.read().await.clone())
    }

    async fn download_artifact(
        &self,
        _app_id: &str,
        _version_code: u32,
        download_id: &str,
    ) -> Result<Vec<u8>, PublishError> {
        self.record(
            Some(PublishOperation::DownloadArtifact),
            PublisherCall::DownloadArtifact {
                download_id: download_id.to_string(),
            },
        )
        .await?;

        if let Some(status) = self.download_failures.read().await.get(download_id) {
            return Err(PublishError::Http {
                operation: PublishOperation::DownloadArtifact,
                status: *status,
                detail: format!("mock download failure for {}", download_id),
            });
        }
        Ok(format!("apk:{}", download_id).into_bytes())
    }
}
