//! Mock distribution client for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::distribution::{
    Artifact, DistributionError, Distributor, FailureNotice, UploadOutcome,
};

/// A recorded artifact upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub destination_id: String,
    pub token: String,
    pub outcome: Option<UploadOutcome>,
}

/// A recorded failure notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNotification {
    pub notice: FailureNotice,
    pub token: String,
}

/// How the mock answers an upload of a given file name.
#[derive(Debug, Clone, Copy)]
enum UploadBehavior {
    Reject(u16),
    Unreachable,
}

/// Mock implementation of the [`Distributor`] trait.
///
/// Records every upload (including rejected ones) and every notification.
#[derive(Debug, Clone, Default)]
pub struct MockDistributor {
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    notifications: Arc<RwLock<Vec<RecordedNotification>>>,
    behaviors: Arc<RwLock<HashMap<String, UploadBehavior>>>,
}

impl MockDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer uploads of `file_name` with HTTP `status`.
    pub async fn reject_upload(&self, file_name: &str, status: u16) {
        self.behaviors
            .write()
            .await
            .insert(file_name.to_string(), UploadBehavior::Reject(status));
    }

    /// Fail uploads of `file_name` with a transport error.
    pub async fn fail_upload(&self, file_name: &str) {
        self.behaviors
            .write()
            .await
            .insert(file_name.to_string(), UploadBehavior::Unreachable);
    }

    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// File names of uploads the service accepted, in order.
    pub async fn accepted_file_names(&self) -> Vec<String> {
        self.uploads
            .read()
            .await
            .iter()
            .filter(|u| u.outcome == Some(UploadOutcome::Accepted))
            .map(|u| u.file_name.clone())
            .collect()
    }

    pub async fn upload_count(&self) -> usize {
        self.uploads.read().await.len()
    }

    pub async fn recorded_notifications(&self) -> Vec<RecordedNotification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl Distributor for MockDistributor {
    async fn upload_artifact(
        &self,
        artifact: &Artifact,
        destination_id: &str,
        token: &str,
    ) -> Result<UploadOutcome, DistributionError> {
        let behavior = self.behaviors.read().await.get(&artifact.file_name).copied();
        let result = match behavior {
            None => Ok(UploadOutcome::Accepted),
            Some(UploadBehavior::Reject(status)) => Ok(UploadOutcome::Rejected { status }),
            Some(UploadBehavior::Unreachable) => Err(DistributionError::Transport(
                "mock connection refused".to_string(),
            )),
        };

        self.uploads.write().await.push(RecordedUpload {
            file_name: artifact.file_name.clone(),
            bytes: artifact.bytes.clone(),
            destination_id: destination_id.to_string(),
            token: token.to_string(),
            outcome: result.as_ref().ok().copied(),
        });
        result
    }

    async fn notify_failure(&self, notice: &FailureNotice, token: &str) {
        self.notifications.write().await.push(RecordedNotification {
            notice: notice.clone(),
            token: token.to_string(),
        });
    }
}
