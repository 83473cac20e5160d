//! Publishing client traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::targeting::GeneratedArtifactSet;

use super::PublishError;

/// Result of a commit the workflow may continue from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The store answered 400 but the edit is known to go through anyway.
    Tolerated { detail: String },
}

/// One authenticated session against the store publishing API.
///
/// Each method maps onto a single remote primitive. Nothing is retried:
/// re-opening an edit after a partial failure would start a new, unrelated
/// transaction.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Start an edit for `app_id` and return its identifier.
    async fn open_edit(&self, app_id: &str) -> Result<String, PublishError>;

    /// Attach the bundle to an open edit.
    async fn upload_bundle(
        &self,
        app_id: &str,
        edit_id: &str,
        bundle: Vec<u8>,
    ) -> Result<(), PublishError>;

    /// Release the uploaded bundle to `track` within the edit.
    async fn assign_track(
        &self,
        app_id: &str,
        edit_id: &str,
        track: &str,
    ) -> Result<(), PublishError>;

    /// Close the edit, which makes the store generate the APKs.
    async fn commit_edit(&self, app_id: &str, edit_id: &str)
        -> Result<CommitOutcome, PublishError>;

    /// Fetch the manifest of generated artifacts.
    async fn list_generated_artifacts(
        &self,
        app_id: &str,
        version_code: u32,
    ) -> Result<GeneratedArtifactSet, PublishError>;

    /// Fetch one generated artifact.
    async fn download_artifact(
        &self,
        app_id: &str,
        version_code: u32,
        download_id: &str,
    ) -> Result<Vec<u8>, PublishError>;
}

/// Turns a caller's opaque credentials into a [`Publisher`] session.
#[async_trait]
pub trait PublisherConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &serde_json::Value,
    ) -> Result<Arc<dyn Publisher>, PublishError>;
}
