//! Client for the downstream distribution service.
//!
//! Both calls are best-effort from the job's point of view: a rejected upload
//! is reported as an [`UploadOutcome`], and a failure notification never
//! reports anything back at all.

mod client;
mod token;

use async_trait::async_trait;
use thiserror::Error;

pub use client::DistributionClient;
pub use token::{ServiceToken, TokenError};

/// The distribution service could not be reached.
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("Distribution service request timed out")]
    Timeout,

    #[error("Distribution service request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for DistributionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// What the distribution service made of one uploaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Accepted,
    Rejected { status: u16 },
}

/// One signed APK ready to be forwarded.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Multipart file name, e.g. `universal.apk` or `config.xhdpi.apk`.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn universal(bytes: Vec<u8>) -> Self {
        Self {
            file_name: "universal.apk".to_string(),
            bytes,
        }
    }

    pub fn split(split_id: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("{}.apk", split_id),
            bytes,
        }
    }
}

/// Payload of a failure notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    /// Caller-correlation identifier (the destination account).
    pub destination_id: String,
    pub app_id: String,
    pub version_code: u32,
    pub detail: String,
}

#[async_trait]
pub trait Distributor: Send + Sync {
    /// Forward one artifact to `destination_id`.
    async fn upload_artifact(
        &self,
        artifact: &Artifact,
        destination_id: &str,
        token: &str,
    ) -> Result<UploadOutcome, DistributionError>;

    /// Report a failed job. Errors are logged, never returned.
    async fn notify_failure(&self, notice: &FailureNotice, token: &str);
}
