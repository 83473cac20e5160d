//! Error types for the publishing client.

use std::fmt;

use thiserror::Error;

/// Remote publishing primitive that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishOperation {
    OpenEdit,
    UploadBundle,
    AssignTrack,
    CommitEdit,
    ListGeneratedArtifacts,
    DownloadArtifact,
}

impl PublishOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenEdit => "open_edit",
            Self::UploadBundle => "upload_bundle",
            Self::AssignTrack => "assign_track",
            Self::CommitEdit => "commit_edit",
            Self::ListGeneratedArtifacts => "list_generated_artifacts",
            Self::DownloadArtifact => "download_artifact",
        }
    }
}

impl fmt::Display for PublishOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the store publishing API. Every variant is fatal to a job,
/// except an HTTP 400 on commit (see [`PublishError::is_commit_tolerated`]).
#[derive(Debug, Error)]
pub enum PublishError {
    /// The service answered with a non-2xx status.
    #[error("{operation} failed with HTTP {status}: {detail}")]
    Http {
        operation: PublishOperation,
        status: u16,
        detail: String,
    },

    /// The request never produced a response.
    #[error("{operation} failed: {message}")]
    Transport {
        operation: PublishOperation,
        message: String,
    },

    #[error("{operation} timed out")]
    Timeout { operation: PublishOperation },

    /// A 2xx response whose body could not be used.
    #[error("{operation} returned an unexpected response: {message}")]
    UnexpectedResponse {
        operation: PublishOperation,
        message: String,
    },

    /// The caller's credentials could not be turned into an API session.
    #[error("Invalid publishing credentials: {0}")]
    Credentials(String),
}

impl PublishError {
    /// HTTP status, when the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<PublishOperation> {
        match self {
            Self::Http { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Timeout { operation }
            | Self::UnexpectedResponse { operation, .. } => Some(*operation),
            Self::Credentials(_) => None,
        }
    }

    /// Human-readable detail suitable for a failure notification.
    pub fn detail(&self) -> String {
        match self {
            Self::Http { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// The store sometimes answers a commit with 400 even though the edit
    /// went through; that single case is not fatal.
    pub fn is_commit_tolerated(&self) -> bool {
        matches!(
            self,
            Self::Http {
                operation: PublishOperation::CommitEdit,
                status: 400,
                ..
            }
        )
    }

    pub(crate) fn from_reqwest(operation: PublishOperation, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout { operation }
        } else {
            Self::Transport {
                operation,
                message: error.to_string(),
            }
        }
    }
}

/// Pull `error.message` out of a Google-style error body, falling back to
/// the (truncated) raw body.
pub(crate) fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(operation: PublishOperation, status: u16) -> PublishError {
        PublishError::Http {
            operation,
            status,
            detail: "boom".to_string(),
        }
    }

    #[test]
    fn test_only_commit_400_is_tolerated() {
        assert!(http(PublishOperation::CommitEdit, 400).is_commit_tolerated());
        assert!(!http(PublishOperation::CommitEdit, 403).is_commit_tolerated());
        assert!(!http(PublishOperation::CommitEdit, 500).is_commit_tolerated());
        assert!(!http(PublishOperation::UploadBundle, 400).is_commit_tolerated());
        assert!(!PublishError::Timeout {
            operation: PublishOperation::CommitEdit
        }
        .is_commit_tolerated());
    }

    #[test]
    fn test_detail_prefers_service_message() {
        let err = http(PublishOperation::OpenEdit, 403);
        assert_eq!(err.detail(), "boom");
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.operation(), Some(PublishOperation::OpenEdit));

        let err = PublishError::Credentials("no token".to_string());
        assert!(err.detail().contains("no token"));
        assert_eq!(err.operation(), None);
    }

    #[test]
    fn test_error_detail_parses_google_error_body() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(error_detail(body), "The caller does not have permission");
    }

    #[test]
    fn test_error_detail_truncates_raw_body() {
        let body = "x".repeat(500);
        assert_eq!(error_detail(&body).len(), 200);
        assert_eq!(error_detail("plain text"), "plain text");
    }
}
