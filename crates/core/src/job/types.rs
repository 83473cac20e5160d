use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::distribution::DistributionError;
use crate::publisher::PublishError;

use super::BundleFile;
use super::BundleError;

/// One inbound bundle and everything needed to publish and fan it out.
///
/// Owned by the worker that executes it and dropped on completion.
#[derive(Debug)]
pub struct SigningJob {
    pub job_id: Uuid,
    pub bundle: BundleFile,
    /// Store package name.
    pub app_id: String,
    pub version_code: u32,
    /// Destination account; also identifies the caller in notifications.
    pub destination_id: String,
    /// Opaque credentials blob handed to the publisher connector.
    pub credentials: serde_json::Value,
    /// Bearer token for the distribution service.
    pub distribution_token: String,
}

/// Progress of a signing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Start,
    EditOpened,
    BundleUploaded,
    Committed,
    ArtifactsListed,
    SplitsFiltered,
    SplitsUploaded,
    UniversalUploaded,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::EditOpened => "edit_opened",
            Self::BundleUploaded => "bundle_uploaded",
            Self::Committed => "committed",
            Self::ArtifactsListed => "artifacts_listed",
            Self::SplitsFiltered => "splits_filtered",
            Self::SplitsUploaded => "splits_uploaded",
            Self::UniversalUploaded => "universal_uploaded",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a job and trigger a failure notification.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Bundle(#[from] BundleError),
}

impl JobError {
    /// Text sent in the failure notification.
    pub fn detail(&self) -> String {
        match self {
            Self::Publish(e) => e.detail(),
            Self::Bundle(e) => e.to_string(),
        }
    }
}

/// A single artifact that could not be delivered. Logged, never fatal.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("download failed: {0}")]
    Download(#[source] PublishError),

    #[error("distribution service rejected the artifact with HTTP {status}")]
    Rejected { status: u16 },

    #[error("forward failed: {0}")]
    Forward(#[source] DistributionError),
}

/// Summary of one job run, for logs and tests.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `Done` or `Failed` once the job has finished.
    pub state: JobState,
    /// Last non-terminal state the job completed.
    pub reached: JobState,
    pub splits_selected: usize,
    pub splits_forwarded: usize,
    pub splits_failed: usize,
    pub universal_forwarded: bool,
    pub failure: Option<String>,
}

impl JobReport {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            started_at: Utc::now(),
            finished_at: None,
            state: JobState::Start,
            reached: JobState::Start,
            splits_selected: 0,
            splits_forwarded: 0,
            splits_failed: 0,
            universal_forwarded: false,
            failure: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == JobState::Done
    }

    pub(crate) fn advance(&mut self, state: JobState) {
        self.state = state;
        self.reached = state;
    }

    pub(crate) fn finish(&mut self) {
        self.state = JobState::Done;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, detail: String) {
        self.state = JobState::Failed;
        self.failure = Some(detail);
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::PublishOperation;

    #[test]
    fn test_report_transitions() {
        let mut report = JobReport::new(Uuid::new_v4());
        assert_eq!(report.state, JobState::Start);

        report.advance(JobState::EditOpened);
        report.advance(JobState::BundleUploaded);
        report.fail("boom".to_string());

        assert_eq!(report.state, JobState::Failed);
        assert_eq!(report.reached, JobState::BundleUploaded);
        assert!(report.state.is_terminal());
        assert!(!report.succeeded());
        assert!(report.finished_at.unwrap() >= report.started_at);
    }

    #[test]
    fn test_job_error_detail() {
        let err = JobError::from(PublishError::Http {
            operation: PublishOperation::CommitEdit,
            status: 500,
            detail: "Backend error".to_string(),
        });
        assert_eq!(err.detail(), "Backend error");
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobState::ArtifactsListed).unwrap(),
            "\"artifacts_listed\""
        );
        assert_eq!(JobState::UniversalUploaded.to_string(), "universal_uploaded");
    }
}
