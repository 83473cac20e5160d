//! Signing job orchestration.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::dispatcher::JobExecutor;
use crate::distribution::{Artifact, Distributor, FailureNotice, UploadOutcome};
use crate::metrics::{ARTIFACTS_FORWARDED, FAILURE_NOTIFICATIONS, JOBS_TOTAL, JOB_DURATION};
use crate::publisher::{
    CommitOutcome, PublishError, PublishOperation, Publisher, PublisherConnector,
};
use crate::targeting::{select_split_artifacts, SplitArtifact, TargetingSelection};

use super::types::{ArtifactError, JobError, JobReport, JobState, SigningJob};
use super::BundleFile;

/// Everything in a job except the bundle, which is consumed by the upload.
struct JobContext {
    job_id: Uuid,
    app_id: String,
    version_code: u32,
    destination_id: String,
    credentials: serde_json::Value,
    distribution_token: String,
}

/// Runs signing jobs against a publisher and a distributor.
///
/// Stateless between jobs; one instance is shared by all workers.
pub struct SigningPipeline {
    connector: Arc<dyn PublisherConnector>,
    distributor: Arc<dyn Distributor>,
    selection: TargetingSelection,
    track: Option<String>,
}

impl SigningPipeline {
    pub fn new(
        connector: Arc<dyn PublisherConnector>,
        distributor: Arc<dyn Distributor>,
        selection: TargetingSelection,
    ) -> Self {
        Self {
            connector,
            distributor,
            selection,
            track: None,
        }
    }

    /// Assign uploaded bundles to `track` before committing. An empty name
    /// means no assignment.
    pub fn with_track(mut self, track: Option<String>) -> Self {
        self.track = track.filter(|t| !t.trim().is_empty());
        self
    }

    /// Run one job to completion.
    ///
    /// Never fails: a fatal error is reported through the distributor's
    /// failure notification and recorded in the returned report.
    pub async fn run(&self, job: SigningJob) -> JobReport {
        let span = info_span!(
            "signing_job",
            job_id = %job.job_id,
            app_id = %job.app_id,
            version_code = job.version_code,
        );
        self.execute_job(job).instrument(span).await
    }

    async fn execute_job(&self, job: SigningJob) -> JobReport {
        let start = Instant::now();
        let SigningJob {
            job_id,
            bundle,
            app_id,
            version_code,
            destination_id,
            credentials,
            distribution_token,
        } = job;
        let ctx = JobContext {
            job_id,
            app_id,
            version_code,
            destination_id,
            credentials,
            distribution_token,
        };
        let mut report = JobReport::new(ctx.job_id);

        let result = self.drive(&ctx, bundle, &mut report).await;
        let outcome = match result {
            Ok(()) => {
                report.finish();
                info!(
                    splits_selected = report.splits_selected,
                    splits_forwarded = report.splits_forwarded,
                    splits_failed = report.splits_failed,
                    universal_forwarded = report.universal_forwarded,
                    "Signing job completed"
                );
                "succeeded"
            }
            Err(e) => {
                warn!(state = %report.reached, error = %e, "Signing job failed");
                report.fail(e.detail());
                self.notify_failure(&ctx, e.detail()).await;
                "failed"
            }
        };

        JOBS_TOTAL.with_label_values(&[outcome]).inc();
        JOB_DURATION
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        report
    }

    async fn drive(
        &self,
        ctx: &JobContext,
        bundle: BundleFile,
        report: &mut JobReport,
    ) -> Result<(), JobError> {
        let app_id = ctx.app_id.as_str();
        let publisher = self.connector.connect(&ctx.credentials).await?;

        let edit_id = publisher.open_edit(app_id).await?;
        report.advance(JobState::EditOpened);
        debug!(edit_id = %edit_id, "Edit opened");

        upload_bundle(publisher.as_ref(), app_id, &edit_id, bundle).await?;
        if let Some(track) = &self.track {
            publisher.assign_track(app_id, &edit_id, track).await?;
        }
        report.advance(JobState::BundleUploaded);
        debug!("Bundle uploaded");

        match publisher.commit_edit(app_id, &edit_id).await? {
            CommitOutcome::Committed => debug!("Edit committed"),
            CommitOutcome::Tolerated { detail } => {
                warn!(detail = %detail, "Commit reported 400, proceeding")
            }
        }
        report.advance(JobState::Committed);

        let manifest = publisher
            .list_generated_artifacts(app_id, ctx.version_code)
            .await?;
        report.advance(JobState::ArtifactsListed);

        let splits = select_split_artifacts(&manifest, &self.selection);
        report.splits_selected = splits.len();
        report.advance(JobState::SplitsFiltered);
        debug!(selected = splits.len(), "Splits filtered");

        for split in splits {
            match self.forward_split(publisher.as_ref(), ctx, split).await {
                Ok(()) => report.splits_forwarded += 1,
                Err(e) => {
                    warn!(download_id = %split.download_id, error = %e, "Failed to forward split");
                    report.splits_failed += 1;
                }
            }
        }
        report.advance(JobState::SplitsUploaded);

        let universal = manifest.universal_artifact.as_ref().ok_or_else(|| {
            PublishError::UnexpectedResponse {
                operation: PublishOperation::ListGeneratedArtifacts,
                message: "manifest has no universal APK".to_string(),
            }
        })?;
        let bytes = publisher
            .download_artifact(app_id, ctx.version_code, &universal.download_id)
            .await?;
        match self.forward(ctx, Artifact::universal(bytes), "universal").await {
            Ok(()) => report.universal_forwarded = true,
            Err(e) => warn!(error = %e, "Failed to forward universal APK"),
        }
        report.advance(JobState::UniversalUploaded);

        Ok(())
    }

    async fn forward_split(
        &self,
        publisher: &dyn Publisher,
        ctx: &JobContext,
        split: &SplitArtifact,
    ) -> Result<(), ArtifactError> {
        let bytes = match publisher
            .download_artifact(&ctx.app_id, ctx.version_code, &split.download_id)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                ARTIFACTS_FORWARDED.with_label_values(&["split", "failed"]).inc();
                return Err(ArtifactError::Download(e));
            }
        };
        let split_id = split.split_id.as_deref().unwrap_or(&split.download_id);

        self.forward(ctx, Artifact::split(split_id, bytes), "split")
            .await
    }

    async fn forward(
        &self,
        ctx: &JobContext,
        artifact: Artifact,
        kind: &str,
    ) -> Result<(), ArtifactError> {
        let result = match self
            .distributor
            .upload_artifact(&artifact, &ctx.destination_id, &ctx.distribution_token)
            .await
        {
            Ok(UploadOutcome::Accepted) => Ok(()),
            Ok(UploadOutcome::Rejected { status }) => Err(ArtifactError::Rejected { status }),
            Err(e) => Err(ArtifactError::Forward(e)),
        };

        let label = if result.is_ok() { "accepted" } else { "failed" };
        ARTIFACTS_FORWARDED.with_label_values(&[kind, label]).inc();
        if result.is_ok() {
            debug!(file_name = %artifact.file_name, "Artifact forwarded");
        }
        result
    }

    async fn notify_failure(&self, ctx: &JobContext, detail: String) {
        let notice = FailureNotice {
            destination_id: ctx.destination_id.clone(),
            app_id: ctx.app_id.clone(),
            version_code: ctx.version_code,
            detail,
        };
        self.distributor
            .notify_failure(&notice, &ctx.distribution_token)
            .await;
        FAILURE_NOTIFICATIONS.inc();
    }
}

/// Send the bundle and delete the staged file whatever the outcome.
async fn upload_bundle(
    publisher: &dyn Publisher,
    app_id: &str,
    edit_id: &str,
    bundle: BundleFile,
) -> Result<(), JobError> {
    let bytes = match bundle.read().await {
        Ok(bytes) => bytes,
        Err(e) => {
            bundle.discard().await;
            return Err(e.into());
        }
    };

    let result = publisher.upload_bundle(app_id, edit_id, bytes).await;
    bundle.discard().await;
    result.map_err(JobError::from)
}

#[async_trait]
impl JobExecutor for SigningPipeline {
    async fn execute(&self, job: SigningJob) {
        self.run(job).await;
    }
}
