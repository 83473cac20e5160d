//! Signing lifecycle integration tests.
//!
//! These tests drive the dispatcher and the signing pipeline together with
//! the mock publisher and distributor:
//! - Jobs submitted to the queue run to completion on the workers
//! - Every job gets its own edit
//! - Failures are notified once per job and do not stop the pool
//! - Staged bundles never outlive their job

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use playsigner_core::{
    config::DispatcherConfig,
    create_dispatcher,
    testing::{fixtures, MockDistributor, MockPublisher, PublisherCall},
    JobQueue, PublishOperation, SigningPipeline, TargetingSelection, WorkerPool,
};

/// Test helper wiring a dispatcher to a pipeline over mocks.
struct TestHarness {
    queue: JobQueue,
    workers: WorkerPool,
    publisher: MockPublisher,
    distributor: MockDistributor,
    bundle_dir: TempDir,
}

impl TestHarness {
    async fn new(workers: usize, track: Option<&str>) -> Self {
        let publisher = MockPublisher::new();
        let distributor = MockDistributor::new();
        publisher
            .set_manifest(fixtures::manifest(
                &[
                    fixtures::density_split("config.xhdpi", "XHDPI"),
                    fixtures::density_split("config.mdpi", "MDPI"),
                    fixtures::language_split("config.ru", "ru"),
                    fixtures::language_split("config.de", "de"),
                ],
                "dl-universal",
            ))
            .await;

        let pipeline = SigningPipeline::new(
            Arc::new(publisher.clone()),
            Arc::new(distributor.clone()),
            TargetingSelection::new(["XHDPI"], ["ru"]),
        )
        .with_track(track.map(str::to_string));

        let (queue, workers) = create_dispatcher(
            Arc::new(pipeline),
            &DispatcherConfig {
                workers,
                queue_capacity: 16,
            },
        );

        Self {
            queue,
            workers,
            publisher,
            distributor,
            bundle_dir: TempDir::new().expect("Failed to create bundle dir"),
        }
    }

    async fn submit(&self, count: usize) {
        for _ in 0..count {
            let job = fixtures::signing_job(self.bundle_dir.path()).await;
            self.queue.submit(job).expect("queue accepts job");
        }
    }

    /// Close the queue and wait for the workers to drain it.
    async fn drain(self) -> (MockPublisher, MockDistributor, TempDir) {
        let Self {
            queue,
            workers,
            publisher,
            distributor,
            bundle_dir,
        } = self;
        drop(queue);
        tokio::time::timeout(Duration::from_secs(10), workers.join())
            .await
            .expect("workers drained in time");
        (publisher, distributor, bundle_dir)
    }
}

fn staged_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_queued_jobs_all_complete() {
    let harness = TestHarness::new(2, None).await;
    harness.submit(3).await;

    let (publisher, distributor, bundle_dir) = harness.drain().await;

    assert_eq!(publisher.edit_count().await, 3);
    assert_eq!(distributor.upload_count().await, 9);

    let names = distributor.accepted_file_names().await;
    assert_eq!(names.iter().filter(|n| *n == "universal.apk").count(), 3);
    assert!(!names.iter().any(|n| n == "config.mdpi.apk" || n == "config.de.apk"));

    assert!(distributor.recorded_notifications().await.is_empty());
    assert_eq!(staged_files(&bundle_dir), 0);
}

#[tokio::test]
async fn test_track_assigned_before_commit() {
    let harness = TestHarness::new(1, Some("internal")).await;
    harness.submit(1).await;

    let (publisher, _, _) = harness.drain().await;
    let calls = publisher.recorded_calls().await;

    let track = calls
        .iter()
        .position(|c| matches!(c, PublisherCall::AssignTrack { track, .. } if track == "internal"))
        .expect("track assigned");
    let commit = calls
        .iter()
        .position(|c| matches!(c, PublisherCall::CommitEdit { .. }))
        .expect("edit committed");
    assert!(track < commit);
}

#[tokio::test]
async fn test_failed_jobs_notify_and_pool_keeps_running() {
    let harness = TestHarness::new(2, None).await;
    harness
        .publisher
        .fail_operation(PublishOperation::UploadBundle, 503)
        .await;
    harness.submit(4).await;

    let (publisher, distributor, bundle_dir) = harness.drain().await;

    let notifications = distributor.recorded_notifications().await;
    assert_eq!(notifications.len(), 4);
    for notification in &notifications {
        assert_eq!(notification.notice.destination_id, fixtures::DESTINATION_ID);
        assert_eq!(notification.notice.version_code, fixtures::VERSION_CODE);
        assert_eq!(notification.token, fixtures::DISTRIBUTION_TOKEN);
    }

    assert_eq!(distributor.upload_count().await, 0);
    assert!(!publisher
        .recorded_calls()
        .await
        .iter()
        .any(|c| matches!(c, PublisherCall::CommitEdit { .. })));
    assert_eq!(staged_files(&bundle_dir), 0);
}

#[tokio::test]
async fn test_failed_split_does_not_stop_universal() {
    let harness = TestHarness::new(1, None).await;
    harness.distributor.reject_upload("config.ru.apk", 502).await;
    harness.submit(1).await;

    let (_, distributor, _) = harness.drain().await;

    assert_eq!(
        distributor.accepted_file_names().await,
        vec!["config.xhdpi.apk", "universal.apk"]
    );
    assert!(distributor.recorded_notifications().await.is_empty());
}
