//! Store-agnostic scenarios shared by the memory and Redis test suites.

use std::collections::HashSet;
use std::sync::Arc;

use beatcut_models::{
    stage, ArtifactType, Asset, AssetKind, JobStatus, NewArtifact, Project, ProjectId,
};
use beatcut_queue::{JobStore, QueueError};

/// A project with one video asset.
pub async fn seed_project(store: &dyn JobStore, name: &str) -> Project {
    let project = Project::new(name, "fast cuts", "clean", 1080, 1920, Some(10.0));
    store.put_project(&project).await.unwrap();
    let asset = Asset::new(project.id.clone(), "clip.mp4", "video/mp4", 1024, AssetKind::Video);
    store.add_asset(&asset).await.unwrap();
    project
}

pub async fn claims_oldest_first(store: &dyn JobStore) {
    let first = seed_project(store, "first").await;
    let second = seed_project(store, "second").await;
    let job_a = tokio_test::assert_ok!(store.enqueue_job(&first.id).await);
    let job_b = store.enqueue_job(&second.id).await.unwrap();

    let claimed = store.claim_next_queued_job().await.unwrap().unwrap();
    assert_eq!(claimed.job.id, job_a.id);
    assert_eq!(claimed.job.status, JobStatus::Processing);
    assert_eq!(claimed.job.stage, stage::ANALYZE);
    assert_eq!(claimed.job.progress, 0);
    assert!(claimed.job.started_at.is_some());
    assert_eq!(claimed.project.id, first.id);
    assert_eq!(claimed.assets.len(), 1);

    let next = store.claim_next_queued_job().await.unwrap().unwrap();
    assert_eq!(next.job.id, job_b.id);
    assert!(store.claim_next_queued_job().await.unwrap().is_none());
}

pub async fn concurrent_claims_are_exclusive(store: Arc<dyn JobStore>, jobs: usize) {
    let mut expected = HashSet::new();
    for i in 0..jobs {
        let project = seed_project(store.as_ref(), &format!("p{}", i)).await;
        expected.insert(store.enqueue_job(&project.id).await.unwrap().id);
    }

    let workers: Vec<_> = (0..jobs * 3)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.claim_next_queued_job().await.unwrap() })
        })
        .collect();

    let mut claimed = Vec::new();
    for result in futures::future::join_all(workers).await {
        if let Some(job) = result.unwrap() {
            claimed.push(job.job.id);
        }
    }

    let unique: HashSet<_> = claimed.iter().cloned().collect();
    assert_eq!(claimed.len(), jobs, "every job claimed exactly once");
    assert_eq!(unique, expected);
}

pub async fn terminal_states_are_absorbing(store: &dyn JobStore) {
    let project = seed_project(store, "terminal").await;
    let job = store.enqueue_job(&project.id).await.unwrap();

    // Not claimed yet: no progress, no terminal transition
    let err = store
        .update_job_progress(&job.id, stage::PLAN, 40, None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::NotProcessing { status: JobStatus::Queued, .. }));
    assert!(store.mark_job_completed(&job.id, None).await.is_err());

    store.claim_next_queued_job().await.unwrap().unwrap();
    let updated = store
        .update_job_progress(&job.id, stage::PLAN, 40, Some("planning".into()))
        .await
        .unwrap();
    assert_eq!(updated.stage, stage::PLAN);
    assert_eq!(updated.progress, 40);

    let done = store
        .mark_job_completed(&job.id, Some("done".into()))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());

    let err = store.mark_job_failed(&job.id, "late", None).await.unwrap_err();
    assert!(matches!(err, QueueError::NotProcessing { status: JobStatus::Completed, .. }));
    assert!(store
        .update_job_progress(&job.id, stage::RENDER, 65, None)
        .await
        .is_err());

    let stored = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.error, None);
    assert_eq!(stored.log_snippet.as_deref(), Some("done"));
}

pub async fn failure_records_error(store: &dyn JobStore) {
    let project = seed_project(store, "failing").await;
    let job = store.enqueue_job(&project.id).await.unwrap();
    store.claim_next_queued_job().await.unwrap().unwrap();

    let failed = store
        .mark_job_failed(&job.id, "render exploded", Some("tail".into()))
        .await
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.stage, stage::FAILED);
    assert_eq!(failed.progress, 100);
    assert_eq!(failed.error.as_deref(), Some("render exploded"));
    assert!(store.mark_job_completed(&job.id, None).await.is_err());
}

pub async fn one_active_job_per_project(store: &dyn JobStore) {
    let project = seed_project(store, "busy").await;
    let job = store.enqueue_job(&project.id).await.unwrap();

    let err = store.enqueue_job(&project.id).await.unwrap_err();
    match err {
        QueueError::ActiveJobExists { job_id, .. } => assert_eq!(job_id, job.id),
        other => panic!("unexpected error: {other}"),
    }

    store.claim_next_queued_job().await.unwrap().unwrap();
    assert!(store.enqueue_job(&project.id).await.is_err());

    store.mark_job_failed(&job.id, "boom", None).await.unwrap();
    let retry = store.enqueue_job(&project.id).await.unwrap();
    assert_ne!(retry.id, job.id);
}

pub async fn rejects_project_without_video(store: &dyn JobStore) {
    let project = Project::new("audio only", "", "hype", 1080, 1920, None);
    store.put_project(&project).await.unwrap();
    let audio = Asset::new(project.id.clone(), "song.mp3", "audio/mpeg", 10, AssetKind::Audio);
    store.add_asset(&audio).await.unwrap();

    let err = store.enqueue_job(&project.id).await.unwrap_err();
    assert!(matches!(err, QueueError::NoVideoAssets(_)));

    let err = store.enqueue_job(&ProjectId::from("missing")).await.unwrap_err();
    assert!(matches!(err, QueueError::ProjectNotFound(_)));
}

pub async fn artifacts_are_listed_in_order(store: &dyn JobStore) {
    let project = seed_project(store, "artifacts").await;
    let job = store.enqueue_job(&project.id).await.unwrap();

    for (kind, key) in [
        (ArtifactType::Analysis, "a.json"),
        (ArtifactType::Edl, "e.json"),
        (ArtifactType::Log, "l.log"),
    ] {
        store
            .create_artifact(NewArtifact {
                project_id: project.id.clone(),
                job_id: job.id.clone(),
                artifact_type: kind,
                storage_key: key.to_string(),
                content_type: "application/json".to_string(),
                size: Some(2),
            })
            .await
            .unwrap();
    }

    let listed = store.list_artifacts_for_job(&job.id).await.unwrap();
    let kinds: Vec<_> = listed.iter().map(|a| a.artifact_type).collect();
    assert_eq!(
        kinds,
        vec![ArtifactType::Analysis, ArtifactType::Edl, ArtifactType::Log]
    );
}
