use jobhunt_core::config::{IngestConfig, SchedulingConfig};
use jobhunt_core::models::{SearchProfile, SourceKind, Target};
use jobhunt_core::retry::RetryPolicy;
use jobhunt_core::scoring::Scorer;
use jobhunt_core::testutil::{MockReporter, MockSource, make_posting, make_profile};
use jobhunt_core::{AppError, IngestService};
use jobhunt_db::{JobRepository, ProfileRepository, RunMetricsRepository};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::integration::common::setup_test_db;

fn pm_profile(owner: &str, id: &str) -> SearchProfile {
    let mut p = make_profile(&["product manager"]);
    p.owner_id = owner.into();
    p.profile_id = id.into();
    p
}

fn service(
    source: MockSource,
    jobs: JobRepository,
    profiles: ProfileRepository,
) -> IngestService<MockSource, JobRepository, ProfileRepository> {
    IngestService::new(
        source,
        jobs,
        profiles,
        Scorer::default(),
        IngestConfig::default()
            .with_retry(RetryPolicy::new(2, Duration::ZERO))
            .with_scheduling(SchedulingConfig::immediate()),
    )
}

fn stripe_source() -> MockSource {
    let source = MockSource::new();
    source.push_ok(
        "stripe",
        vec![
            make_posting("Stripe", "Senior Product Manager", "Remote"),
            make_posting("Stripe", "Software Engineer", "Remote"),
        ],
    );
    source
}

#[tokio::test]
async fn ingestion_is_idempotent_across_runs() {
    let (pool, _container) = setup_test_db().await;
    let jobs = JobRepository::new(pool.clone());
    let profiles = ProfileRepository::new(pool.clone());
    profiles.upsert(&pm_profile("u1", "p1")).await.unwrap();
    profiles.upsert(&pm_profile("u2", "p1")).await.unwrap();

    let targets = vec![Target::new("Stripe", SourceKind::Greenhouse, "stripe", 1)];

    let first = service(stripe_source(), jobs.clone(), profiles.clone())
        .run(targets.clone(), CancellationToken::new(), &MockReporter::new())
        .await
        .unwrap();
    assert_eq!(first.total_postings(), 2);
    assert_eq!(first.total_matches(), 2);
    assert_eq!(first.persistence_errors, 0);
    assert_eq!(jobs.count_active().await.unwrap(), 1);
    assert_eq!(jobs.matches_for_user("u1").await.unwrap().len(), 1);
    assert_eq!(jobs.matches_for_user("u2").await.unwrap().len(), 1);

    let second = service(stripe_source(), jobs.clone(), profiles)
        .run(targets, CancellationToken::new(), &MockReporter::new())
        .await
        .unwrap();
    assert_eq!(second.total_postings(), 2);
    assert_eq!(second.total_matches(), 0);
    assert_eq!(jobs.count_active().await.unwrap(), 1);
    assert_eq!(jobs.matches_for_user("u1").await.unwrap().len(), 1);

    let runs = RunMetricsRepository::new(pool).latest(5).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second.id);
}

#[tokio::test]
async fn failing_board_is_recorded_and_others_persist() {
    let (pool, _container) = setup_test_db().await;
    let jobs = JobRepository::new(pool.clone());
    let profiles = ProfileRepository::new(pool);
    profiles.upsert(&pm_profile("u1", "p1")).await.unwrap();

    let source = stripe_source();
    for _ in 0..2 {
        source.push_err(
            "notion",
            AppError::UpstreamStatus {
                status: 503,
                url: "https://api.ashbyhq.com/posting-api/job-board/notion".into(),
            },
        );
    }

    let metrics = service(source.clone(), jobs.clone(), profiles)
        .run(
            vec![
                Target::new("Stripe", SourceKind::Greenhouse, "stripe", 1),
                Target::new("Notion", SourceKind::Ashby, "notion", 2),
            ],
            CancellationToken::new(),
            &MockReporter::new(),
        )
        .await
        .unwrap();

    assert_eq!(metrics.targets_succeeded(), 1);
    assert_eq!(metrics.targets_failed(), 1);
    assert_eq!(source.calls_for("notion"), 2);
    assert_eq!(jobs.count_active().await.unwrap(), 1);
}
