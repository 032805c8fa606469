use jobhunt_core::metrics::{RunMetrics, TargetMetrics};
use jobhunt_core::models::{SearchProfile, Seniority, SourceKind, Target};
use jobhunt_core::traits::{JobStore, ProfileStore};
use jobhunt_db::{JobRepository, ProfileRepository, RunMetricsRepository, TargetRepository};

use crate::integration::common::setup_test_db;

fn profile(owner: &str, id: &str) -> SearchProfile {
    SearchProfile {
        keywords: vec!["product manager".into(), "platform".into()],
        exclude_keywords: vec!["intern".into()],
        seniority_targets: vec![Seniority::Senior, Seniority::Staff],
        location_targets: vec!["Remote".into(), "New York".into()],
        min_score: 55,
        avoid_companies: vec!["Initech".into()],
        ..SearchProfile::new(owner, id)
    }
}

#[tokio::test]
async fn profiles_round_trip() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProfileRepository::new(pool);

    let saved = profile("u1", "platform-pm");
    repo.upsert(&saved).await.unwrap();

    let loaded = repo.load_profiles().await.unwrap();
    assert_eq!(loaded, vec![saved]);
}

#[tokio::test]
async fn inactive_profiles_are_not_loaded() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProfileRepository::new(pool);

    repo.upsert(&profile("u1", "a")).await.unwrap();
    repo.upsert(&profile("u2", "b")).await.unwrap();
    assert!(repo.deactivate("u1", "a").await.unwrap());
    assert!(!repo.deactivate("u9", "zzz").await.unwrap());

    let loaded = repo.load_profiles().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].owner_id, "u2");

    // Saving again reactivates.
    repo.upsert(&profile("u1", "a")).await.unwrap();
    assert_eq!(repo.load_profiles().await.unwrap().len(), 2);
}

#[tokio::test]
async fn targets_are_listed_by_priority() {
    let (pool, _container) = setup_test_db().await;
    let repo = TargetRepository::new(pool);

    repo.upsert(&Target::new("Notion", SourceKind::Ashby, "notion", 2))
        .await
        .unwrap();
    repo.upsert(&Target::new("Stripe", SourceKind::Greenhouse, "stripe", 1))
        .await
        .unwrap();
    repo.upsert(&Target::new("Kraken", SourceKind::Lever, "kraken", 3))
        .await
        .unwrap();
    repo.upsert(&Target::new("Notion", SourceKind::Ashby, "notion", 1))
        .await
        .unwrap();

    let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Notion", "Stripe", "Kraken"]);

    assert!(
        repo.upsert(&Target::new("Bad", SourceKind::Lever, "", 1))
            .await
            .is_err()
    );
    assert!(repo.delete("Kraken").await.unwrap());
    assert_eq!(repo.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn run_metrics_are_saved_and_listed() {
    let (pool, _container) = setup_test_db().await;
    let jobs = JobRepository::new(pool.clone());
    let runs = RunMetricsRepository::new(pool);

    let mut metrics = RunMetrics::new();
    let mut target = TargetMetrics::new("Stripe", SourceKind::Greenhouse, 1);
    target.jobs_found = 12;
    target.jobs_matched = 3;
    metrics.add_target(target);
    metrics.add_user_matches("u1", 3);
    metrics.finish();

    jobs.save_run_metrics(&metrics).await.unwrap();
    // Saving the same run twice overwrites it.
    jobs.save_run_metrics(&metrics).await.unwrap();

    let latest = runs.latest(10).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, metrics.id);
    assert_eq!(latest[0].total_postings(), 12);
    assert_eq!(latest[0].user_matches["u1"], 3);
}
