use chrono::{TimeDelta, Utc};
use jobhunt_core::models::{JobMatch, RawPosting, SearchProfile};
use jobhunt_core::scoring::Scorer;
use jobhunt_core::testutil::{make_posting, make_profile};
use jobhunt_core::traits::JobStore;
use jobhunt_db::JobRepository;

use crate::integration::common::{expire_job, setup_test_db};

fn write_for(posting: &RawPosting, profile: &SearchProfile) -> JobMatch {
    let result = Scorer::default().score(posting, profile);
    assert!(result.is_accepted(), "fixture posting should be accepted");
    JobMatch::new(posting, &result, profile, Utc::now(), TimeDelta::days(30))
}

fn pm_posting() -> RawPosting {
    make_posting("Stripe", "Senior Product Manager", "Remote")
}

#[tokio::test]
async fn commit_batch_writes_job_and_match() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobRepository::new(pool);
    let posting = pm_posting();
    let write = write_for(&posting, &make_profile(&["product manager"]));

    repo.commit_batch(std::slice::from_ref(&write)).await.unwrap();

    let key = posting.dedup_key();
    assert!(repo.job_exists(&key).await.unwrap());
    let stored = repo.get(&key).await.unwrap().expect("job should be stored");
    assert_eq!(stored.title, "Senior Product Manager");
    assert_eq!(stored.seniority, write.job.seniority);
    assert_eq!(stored.match_score, write.job.match_score);

    let matches = repo.matches_for_user("u1").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, write.matched.id);
    assert_eq!(matches[0].matched_keywords, write.matched.matched_keywords);
}

#[tokio::test]
async fn existing_keys_ignores_unknown_and_expired() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobRepository::new(pool.clone());
    let profile = make_profile(&["product manager"]);

    let live = pm_posting();
    let stale = make_posting("Stripe", "Group Product Manager", "Remote");
    repo.commit_batch(&[write_for(&live, &profile), write_for(&stale, &profile)])
        .await
        .unwrap();
    expire_job(&pool, &stale.dedup_key()).await;

    let keys = repo
        .existing_keys(&[live.dedup_key(), stale.dedup_key(), "missing".to_string()])
        .await
        .unwrap();

    assert_eq!(keys.len(), 1);
    assert!(keys.contains(&live.dedup_key()));
    assert!(!repo.job_exists(&stale.dedup_key()).await.unwrap());
    assert!(repo.existing_keys(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn live_job_keeps_fields_the_new_write_omits() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobRepository::new(pool);
    let profile = make_profile(&["product manager"]);

    let mut first = pm_posting();
    first.salary = Some("$150,000 - $190,000".into());
    first.description = "Own the payments roadmap.".into();
    let original = write_for(&first, &profile);
    repo.commit_batch(std::slice::from_ref(&original)).await.unwrap();

    let mut second = write_for(&pm_posting(), &profile);
    second.job.url = "https://boards.greenhouse.io/stripe/jobs/42".into();
    second.job.first_seen_at = Utc::now() + TimeDelta::days(1);
    repo.commit_batch(&[second]).await.unwrap();

    let stored = repo.get(&first.dedup_key()).await.unwrap().unwrap();
    assert_eq!(stored.url, "https://boards.greenhouse.io/stripe/jobs/42");
    assert_eq!(stored.salary.as_deref(), Some("$150,000 - $190,000"));
    assert_eq!(stored.description.as_deref(), Some("Own the payments roadmap."));
    assert_eq!(
        stored.first_seen_at.timestamp_micros(),
        original.job.first_seen_at.timestamp_micros()
    );
}

#[tokio::test]
async fn expired_job_is_replaced_wholesale() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobRepository::new(pool.clone());
    let profile = make_profile(&["product manager"]);

    let mut first = pm_posting();
    first.salary = Some("$150,000 - $190,000".into());
    repo.commit_batch(&[write_for(&first, &profile)]).await.unwrap();
    expire_job(&pool, &first.dedup_key()).await;

    let fresh = write_for(&pm_posting(), &profile);
    repo.commit_batch(std::slice::from_ref(&fresh)).await.unwrap();

    let stored = repo.get(&first.dedup_key()).await.unwrap().unwrap();
    assert_eq!(stored.salary, None);
    assert!(stored.expires_at > Utc::now());
    assert_eq!(
        stored.expires_at.timestamp_micros(),
        fresh.job.expires_at.timestamp_micros()
    );
    assert!(repo.job_exists(&first.dedup_key()).await.unwrap());
}

#[tokio::test]
async fn match_is_updated_not_duplicated() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobRepository::new(pool);
    let profile = make_profile(&["product manager"]);

    let write = write_for(&pm_posting(), &profile);
    repo.commit_batch(std::slice::from_ref(&write)).await.unwrap();

    let mut rescored = write.clone();
    rescored.matched.match_score = 91;
    repo.commit_batch(&[rescored]).await.unwrap();

    let matches = repo.matches_for_user("u1").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].match_score, 91);
}

#[tokio::test]
async fn failed_batch_writes_nothing() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobRepository::new(pool);
    let profile = make_profile(&["product manager"]);

    let good = write_for(&pm_posting(), &profile);
    let mut bad = write_for(&make_posting("Stripe", "Staff Product Manager", "Remote"), &profile);
    // Violates the matches -> jobs foreign key.
    bad.matched.dedup_key = "no-such-job".into();

    assert!(repo.commit_batch(&[good.clone(), bad]).await.is_err());
    assert!(repo.get(&good.job.dedup_key).await.unwrap().is_none());
    assert!(repo.matches_for_user("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_expired_cascades_to_matches() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobRepository::new(pool.clone());
    let profile = make_profile(&["product manager"]);

    let keep = pm_posting();
    let stale = make_posting("Stripe", "Group Product Manager", "Remote");
    repo.commit_batch(&[write_for(&keep, &profile), write_for(&stale, &profile)])
        .await
        .unwrap();
    expire_job(&pool, &stale.dedup_key()).await;

    assert_eq!(repo.delete_expired().await.unwrap(), 1);
    assert_eq!(repo.delete_expired().await.unwrap(), 0);
    assert!(repo.get(&stale.dedup_key()).await.unwrap().is_none());

    let matches = repo.matches_for_user("u1").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].dedup_key, keep.dedup_key());
    assert_eq!(repo.count_active().await.unwrap(), 1);
}
