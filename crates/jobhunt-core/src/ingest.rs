//! The ingestion run: load profiles, sweep every target, persist matches.
//!
//! ```text
//! LoadProfiles -> ( Cleanup || ForEachTarget[ Fetch+Retry -> Analyze -> Score -> Persist ] ) -> FlushMetrics
//! ```
//!
//! Targets run under a global semaphore, nested outside the per-source gates
//! of the [`SourceClient`]. Each target task owns its own metrics and
//! analytics; the run merges them when the task finishes.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::analytics::MarketAnalytics;
use crate::config::{IngestConfig, sort_by_priority};
use crate::error::AppError;
use crate::metrics::{RunMetrics, TargetMetrics, TargetStatus};
use crate::models::{JobMatch, RawPosting, SearchProfile, Target};
use crate::persist::commit_in_batches;
use crate::scoring::{RejectReason, Scorer};
use crate::traits::{JobStore, ProfileStore, SourceClient};

/// Events emitted during a run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    Started {
        targets: usize,
        profiles: usize,
    },
    ProfileWarning {
        warning: &'a str,
    },
    TargetSkipped {
        target: &'a Target,
        reason: &'a str,
    },
    TargetFetched {
        target: &'a Target,
        postings: usize,
    },
    TargetFailed {
        target: &'a Target,
        error: &'a str,
    },
    PostingRejected {
        target: &'a Target,
        title: &'a str,
        profile_id: &'a str,
        reason: &'a RejectReason,
    },
    PersistFailed {
        target: &'a Target,
        dropped: usize,
    },
    TargetCompleted {
        metrics: &'a TargetMetrics,
    },
    CleanupCompleted {
        removed: u64,
    },
    CleanupFailed {
        error: &'a str,
    },
    Cancelled {
        unscheduled: usize,
    },
    Finished {
        metrics: &'a RunMetrics,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Started { targets, profiles } => {
                tracing::info!(%targets, %profiles, "Ingestion run started");
            }
            RunEvent::ProfileWarning { warning } => {
                tracing::warn!(%warning, "Profile check");
            }
            RunEvent::TargetSkipped { target, reason } => {
                tracing::warn!(target_name = %target.name, source = %target.source_kind, %reason, "Target skipped");
            }
            RunEvent::TargetFetched { target, postings } => {
                tracing::debug!(target_name = %target.name, source = %target.source_kind, %postings, "Target fetched");
            }
            RunEvent::TargetFailed { target, error } => {
                tracing::warn!(target_name = %target.name, source = %target.source_kind, %error, "Target failed");
            }
            RunEvent::PostingRejected {
                target,
                title,
                profile_id,
                reason,
            } => {
                tracing::debug!(target_name = %target.name, %title, %profile_id, %reason, "Posting rejected");
            }
            RunEvent::PersistFailed { target, dropped } => {
                tracing::error!(target_name = %target.name, %dropped, "Matches dropped after commit retries");
            }
            RunEvent::TargetCompleted { metrics } => {
                tracing::info!(
                    target_name = %metrics.name,
                    source = %metrics.source_kind,
                    postings = metrics.jobs_found,
                    matches = metrics.jobs_matched,
                    duration_ms = metrics.duration_ms,
                    "Target completed"
                );
            }
            RunEvent::CleanupCompleted { removed } => {
                tracing::info!(%removed, "Expired jobs removed");
            }
            RunEvent::CleanupFailed { error } => {
                tracing::warn!(%error, "Expiration sweep failed");
            }
            RunEvent::Cancelled { unscheduled } => {
                tracing::warn!(%unscheduled, "Run cancelled, remaining targets not scheduled");
            }
            RunEvent::Finished { metrics } => {
                tracing::info!(
                    run_id = %metrics.id,
                    postings = metrics.total_postings(),
                    matches = metrics.total_matches(),
                    errors = metrics.total_errors(),
                    "Ingestion run finished"
                );
            }
        }
    }
}

/// Everything one target task produced.
#[derive(Debug)]
struct TargetOutcome {
    metrics: TargetMetrics,
    analytics: MarketAnalytics,
    user_matches: BTreeMap<String, u64>,
    persistence_errors: u64,
    cancelled: bool,
}

impl TargetOutcome {
    fn new(target: &Target) -> Self {
        Self {
            metrics: TargetMetrics::new(&target.name, target.source_kind, target.priority),
            analytics: MarketAnalytics::default(),
            user_matches: BTreeMap::new(),
            persistence_errors: 0,
            cancelled: false,
        }
    }
}

/// Drives one ingestion run over a set of targets.
pub struct IngestService<S, J, P>
where
    S: SourceClient,
    J: JobStore,
    P: ProfileStore,
{
    source: S,
    store: J,
    profiles: P,
    scorer: Scorer,
    config: IngestConfig,
}

impl<S, J, P> IngestService<S, J, P>
where
    S: SourceClient,
    J: JobStore,
    P: ProfileStore,
{
    /// `source` should already carry its per-source throttling. The
    /// scorer is held to `config.min_score` as its global floor.
    pub fn new(source: S, store: J, profiles: P, scorer: Scorer, config: IngestConfig) -> Self {
        Self {
            source,
            store,
            profiles,
            scorer: scorer.with_global_floor(config.min_score),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run until every target is processed or the token is cancelled.
    ///
    /// Only a failure to load profiles aborts the run. Target, persistence
    /// and cleanup failures are counted in the returned metrics.
    pub async fn run<WR: RunReporter>(
        &self,
        mut targets: Vec<Target>,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<RunMetrics, AppError> {
        self.config.validate()?;
        let mut metrics = RunMetrics::new();

        let profiles = self.profiles.load_profiles().await?;
        metrics.profiles = profiles.len() as u64;
        reporter.report(RunEvent::Started {
            targets: targets.len(),
            profiles: profiles.len(),
        });
        for profile in &profiles {
            for warning in profile.validate() {
                reporter.report(RunEvent::ProfileWarning { warning: &warning });
            }
        }

        sort_by_priority(&mut targets);

        let (cleanup, outcomes) = tokio::join!(
            self.cleanup(reporter),
            self.sweep(&targets, &profiles, &cancel_token, reporter)
        );
        metrics.expired_removed = cleanup;

        let mut unscheduled = 0;
        for outcome in outcomes {
            if outcome.cancelled {
                unscheduled += 1;
            }
            metrics.persistence_errors += outcome.persistence_errors;
            for (user, count) in outcome.user_matches {
                metrics.add_user_matches(&user, count);
            }
            metrics.analytics.merge(outcome.analytics);
            metrics.add_target(outcome.metrics);
        }
        if unscheduled > 0 || cancel_token.is_cancelled() {
            metrics.cancelled = true;
            reporter.report(RunEvent::Cancelled { unscheduled });
        }

        metrics.finish();
        if let Err(e) = self.store.save_run_metrics(&metrics).await {
            tracing::warn!(error = %e, "Failed to save run metrics");
        }
        reporter.report(RunEvent::Finished { metrics: &metrics });
        Ok(metrics)
    }

    /// Expiration sweep. Failures are reported, never fatal.
    async fn cleanup<WR: RunReporter>(&self, reporter: &WR) -> u64 {
        match self.store.delete_expired().await {
            Ok(removed) => {
                reporter.report(RunEvent::CleanupCompleted { removed });
                removed
            }
            Err(e) => {
                let error = e.to_string();
                reporter.report(RunEvent::CleanupFailed { error: &error });
                0
            }
        }
    }

    async fn sweep<WR: RunReporter>(
        &self,
        targets: &[Target],
        profiles: &[SearchProfile],
        cancel_token: &CancellationToken,
        reporter: &WR,
    ) -> Vec<TargetOutcome> {
        let global = Semaphore::new(self.config.max_concurrency.max(1));

        // The semaphore is fair, so targets start in priority order.
        let mut tasks: FuturesUnordered<_> = targets
            .iter()
            .map(|target| self.process_target(target, profiles, &global, cancel_token, reporter))
            .collect();

        let mut outcomes = Vec::with_capacity(targets.len());
        while let Some(outcome) = tasks.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn process_target<WR: RunReporter>(
        &self,
        target: &Target,
        profiles: &[SearchProfile],
        global: &Semaphore,
        cancel_token: &CancellationToken,
        reporter: &WR,
    ) -> TargetOutcome {
        let mut outcome = TargetOutcome::new(target);

        let permit = tokio::select! {
            biased;
            () = cancel_token.cancelled() => None,
            permit = global.acquire() => permit.ok(),
        };
        let Some(_permit) = permit else {
            outcome.cancelled = true;
            return outcome;
        };
        if cancel_token.is_cancelled() {
            outcome.cancelled = true;
            return outcome;
        }

        if let Err(e) = target.validate() {
            outcome.metrics.errors += 1;
            let reason = e.to_string();
            reporter.report(RunEvent::TargetSkipped {
                target,
                reason: &reason,
            });
            return outcome;
        }

        let started = Instant::now();
        self.ingest_target(target, profiles, &mut outcome, reporter)
            .await;
        outcome.metrics.set_duration(started.elapsed());
        reporter.report(RunEvent::TargetCompleted {
            metrics: &outcome.metrics,
        });

        let cooldown = self
            .config
            .scheduling
            .cooldown(target.priority, outcome.metrics.errors > 0);
        if !cooldown.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(cooldown) => {}
                () = cancel_token.cancelled() => {}
            }
        }

        outcome
    }

    async fn ingest_target<WR: RunReporter>(
        &self,
        target: &Target,
        profiles: &[SearchProfile],
        outcome: &mut TargetOutcome,
        reporter: &WR,
    ) {
        let mut postings = match self
            .config
            .retry
            .run(&target.name, |_| self.source.fetch(target))
            .await
        {
            Ok(postings) => postings,
            Err(e) => {
                outcome.metrics.errors += 1;
                outcome.metrics.status = TargetStatus::Failed;
                let error = e.to_string();
                reporter.report(RunEvent::TargetFailed {
                    target,
                    error: &error,
                });
                return;
            }
        };

        postings.truncate(self.config.max_postings_per_target);
        outcome.metrics.jobs_found = postings.len() as u64;
        reporter.report(RunEvent::TargetFetched {
            target,
            postings: postings.len(),
        });

        for posting in &postings {
            outcome.analytics.record(posting);
        }

        let writes = self.score_postings(target, &postings, profiles, outcome, reporter);
        let writes = self.drop_known(writes, outcome).await;

        let persisted =
            commit_in_batches(&self.store, &writes, self.config.batch_size, &self.config.retry)
                .await;
        if persisted.failed_batches > 0 {
            outcome.persistence_errors += persisted.failed_batches as u64;
            reporter.report(RunEvent::PersistFailed {
                target,
                dropped: persisted.dropped,
            });
        }

        outcome.metrics.jobs_matched = persisted.committed as u64;
        outcome.user_matches = persisted.committed_by_user;
        outcome.metrics.status = TargetStatus::Success;
    }

    /// Score every posting against every profile; keep the accepted ones.
    fn score_postings<WR: RunReporter>(
        &self,
        target: &Target,
        postings: &[RawPosting],
        profiles: &[SearchProfile],
        outcome: &mut TargetOutcome,
        reporter: &WR,
    ) -> Vec<JobMatch> {
        let now = Utc::now();
        let expiration = self.config.job_expiration();
        let mut writes = Vec::new();
        let mut score_total = 0u64;

        for posting in postings {
            for profile in profiles {
                let result = self.scorer.score(posting, profile);
                if let Some(reason) = &result.rejection_reason {
                    reporter.report(RunEvent::PostingRejected {
                        target,
                        title: &posting.title,
                        profile_id: &profile.profile_id,
                        reason,
                    });
                    continue;
                }
                if !profile.accepts_company(&posting.company) {
                    tracing::debug!(
                        company = %posting.company,
                        profile_id = %profile.profile_id,
                        "Company filtered by profile preferences"
                    );
                    continue;
                }
                score_total += u64::from(result.score);
                writes.push(JobMatch::new(posting, &result, profile, now, expiration));
            }
        }

        if !writes.is_empty() {
            outcome.metrics.avg_score = score_total as f64 / writes.len() as f64;
        }
        writes
    }

    /// Drop writes for jobs the store already holds unexpired.
    ///
    /// The check runs once per target, before any of its writes, so several
    /// profiles matching the same new posting are all recorded.
    async fn drop_known(&self, writes: Vec<JobMatch>, outcome: &mut TargetOutcome) -> Vec<JobMatch> {
        if writes.is_empty() {
            return writes;
        }
        let keys: Vec<String> = writes
            .iter()
            .map(|w| w.job.dedup_key.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        match self
            .config
            .retry
            .run("existence check", |_| self.store.existing_keys(&keys))
            .await
        {
            Ok(known) => writes
                .into_iter()
                .filter(|w| !known.contains(&w.job.dedup_key))
                .collect(),
            Err(e) => {
                // Upserts are idempotent, so writing everything is still safe.
                tracing::warn!(error = %e, "Existence check failed, writing all matches");
                outcome.persistence_errors += 1;
                writes
            }
        }
    }
}
