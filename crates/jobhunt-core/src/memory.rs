//! In-process stores.
//!
//! [`MemoryStore`] follows the same expiry and merge rules as the
//! PostgreSQL store. It backs dry runs and the orchestrator tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::error::AppError;
use crate::metrics::RunMetrics;
use crate::models::{JobMatch, JobRecord, MatchRecord, SearchProfile};
use crate::traits::{JobStore, ProfileStore};

#[derive(Debug, Default)]
struct MemoryState {
    jobs: HashMap<String, JobRecord>,
    matches: HashMap<String, MatchRecord>,
    runs: Vec<RunMetrics>,
    commit_calls: usize,
    failures: VecDeque<AppError>,
}

/// A [`JobStore`] held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next commits fail with these errors, in order, writing nothing.
    pub fn fail_next_commits(&self, errors: Vec<AppError>) {
        self.state().failures.extend(errors);
    }

    /// Store a job record as-is, e.g. one that has already expired.
    pub fn insert_job(&self, job: JobRecord) {
        self.state().jobs.insert(job.dedup_key.clone(), job);
    }

    pub fn job(&self, dedup_key: &str) -> Option<JobRecord> {
        self.state().jobs.get(dedup_key).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.state().jobs.len()
    }

    pub fn match_count(&self) -> usize {
        self.state().matches.len()
    }

    pub fn matches(&self) -> Vec<MatchRecord> {
        let mut matches: Vec<MatchRecord> = self.state().matches.values().cloned().collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    pub fn commit_calls(&self) -> usize {
        self.state().commit_calls
    }

    pub fn saved_runs(&self) -> Vec<RunMetrics> {
        self.state().runs.clone()
    }
}

impl JobStore for MemoryStore {
    async fn job_exists(&self, dedup_key: &str) -> Result<bool, AppError> {
        let now = Utc::now();
        Ok(self
            .state()
            .jobs
            .get(dedup_key)
            .is_some_and(|job| !job.is_expired(now)))
    }

    async fn existing_keys(&self, dedup_keys: &[String]) -> Result<HashSet<String>, AppError> {
        let now = Utc::now();
        let state = self.state();
        Ok(dedup_keys
            .iter()
            .filter(|key| {
                state
                    .jobs
                    .get(key.as_str())
                    .is_some_and(|job| !job.is_expired(now))
            })
            .cloned()
            .collect())
    }

    async fn commit_batch(&self, batch: &[JobMatch]) -> Result<(), AppError> {
        let now = Utc::now();
        let mut state = self.state();
        state.commit_calls += 1;
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let state = &mut *state;
        for write in batch {
            let key = &write.job.dedup_key;
            match state.jobs.get_mut(key).filter(|stored| !stored.is_expired(now)) {
                Some(stored) => stored.merge_from(&write.job),
                None => {
                    state.jobs.insert(key.clone(), write.job.clone());
                }
            }

            state
                .matches
                .entry(write.matched.id.clone())
                .and_modify(|stored| {
                    stored.match_score = write.matched.match_score;
                    stored.reasons = write.matched.reasons.clone();
                    stored.matched_keywords = write.matched.matched_keywords.clone();
                })
                .or_insert_with(|| write.matched.clone());
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut state = self.state();
        let before = state.jobs.len();
        state.jobs.retain(|_, job| !job.is_expired(now));
        let removed = before - state.jobs.len();

        let MemoryState { jobs, matches, .. } = &mut *state;
        matches.retain(|_, m| jobs.contains_key(&m.dedup_key));
        Ok(removed as u64)
    }

    async fn save_run_metrics(&self, metrics: &RunMetrics) -> Result<(), AppError> {
        self.state().runs.push(metrics.clone());
        Ok(())
    }
}

/// A fixed set of profiles.
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    profiles: Arc<Vec<SearchProfile>>,
}

impl StaticProfiles {
    pub fn new(profiles: Vec<SearchProfile>) -> Self {
        Self {
            profiles: Arc::new(profiles),
        }
    }

    /// Load a JSON array of profiles.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Ok(Self::new(serde_json::from_str(&raw)?))
    }
}

impl ProfileStore for StaticProfiles {
    async fn load_profiles(&self) -> Result<Vec<SearchProfile>, AppError> {
        Ok(self.profiles.as_ref().clone())
    }
}
