use std::collections::HashSet;
use std::future::Future;

use crate::error::AppError;
use crate::metrics::RunMetrics;
use crate::models::{JobMatch, RawPosting, SearchProfile, Target};
use crate::salary::SalaryRange;

/// Fetches and normalizes the postings of one job board.
///
/// A board that definitively does not exist yields `Ok(vec![])`, not an
/// error. Transient conditions (network, 429, 5xx) are returned as
/// retryable [`AppError`]s for the caller's retry policy.
pub trait SourceClient: Send + Sync + Clone {
    fn fetch(
        &self,
        target: &Target,
    ) -> impl Future<Output = Result<Vec<RawPosting>, AppError>> + Send;
}

/// Plain-text summary and requirement bullets pulled out of a description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub summary: String,
    pub requirements: Vec<String>,
    /// The whole description as plain text, before truncation.
    pub full_text: String,
}

/// Turns markup-bearing descriptions into bounded text.
pub trait ContentExtractor: Send + Sync + Clone {
    fn extract_description(&self, html: &str) -> Result<ExtractedContent, AppError>;
}

/// Best-effort annual salary range from free text.
pub trait SalaryExtractor: Send + Sync + Clone {
    fn extract_salary(&self, text: &str) -> Option<SalaryRange>;
}

/// Durable storage for jobs, matches and run summaries.
pub trait JobStore: Send + Sync + Clone {
    /// True only if a record exists and has not expired.
    fn job_exists(&self, dedup_key: &str) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// The subset of `dedup_keys` that currently exist unexpired.
    fn existing_keys(
        &self,
        dedup_keys: &[String],
    ) -> impl Future<Output = Result<HashSet<String>, AppError>> + Send;

    /// Write every job + match pair of the batch, or none of them.
    fn commit_batch(&self, batch: &[JobMatch]) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Remove expired jobs and their matches. Returns the number of jobs removed.
    fn delete_expired(&self) -> impl Future<Output = Result<u64, AppError>> + Send;

    fn save_run_metrics(
        &self,
        metrics: &RunMetrics,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Source of the search profiles scored during a run.
pub trait ProfileStore: Send + Sync + Clone {
    fn load_profiles(&self) -> impl Future<Output = Result<Vec<SearchProfile>, AppError>> + Send;
}

/// Answers free-text application questions.
pub trait QuestionAnswerer: Send + Sync + Clone {
    fn answer(
        &self,
        question: &str,
        profile_summary: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Key/value cache for answers, keyed by normalized question.
pub trait AnswerCache: Send + Sync + Clone {
    fn get(&self, key: &str) -> impl Future<Output = Option<String>> + Send;

    fn set(&self, key: &str, answer: &str) -> impl Future<Output = ()> + Send;
}
