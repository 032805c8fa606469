//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten doubles for dependency injection in unit and integration
//! tests. All of them use `Arc<Mutex<_>>` so clones share state and tests
//! can assert on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::ingest::{RunEvent, RunReporter};
use crate::models::{RawPosting, SearchProfile, SourceKind, Target, UNKNOWN_AGE_DAYS};
use crate::traits::{AnswerCache, QuestionAnswerer, SourceClient};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Source with a response queue per board id.
///
/// Each fetch pops the next queued response for the target's board. An
/// empty queue yields `Ok(vec![])`, like a board with no open roles.
#[derive(Clone, Default)]
pub struct MockSource {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<Vec<RawPosting>, AppError>>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, board_id: &str, postings: Vec<RawPosting>) {
        self.push(board_id, Ok(postings));
    }

    pub fn push_err(&self, board_id: &str, error: AppError) {
        self.push(board_id, Err(error));
    }

    fn push(&self, board_id: &str, response: Result<Vec<RawPosting>, AppError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(board_id.to_string())
            .or_default()
            .push_back(response);
    }

    /// Board ids fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, board_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|b| *b == board_id)
            .count()
    }
}

impl SourceClient for MockSource {
    async fn fetch(&self, target: &Target) -> Result<Vec<RawPosting>, AppError> {
        self.calls.lock().unwrap().push(target.board_id.clone());
        self.responses
            .lock()
            .unwrap()
            .get_mut(&target.board_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records the name of every event it sees.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RunReporter for MockReporter {
    fn report(&self, event: RunEvent<'_>) {
        let name = match event {
            RunEvent::Started { .. } => "Started",
            RunEvent::ProfileWarning { .. } => "ProfileWarning",
            RunEvent::TargetSkipped { .. } => "TargetSkipped",
            RunEvent::TargetFetched { .. } => "TargetFetched",
            RunEvent::TargetFailed { .. } => "TargetFailed",
            RunEvent::PostingRejected { .. } => "PostingRejected",
            RunEvent::PersistFailed { .. } => "PersistFailed",
            RunEvent::TargetCompleted { .. } => "TargetCompleted",
            RunEvent::CleanupCompleted { .. } => "CleanupCompleted",
            RunEvent::CleanupFailed { .. } => "CleanupFailed",
            RunEvent::Cancelled { .. } => "Cancelled",
            RunEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(name.to_string());
    }
}

// ---------------------------------------------------------------------------
// MockAnswerer / MemoryAnswerCache
// ---------------------------------------------------------------------------

/// Answerer returning a fixed answer, after any queued errors.
#[derive(Clone)]
pub struct MockAnswerer {
    answer: String,
    errors: Arc<Mutex<VecDeque<AppError>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockAnswerer {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn push_err(&self, error: AppError) {
        self.errors.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl QuestionAnswerer for MockAnswerer {
    async fn answer(&self, _question: &str, _profile_summary: &str) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;
        match self.errors.lock().unwrap().pop_front() {
            Some(e) => Err(e),
            None => Ok(self.answer.clone()),
        }
    }
}

/// Unbounded map-backed cache.
#[derive(Clone, Default)]
pub struct MemoryAnswerCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryAnswerCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnswerCache for MemoryAnswerCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, answer: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), answer.to_string());
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A Greenhouse posting with no description, salary or date.
pub fn make_posting(company: &str, title: &str, location: &str) -> RawPosting {
    RawPosting {
        title: title.to_string(),
        company: company.to_string(),
        location: location.to_string(),
        url: format!(
            "https://boards.greenhouse.io/{}/jobs/{}",
            company.to_lowercase().replace(' ', ""),
            title.len()
        ),
        description: String::new(),
        requirements: Vec::new(),
        salary: None,
        source_kind: SourceKind::Greenhouse,
        posted_at: None,
        days_ago: UNKNOWN_AGE_DAYS,
    }
}

/// Profile `u1`/`p1` with the given keywords and a floor of 40.
pub fn make_profile(keywords: &[&str]) -> SearchProfile {
    SearchProfile {
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        min_score: 40,
        ..SearchProfile::new("u1", "p1")
    }
}
