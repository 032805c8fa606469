pub mod analytics;
pub mod answer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod matching;
pub mod memory;
pub mod metrics;
pub mod models;
pub mod persist;
pub mod retry;
pub mod rules;
pub mod salary;
pub mod scoring;
pub mod throttle;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::AppError;
pub use ingest::{IngestService, RunEvent, RunReporter, TracingRunReporter};
pub use models::{
    JobMatch, JobRecord, MatchRecord, RawPosting, SearchProfile, Seniority, SourceKind, Target,
    compute_hash, dedup_key,
};
pub use scoring::{RejectReason, ScoreResult, Scorer};
pub use traits::{
    AnswerCache, ContentExtractor, JobStore, ProfileStore, QuestionAnswerer, SalaryExtractor,
    SourceClient,
};
