use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;

use crate::error::AppError;
use crate::models::{SourceKind, Target};
use crate::retry::RetryPolicy;
use crate::scoring::DEFAULT_GLOBAL_FLOOR;

/// Concurrency cap and request rate for one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSettings {
    pub concurrency: usize,
    /// Requests per second.
    pub rate: f64,
}

impl SourceSettings {
    pub fn new(concurrency: usize, rate: f64) -> Self {
        Self { concurrency, rate }
    }
}

/// Cooldown a target task keeps its global permit for after finishing,
/// so high-priority boards are revisited sooner.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingConfig {
    /// Cooldown for priority 1 and 2 targets.
    pub high_priority_cooldown: Duration,
    /// Cooldown for priority 3 targets.
    pub low_priority_cooldown: Duration,
    /// Multiplier applied when the target had errors.
    pub error_multiplier: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            high_priority_cooldown: Duration::from_millis(300),
            low_priority_cooldown: Duration::from_millis(500),
            error_multiplier: 2,
        }
    }
}

impl SchedulingConfig {
    /// No cooldown at all.
    pub fn immediate() -> Self {
        Self {
            high_priority_cooldown: Duration::ZERO,
            low_priority_cooldown: Duration::ZERO,
            error_multiplier: 1,
        }
    }

    pub fn cooldown(&self, priority: u8, had_errors: bool) -> Duration {
        let base = if priority <= 2 {
            self.high_priority_cooldown
        } else {
            self.low_priority_cooldown
        };
        if had_errors {
            base * self.error_multiplier
        } else {
            base
        }
    }
}

/// Settings for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub request_timeout: Duration,
    /// Targets processed at the same time.
    pub max_concurrency: usize,
    pub greenhouse: SourceSettings,
    pub ashby: SourceSettings,
    pub lever: SourceSettings,
    pub retry: RetryPolicy,
    pub job_expiration_days: u32,
    /// Floor every profile is held to, whatever its own minimum.
    pub min_score: u32,
    /// Job + match pairs per store transaction.
    pub batch_size: usize,
    pub max_postings_per_target: usize,
    pub scheduling: SchedulingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_concurrency: 15,
            greenhouse: SourceSettings::new(4, 5.0),
            ashby: SourceSettings::new(3, 3.0),
            lever: SourceSettings::new(3, 4.0),
            retry: RetryPolicy::default(),
            job_expiration_days: 30,
            min_score: DEFAULT_GLOBAL_FLOOR,
            batch_size: 200,
            max_postings_per_target: 1000,
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn source(&self, kind: SourceKind) -> &SourceSettings {
        match kind {
            SourceKind::Greenhouse => &self.greenhouse,
            SourceKind::Ashby => &self.ashby,
            SourceKind::Lever => &self.lever,
        }
    }

    pub fn source_mut(&mut self, kind: SourceKind) -> &mut SourceSettings {
        match kind {
            SourceKind::Greenhouse => &mut self.greenhouse,
            SourceKind::Ashby => &mut self.ashby,
            SourceKind::Lever => &mut self.lever,
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_scheduling(mut self, scheduling: SchedulingConfig) -> Self {
        self.scheduling = scheduling;
        self
    }

    pub fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn job_expiration(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.job_expiration_days))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_concurrency == 0 {
            return Err(AppError::ConfigError(
                "max concurrency must be at least 1".into(),
            ));
        }
        for kind in SourceKind::ALL {
            let s = self.source(kind);
            if s.concurrency == 0 {
                return Err(AppError::ConfigError(format!(
                    "{kind} concurrency must be at least 1"
                )));
            }
            if !(s.rate > 0.0 && s.rate.is_finite()) {
                return Err(AppError::ConfigError(format!(
                    "{kind} rate must be positive (got {})",
                    s.rate
                )));
            }
        }
        if self.retry.attempts == 0 {
            return Err(AppError::ConfigError(
                "retry attempts must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::ConfigError("batch size must be at least 1".into()));
        }
        if self.job_expiration_days == 0 {
            return Err(AppError::ConfigError(
                "job expiration must be at least one day".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "request timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a JSON array of targets.
///
/// Individual targets are validated by the run itself, so one bad board id
/// skips that target instead of the whole file.
pub fn parse_targets(json: &str) -> Result<Vec<Target>, AppError> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a targets file.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
    })?;
    parse_targets(&raw)
}

/// Order targets by priority, 1 first. Stable within a priority.
pub fn sort_by_priority(targets: &mut [Target]) {
    targets.sort_by_key(|t| t.priority);
}
