use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::MarketAnalytics;
use crate::models::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Success,
    Failed,
    /// Not attempted: invalid configuration or the run was cancelled.
    Skipped,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Success => "success",
            TargetStatus::Failed => "failed",
            TargetStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of one target within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub name: String,
    pub source_kind: SourceKind,
    pub priority: u8,
    pub jobs_found: u64,
    pub jobs_matched: u64,
    pub errors: u64,
    pub duration_ms: u64,
    pub status: TargetStatus,
    pub avg_score: f64,
}

impl TargetMetrics {
    pub fn new(name: impl Into<String>, source_kind: SourceKind, priority: u8) -> Self {
        Self {
            name: name.into(),
            source_kind,
            priority,
            jobs_found: 0,
            jobs_matched: 0,
            errors: 0,
            duration_ms: 0,
            status: TargetStatus::Skipped,
            avg_score: 0.0,
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_ms = duration.as_millis() as u64;
    }

    pub fn match_rate(&self) -> f64 {
        if self.jobs_found == 0 {
            0.0
        } else {
            self.jobs_matched as f64 / self.jobs_found as f64 * 100.0
        }
    }
}

/// Per-source target outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub success: u64,
    pub failed: u64,
    pub postings: u64,
}

impl SourceStats {
    pub fn success_rate(&self) -> f64 {
        let total = self.success + self.failed;
        if total == 0 {
            0.0
        } else {
            self.success as f64 / total as f64 * 100.0
        }
    }
}

/// Aggregate record of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub profiles: u64,
    pub targets: Vec<TargetMetrics>,
    pub sources: BTreeMap<SourceKind, SourceStats>,
    /// Matches created per user id.
    pub user_matches: BTreeMap<String, u64>,
    /// Batches whose commit failed after every retry.
    pub persistence_errors: u64,
    pub expired_removed: u64,
    pub cancelled: bool,
    pub analytics: MarketAnalytics,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            profiles: 0,
            targets: Vec::new(),
            sources: BTreeMap::new(),
            user_matches: BTreeMap::new(),
            persistence_errors: 0,
            expired_removed: 0,
            cancelled: false,
            analytics: MarketAnalytics::default(),
        }
    }

    pub fn add_target(&mut self, target: TargetMetrics) {
        let stats = self.sources.entry(target.source_kind).or_default();
        stats.postings += target.jobs_found;
        match target.status {
            TargetStatus::Success => stats.success += 1,
            TargetStatus::Failed => stats.failed += 1,
            TargetStatus::Skipped => {}
        }
        self.targets.push(target);
    }

    pub fn add_user_matches(&mut self, user_id: &str, count: u64) {
        *self.user_matches.entry(user_id.to_string()).or_default() += count;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn targets_succeeded(&self) -> usize {
        self.count_status(TargetStatus::Success)
    }

    pub fn targets_failed(&self) -> usize {
        self.count_status(TargetStatus::Failed)
    }

    pub fn targets_skipped(&self) -> usize {
        self.count_status(TargetStatus::Skipped)
    }

    fn count_status(&self, status: TargetStatus) -> usize {
        self.targets.iter().filter(|t| t.status == status).count()
    }

    pub fn total_postings(&self) -> u64 {
        self.targets.iter().map(|t| t.jobs_found).sum()
    }

    pub fn total_matches(&self) -> u64 {
        self.targets.iter().map(|t| t.jobs_matched).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.targets.iter().map(|t| t.errors).sum::<u64>() + self.persistence_errors
    }

    pub fn match_rate(&self) -> f64 {
        let found = self.total_postings();
        if found == 0 {
            0.0
        } else {
            self.total_matches() as f64 / found as f64 * 100.0
        }
    }

    /// Human-readable run summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(72);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Ingestion run {}", self.id);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Runtime:          {:.1}s", self.duration().as_secs_f64());
        let _ = writeln!(out, "Profiles:         {}", self.profiles);
        let _ = writeln!(
            out,
            "Targets:          {} ok, {} failed, {} skipped",
            self.targets_succeeded(),
            self.targets_failed(),
            self.targets_skipped()
        );
        let _ = writeln!(out, "Postings found:   {}", self.total_postings());
        let _ = writeln!(out, "Matches created:  {}", self.total_matches());
        let _ = writeln!(out, "Errors:           {}", self.total_errors());
        let _ = writeln!(out, "Match rate:       {:.1}%", self.match_rate());
        if self.expired_removed > 0 {
            let _ = writeln!(out, "Expired removed:  {}", self.expired_removed);
        }
        if self.cancelled {
            let _ = writeln!(out, "Run was cancelled before all targets were scheduled");
        }

        if !self.sources.is_empty() {
            let _ = writeln!(out, "\nBy source:");
            for (kind, stats) in &self.sources {
                let _ = writeln!(
                    out,
                    "  {:<10} {:>3} targets, {:>5} postings, {:>3.0}% success",
                    kind.as_str(),
                    stats.success + stats.failed,
                    stats.postings,
                    stats.success_rate()
                );
            }
        }

        if !self.user_matches.is_empty() {
            let _ = writeln!(out, "\nBy user:");
            let mut users: Vec<_> = self.user_matches.iter().collect();
            users.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (user, count) in users {
                let _ = writeln!(out, "  {user:<40} {count:>4} matches");
            }
        }

        let mut top: Vec<&TargetMetrics> = self
            .targets
            .iter()
            .filter(|t| t.status == TargetStatus::Success)
            .collect();
        top.sort_by(|a, b| {
            b.jobs_found
                .cmp(&a.jobs_found)
                .then(a.duration_ms.cmp(&b.duration_ms))
        });
        if !top.is_empty() {
            let _ = writeln!(out, "\nTop targets:");
            for t in top.iter().take(15) {
                let _ = writeln!(
                    out,
                    "  {:<25} {:>4} postings | {:>3} matches ({:.0}%) | {:.1}s",
                    t.name,
                    t.jobs_found,
                    t.jobs_matched,
                    t.match_rate(),
                    t.duration_ms as f64 / 1000.0
                );
            }
        }

        let failed: Vec<&str> = self
            .targets
            .iter()
            .filter(|t| t.status == TargetStatus::Failed)
            .map(|t| t.name.as_str())
            .collect();
        if !failed.is_empty() {
            let _ = writeln!(out, "\nFailed targets:");
            for name in failed.iter().take(10) {
                let _ = writeln!(out, "  {name}");
            }
        }

        let _ = writeln!(out, "{rule}");
        out
    }
}
