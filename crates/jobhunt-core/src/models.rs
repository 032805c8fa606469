use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Age reported for postings whose source gave no usable timestamp.
///
/// Large enough to fall outside every freshness tier, so an undated
/// posting is never treated as "just posted".
pub const UNKNOWN_AGE_DAYS: u32 = 999;

/// Applicant tracking system a target is hosted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Greenhouse,
    Ashby,
    Lever,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Greenhouse, SourceKind::Ashby, SourceKind::Lever];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Greenhouse => "greenhouse",
            SourceKind::Ashby => "ashby",
            SourceKind::Lever => "lever",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greenhouse" => Ok(SourceKind::Greenhouse),
            "ashby" => Ok(SourceKind::Ashby),
            "lever" => Ok(SourceKind::Lever),
            other => Err(AppError::ConfigError(format!("Unknown source kind: {other}"))),
        }
    }
}

/// A company job board to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(alias = "ats")]
    pub source_kind: SourceKind,
    #[serde(alias = "id")]
    pub board_id: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    3
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        source_kind: SourceKind,
        board_id: impl Into<String>,
        priority: u8,
    ) -> Self {
        Self {
            name: name.into(),
            source_kind,
            board_id: board_id.into(),
            priority,
        }
    }

    /// Reject targets that can never be fetched.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.board_id.trim().is_empty() {
            return Err(AppError::ConfigError(format!(
                "Target '{}' has an empty board id",
                self.name
            )));
        }
        if self
            .board_id
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        {
            return Err(AppError::ConfigError(format!(
                "Target '{}' has an invalid board id '{}'",
                self.name, self.board_id
            )));
        }
        if !(1..=3).contains(&self.priority) {
            return Err(AppError::ConfigError(format!(
                "Target '{}' priority must be 1, 2 or 3 (got {})",
                self.name, self.priority
            )));
        }
        Ok(())
    }
}

/// One posting as returned by a source, normalized across ATS shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosting {
    pub title: String,
    pub company: String,
    /// Free text, possibly several options ("NYC or Remote").
    #[serde(default)]
    pub location: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub salary: Option<String>,
    pub source_kind: SourceKind,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default = "unknown_age")]
    pub days_ago: u32,
}

fn unknown_age() -> u32 {
    UNKNOWN_AGE_DAYS
}

impl RawPosting {
    /// Identity of this posting across runs.
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.company, &self.title, &self.location)
    }
}

/// Whole days between `posted_at` and `now`; [`UNKNOWN_AGE_DAYS`] when absent.
pub fn days_since(posted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    match posted_at {
        Some(ts) => (now - ts).num_days().clamp(0, UNKNOWN_AGE_DAYS as i64) as u32,
        None => UNKNOWN_AGE_DAYS,
    }
}

/// Seniority level derived from a job title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Executive,
    Principal,
    Staff,
    Senior,
    Lead,
    Mid,
    Junior,
    Intern,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Executive => "executive",
            Seniority::Principal => "principal",
            Seniority::Staff => "staff",
            Seniority::Senior => "senior",
            Seniority::Lead => "lead",
            Seniority::Mid => "mid",
            Seniority::Junior => "junior",
            Seniority::Intern => "intern",
        }
    }

    /// Map a lowercased title onto a level. First match wins; "mid" otherwise.
    pub fn from_title(title: &str) -> Self {
        const PATTERNS: &[(&[&str], Seniority)] = &[
            (
                &["vp", "vice president", "head of", "director", "chief", "exec"],
                Seniority::Executive,
            ),
            (&["principal", "distinguished", "fellow"], Seniority::Principal),
            (&["staff"], Seniority::Staff),
            (&["senior", "sr.", "sr "], Seniority::Senior),
            (&["lead", "manager"], Seniority::Lead),
            (&["mid-level", "mid", "experienced"], Seniority::Mid),
            (
                &["junior", "jr.", "entry", "associate", "new grad"],
                Seniority::Junior,
            ),
            (&["intern", "internship"], Seniority::Intern),
        ];

        let title = title.to_lowercase();
        PATTERNS
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| title.contains(n)))
            .map(|(_, level)| *level)
            .unwrap_or(Seniority::Mid)
    }
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Seniority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "executive" => Ok(Seniority::Executive),
            "principal" => Ok(Seniority::Principal),
            "staff" => Ok(Seniority::Staff),
            "senior" => Ok(Seniority::Senior),
            "lead" => Ok(Seniority::Lead),
            "mid" => Ok(Seniority::Mid),
            "junior" => Ok(Seniority::Junior),
            "intern" => Ok(Seniority::Intern),
            other => Err(AppError::ConfigError(format!("Unknown seniority: {other}"))),
        }
    }
}

/// A user's saved search criteria. Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchProfile {
    pub owner_id: String,
    pub profile_id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub seniority_targets: Vec<Seniority>,
    #[serde(default)]
    pub location_targets: Vec<String>,
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    #[serde(default)]
    pub preferred_companies: Vec<String>,
    #[serde(default)]
    pub avoid_companies: Vec<String>,
}

fn default_min_score() -> u32 {
    40
}

impl SearchProfile {
    pub fn new(owner_id: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            profile_id: profile_id.into(),
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            seniority_targets: Vec::new(),
            location_targets: Vec::new(),
            min_score: default_min_score(),
            preferred_companies: Vec::new(),
            avoid_companies: Vec::new(),
        }
    }

    /// Load-time sanity checks. Problems are reported, not fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            warnings.push(format!(
                "profile {}/{} has no keywords; every posting will be rejected",
                self.owner_id, self.profile_id
            ));
        }
        if self.seniority_targets.is_empty() {
            warnings.push(format!(
                "profile {}/{} has no seniority targets",
                self.owner_id, self.profile_id
            ));
        }
        if self.min_score > 100 {
            warnings.push(format!(
                "profile {}/{} min score {} exceeds 100",
                self.owner_id, self.profile_id, self.min_score
            ));
        }
        warnings
    }

    /// Company-level preference filter applied after scoring.
    pub fn accepts_company(&self, company: &str) -> bool {
        let same = |c: &String| c.trim().eq_ignore_ascii_case(company.trim());
        if self.avoid_companies.iter().any(same) {
            return false;
        }
        self.preferred_companies.is_empty() || self.preferred_companies.iter().any(same)
    }

    /// Short plain-text description used as LLM context.
    pub fn summary(&self) -> String {
        let levels: Vec<&str> = self.seniority_targets.iter().map(|s| s.as_str()).collect();
        format!(
            "Looking for: {}. Levels: {}. Locations: {}.",
            self.keywords.join(", "),
            if levels.is_empty() {
                "any".to_string()
            } else {
                levels.join(", ")
            },
            if self.location_targets.is_empty() {
                "any".to_string()
            } else {
                self.location_targets.join(", ")
            }
        )
    }
}

/// Persisted job document. `None` fields are left untouched on upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub dedup_key: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub source_kind: SourceKind,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub salary: Option<String>,
    pub seniority: Option<Seniority>,
    pub match_score: Option<u32>,
    pub tags: Option<Vec<String>>,
    pub first_seen_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Overlay the `Some` fields of `newer` onto `self`.
    pub fn merge_from(&mut self, newer: &JobRecord) {
        self.title = newer.title.clone();
        self.url = newer.url.clone();
        if newer.description.is_some() {
            self.description = newer.description.clone();
        }
        if newer.requirements.is_some() {
            self.requirements = newer.requirements.clone();
        }
        if newer.salary.is_some() {
            self.salary = newer.salary.clone();
        }
        if newer.seniority.is_some() {
            self.seniority = newer.seniority;
        }
        if newer.match_score.is_some() {
            self.match_score = newer.match_score;
        }
        if newer.tags.is_some() {
            self.tags = newer.tags.clone();
        }
    }
}

/// Persisted (user, profile, job) match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub user_id: String,
    pub profile_id: String,
    pub dedup_key: String,
    pub match_score: u32,
    pub reasons: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One unit of the all-or-nothing job + match write.
#[derive(Debug, Clone, PartialEq)]
pub struct JobMatch {
    pub job: JobRecord,
    pub matched: MatchRecord,
}

impl JobMatch {
    /// Build the write pair for an accepted score.
    pub fn new(
        posting: &RawPosting,
        result: &crate::scoring::ScoreResult,
        profile: &SearchProfile,
        now: DateTime<Utc>,
        expiration: TimeDelta,
    ) -> Self {
        let key = posting.dedup_key();
        let job = JobRecord {
            dedup_key: key.clone(),
            title: posting.title.clone(),
            company: posting.company.clone(),
            location: if posting.location.trim().is_empty() {
                "Not specified".to_string()
            } else {
                posting.location.clone()
            },
            url: posting.url.clone(),
            source_kind: posting.source_kind,
            description: Some(posting.description.clone()).filter(|d| !d.is_empty()),
            requirements: Some(posting.requirements.clone()),
            salary: posting.salary.clone(),
            seniority: Some(result.seniority),
            match_score: Some(result.score),
            tags: Some(result.flags.clone()),
            first_seen_at: now,
            expires_at: now + expiration,
        };
        let matched = MatchRecord {
            id: match_id(&profile.owner_id, &profile.profile_id, &key),
            user_id: profile.owner_id.clone(),
            profile_id: profile.profile_id.clone(),
            dedup_key: key,
            match_score: result.score,
            reasons: result.flags.clone(),
            matched_keywords: result.matched_keywords.clone(),
            created_at: now,
        };
        Self { job, matched }
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Separates hashed identity parts. Stripped from each part before joining.
const KEY_SEPARATOR: char = '\u{1f}';

/// Posting identity: company, title and location, case-insensitive.
pub fn dedup_key(company: &str, title: &str, location: &str) -> String {
    compute_hash(&join_key_parts(&[
        &company.trim().to_lowercase(),
        &title.trim().to_lowercase(),
        &location.trim().to_lowercase(),
    ]))
}

/// Match identity: one per (user, profile, job).
pub fn match_id(user_id: &str, profile_id: &str, dedup_key: &str) -> String {
    compute_hash(&join_key_parts(&[user_id, profile_id, dedup_key]))
}

fn join_key_parts(parts: &[&str]) -> String {
    let stripped: Vec<String> = parts
        .iter()
        .map(|part| part.replace(KEY_SEPARATOR, ""))
        .collect();
    stripped.join(&KEY_SEPARATOR.to_string())
}
