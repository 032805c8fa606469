use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres, Transaction};

use jobhunt_core::error::AppError;
use jobhunt_core::metrics::RunMetrics;
use jobhunt_core::models::{JobMatch, JobRecord, MatchRecord, Seniority};
use jobhunt_core::traits::JobStore;

use crate::metrics_repository::RunMetricsRepository;

/// PostgreSQL-backed store for jobs and their per-profile matches.
#[derive(Clone)]
pub struct JobRepository {
    pool: Pool<Postgres>,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a stored job, expired or not.
    pub async fn get(&self, dedup_key: &str) -> Result<Option<JobRecord>, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT dedup_key, title, company, location, url, source_kind, description,
                   requirements, salary, seniority, match_score, tags, first_seen_at, expires_at
            FROM jobs
            WHERE dedup_key = $1
            "#,
        )
        .bind(dedup_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(JobRecord::try_from).transpose()
    }

    /// Matches of one user, newest first.
    pub async fn matches_for_user(&self, user_id: &str) -> Result<Vec<MatchRecord>, AppError> {
        let rows = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT id, user_id, profile_id, dedup_key, match_score, reasons,
                   matched_keywords, created_at
            FROM matches
            WHERE user_id = $1
            ORDER BY created_at DESC, match_score DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of unexpired jobs.
    pub async fn count_active(&self) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE expires_at > NOW()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn upsert_job(
        tx: &mut Transaction<'_, Postgres>,
        job: &JobRecord,
    ) -> Result<(), AppError> {
        // An expired row is replaced wholesale; a live one keeps its
        // identity and only takes the fields the new write carries.
        sqlx::query(
            r#"
            INSERT INTO jobs (dedup_key, title, company, location, url, source_kind, description,
                              requirements, salary, seniority, match_score, tags,
                              first_seen_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (dedup_key) DO UPDATE SET
                title = EXCLUDED.title,
                url = EXCLUDED.url,
                company = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.company ELSE jobs.company END,
                location = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.location ELSE jobs.location END,
                source_kind = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.source_kind ELSE jobs.source_kind END,
                description = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.description
                    ELSE COALESCE(EXCLUDED.description, jobs.description) END,
                requirements = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.requirements
                    ELSE COALESCE(EXCLUDED.requirements, jobs.requirements) END,
                salary = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.salary
                    ELSE COALESCE(EXCLUDED.salary, jobs.salary) END,
                seniority = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.seniority
                    ELSE COALESCE(EXCLUDED.seniority, jobs.seniority) END,
                match_score = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.match_score
                    ELSE COALESCE(EXCLUDED.match_score, jobs.match_score) END,
                tags = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.tags
                    ELSE COALESCE(EXCLUDED.tags, jobs.tags) END,
                first_seen_at = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.first_seen_at ELSE jobs.first_seen_at END,
                expires_at = CASE WHEN jobs.expires_at <= NOW()
                    THEN EXCLUDED.expires_at ELSE jobs.expires_at END,
                updated_at = NOW()
            "#,
        )
        .bind(&job.dedup_key)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.url)
        .bind(job.source_kind.as_str())
        .bind(&job.description)
        .bind(job.requirements.as_ref().map(Json))
        .bind(&job.salary)
        .bind(job.seniority.map(|s| s.as_str()))
        .bind(job.match_score.map(|s| s as i32))
        .bind(job.tags.as_ref().map(Json))
        .bind(job.first_seen_at)
        .bind(job.expires_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_match(
        tx: &mut Transaction<'_, Postgres>,
        matched: &MatchRecord,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO matches (id, user_id, profile_id, dedup_key, match_score, reasons,
                                 matched_keywords, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                match_score = EXCLUDED.match_score,
                reasons = EXCLUDED.reasons,
                matched_keywords = EXCLUDED.matched_keywords,
                updated_at = NOW()
            "#,
        )
        .bind(&matched.id)
        .bind(&matched.user_id)
        .bind(&matched.profile_id)
        .bind(&matched.dedup_key)
        .bind(matched.match_score as i32)
        .bind(Json(&matched.reasons))
        .bind(Json(&matched.matched_keywords))
        .bind(matched.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct JobRow {
    dedup_key: String,
    title: String,
    company: String,
    location: String,
    url: String,
    source_kind: String,
    description: Option<String>,
    requirements: Option<Json<Vec<String>>>,
    salary: Option<String>,
    seniority: Option<String>,
    match_score: Option<i32>,
    tags: Option<Json<Vec<String>>>,
    first_seen_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let seniority = row
            .seniority
            .as_deref()
            .map(str::parse::<Seniority>)
            .transpose()?;

        Ok(JobRecord {
            dedup_key: row.dedup_key,
            title: row.title,
            company: row.company,
            location: row.location,
            url: row.url,
            source_kind: row.source_kind.parse()?,
            description: row.description,
            requirements: row.requirements.map(|r| r.0),
            salary: row.salary,
            seniority,
            match_score: row.match_score.map(|s| s.max(0) as u32),
            tags: row.tags.map(|t| t.0),
            first_seen_at: row.first_seen_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: String,
    user_id: String,
    profile_id: String,
    dedup_key: String,
    match_score: i32,
    reasons: Json<Vec<String>>,
    matched_keywords: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl From<MatchRow> for MatchRecord {
    fn from(row: MatchRow) -> Self {
        MatchRecord {
            id: row.id,
            user_id: row.user_id,
            profile_id: row.profile_id,
            dedup_key: row.dedup_key,
            match_score: row.match_score.max(0) as u32,
            reasons: row.reasons.0,
            matched_keywords: row.matched_keywords.0,
            created_at: row.created_at,
        }
    }
}

impl JobStore for JobRepository {
    async fn job_exists(&self, dedup_key: &str) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM jobs WHERE dedup_key = $1 AND expires_at > NOW())",
        )
        .bind(dedup_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    async fn existing_keys(&self, dedup_keys: &[String]) -> Result<HashSet<String>, AppError> {
        if dedup_keys.is_empty() {
            return Ok(HashSet::new());
        }

        let keys = sqlx::query_scalar::<_, String>(
            "SELECT dedup_key FROM jobs WHERE dedup_key = ANY($1) AND expires_at > NOW()",
        )
        .bind(dedup_keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(keys.into_iter().collect())
    }

    async fn commit_batch(&self, batch: &[JobMatch]) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        for write in batch {
            Self::upsert_job(&mut tx, &write.job).await?;
            Self::upsert_match(&mut tx, &write.matched).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tracing::debug!(records = batch.len(), "Committed job batch");
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM jobs WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn save_run_metrics(&self, metrics: &RunMetrics) -> Result<(), AppError> {
        RunMetricsRepository::new(self.pool.clone())
            .save(metrics)
            .await
    }
}
