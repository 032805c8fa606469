use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};

use jobhunt_core::error::AppError;
use jobhunt_core::metrics::RunMetrics;

/// Run summaries, one row per ingestion run.
#[derive(Clone)]
pub struct RunMetricsRepository {
    pool: Pool<Postgres>,
}

impl RunMetricsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the summary of a run.
    pub async fn save(&self, metrics: &RunMetrics) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO run_metrics (id, started_at, finished_at, summary)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                finished_at = EXCLUDED.finished_at,
                summary = EXCLUDED.summary
            "#,
        )
        .bind(metrics.id)
        .bind(metrics.started_at)
        .bind(metrics.finished_at)
        .bind(Json(metrics))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Most recent runs, newest first.
    pub async fn latest(&self, limit: i64) -> Result<Vec<RunMetrics>, AppError> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT summary
            FROM run_metrics
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.summary.0).collect())
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    summary: Json<RunMetrics>,
}
