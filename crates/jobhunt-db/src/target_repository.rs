use sqlx::{PgPool, Pool, Postgres};

use jobhunt_core::error::AppError;
use jobhunt_core::models::Target;

/// Registered job boards.
#[derive(Clone)]
pub struct TargetRepository {
    pool: Pool<Postgres>,
}

impl TargetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Validate and store a target, replacing any with the same name.
    pub async fn upsert(&self, target: &Target) -> Result<(), AppError> {
        target.validate()?;

        sqlx::query(
            r#"
            INSERT INTO targets (name, source_kind, board_id, priority)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE SET
                source_kind = EXCLUDED.source_kind,
                board_id = EXCLUDED.board_id,
                priority = EXCLUDED.priority
            "#,
        )
        .bind(&target.name)
        .bind(target.source_kind.as_str())
        .bind(&target.board_id)
        .bind(i16::from(target.priority))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// All targets, highest priority first.
    pub async fn list(&self) -> Result<Vec<Target>, AppError> {
        let rows = sqlx::query_as::<_, TargetRow>(
            r#"
            SELECT name, source_kind, board_id, priority
            FROM targets
            ORDER BY priority ASC, name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Target::try_from).collect()
    }

    pub async fn delete(&self, name: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM targets WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct TargetRow {
    name: String,
    source_kind: String,
    board_id: String,
    priority: i16,
}

impl TryFrom<TargetRow> for Target {
    type Error = AppError;

    fn try_from(row: TargetRow) -> Result<Self, Self::Error> {
        Ok(Target {
            name: row.name,
            source_kind: row.source_kind.parse()?,
            board_id: row.board_id,
            priority: u8::try_from(row.priority)
                .map_err(|_| AppError::DatabaseError(format!("Invalid priority {}", row.priority)))?,
        })
    }
}
