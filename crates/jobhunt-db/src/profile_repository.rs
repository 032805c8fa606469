use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};

use jobhunt_core::error::AppError;
use jobhunt_core::models::{SearchProfile, Seniority};
use jobhunt_core::traits::ProfileStore;

/// Saved search profiles. Only active profiles take part in a run.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: Pool<Postgres>,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or replace a profile and mark it active.
    pub async fn upsert(&self, profile: &SearchProfile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (owner_id, profile_id, keywords, exclude_keywords,
                                  seniority_targets, location_targets, min_score,
                                  preferred_companies, avoid_companies, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
            ON CONFLICT (owner_id, profile_id) DO UPDATE SET
                keywords = EXCLUDED.keywords,
                exclude_keywords = EXCLUDED.exclude_keywords,
                seniority_targets = EXCLUDED.seniority_targets,
                location_targets = EXCLUDED.location_targets,
                min_score = EXCLUDED.min_score,
                preferred_companies = EXCLUDED.preferred_companies,
                avoid_companies = EXCLUDED.avoid_companies,
                active = TRUE
            "#,
        )
        .bind(&profile.owner_id)
        .bind(&profile.profile_id)
        .bind(Json(&profile.keywords))
        .bind(Json(&profile.exclude_keywords))
        .bind(Json(&profile.seniority_targets))
        .bind(Json(&profile.location_targets))
        .bind(profile.min_score as i32)
        .bind(Json(&profile.preferred_companies))
        .bind(Json(&profile.avoid_companies))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Exclude a profile from future runs. Returns false if it does not exist.
    pub async fn deactivate(&self, owner_id: &str, profile_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE profiles SET active = FALSE WHERE owner_id = $1 AND profile_id = $2",
        )
        .bind(owner_id)
        .bind(profile_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    owner_id: String,
    profile_id: String,
    keywords: Json<Vec<String>>,
    exclude_keywords: Json<Vec<String>>,
    seniority_targets: Json<Vec<Seniority>>,
    location_targets: Json<Vec<String>>,
    min_score: i32,
    preferred_companies: Json<Vec<String>>,
    avoid_companies: Json<Vec<String>>,
}

impl From<ProfileRow> for SearchProfile {
    fn from(row: ProfileRow) -> Self {
        SearchProfile {
            owner_id: row.owner_id,
            profile_id: row.profile_id,
            keywords: row.keywords.0,
            exclude_keywords: row.exclude_keywords.0,
            seniority_targets: row.seniority_targets.0,
            location_targets: row.location_targets.0,
            min_score: row.min_score.max(0) as u32,
            preferred_companies: row.preferred_companies.0,
            avoid_companies: row.avoid_companies.0,
        }
    }
}

impl ProfileStore for ProfileRepository {
    async fn load_profiles(&self) -> Result<Vec<SearchProfile>, AppError> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT owner_id, profile_id, keywords, exclude_keywords, seniority_targets,
                   location_targets, min_score, preferred_companies, avoid_companies
            FROM profiles
            WHERE active
            ORDER BY created_at ASC, owner_id, profile_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
