use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// SQL migration statements, executed one at a time.
const MIGRATIONS: &[&str] = &[
    // 001_init.sql
    r#"CREATE TABLE IF NOT EXISTS targets (
        name VARCHAR(255) PRIMARY KEY,
        source_kind VARCHAR(20) NOT NULL,
        board_id VARCHAR(255) NOT NULL,
        priority SMALLINT NOT NULL DEFAULT 3,
        CONSTRAINT chk_targets_source_kind CHECK (source_kind IN ('greenhouse', 'ashby', 'lever')),
        CONSTRAINT chk_targets_priority CHECK (priority BETWEEN 1 AND 3)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS jobs (
        dedup_key VARCHAR(64) PRIMARY KEY,
        title VARCHAR NOT NULL,
        company VARCHAR NOT NULL,
        location VARCHAR NOT NULL,
        url VARCHAR NOT NULL,
        source_kind VARCHAR(20) NOT NULL,
        description TEXT,
        requirements JSONB,
        salary VARCHAR(100),
        seniority VARCHAR(20),
        match_score INTEGER,
        tags JSONB,
        first_seen_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        expires_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_jobs_expires_at ON jobs(expires_at)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company, first_seen_at DESC)"#,
    r#"CREATE TABLE IF NOT EXISTS matches (
        id VARCHAR(64) PRIMARY KEY,
        user_id VARCHAR(255) NOT NULL,
        profile_id VARCHAR(255) NOT NULL,
        dedup_key VARCHAR(64) NOT NULL REFERENCES jobs(dedup_key) ON DELETE CASCADE,
        match_score INTEGER NOT NULL,
        reasons JSONB NOT NULL DEFAULT '[]',
        matched_keywords JSONB NOT NULL DEFAULT '[]',
        viewed BOOLEAN NOT NULL DEFAULT FALSE,
        saved BOOLEAN NOT NULL DEFAULT FALSE,
        applied BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_matches_user ON matches(user_id, created_at DESC)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_matches_job ON matches(dedup_key)"#,
    r#"CREATE TABLE IF NOT EXISTS profiles (
        owner_id VARCHAR(255) NOT NULL,
        profile_id VARCHAR(255) NOT NULL,
        keywords JSONB NOT NULL DEFAULT '[]',
        exclude_keywords JSONB NOT NULL DEFAULT '[]',
        seniority_targets JSONB NOT NULL DEFAULT '[]',
        location_targets JSONB NOT NULL DEFAULT '[]',
        min_score INTEGER NOT NULL DEFAULT 40,
        preferred_companies JSONB NOT NULL DEFAULT '[]',
        avoid_companies JSONB NOT NULL DEFAULT '[]',
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (owner_id, profile_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS run_metrics (
        id UUID PRIMARY KEY,
        started_at TIMESTAMPTZ NOT NULL,
        finished_at TIMESTAMPTZ,
        summary JSONB NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_run_metrics_started ON run_metrics(started_at DESC)"#,
];

/// Spins up a PostgreSQL container and returns a migrated pool.
///
/// Keep the returned `ContainerAsync` alive for the whole test; dropping
/// it stops the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "jobhunt_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/jobhunt_test");

    // The server restarts once after init; retry until it accepts us.
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    (pool, container)
}

/// Push a stored job past its expiry.
pub async fn expire_job(pool: &PgPool, dedup_key: &str) {
    sqlx::query("UPDATE jobs SET expires_at = NOW() - INTERVAL '1 day' WHERE dedup_key = $1")
        .bind(dedup_key)
        .execute(pool)
        .await
        .expect("Failed to expire job");
}
