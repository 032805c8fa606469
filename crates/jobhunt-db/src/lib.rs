pub mod config;
pub mod database;
pub mod job_repository;
pub mod metrics_repository;
pub mod profile_repository;
pub mod target_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use job_repository::JobRepository;
pub use metrics_repository::RunMetricsRepository;
pub use profile_repository::ProfileRepository;
pub use target_repository::TargetRepository;
