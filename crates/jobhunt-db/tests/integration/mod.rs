pub mod common;
mod ingestion_tests;
mod job_repository_tests;
mod profile_repository_tests;
