//! Ashby posting API: `GET /posting-api/job-board/{board}`.

use chrono::{DateTime, Utc};
use jobhunt_core::error::AppError;
use serde::Deserialize;

use crate::ats::Listing;

const API_BASE: &str = "https://api.ashbyhq.com/posting-api/job-board";

pub fn endpoint(board: &str) -> String {
    format!("{API_BASE}/{board}?includeCompensation=true")
}

pub fn board_url(board: &str) -> String {
    format!("https://jobs.ashbyhq.com/{board}/")
}

#[derive(Deserialize)]
struct Board {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    is_remote: bool,
    #[serde(default = "listed")]
    is_listed: bool,
    #[serde(default)]
    job_url: Option<String>,
    #[serde(default)]
    description_html: Option<String>,
    #[serde(default)]
    description_plain: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    compensation: Option<Compensation>,
}

fn listed() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Compensation {
    #[serde(default)]
    scrapeable_compensation_salary_summary: Option<String>,
    #[serde(default)]
    compensation_tier_summary: Option<String>,
}

pub fn parse(body: &str) -> Result<Vec<Listing>, AppError> {
    let board: Board = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("Ashby response: {e}")))?;

    Ok(board
        .jobs
        .into_iter()
        .filter(|job| job.is_listed)
        .map(|job| {
            let location = match job.location.filter(|l| !l.trim().is_empty()) {
                Some(location) => location,
                None if job.is_remote => "Remote".to_string(),
                None => String::new(),
            };
            let content = job
                .description_html
                .filter(|d| !d.trim().is_empty())
                .or(job.description_plain)
                .unwrap_or_default();
            let posted_at = job
                .published_at
                .or(job.updated_at)
                .as_deref()
                .and_then(parse_timestamp);
            let salary_hint = job.compensation.and_then(|c| {
                c.scrapeable_compensation_salary_summary
                    .or(c.compensation_tier_summary)
            });

            Listing {
                url: job.job_url.unwrap_or(job.id),
                title: job.title,
                location,
                content,
                posted_at,
                salary_hint,
            }
        })
        .collect())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
