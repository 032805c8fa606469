//! Greenhouse job board API: `GET /v1/boards/{board}/jobs?content=true`.

use chrono::{DateTime, Utc};
use jobhunt_core::error::AppError;
use serde::Deserialize;

use crate::ats::Listing;

const API_BASE: &str = "https://boards-api.greenhouse.io/v1/boards";

pub fn endpoint(board: &str) -> String {
    format!("{API_BASE}/{board}/jobs?content=true")
}

pub fn board_url(board: &str) -> String {
    format!("https://boards.greenhouse.io/{board}/")
}

#[derive(Deserialize)]
struct Board {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Deserialize)]
struct Job {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    absolute_url: Option<String>,
    /// HTML, entity-escaped.
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Location {
    Named { name: String },
    Text(String),
}

impl Location {
    fn into_text(self) -> String {
        match self {
            Location::Named { name } => name,
            Location::Text(text) => text,
        }
    }
}

pub fn parse(body: &str) -> Result<Vec<Listing>, AppError> {
    let board: Board = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("Greenhouse response: {e}")))?;

    Ok(board
        .jobs
        .into_iter()
        .map(|job| Listing {
            url: job.absolute_url.unwrap_or_else(|| format!("jobs/{}", job.id)),
            title: job.title,
            location: job.location.map(Location::into_text).unwrap_or_default(),
            content: job.content.as_deref().map(unescape_html).unwrap_or_default(),
            posted_at: job.updated_at.as_deref().and_then(parse_timestamp),
            salary_hint: None,
        })
        .collect())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Greenhouse escapes the markup inside `content`.
fn unescape_html(escaped: &str) -> String {
    escaped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "jobs": [
            {
                "id": 4012,
                "title": "Senior Product Manager, Payments",
                "location": {"name": "San Francisco, CA"},
                "absolute_url": "https://boards.greenhouse.io/stripe/jobs/4012",
                "content": "&lt;h3&gt;Requirements&lt;/h3&gt;&lt;ul&gt;&lt;li&gt;Payments &amp;amp; risk experience&lt;/li&gt;&lt;/ul&gt;",
                "updated_at": "2026-10-15T14:30:00-04:00"
            },
            {
                "id": 4013,
                "title": "Product Manager",
                "location": "Remote",
                "updated_at": "yesterday"
            }
        ],
        "meta": {"total": 2}
    }"#;

    #[test]
    fn parses_board() {
        let listings = parse(BODY).unwrap();
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.title, "Senior Product Manager, Payments");
        assert_eq!(first.location, "San Francisco, CA");
        assert!(first.content.starts_with("<h3>Requirements</h3>"));
        assert!(first.content.contains("Payments &amp; risk"));
        assert_eq!(
            first.posted_at.map(|t| t.to_rfc3339()),
            Some("2026-10-15T18:30:00+00:00".to_string())
        );

        let second = &listings[1];
        assert_eq!(second.location, "Remote");
        assert_eq!(second.url, "jobs/4013");
        assert_eq!(second.posted_at, None);
        assert!(second.content.is_empty());
    }

    #[test]
    fn empty_board() {
        assert!(parse(r#"{"jobs": []}"#).unwrap().is_empty());
        assert!(parse("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        assert!(matches!(parse("<html>"), Err(AppError::ParseError(_))));
    }

    #[test]
    fn endpoints() {
        assert_eq!(
            endpoint("stripe"),
            "https://boards-api.greenhouse.io/v1/boards/stripe/jobs?content=true"
        );
    }
}
