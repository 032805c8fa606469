//! Lever postings API: `GET /v0/postings/{board}?mode=json`.

use chrono::{DateTime, Utc};
use jobhunt_core::error::AppError;
use serde::Deserialize;

use crate::ats::Listing;

const API_BASE: &str = "https://api.lever.co/v0/postings";

pub fn endpoint(board: &str) -> String {
    format!("{API_BASE}/{board}?mode=json")
}

pub fn board_url(board: &str) -> String {
    format!("https://jobs.lever.co/{board}/")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Posting {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    categories: Option<Categories>,
    #[serde(default)]
    hosted_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    description_plain: Option<String>,
    /// Titled sections such as "Requirements", with `<li>` content.
    #[serde(default)]
    lists: Vec<Section>,
    #[serde(default)]
    additional: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    salary_range: Option<SalaryRange>,
}

#[derive(Deserialize)]
struct Categories {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Deserialize)]
struct Section {
    #[serde(default)]
    text: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct SalaryRange {
    min: Option<f64>,
    max: Option<f64>,
    #[serde(default)]
    interval: Option<String>,
}

impl SalaryRange {
    /// Only yearly ranges; other intervals fall back to text extraction.
    fn hint(&self) -> Option<String> {
        let yearly = self
            .interval
            .as_deref()
            .is_none_or(|i| i.contains("year"));
        match (self.min, self.max) {
            (Some(min), Some(max)) if yearly => Some(format!("${min:.0} - ${max:.0}")),
            _ => None,
        }
    }
}

pub fn parse(body: &str) -> Result<Vec<Listing>, AppError> {
    let postings: Vec<Posting> = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("Lever response: {e}")))?;

    Ok(postings
        .into_iter()
        .map(|posting| Listing {
            content: content_of(&posting),
            salary_hint: posting.salary_range.as_ref().and_then(SalaryRange::hint),
            posted_at: posting.created_at.and_then(DateTime::<Utc>::from_timestamp_millis),
            location: posting
                .categories
                .and_then(|c| c.location)
                .unwrap_or_default(),
            url: posting.hosted_url.unwrap_or(posting.id),
            title: posting.text,
        })
        .collect())
}

/// HTML description followed by each titled list as a heading and bullets.
fn content_of(posting: &Posting) -> String {
    let mut html = posting
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .or_else(|| posting.description_plain.clone())
        .unwrap_or_default();
    for section in &posting.lists {
        html.push_str(&format!(
            "<h3>{}</h3><ul>{}</ul>",
            section.text, section.content
        ));
    }
    if let Some(additional) = posting.additional.as_deref() {
        html.push_str(additional);
    }
    html
}
