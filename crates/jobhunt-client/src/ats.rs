use std::time::Duration;

use chrono::{DateTime, Utc};
use jobhunt_core::error::AppError;
use jobhunt_core::models::{RawPosting, SourceKind, Target, days_since};
use jobhunt_core::traits::{ContentExtractor, SalaryExtractor, SourceClient};
use rand::seq::SliceRandom;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::content::HtmlContentExtractor;
use crate::salary::RegexSalaryExtractor;
use crate::{ashby, greenhouse, lever};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// One posting as read from a board, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub title: String,
    pub location: String,
    /// Absolute or board-relative apply URL.
    pub url: String,
    /// HTML or plain-text description.
    pub content: String,
    pub posted_at: Option<DateTime<Utc>>,
    /// Structured compensation text, when the board provides it.
    pub salary_hint: Option<String>,
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// HTTP client for the public Greenhouse, Ashby and Lever board APIs.
///
/// Wrap it in a `ThrottledSource` to get per-source pacing. A board that
/// does not exist (404) yields no postings rather than an error.
#[derive(Clone)]
pub struct AtsClient<E = HtmlContentExtractor, X = RegexSalaryExtractor> {
    client: Client,
    timeout_secs: u64,
    content: E,
    salary: X,
}

impl AtsClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Self::with_extractors(
            timeout,
            HtmlContentExtractor::new(),
            RegexSalaryExtractor::new(),
        )
    }
}

impl<E, X> AtsClient<E, X>
where
    E: ContentExtractor,
    X: SalaryExtractor,
{
    pub fn with_extractors(timeout: Duration, content: E, salary: X) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            content,
            salary,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Option<String>, AppError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", random_user_agent())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(|e| AppError::NetworkError(format!("Failed to read response body: {e}")))
    }

    /// Turn a board listing into a [`RawPosting`].
    pub fn normalize(
        &self,
        listing: Listing,
        target: &Target,
        base: &Url,
        now: DateTime<Utc>,
    ) -> RawPosting {
        let extracted = match self.content.extract_description(&listing.content) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(title = %listing.title, error = %e, "Description extraction failed");
                Default::default()
            }
        };

        let salary = listing
            .salary_hint
            .as_deref()
            .and_then(|hint| self.salary.extract_salary(hint))
            .or_else(|| {
                let text = format!("{} {}", listing.title, extracted.full_text);
                self.salary.extract_salary(&text)
            })
            .map(|range| range.to_string());

        RawPosting {
            url: absolute_url(base, &listing.url),
            title: listing.title.trim().to_string(),
            company: target.name.clone(),
            location: listing.location.trim().to_string(),
            description: extracted.summary,
            requirements: extracted.requirements,
            salary,
            source_kind: target.source_kind,
            days_ago: days_since(listing.posted_at, now),
            posted_at: listing.posted_at,
        }
    }
}

impl<E, X> SourceClient for AtsClient<E, X>
where
    E: ContentExtractor,
    X: SalaryExtractor,
{
    async fn fetch(&self, target: &Target) -> Result<Vec<RawPosting>, AppError> {
        let board = target.board_id.as_str();
        let (endpoint, base) = match target.source_kind {
            SourceKind::Greenhouse => (greenhouse::endpoint(board), greenhouse::board_url(board)),
            SourceKind::Ashby => (ashby::endpoint(board), ashby::board_url(board)),
            SourceKind::Lever => (lever::endpoint(board), lever::board_url(board)),
        };
        let base = Url::parse(&base)
            .map_err(|e| AppError::ConfigError(format!("Invalid board URL {base}: {e}")))?;

        let Some(body) = self.get_json(&endpoint).await? else {
            tracing::warn!(target_name = %target.name, source = %target.source_kind, board, "Board not found");
            return Ok(Vec::new());
        };

        let listings = match target.source_kind {
            SourceKind::Greenhouse => greenhouse::parse(&body)?,
            SourceKind::Ashby => ashby::parse(&body)?,
            SourceKind::Lever => lever::parse(&body)?,
        };

        let now = Utc::now();
        let postings: Vec<RawPosting> = listings
            .into_iter()
            .filter(|l| !l.title.trim().is_empty())
            .map(|l| self.normalize(l, target, &base, now))
            .collect();

        tracing::debug!(
            target_name = %target.name,
            source = %target.source_kind,
            postings = postings.len(),
            "Board fetched"
        );
        Ok(postings)
    }
}

/// Resolve a possibly relative apply URL against the board's public URL.
pub fn absolute_url(base: &Url, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return base.to_string();
    }
    match Url::parse(raw) {
        Ok(url) => url.to_string(),
        Err(_) => base
            .join(raw)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use jobhunt_core::models::UNKNOWN_AGE_DAYS;

    fn target() -> Target {
        Target::new("Stripe", SourceKind::Greenhouse, "stripe", 1)
    }

    fn base() -> Url {
        Url::parse(&greenhouse::board_url("stripe")).unwrap()
    }

    #[test]
    fn resolves_relative_urls() {
        assert_eq!(
            absolute_url(&base(), "jobs/123"),
            "https://boards.greenhouse.io/stripe/jobs/123"
        );
        assert_eq!(
            absolute_url(&base(), "/stripe/jobs/9"),
            "https://boards.greenhouse.io/stripe/jobs/9"
        );
        assert_eq!(
            absolute_url(&base(), "https://stripe.com/jobs/listing/1"),
            "https://stripe.com/jobs/listing/1"
        );
        assert_eq!(absolute_url(&base(), " "), "https://boards.greenhouse.io/stripe/");
    }

    #[test]
    fn normalizes_listing() {
        let client = AtsClient::new().unwrap();
        let now = Utc::now();
        let listing = Listing {
            title: " Senior Product Manager ".into(),
            location: "San Francisco, CA".into(),
            url: "jobs/42".into(),
            content: "<h3>Requirements</h3><ul><li>Five years of product experience</li></ul>\
                      <p>The pay range is $180,000 - $220,000.</p>"
                .into(),
            posted_at: Some(now - TimeDelta::days(2)),
            salary_hint: None,
        };

        let posting = client.normalize(listing, &target(), &base(), now);
        assert_eq!(posting.title, "Senior Product Manager");
        assert_eq!(posting.company, "Stripe");
        assert_eq!(posting.url, "https://boards.greenhouse.io/stripe/jobs/42");
        assert_eq!(posting.requirements, vec!["Five years of product experience"]);
        assert_eq!(posting.salary.as_deref(), Some("$180k - $220k"));
        assert_eq!(posting.days_ago, 2);
    }

    #[test]
    fn finds_salary_past_the_summary_limit() {
        let client = AtsClient::new().unwrap();
        let filler = "Our team ships payments infrastructure used worldwide. ".repeat(60);
        let listing = Listing {
            title: "Product Manager".into(),
            content: format!(
                "<p>{filler}</p><p>The annual base salary range is $180,000 - $220,000.</p>"
            ),
            ..Listing::default()
        };
        let posting = client.normalize(listing, &target(), &base(), Utc::now());
        assert!(!posting.description.contains("$180,000"));
        assert_eq!(posting.salary.as_deref(), Some("$180k - $220k"));
    }

    #[test]
    fn salary_hint_takes_precedence() {
        let client = AtsClient::new().unwrap();
        let listing = Listing {
            title: "Product Manager".into(),
            content: "Pay: $100,000 - $120,000".into(),
            salary_hint: Some("$150K – $190K".into()),
            ..Listing::default()
        };
        let posting = client.normalize(listing, &target(), &base(), Utc::now());
        assert_eq!(posting.salary.as_deref(), Some("$150k - $190k"));
        assert_eq!(posting.days_ago, UNKNOWN_AGE_DAYS);
    }

    #[test]
    fn user_agent_comes_from_pool() {
        for _ in 0..10 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }
}
