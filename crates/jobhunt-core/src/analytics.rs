use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matching::matches_term;
use crate::models::{RawPosting, Seniority};
use crate::salary::SalaryRange;

const ROLE_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "engineering",
        &[
            "engineer",
            "developer",
            "architect",
            "devops",
            "sre",
            "infrastructure",
            "backend",
            "frontend",
            "full stack",
        ],
    ),
    (
        "product",
        &[
            "product manager",
            "pm",
            "product owner",
            "product lead",
            "director of product",
            "head of product",
        ],
    ),
    (
        "data",
        &[
            "data scientist",
            "data analyst",
            "machine learning",
            "ml",
            "ai engineer",
            "data engineer",
            "analytics",
        ],
    ),
    (
        "design",
        &["designer", "ux", "ui", "product design", "creative", "art director"],
    ),
    (
        "marketing",
        &["marketing", "growth", "demand gen", "brand", "content", "seo", "sem"],
    ),
    (
        "sales",
        &[
            "sales",
            "account executive",
            "ae",
            "business development",
            "sdr",
            "bdr",
            "account manager",
        ],
    ),
    (
        "finance",
        &["finance", "accounting", "cfo", "controller", "analyst", "treasury"],
    ),
    (
        "hr",
        &["hr", "recruiter", "talent", "people operations", "human resources"],
    ),
    (
        "operations",
        &[
            "operations",
            "ops",
            "program manager",
            "project manager",
            "chief of staff",
        ],
    ),
    (
        "executive",
        &["director", "vp", "vice president", "c-level", "chief", "head of", "founder"],
    ),
];

const METRO_AREAS: &[(&str, &[&str])] = &[
    (
        "san francisco",
        &[
            "sf",
            "san francisco",
            "bay area",
            "palo alto",
            "mountain view",
            "menlo park",
            "redwood city",
        ],
    ),
    ("new york", &["nyc", "new york", "manhattan", "brooklyn"]),
    ("seattle", &["seattle", "bellevue", "redmond", "kirkland"]),
    ("austin", &["austin", "texas"]),
    ("los angeles", &["la", "los angeles", "santa monica", "culver city"]),
    ("boston", &["boston", "cambridge", "massachusetts"]),
    ("chicago", &["chicago", "illinois"]),
    ("denver", &["denver", "colorado", "boulder"]),
    ("remote", &["remote", "anywhere", "distributed", "virtual"]),
];

const REMOTE_MARKERS: [&str; 3] = ["remote", "anywhere", "distributed"];

/// Role category of a lowercased title; "other" when nothing matches.
pub fn categorize_role(title: &str) -> &'static str {
    ROLE_CATEGORIES
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| matches_term(title, t)))
        .map(|(category, _)| *category)
        .unwrap_or("other")
}

/// Metro area a lowercased location belongs to, if a known one.
pub fn primary_location(location: &str) -> Option<&'static str> {
    METRO_AREAS
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| matches_term(location, t)))
        .map(|(metro, _)| *metro)
}

/// Bracket label for an annual salary midpoint.
pub fn salary_bracket(midpoint: u32) -> &'static str {
    match midpoint {
        0..100_000 => "under_100k",
        100_000..150_000 => "100k_150k",
        150_000..200_000 => "150k_200k",
        200_000..250_000 => "200k_250k",
        250_000..300_000 => "250k_300k",
        _ => "300k_plus",
    }
}

/// Per-company posting and salary tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub postings: u64,
    pub remote: u64,
    pub salary_samples: u64,
    pub salary_total: u64,
}

impl CompanyStats {
    pub fn average_salary(&self) -> Option<u64> {
        (self.salary_samples > 0).then(|| self.salary_total / self.salary_samples)
    }
}

/// Market snapshot across every fetched posting, matched or not.
///
/// Each target task fills its own instance; the run merges them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalytics {
    pub total_postings: u64,
    pub remote_postings: u64,
    pub roles: BTreeMap<String, u64>,
    pub seniority: BTreeMap<String, u64>,
    pub locations: BTreeMap<String, u64>,
    pub salary_brackets: BTreeMap<String, u64>,
    pub companies: BTreeMap<String, CompanyStats>,
}

impl MarketAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, posting: &RawPosting) {
        let title = posting.title.to_lowercase();
        let location = posting.location.to_lowercase();

        self.total_postings += 1;
        *self
            .roles
            .entry(categorize_role(&title).to_string())
            .or_default() += 1;
        *self
            .seniority
            .entry(Seniority::from_title(&title).to_string())
            .or_default() += 1;

        let company = self.companies.entry(posting.company.clone()).or_default();
        company.postings += 1;

        if REMOTE_MARKERS.iter().any(|m| location.contains(m)) {
            self.remote_postings += 1;
            company.remote += 1;
        }

        if let Some(metro) = primary_location(&location) {
            *self.locations.entry(metro.to_string()).or_default() += 1;
        }

        match posting.salary.as_deref().and_then(SalaryRange::parse) {
            Some(range) => {
                let midpoint = range.midpoint();
                company.salary_samples += 1;
                company.salary_total += u64::from(midpoint);
                *self
                    .salary_brackets
                    .entry(salary_bracket(midpoint).to_string())
                    .or_default() += 1;
            }
            None => {
                *self
                    .salary_brackets
                    .entry("not_specified".to_string())
                    .or_default() += 1;
            }
        }
    }

    pub fn merge(&mut self, other: MarketAnalytics) {
        fn add(into: &mut BTreeMap<String, u64>, from: BTreeMap<String, u64>) {
            for (k, v) in from {
                *into.entry(k).or_default() += v;
            }
        }

        self.total_postings += other.total_postings;
        self.remote_postings += other.remote_postings;
        add(&mut self.roles, other.roles);
        add(&mut self.seniority, other.seniority);
        add(&mut self.locations, other.locations);
        add(&mut self.salary_brackets, other.salary_brackets);
        for (name, stats) in other.companies {
            let entry = self.companies.entry(name).or_default();
            entry.postings += stats.postings;
            entry.remote += stats.remote;
            entry.salary_samples += stats.salary_samples;
            entry.salary_total += stats.salary_total;
        }
    }

    /// Companies with the most postings, largest first.
    pub fn top_companies(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut companies: Vec<(&str, u64)> = self
            .companies
            .iter()
            .map(|(name, stats)| (name.as_str(), stats.postings))
            .collect();
        companies.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        companies.truncate(limit);
        companies
    }

    /// Highest average salary midpoints among companies with enough samples.
    pub fn highest_paying(&self, min_samples: u64, limit: usize) -> Vec<(&str, u64)> {
        let mut companies: Vec<(&str, u64)> = self
            .companies
            .iter()
            .filter(|(_, s)| s.salary_samples >= min_samples)
            .filter_map(|(name, s)| s.average_salary().map(|avg| (name.as_str(), avg)))
            .collect();
        companies.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        companies.truncate(limit);
        companies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_posting;

    #[test]
    fn categorizes_roles() {
        assert_eq!(categorize_role("senior product manager"), "product");
        assert_eq!(categorize_role("staff software engineer"), "engineering");
        assert_eq!(categorize_role("ux researcher"), "design");
        assert_eq!(categorize_role("chief of staff"), "operations");
        assert_eq!(categorize_role("office coordinator"), "other");
        // "pm" must not hit inside a longer word
        assert_eq!(categorize_role("shipment coordinator"), "other");
    }

    #[test]
    fn maps_metro_aliases() {
        assert_eq!(primary_location("palo alto, ca"), Some("san francisco"));
        assert_eq!(primary_location("brooklyn, ny"), Some("new york"));
        assert_eq!(primary_location("atlanta, ga"), None);
        assert_eq!(primary_location("remote - us"), Some("remote"));
    }

    #[test]
    fn brackets_salaries() {
        assert_eq!(salary_bracket(90_000), "under_100k");
        assert_eq!(salary_bracket(150_000), "150k_200k");
        assert_eq!(salary_bracket(310_000), "300k_plus");
    }

    #[test]
    fn records_and_merges() {
        let mut a = MarketAnalytics::new();
        let mut paid = make_posting("Stripe", "Senior Product Manager", "SF / Remote");
        paid.salary = Some("$180k - $220k".into());
        a.record(&paid);
        a.record(&make_posting("Stripe", "Software Engineer", "Seattle, WA"));

        let mut b = MarketAnalytics::new();
        b.record(&make_posting("Figma", "Product Designer", "New York, NY"));

        a.merge(b);
        assert_eq!(a.total_postings, 3);
        assert_eq!(a.remote_postings, 1);
        assert_eq!(a.roles["product"], 1);
        assert_eq!(a.roles["engineering"], 1);
        assert_eq!(a.roles["design"], 1);
        assert_eq!(a.salary_brackets["200k_250k"], 1);
        assert_eq!(a.salary_brackets["not_specified"], 2);
        assert_eq!(a.companies["Stripe"].average_salary(), Some(200_000));
        assert_eq!(a.top_companies(1), vec![("Stripe", 2)]);
        assert_eq!(a.highest_paying(1, 5), vec![("Stripe", 200_000)]);
    }
}
