use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Vocabulary and thresholds used by the [`Scorer`](crate::scoring::Scorer).
///
/// `Default` carries the production values. A JSON override only needs the
/// keys it changes; everything else falls back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// A location segment equal to one of these passes the location gate outright.
    pub remote_terms: Vec<String>,
    /// Substrings marking a domestic city, state or region.
    pub domestic_regions: Vec<String>,
    /// Substrings that disqualify a location segment. Checked before the allow terms.
    pub excluded_regions: Vec<String>,
    /// Two-letter subdivision codes, matched on word boundaries.
    pub subdivision_codes: Vec<String>,
    /// Role nouns from disciplines that are never of interest.
    pub blocked_title_roots: Vec<String>,
    pub top_tier_companies: Vec<String>,
    pub next_tier_companies: Vec<String>,
    /// Pairs of (shorthand, full name) treated as the same place.
    pub location_aliases: Vec<(String, String)>,
    /// Terms in the location or description that earn the remote bonus.
    pub remote_bonus_terms: Vec<String>,
    /// Upper salary bound above which the high-salary bonus applies.
    pub high_salary_threshold: u32,
    /// An excluded keyword first seen within this many characters of the
    /// description is prominent.
    pub prominence_window: usize,
    /// An excluded keyword seen this many times in the description is prominent.
    pub prominence_count: usize,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            remote_terms: strings(&[
                "remote",
                "anywhere",
                "distributed",
                "global",
                "united states",
                "usa",
                "us",
                "u.s.",
            ]),
            domestic_regions: strings(&[
                "united states",
                "usa",
                "us",
                "remote",
                "anywhere",
                "distributed",
                "california",
                "new york",
                "texas",
                "florida",
                "washington",
                "san francisco",
                "bay area",
                "los angeles",
                "seattle",
                "austin",
                "boston",
                "chicago",
                "denver",
                "portland",
                "san diego",
                "miami",
                "atlanta",
                "philadelphia",
                "detroit",
                "phoenix",
                "north america",
                "cambridge",
                "palo alto",
                "mountain view",
            ]),
            excluded_regions: strings(&[
                "berlin",
                "germany",
                "europe",
                "uk",
                "london",
                "paris",
                "france",
                "amsterdam",
                "netherlands",
                "spain",
                "madrid",
                "barcelona",
                "italy",
                "rome",
                "sweden",
                "stockholm",
                "denmark",
                "copenhagen",
                "norway",
                "oslo",
                "switzerland",
                "zurich",
                "austria",
                "vienna",
                "poland",
                "warsaw",
                "czech",
                "prague",
                "hungary",
                "budapest",
                "asia",
                "china",
                "japan",
                "singapore",
                "india",
                "bangalore",
                "canada",
                "toronto",
                "vancouver",
                "montreal",
                "australia",
                "sydney",
                "latam",
                "brazil",
                "mexico",
                "apac",
                "emea",
                "dubai",
                "uae",
                "tel aviv",
                "israel",
                "auckland",
                "new zealand",
                "south africa",
            ]),
            subdivision_codes: strings(&[
                "al", "ak", "az", "ar", "ca", "co", "ct", "de", "fl", "ga", "hi", "id", "il", "in",
                "ia", "ks", "ky", "la", "me", "md", "ma", "mi", "mn", "ms", "mo", "mt", "ne", "nv",
                "nh", "nj", "nm", "ny", "nc", "nd", "oh", "ok", "or", "pa", "ri", "sc", "sd", "tn",
                "tx", "ut", "vt", "va", "wa", "wv", "wi", "wy", "dc",
            ]),
            blocked_title_roots: strings(&[
                "engineer",
                "developer",
                "designer",
                "recruiter",
                "recruiting",
                "sourcer",
                "account executive",
                "sales representative",
                "sales development",
                "solutions architect",
                "data scientist",
                "technician",
                "attorney",
                "counsel",
            ]),
            top_tier_companies: strings(&[
                "OpenAI",
                "Anthropic",
                "Google",
                "Meta",
                "Apple",
                "Stripe",
                "Airbnb",
                "Netflix",
                "Nvidia",
                "SpaceX",
                "Databricks",
            ]),
            next_tier_companies: strings(&[
                "Scale AI",
                "Figma",
                "Notion",
                "Uber",
                "Lyft",
                "Coinbase",
                "Rippling",
                "DoorDash",
                "Snowflake",
                "Datadog",
                "Spotify",
            ]),
            location_aliases: [
                ("sf", "san francisco"),
                ("bay area", "san francisco"),
                ("nyc", "new york"),
                ("la", "los angeles"),
                ("austin", "texas"),
                ("seattle", "washington"),
            ]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
            remote_bonus_terms: strings(&["remote", "anywhere", "distributed", "virtual"]),
            high_salary_threshold: 150_000,
            prominence_window: 200,
            prominence_count: 3,
        }
    }
}

impl ScoringRules {
    /// Parse a (possibly partial) JSON override.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let rules: ScoringRules = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.prominence_count == 0 {
            return Err(AppError::ConfigError(
                "prominence_count must be at least 1".into(),
            ));
        }
        if self
            .blocked_title_roots
            .iter()
            .chain(&self.remote_terms)
            .chain(&self.domestic_regions)
            .chain(&self.excluded_regions)
            .any(|t| t.trim().is_empty())
        {
            return Err(AppError::ConfigError(
                "scoring vocabulary contains an empty term".into(),
            ));
        }
        Ok(())
    }

    /// Lowercase every matching term so lookups can compare lowercased text.
    /// Company names keep their case; tiers compare case-insensitively.
    pub(crate) fn normalized(mut self) -> Self {
        let lower = |v: &mut Vec<String>| {
            for s in v.iter_mut() {
                *s = s.trim().to_lowercase();
            }
        };
        lower(&mut self.remote_terms);
        lower(&mut self.domestic_regions);
        lower(&mut self.excluded_regions);
        lower(&mut self.subdivision_codes);
        lower(&mut self.blocked_title_roots);
        lower(&mut self.remote_bonus_terms);
        for (short, full) in self.location_aliases.iter_mut() {
            *short = short.trim().to_lowercase();
            *full = full.trim().to_lowercase();
        }
        self
    }
}
