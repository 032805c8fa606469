//! Gated accept/reject scoring of a posting against one profile.
//!
//! Gates run in a fixed order and the first failing gate short-circuits:
//!
//! 1. location (any segment must be domestic or remote)
//! 2. blocked title roots
//! 3. keywords (at least one must match)
//! 4. additive bonuses (seniority, preferred location, company tier,
//!    salary, freshness, remote)
//! 5. excluded keywords (title always, description only when prominent)
//! 6. noise floor
//!
//! [`Scorer::score`] is pure. It performs no I/O and holds no mutable state,
//! so one scorer can be shared across tasks without locking.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matching::{contains_word, find_term, first_word_offset, matches_term, word_match_offsets};
use crate::models::{RawPosting, SearchProfile, Seniority};
use crate::rules::ScoringRules;
use crate::salary::SalaryRange;

/// Keyword contribution ceiling.
pub const KEYWORD_CAP: u32 = 50;
/// Global noise floor applied when no stricter one is configured.
pub const DEFAULT_GLOBAL_FLOOR: u32 = 15;

const PHRASE_IN_TITLE: u32 = 30;
const WORD_IN_TITLE: u32 = 10;
const SCATTERED_WORD_IN_TITLE: u32 = 5;
const IN_REQUIREMENTS: u32 = 12;
const IN_DESCRIPTION: u32 = 6;

const SENIORITY_MATCH: u32 = 25;
const SENIORITY_UNSPECIFIED: u32 = 15;
const LOCATION_MATCH: u32 = 15;
const LOCATION_UNSPECIFIED: u32 = 10;
const TOP_TIER: u32 = 20;
const NEXT_TIER: u32 = 15;
const OTHER_TIER: u32 = 5;
const SALARY_PRESENT: u32 = 5;
const HIGH_SALARY: u32 = 3;
const REMOTE_FRIENDLY: u32 = 5;

/// (max days ago, bonus, flag)
const FRESHNESS: [(u32, u32, &str); 4] = [
    (1, 8, "Just Posted"),
    (3, 6, "Very Fresh"),
    (7, 4, "Fresh"),
    (14, 2, "Recent"),
];

/// Why a posting was filtered out. A normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    NonDomesticLocation { location: String },
    BlockedTitle { root: String },
    NoKeywordMatch,
    ExcludedInTitle { keyword: String },
    ExcludedInDescription { keyword: String, occurrences: usize },
    BelowFloor { score: u32, floor: u32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NonDomesticLocation { location } => {
                write!(f, "non-domestic location: {location}")
            }
            RejectReason::BlockedTitle { root } => write!(f, "blocked title category: {root}"),
            RejectReason::NoKeywordMatch => write!(f, "no keyword match"),
            RejectReason::ExcludedInTitle { keyword } => {
                write!(f, "title contains excluded keyword: {keyword}")
            }
            RejectReason::ExcludedInDescription {
                keyword,
                occurrences,
            } => write!(
                f,
                "description emphasizes excluded keyword: {keyword} ({occurrences}x)"
            ),
            RejectReason::BelowFloor { score, floor } => {
                write!(f, "below floor: {score} < {floor}")
            }
        }
    }
}

/// Outcome of scoring one posting against one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 0..=100. Zero for every rejection except the floor, which keeps the
    /// score it fell short with.
    pub score: u32,
    pub flags: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub seniority: Seniority,
    pub rejected: bool,
    pub rejection_reason: Option<RejectReason>,
}

impl ScoreResult {
    fn reject(seniority: Seniority, reason: RejectReason) -> Self {
        Self {
            score: 0,
            flags: Vec::new(),
            matched_keywords: Vec::new(),
            seniority,
            rejected: true,
            rejection_reason: Some(reason),
        }
    }

    pub fn is_accepted(&self) -> bool {
        !self.rejected
    }
}

/// Lowercased views of a posting, built once per score call.
struct PostingText {
    title: String,
    location: String,
    description: String,
    requirements: String,
}

impl PostingText {
    fn new(posting: &RawPosting) -> Self {
        Self {
            title: posting.title.to_lowercase(),
            location: posting.location.to_lowercase(),
            description: posting.description.to_lowercase(),
            requirements: posting.requirements.join(" ").to_lowercase(),
        }
    }
}

/// Stateless scorer over a fixed [`ScoringRules`] vocabulary.
#[derive(Debug, Clone)]
pub struct Scorer {
    rules: ScoringRules,
    global_floor: u32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoringRules::default())
    }
}

impl Scorer {
    pub fn new(rules: ScoringRules) -> Self {
        Self {
            rules: rules.normalized(),
            global_floor: DEFAULT_GLOBAL_FLOOR,
        }
    }

    /// Set the floor every profile is held to, whatever its own minimum.
    pub fn with_global_floor(mut self, floor: u32) -> Self {
        self.global_floor = floor;
        self
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn score(&self, posting: &RawPosting, profile: &SearchProfile) -> ScoreResult {
        let text = PostingText::new(posting);
        let seniority = Seniority::from_title(&text.title);

        if !self.is_domestic_location(&text.location) {
            return ScoreResult::reject(
                seniority,
                RejectReason::NonDomesticLocation {
                    location: posting.location.clone(),
                },
            );
        }

        if let Some(root) = self
            .rules
            .blocked_title_roots
            .iter()
            .find(|root| contains_word(&text.title, root))
        {
            return ScoreResult::reject(seniority, RejectReason::BlockedTitle { root: root.clone() });
        }

        let (keyword_score, matched_keywords) = keyword_score(&text, &profile.keywords);
        if matched_keywords.is_empty() {
            return ScoreResult::reject(seniority, RejectReason::NoKeywordMatch);
        }

        let mut score = keyword_score.min(KEYWORD_CAP);
        let mut flags = vec![format!(
            "Keywords: {}",
            matched_keywords
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        )];

        score += self.additive_bonuses(posting, &text, profile, seniority, &mut flags);

        if let Some(reason) = self.excluded_keyword(&text, &profile.exclude_keywords) {
            return ScoreResult {
                flags,
                matched_keywords,
                ..ScoreResult::reject(seniority, reason)
            };
        }

        let score = score.min(100);
        let floor = profile.min_score.max(self.global_floor);
        if score < floor {
            return ScoreResult {
                score,
                flags,
                matched_keywords,
                ..ScoreResult::reject(seniority, RejectReason::BelowFloor { score, floor })
            };
        }

        ScoreResult {
            score,
            flags,
            matched_keywords,
            seniority,
            rejected: false,
            rejection_reason: None,
        }
    }

    /// Empty locations pass. Otherwise at least one " or " / "/" segment
    /// must be remote or domestic, with exclusions winning over allow terms.
    pub fn is_domestic_location(&self, location: &str) -> bool {
        let location = location.trim().to_lowercase();
        if location.is_empty() {
            return true;
        }
        location
            .split(" or ")
            .flat_map(|part| part.split('/'))
            .map(str::trim)
            .filter(|seg| !seg.is_empty())
            .any(|seg| self.segment_passes(seg))
    }

    fn segment_passes(&self, segment: &str) -> bool {
        if self.rules.remote_terms.iter().any(|t| t == segment) {
            return true;
        }
        if find_term(segment, &self.rules.excluded_regions).is_some() {
            return false;
        }
        find_term(segment, &self.rules.domestic_regions).is_some()
            || self
                .rules
                .subdivision_codes
                .iter()
                .any(|code| contains_word(segment, code))
    }

    fn additive_bonuses(
        &self,
        posting: &RawPosting,
        text: &PostingText,
        profile: &SearchProfile,
        seniority: Seniority,
        flags: &mut Vec<String>,
    ) -> u32 {
        let mut score = 0;

        if profile.seniority_targets.contains(&seniority) {
            score += SENIORITY_MATCH;
            flags.push(format!("Level: {seniority}"));
        } else if profile.seniority_targets.is_empty() {
            score += SENIORITY_UNSPECIFIED;
        }

        if let Some(target) = profile
            .location_targets
            .iter()
            .find(|loc| self.location_target_matches(&loc.to_lowercase(), text))
        {
            score += LOCATION_MATCH;
            flags.push(format!("Location: {target}"));
        } else if profile.location_targets.is_empty() {
            score += LOCATION_UNSPECIFIED;
        }

        let company = posting.company.trim();
        if self
            .rules
            .top_tier_companies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(company))
        {
            score += TOP_TIER;
            flags.push("Top Tier".to_string());
        } else if self
            .rules
            .next_tier_companies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(company))
        {
            score += NEXT_TIER;
            flags.push("High Growth".to_string());
        } else {
            score += OTHER_TIER;
        }

        if let Some(salary) = posting.salary.as_deref().filter(|s| !s.trim().is_empty()) {
            score += SALARY_PRESENT;
            flags.push(format!("Salary: {salary}"));
            if SalaryRange::parse(salary).is_some_and(|r| r.high > self.rules.high_salary_threshold)
            {
                score += HIGH_SALARY;
                flags.push("High Salary".to_string());
            }
        }

        if let Some((_, bonus, flag)) = FRESHNESS
            .iter()
            .find(|(max_days, _, _)| posting.days_ago <= *max_days)
        {
            score += bonus;
            flags.push(flag.to_string());
        }

        if self.rules.remote_bonus_terms.iter().any(|t| {
            matches_term(&text.location, t) || matches_term(&text.description, t)
        }) {
            score += REMOTE_FRIENDLY;
            flags.push("Remote Friendly".to_string());
        }

        score
    }

    fn location_target_matches(&self, target: &str, text: &PostingText) -> bool {
        let target = target.trim();
        if target.is_empty() {
            return false;
        }
        if matches_term(&text.location, target) || matches_term(&text.description, target) {
            return true;
        }
        self.rules.location_aliases.iter().any(|(short, full)| {
            (target == short && matches_term(&text.location, full))
                || (target == full && matches_term(&text.location, short))
        })
    }

    fn excluded_keyword(&self, text: &PostingText, excluded: &[String]) -> Option<RejectReason> {
        for keyword in excluded {
            let needle = keyword.trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            if contains_word(&text.title, &needle) {
                return Some(RejectReason::ExcludedInTitle {
                    keyword: keyword.clone(),
                });
            }
            let occurrences = word_match_offsets(&text.description, &needle).len();
            let early = first_word_offset(&text.description, &needle)
                .is_some_and(|offset| offset < self.rules.prominence_window);
            if occurrences >= self.rules.prominence_count || early {
                return Some(RejectReason::ExcludedInDescription {
                    keyword: keyword.clone(),
                    occurrences,
                });
            }
        }
        None
    }
}

/// Sum of per-keyword deltas (uncapped) and the keywords that matched.
fn keyword_score(text: &PostingText, keywords: &[String]) -> (u32, Vec<String>) {
    let mut total = 0;
    let mut matched = Vec::new();

    for keyword in keywords {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let words: Vec<&str> = needle.split_whitespace().collect();
        let delta = if contains_word(&text.title, &needle) {
            if words.len() > 1 {
                PHRASE_IN_TITLE
            } else {
                WORD_IN_TITLE
            }
        } else if words.len() > 1 && words.iter().all(|w| contains_word(&text.title, w)) {
            SCATTERED_WORD_IN_TITLE * words.len() as u32
        } else if contains_word(&text.requirements, &needle) {
            IN_REQUIREMENTS
        } else if contains_word(&text.description, &needle) {
            IN_DESCRIPTION
        } else {
            0
        };

        if delta > 0 {
            total += delta;
            if !matched.contains(keyword) {
                matched.push(keyword.clone());
            }
        }
    }

    (total, matched)
}
