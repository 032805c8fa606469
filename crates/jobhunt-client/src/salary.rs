use std::sync::LazyLock;

use jobhunt_core::salary::SalaryRange;
use jobhunt_core::traits::SalaryExtractor;
use regex::Regex;

/// Working hours per year used to annualize hourly rates.
pub const HOURS_PER_YEAR: f64 = 2080.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Annual,
    Hourly,
    AtLeast,
}

const CURRENCY: &str = r"[$£€]";
const DASH: &str = r"\s*(?:-|–|—|to)\s*";

static PATTERNS: LazyLock<Vec<(Regex, Shape)>> = LazyLock::new(|| {
    let full = r"(\d{1,3}(?:,\d{3})+|\d{4,7})(?:\.\d{2})?";
    let thousands = r"(\d{2,3}(?:\.\d)?)\s*k";
    let either = r"(\d{1,3}(?:,\d{3})+k?|\d{2,7}k?)";
    let hourly = r"(\d{2,3}(?:\.\d{2})?)";

    [
        // $150,000 - $200,000
        (format!(r"{CURRENCY}\s*{full}{DASH}{CURRENCY}?\s*{full}"), Shape::Annual),
        // $150k - $200k
        (format!(r"{CURRENCY}\s*{thousands}{DASH}{CURRENCY}?\s*{thousands}"), Shape::Annual),
        // between $150,000 and $200,000
        (
            format!(r"between\s+{CURRENCY}\s*{either}\s+(?:and|to)\s+{CURRENCY}?\s*{either}"),
            Shape::Annual,
        ),
        // salary range: $150k - 200,000
        (
            format!(
                r"(?:compensation|pay|salary|base salary|ote)\s+(?:range|is|of)?\s*:?\s*{CURRENCY}\s*{either}{DASH}{CURRENCY}?\s*{either}"
            ),
            Shape::Annual,
        ),
        // $150k+
        (format!(r"{CURRENCY}\s*(\d{{2,3}})\s*k\s*\+"), Shape::AtLeast),
        // $55 - $75 per hour
        (
            format!(
                r"{CURRENCY}\s*{hourly}{DASH}{CURRENCY}?\s*{hourly}\s*(?:per\s+hour|/\s*hour|/\s*hr|an\s+hour|hourly)"
            ),
            Shape::Hourly,
        ),
    ]
    .into_iter()
    .map(|(pattern, shape)| {
        let regex = Regex::new(&format!("(?i){pattern}")).expect("valid salary pattern");
        (regex, shape)
    })
    .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Regex-driven salary extraction from free-form posting text.
///
/// Patterns are tried from most to least specific; the first match that
/// passes the [`SalaryRange::checked`] sanity bounds wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexSalaryExtractor;

impl RegexSalaryExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl SalaryExtractor for RegexSalaryExtractor {
    fn extract_salary(&self, text: &str) -> Option<SalaryRange> {
        if text.trim().is_empty() {
            return None;
        }
        let text = WHITESPACE.replace_all(text, " ");

        for (regex, shape) in PATTERNS.iter() {
            for caps in regex.captures_iter(&text) {
                let low = caps.get(1).and_then(|m| amount(m.as_str()));
                let high = caps.get(2).and_then(|m| amount(m.as_str()));
                let range = match (shape, low, high) {
                    (Shape::AtLeast, Some(v), _) => SalaryRange::checked(v as u32, v as u32),
                    (Shape::Annual, Some(low), Some(high)) => {
                        SalaryRange::checked(low as u32, high as u32)
                    }
                    (Shape::Hourly, Some(low), Some(high)) => SalaryRange::checked(
                        (low * HOURS_PER_YEAR) as u32,
                        (high * HOURS_PER_YEAR) as u32,
                    ),
                    _ => None,
                };
                if range.is_some() {
                    return range;
                }
            }
        }
        None
    }
}

/// `150,000` → 150000, `150k` → 150000, `55.50` → 55.5.
fn amount(raw: &str) -> Option<f64> {
    let cleaned = raw.replace([',', ' '], "").to_lowercase();
    match cleaned.strip_suffix('k') {
        Some(thousands) => thousands.parse::<f64>().ok().map(|v| v * 1_000.0),
        None => cleaned.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Option<String> {
        RegexSalaryExtractor
            .extract_salary(text)
            .map(|r| r.to_string())
    }

    #[test]
    fn full_figure_range() {
        assert_eq!(
            extract("The base pay for this role is $150,000 - $200,000 per year."),
            Some("$150k - $200k".into())
        );
    }

    #[test]
    fn k_notation_range() {
        assert_eq!(extract("Comp: $140K–$185K + equity"), Some("$140k - $185k".into()));
    }

    #[test]
    fn between_phrase() {
        assert_eq!(
            extract("We expect to pay between $120,000 and $160,000 annually"),
            Some("$120k - $160k".into())
        );
    }

    #[test]
    fn hourly_is_annualized() {
        assert_eq!(extract("$50 - $75 per hour"), Some("$104k - $156k".into()));
    }

    #[test]
    fn open_ended() {
        assert_eq!(extract("Salary: $180k+ DOE"), Some("$180k+".into()));
    }

    #[test]
    fn implausible_ranges_are_skipped() {
        assert_eq!(extract("Raised $10,000,000 - $50,000,000 in funding"), None);
        assert_eq!(extract("$100,000 - $900,000"), None);
        assert_eq!(extract("No salary listed"), None);
        assert_eq!(extract(""), None);
    }

    #[test]
    fn first_plausible_match_wins() {
        assert_eq!(
            extract("Budget $5,000 - $9,000 for equipment. Salary range: $130,000 - $150,000."),
            Some("$130k - $150k".into())
        );
    }
}
