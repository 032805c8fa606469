use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use htmd::HtmlToMarkdown;
use htmd::options::{BulletListMarker, HeadingStyle, Options};
use jobhunt_core::error::AppError;
use jobhunt_core::traits::{ContentExtractor, ExtractedContent};
use regex::Regex;

/// Summary length ceiling, in characters.
pub const MAX_SUMMARY_CHARS: usize = 2000;
/// Requirement bullets kept per posting.
pub const MAX_REQUIREMENTS: usize = 15;

const MIN_REQUIREMENT_CHARS: usize = 10;
const MAX_REQUIREMENT_CHARS: usize = 500;

/// Headings that open a requirements section.
const REQUIREMENT_HEADINGS: &[&str] = &[
    "requirements",
    "requirement",
    "qualifications",
    "qualification",
    "you have",
    "must have",
    "required skills",
    "you will need",
    "what you'll bring",
    "what you will bring",
    "what we're looking for",
    "what we are looking for",
    "ideal candidate",
    "minimum qualifications",
    "basic qualifications",
];

/// Headings that look like requirements but are not.
const OPTIONAL_PREFIXES: &[&str] = &["preferred", "nice to have", "bonus", "plus"];

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[*\-+•◦▪▶]|\d{1,2}[.)])\s+(.+?)\s*$").expect("valid bullet regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Description extractor built on htmd.
///
/// HTML is converted to Markdown first (script, style and page chrome
/// dropped), which keeps list and heading structure for requirement
/// extraction. Plain-text input is used as-is.
pub struct HtmlContentExtractor {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for HtmlContentExtractor {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl HtmlContentExtractor {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .options(Options {
                heading_style: HeadingStyle::Atx,
                bullet_list_marker: BulletListMarker::Dash,
                ..Default::default()
            })
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
                "img",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }

    fn to_text(&self, input: &str) -> Result<String, AppError> {
        if looks_like_html(input) {
            self.converter
                .convert(input)
                .map_err(|e| AppError::CleanerError(e.to_string()))
        } else {
            Ok(input.to_string())
        }
    }
}

impl Default for HtmlContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for HtmlContentExtractor {
    fn extract_description(&self, html: &str) -> Result<ExtractedContent, AppError> {
        if html.trim().is_empty() {
            return Ok(ExtractedContent::default());
        }
        let text = self.to_text(html)?;
        let full_text = plain_text(&text);
        Ok(ExtractedContent {
            summary: summarize(&full_text, MAX_SUMMARY_CHARS),
            requirements: extract_requirements(&text),
            full_text,
        })
    }
}

fn looks_like_html(input: &str) -> bool {
    input.contains('<') && input.contains('>')
}

/// Markdown markers stripped, whitespace collapsed to single spaces.
fn plain_text(markdown: &str) -> String {
    let stripped: Vec<&str> = markdown
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches('#')
                .trim_start_matches(['*', '-', '+', '>'])
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect();
    let joined = stripped.join(" ").replace("**", "").replace('\\', "");
    WHITESPACE.replace_all(&joined, " ").trim().to_string()
}

/// Truncate to `max_chars`. Cut back to the last sentence end when it lies
/// past 70% of the limit, otherwise append `...`.
pub fn summarize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    let boundary = truncated
        .char_indices()
        .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, _)| i)
        .next_back();

    match boundary {
        Some(byte) if truncated[..byte].chars().count() * 10 > max_chars * 7 => {
            truncated[..=byte].to_string()
        }
        _ => format!("{truncated}..."),
    }
}

/// Bullet items under requirement-style headings, de-duplicated and bounded.
pub fn extract_requirements(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut requirements = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        if let Some(heading) = heading_text(line) {
            in_section = is_requirement_heading(&heading);
            continue;
        }
        if !in_section {
            continue;
        }
        let Some(caps) = BULLET.captures(line) else {
            continue;
        };
        let item = clean_item(&caps[1]);
        let len = item.chars().count();
        if len <= MIN_REQUIREMENT_CHARS || len >= MAX_REQUIREMENT_CHARS {
            continue;
        }
        if seen.insert(item.to_lowercase()) {
            requirements.push(item);
            if requirements.len() == MAX_REQUIREMENTS {
                break;
            }
        }
    }
    requirements
}

/// The text of a heading line: `# Heading`, `**Heading**` or a short
/// non-bullet line ending in a colon.
fn heading_text(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || BULLET.is_match(line) {
        return None;
    }
    let text = if let Some(rest) = line.strip_prefix('#') {
        rest.trim_start_matches('#')
    } else if line.starts_with("**") && line.ends_with("**") && line.len() > 4 {
        &line[2..line.len() - 2]
    } else if line.ends_with(':') && line.chars().count() <= 80 {
        line
    } else {
        return None;
    };
    let text = text.replace("**", "");
    Some(text.trim().trim_end_matches(':').trim().to_lowercase())
}

fn is_requirement_heading(heading: &str) -> bool {
    if OPTIONAL_PREFIXES.iter().any(|p| heading.starts_with(p)) {
        return false;
    }
    REQUIREMENT_HEADINGS.iter().any(|h| heading.contains(h))
}

fn clean_item(raw: &str) -> String {
    let item = raw.replace("**", "").replace('\\', "");
    WHITESPACE.replace_all(item.trim(), " ").to_string()
}
