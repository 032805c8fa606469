//! Term matching over lowercased text.
//!
//! Keywords and short vocabulary terms must not match inside longer words
//! ("uk" in "milwaukee", "manager" in "management"), so they go through the
//! word-boundary helpers. Longer vocabulary terms ("san francisco") are plain
//! substring checks.

/// Terms of this many characters or fewer are matched on word boundaries.
pub const SHORT_TERM_CHARS: usize = 3;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offsets of every word-bounded occurrence of `needle` in `haystack`.
///
/// A boundary is only required on a side where the needle itself starts or
/// ends with a word character, so "c++" or "u.s." still match sensibly.
pub fn word_match_offsets(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let starts_word = needle.chars().next().is_some_and(is_word_char);
    let ends_word = needle.chars().next_back().is_some_and(is_word_char);

    haystack
        .match_indices(needle)
        .filter(|(i, _)| {
            let before_ok = !starts_word
                || haystack[..*i]
                    .chars()
                    .next_back()
                    .is_none_or(|c| !is_word_char(c));
            let after_ok = !ends_word
                || haystack[i + needle.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !is_word_char(c));
            before_ok && after_ok
        })
        .map(|(i, _)| i)
        .collect()
}

pub fn contains_word(haystack: &str, needle: &str) -> bool {
    !word_match_offsets(haystack, needle).is_empty()
}

/// Character offset of the first word-bounded occurrence.
pub fn first_word_offset(haystack: &str, needle: &str) -> Option<usize> {
    word_match_offsets(haystack, needle)
        .first()
        .map(|i| haystack[..*i].chars().count())
}

/// Vocabulary lookup: word-bounded for short terms, substring otherwise.
pub fn matches_term(haystack: &str, term: &str) -> bool {
    if term.chars().count() <= SHORT_TERM_CHARS {
        contains_word(haystack, term)
    } else {
        haystack.contains(term)
    }
}

/// First term of `terms` found in `haystack`, if any.
pub fn find_term<'a>(haystack: &str, terms: &'a [String]) -> Option<&'a str> {
    terms
        .iter()
        .find(|t| matches_term(haystack, t))
        .map(String::as_str)
}
