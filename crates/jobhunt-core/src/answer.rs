//! Cached answers to free-text application questions.

use crate::error::AppError;
use crate::traits::{AnswerCache, QuestionAnswerer};

/// Cache key for a question: lowercased, whitespace collapsed.
pub fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A [`QuestionAnswerer`] that consults an [`AnswerCache`] first.
#[derive(Debug, Clone)]
pub struct CachedAnswerer<A, C> {
    answerer: A,
    cache: C,
}

impl<A, C> CachedAnswerer<A, C>
where
    A: QuestionAnswerer,
    C: AnswerCache,
{
    pub fn new(answerer: A, cache: C) -> Self {
        Self { answerer, cache }
    }
}

impl<A, C> QuestionAnswerer for CachedAnswerer<A, C>
where
    A: QuestionAnswerer,
    C: AnswerCache,
{
    async fn answer(&self, question: &str, profile_summary: &str) -> Result<String, AppError> {
        let key = normalize_question(question);
        if key.is_empty() {
            return Err(AppError::Generic("question is empty".into()));
        }
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(question = %key, "Answer cache hit");
            return Ok(hit);
        }

        let answer = self.answerer.answer(question, profile_summary).await?;
        self.cache.set(&key, &answer).await;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryAnswerCache, MockAnswerer};

    #[test]
    fn normalizes_case_and_spacing() {
        assert_eq!(
            normalize_question("  Why do you want\n to work   HERE? "),
            "why do you want to work here?"
        );
    }

    #[tokio::test]
    async fn second_ask_is_served_from_cache() {
        let answerer = MockAnswerer::new("Because of the mission.");
        let cached = CachedAnswerer::new(answerer.clone(), MemoryAnswerCache::new());

        let first = cached.answer("Why us?", "PM, 8 years").await.unwrap();
        let second = cached.answer("  why   US? ", "PM, 8 years").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(answerer.calls(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let answerer = MockAnswerer::new("ok");
        answerer.push_err(AppError::LlmError {
            message: "overloaded".into(),
            status_code: 529,
            retryable: true,
        });
        let cached = CachedAnswerer::new(answerer.clone(), MemoryAnswerCache::new());

        assert!(cached.answer("Why us?", "").await.is_err());
        assert_eq!(cached.answer("Why us?", "").await.unwrap(), "ok");
        assert_eq!(answerer.calls(), 2);
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let answerer = MockAnswerer::new("ok");
        let cached = CachedAnswerer::new(answerer.clone(), MemoryAnswerCache::new());
        assert!(cached.answer("   ", "").await.is_err());
        assert_eq!(answerer.calls(), 0);
    }
}
