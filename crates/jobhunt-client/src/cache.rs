use std::time::Duration;

use jobhunt_core::traits::AnswerCache;
use moka::future::Cache;

/// In-process answer cache with a size bound and a time-to-live.
#[derive(Clone)]
pub struct MokaAnswerCache {
    inner: Cache<String, String>,
}

impl MokaAnswerCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for MokaAnswerCache {
    fn default() -> Self {
        Self::new(1_000, Duration::from_secs(7 * 24 * 3600))
    }
}

impl AnswerCache for MokaAnswerCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, answer: &str) {
        self.inner.insert(key.to_string(), answer.to_string()).await;
    }
}
