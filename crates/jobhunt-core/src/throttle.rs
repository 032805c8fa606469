//! Per-source request pacing.
//!
//! Every ATS gets one [`RateLimiter`] and one concurrency semaphore, shared
//! by all targets hosted on it. [`ThrottledSource`] wraps any
//! [`SourceClient`] and runs each fetch through the gate of the target's
//! source: permit first, then the limiter, then the request.
//!
//! # Example
//!
//! ```rust,no_run
//! use jobhunt_core::config::IngestConfig;
//! use jobhunt_core::throttle::{SourceGates, ThrottledSource};
//! # use jobhunt_core::traits::SourceClient;
//! # use jobhunt_core::models::{RawPosting, Target};
//! # #[derive(Clone)] struct MyClient;
//! # impl SourceClient for MyClient {
//! #     async fn fetch(&self, _: &Target) -> Result<Vec<RawPosting>, jobhunt_core::AppError> { todo!() }
//! # }
//!
//! let gates = SourceGates::from_config(&IngestConfig::default());
//! let source = ThrottledSource::new(MyClient, gates);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

use crate::config::IngestConfig;
use crate::error::AppError;
use crate::models::{RawPosting, SourceKind, Target};
use crate::traits::SourceClient;

/// Consecutive errors tolerated before the limiter starts slowing down.
pub const ERROR_STREAK_THRESHOLD: u32 = 3;
/// Ceiling for the adaptive delay.
pub const MAX_DELAY: Duration = Duration::from_secs(10);

const BACKOFF_FACTOR: f64 = 1.5;
const RECOVERY_FACTOR: f64 = 0.9;
/// Upper bound of the multiplicative jitter. The lower bound is 1.0 so the
/// configured rate is never exceeded.
const MAX_JITTER: f64 = 1.2;

#[derive(Debug)]
struct LimiterState {
    delay: Duration,
    last_grant: Option<Instant>,
    consecutive_errors: u32,
}

/// Paces calls to at most one per `1 / rate` seconds, slowing down under
/// sustained errors and recovering toward the configured base.
///
/// Cloning shares the state. Slots are reserved under the lock and slept
/// on outside it, so concurrent callers queue up one interval apart.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    base_delay: Duration,
    jitter: bool,
    state: Arc<Mutex<LimiterState>>,
}

impl RateLimiter {
    /// Create a limiter for `rate` requests per second.
    pub fn per_second(rate: f64) -> Self {
        let base_delay = if rate > 0.0 {
            Duration::from_secs_f64(1.0 / rate)
        } else {
            MAX_DELAY
        };
        Self::with_delay(base_delay)
    }

    pub fn with_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            jitter: true,
            state: Arc::new(Mutex::new(LimiterState {
                delay: base_delay,
                last_grant: None,
                consecutive_errors: 0,
            })),
        }
    }

    /// Disable jitter, making the interval exactly the current delay.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(1.0..MAX_JITTER);
        delay.mul_f64(factor)
    }

    /// Suspend until this caller's slot comes up.
    pub async fn wait(&self) {
        let slot = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let slot = match state.last_grant {
                Some(last) => (last + self.jittered(state.delay)).max(now),
                None => now,
            };
            state.last_grant = Some(slot);
            slot
        };

        if slot > Instant::now() {
            tracing::trace!(
                sleep_ms = %slot.saturating_duration_since(Instant::now()).as_millis(),
                "Rate limiting request"
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Count a failure. Past the streak threshold the delay grows by half,
    /// up to [`MAX_DELAY`].
    pub async fn record_error(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_errors += 1;
        if state.consecutive_errors > ERROR_STREAK_THRESHOLD {
            let ceiling = MAX_DELAY.max(self.base_delay);
            state.delay = state.delay.mul_f64(BACKOFF_FACTOR).min(ceiling);
            tracing::debug!(
                delay_ms = %state.delay.as_millis(),
                errors = state.consecutive_errors,
                "Rate limiter backing off"
            );
        }
    }

    /// Reset the error streak and relax the delay toward the base.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_errors = 0;
        if state.delay > self.base_delay {
            state.delay = state.delay.mul_f64(RECOVERY_FACTOR).max(self.base_delay);
        }
    }

    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.delay
    }

    pub async fn consecutive_errors(&self) -> u32 {
        self.state.lock().await.consecutive_errors
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Limiter and concurrency cap for one source.
#[derive(Debug, Clone)]
pub struct SourceGate {
    pub limiter: RateLimiter,
    permits: Arc<Semaphore>,
}

impl SourceGate {
    pub fn new(limiter: RateLimiter, concurrency: usize) -> Self {
        Self {
            limiter,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

/// One [`SourceGate`] per [`SourceKind`].
#[derive(Debug, Clone, Default)]
pub struct SourceGates {
    gates: HashMap<SourceKind, SourceGate>,
}

impl SourceGates {
    pub fn from_config(config: &IngestConfig) -> Self {
        let gates = SourceKind::ALL
            .iter()
            .map(|kind| {
                let settings = config.source(*kind);
                (
                    *kind,
                    SourceGate::new(RateLimiter::per_second(settings.rate), settings.concurrency),
                )
            })
            .collect();
        Self { gates }
    }

    pub fn insert(&mut self, kind: SourceKind, gate: SourceGate) {
        self.gates.insert(kind, gate);
    }

    pub fn get(&self, kind: SourceKind) -> Option<&SourceGate> {
        self.gates.get(&kind)
    }
}

/// A [`SourceClient`] wrapper that enforces per-source pacing and caps.
#[derive(Clone)]
pub struct ThrottledSource<S> {
    inner: S,
    gates: SourceGates,
}

impl<S: SourceClient> ThrottledSource<S> {
    pub fn new(inner: S, gates: SourceGates) -> Self {
        Self { inner, gates }
    }

    pub fn gates(&self) -> &SourceGates {
        &self.gates
    }
}

impl<S: SourceClient> SourceClient for ThrottledSource<S> {
    async fn fetch(&self, target: &Target) -> Result<Vec<RawPosting>, AppError> {
        let Some(gate) = self.gates.get(target.source_kind) else {
            return self.inner.fetch(target).await;
        };

        let _permit = gate
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::Generic(format!("{} gate closed", target.source_kind)))?;
        gate.limiter.wait().await;

        match self.inner.fetch(target).await {
            Ok(postings) => {
                gate.limiter.record_success().await;
                Ok(postings)
            }
            Err(e) => {
                if e.is_backpressure() {
                    gate.limiter.record_error().await;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn greenhouse(board: &str) -> Target {
        Target::new(board, SourceKind::Greenhouse, board, 1)
    }

    #[tokio::test]
    async fn sequential_waits_respect_rate_bound() {
        let limiter = RateLimiter::per_second(20.0);
        let start = std::time::Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        // (N - 1) / R = 4 / 20
        assert!(
            start.elapsed() >= Duration::from_millis(200),
            "elapsed: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn concurrent_waits_are_spaced() {
        let limiter = RateLimiter::per_second(20.0).without_jitter();
        let start = std::time::Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.wait().await }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn first_wait_is_immediate() {
        let limiter = RateLimiter::per_second(0.5);
        let start = std::time::Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn backs_off_only_after_streak() {
        let limiter = RateLimiter::with_delay(Duration::from_millis(200));
        for _ in 0..ERROR_STREAK_THRESHOLD {
            limiter.record_error().await;
        }
        assert_eq!(limiter.current_delay().await, Duration::from_millis(200));

        limiter.record_error().await;
        assert_eq!(limiter.current_delay().await, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn backoff_is_capped() {
        let limiter = RateLimiter::with_delay(Duration::from_secs(4));
        for _ in 0..20 {
            limiter.record_error().await;
        }
        assert_eq!(limiter.current_delay().await, MAX_DELAY);
    }

    #[tokio::test]
    async fn recovery_never_drops_below_base() {
        let limiter = RateLimiter::with_delay(Duration::from_millis(200));
        for _ in 0..6 {
            limiter.record_error().await;
        }
        assert!(limiter.current_delay().await > Duration::from_millis(200));

        for _ in 0..50 {
            limiter.record_success().await;
        }
        assert_eq!(limiter.current_delay().await, Duration::from_millis(200));
        assert_eq!(limiter.consecutive_errors().await, 0);
    }

    #[tokio::test]
    async fn success_resets_streak() {
        let limiter = RateLimiter::with_delay(Duration::from_millis(200));
        for _ in 0..3 {
            limiter.record_error().await;
        }
        limiter.record_success().await;
        limiter.record_error().await;
        assert_eq!(limiter.consecutive_errors().await, 1);
        assert_eq!(limiter.current_delay().await, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn throttled_source_passes_through_results() {
        let inner = MockSource::new();
        inner.push_ok("stripe", vec![crate::testutil::make_posting("Stripe", "PM", "Remote")]);
        let source = ThrottledSource::new(inner, SourceGates::from_config(&IngestConfig::default()));

        let postings = source.fetch(&greenhouse("stripe")).await.unwrap();
        assert_eq!(postings.len(), 1);
    }

    #[tokio::test]
    async fn throttled_source_records_backpressure() {
        let inner = MockSource::new();
        for _ in 0..5 {
            inner.push_err("stripe", AppError::RateLimitExceeded);
        }
        let source = ThrottledSource::new(inner, SourceGates::from_config(&IngestConfig::default()));
        for _ in 0..5 {
            assert!(source.fetch(&greenhouse("stripe")).await.is_err());
        }

        let gate = source.gates().get(SourceKind::Greenhouse).unwrap();
        assert_eq!(gate.limiter.consecutive_errors().await, 5);
        assert!(gate.limiter.current_delay().await > gate.limiter.base_delay());
    }

    #[tokio::test]
    async fn non_backpressure_errors_do_not_slow_down() {
        let inner = MockSource::new();
        inner.push_err("bad", AppError::ParseError("not json".into()));
        let source = ThrottledSource::new(inner, SourceGates::from_config(&IngestConfig::default()));
        assert!(source.fetch(&greenhouse("bad")).await.is_err());

        let gate = source.gates().get(SourceKind::Greenhouse).unwrap();
        assert_eq!(gate.limiter.consecutive_errors().await, 0);
    }

    #[derive(Clone)]
    struct SlowSource {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl SourceClient for SlowSource {
        async fn fetch(&self, _target: &Target) -> Result<Vec<RawPosting>, AppError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn concurrency_cap_holds_across_targets() {
        let peak = Arc::new(AtomicUsize::new(0));
        let inner = SlowSource {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        };
        let mut gates = SourceGates::default();
        gates.insert(
            SourceKind::Greenhouse,
            SourceGate::new(RateLimiter::with_delay(Duration::ZERO), 2),
        );
        let source = ThrottledSource::new(inner, gates);

        let mut handles = Vec::new();
        for i in 0..8 {
            let s = source.clone();
            handles.push(tokio::spawn(async move {
                s.fetch(&greenhouse(&format!("board{i}"))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }
}
