//! Circuit breaker for the synthesis service.
//!
//! The breaker tracks the last `window_size` call outcomes. Once at least
//! `min_calls` outcomes are recorded and the failure rate crosses the
//! threshold, it opens and rejects calls without touching the service. After
//! the cooldown a single trial call is let through:
//!
//! ```text
//!   CLOSED ──failure rate ≥ threshold──▶ OPEN
//!     ▲                                   │ cooldown elapsed
//!     │ trial ok                          ▼
//!     └──────────────────────────────  HALF_OPEN ──trial failed──▶ OPEN (cooldown × 2)
//! ```
//!
//! All state lives behind one mutex and every transition happens inside a
//! single critical section, so concurrent callers never observe a torn state.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error("{0}")]
    Inner(E),
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub total_calls: u64,
    pub total_failures: u64,
    pub rejected_calls: u64,
    pub times_opened: u64,
    /// Failure rate over the current window
    pub window_failure_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    /// `true` marks a failure
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    cooldown: Duration,
    trial_in_flight: bool,
    total_calls: u64,
    total_failures: u64,
    rejected_calls: u64,
    times_opened: u64,
}

impl BreakerInner {
    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().filter(|failed| **failed).count() as f64 / self.window.len() as f64
    }

    fn open(&mut self, now: Instant) {
        self.state = BreakerState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
        self.times_opened += 1;
    }
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let inner = BreakerInner {
            state: BreakerState::Closed,
            window: VecDeque::with_capacity(config.window_size),
            opened_at: None,
            cooldown: config.cooldown,
            trial_in_flight: false,
            total_calls: 0,
            total_failures: 0,
            rejected_calls: 0,
            times_opened: 0,
        };
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock();
        BreakerStats {
            state: inner.state,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            rejected_calls: inner.rejected_calls,
            times_opened: inner.times_opened,
            window_failure_rate: inner.failure_rate(),
        }
    }

    /// Force the breaker back to CLOSED with an empty window
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.window.clear();
        inner.opened_at = None;
        inner.cooldown = self.config.cooldown;
        inner.trial_in_flight = false;
        info!(breaker = %self.name, "Circuit breaker reset");
    }

    /// Run `operation` if the breaker admits it. Every `Err` returned by the
    /// operation counts as a failure.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.try_acquire().ok_or(BreakerError::Open)?;
        let mut guard = CallGuard {
            breaker: self,
            admission,
            finished: false,
        };

        let result = operation().await;
        guard.finished = true;
        self.record(admission, result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    fn try_acquire(&self) -> Option<Admission> {
        let mut inner = self.lock();
        let admission = match inner.state {
            BreakerState::Closed => Some(Admission::Normal),
            BreakerState::Open => {
                let cooled = inner
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= inner.cooldown);
                if cooled {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(breaker = %self.name, "Circuit breaker half-open, admitting trial call");
                    Some(Admission::Trial)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(Admission::Trial)
                }
            }
        };

        match admission {
            Some(_) => inner.total_calls += 1,
            None => inner.rejected_calls += 1,
        }
        admission
    }

    fn record(&self, admission: Admission, success: bool) {
        let mut inner = self.lock();
        if !success {
            inner.total_failures += 1;
        }

        match admission {
            Admission::Trial => {
                inner.trial_in_flight = false;
                if success {
                    inner.state = BreakerState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                    inner.cooldown = self.config.cooldown;
                    info!(breaker = %self.name, "Trial call succeeded, circuit closed");
                } else {
                    inner.cooldown = (inner.cooldown * 2).min(self.config.max_cooldown);
                    inner.open(Instant::now());
                    warn!(
                        breaker = %self.name,
                        cooldown_secs = inner.cooldown.as_secs(),
                        "Trial call failed, circuit re-opened"
                    );
                }
            }
            Admission::Normal => {
                // Outcomes of calls admitted before a trip do not feed the next window
                if inner.state != BreakerState::Closed {
                    return;
                }
                inner.window.push_back(!success);
                while inner.window.len() > self.config.window_size.max(1) {
                    inner.window.pop_front();
                }

                let rate = inner.failure_rate();
                if inner.window.len() >= self.config.min_calls && rate >= self.config.failure_rate_threshold {
                    inner.open(Instant::now());
                    warn!(
                        breaker = %self.name,
                        failure_rate = rate,
                        window = inner.window.len(),
                        "Failure rate exceeded threshold, circuit opened"
                    );
                }
            }
        }
    }
}

/// Releases a half-open trial slot if the call future is dropped mid-flight
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    finished: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished && self.admission == Admission::Trial {
            self.breaker.record(Admission::Trial, false);
        }
    }
}
