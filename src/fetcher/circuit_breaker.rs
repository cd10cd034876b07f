use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Circuit breaker state: Closed passes calls through, Open rejects them
/// until the reset timeout elapses, HalfOpen admits a bounded number of
/// probe calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    /// Gauge encoding: 0=closed, 1=open, 2=half-open.
    pub fn as_gauge(&self) -> i64 {
        match self {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    retry_count: u32,
    last_failure: Option<Instant>,
}

/// Per-source failure isolator. One instance per upstream source; all
/// transitions are serialized by the internal mutex, but the protected
/// call itself runs outside the lock.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_retries: u32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        reset_timeout: Duration,
        half_open_max_retries: u32,
    ) -> Self {
        CircuitBreaker {
            name: name.into(),
            failure_threshold,
            reset_timeout,
            half_open_max_retries,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                retry_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Run `f` under breaker protection. Returns `Error::CircuitOpen` when
    /// rejecting without invoking `f`; otherwise returns `f`'s own result.
    /// `f` is invoked at most once per call.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        {
            let mut inner = self.lock();

            if inner.state == BreakerState::Open {
                let cooled_down = inner
                    .last_failure
                    .is_some_and(|at| at.elapsed() >= self.reset_timeout);
                if cooled_down {
                    inner.state = BreakerState::HalfOpen;
                    inner.retry_count = 0;
                    tracing::info!("Circuit {} changed from Open to HalfOpen", self.name);
                } else {
                    return Err(Error::CircuitOpen(self.name.clone()));
                }
            }

            if inner.state == BreakerState::HalfOpen {
                inner.retry_count += 1;
                if inner.retry_count > self.half_open_max_retries {
                    inner.state = BreakerState::Open;
                    inner.last_failure = Some(Instant::now());
                    tracing::warn!(
                        "Circuit {} exceeded half-open retries, returning to Open",
                        self.name
                    );
                    return Err(Error::CircuitOpen(self.name.clone()));
                }
            }
        }

        let outcome = f().await;

        let mut inner = self.lock();
        match outcome {
            Err(err) => {
                inner.failure_count += 1;
                inner.last_failure = Some(Instant::now());

                if inner.state == BreakerState::HalfOpen
                    || inner.failure_count >= self.failure_threshold
                {
                    inner.state = BreakerState::Open;
                    tracing::warn!("Circuit {} opened due to failure: {}", self.name, err);
                }

                Err(err)
            }
            Ok(value) => {
                if inner.state == BreakerState::HalfOpen {
                    inner.state = BreakerState::Closed;
                    tracing::info!("Circuit {} closed after successful probe", self.name);
                }
                inner.failure_count = 0;
                Ok(value)
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // A poisoned lock only means a panic elsewhere; the state itself
        // is still a plain value, so keep going with it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
