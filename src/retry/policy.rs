use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::sleeper::{Sleeper, TokioSleeper};
use crate::config::{ExhaustedPolicy, RetryConfig};
use crate::error::{ApiError, DiscussError};
use crate::signal::SignalHandler;

/// Emitted once per streak when consecutive transient failures reach `max_attempts`.
#[derive(Debug, Clone)]
pub struct DegradedNotice {
    pub operation: String,
    pub attempts: u32,
    pub last_error: String,
    pub next_delay: Duration,
}

pub type DegradedHook = Arc<dyn Fn(&DegradedNotice) + Send + Sync>;

/// Per-operation backoff bookkeeping. Reset after every successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub next_delay: Duration,
    pub degraded: bool,
}

impl RetryState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug)]
pub enum RetryError {
    Permanent(ApiError),
    Exhausted {
        operation: String,
        attempts: u32,
        last: ApiError,
    },
    /// Cancellation observed while backing off; the failed attempt is not retried.
    Cancelled { last: ApiError },
}

impl From<RetryError> for DiscussError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Permanent(e) => DiscussError::PermanentApi(e),
            RetryError::Exhausted {
                operation,
                attempts,
                last,
            } => DiscussError::RetriesExhausted {
                operation,
                attempts,
                last,
            },
            RetryError::Cancelled { .. } => DiscussError::Cancelled,
        }
    }
}

#[derive(Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    on_exhausted: ExhaustedPolicy,
    sleeper: Arc<dyn Sleeper>,
    signal: SignalHandler,
    degraded_hook: Option<DegradedHook>,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
            on_exhausted: ExhaustedPolicy::Persist,
            sleeper: Arc::new(TokioSleeper),
            signal: SignalHandler::new(),
            degraded_hook: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_secs(config.base_delay_secs),
            Duration::from_secs(config.max_delay_secs),
            config.max_attempts,
        )
        .with_exhausted_policy(config.on_exhausted)
    }

    pub fn with_exhausted_policy(mut self, policy: ExhaustedPolicy) -> Self {
        self.on_exhausted = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_signal(mut self, signal: SignalHandler) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_degraded_hook(mut self, hook: DegradedHook) -> Self {
        self.degraded_hook = Some(hook);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the retry following the `attempt`-th consecutive failure (1-based):
    /// `min(base * 2^(attempt-1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, is cancelled, or (with
    /// `ExhaustedPolicy::Abort`) hits `max_attempts` transient failures in a row.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        state: &mut RetryState,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        loop {
            let err = match op().await {
                Ok(value) => {
                    if state.degraded {
                        info!(operation, "Connectivity restored");
                    }
                    state.reset();
                    return Ok(value);
                }
                Err(e) if e.is_permanent() => {
                    debug!(operation, error = %e, "Permanent failure, not retrying");
                    return Err(RetryError::Permanent(e));
                }
                Err(e) => e,
            };

            state.attempt += 1;
            let backoff = self.delay_for(state.attempt);
            let delay = err
                .retry_after()
                .map_or(backoff, |requested| requested.max(backoff))
                .min(self.max_delay);
            state.next_delay = delay;

            if state.attempt >= self.max_attempts && !state.degraded {
                state.degraded = true;
                warn!(
                    operation,
                    attempts = state.attempt,
                    error = %err,
                    "Degraded connectivity: remote thread service keeps failing"
                );

                if let Some(hook) = &self.degraded_hook {
                    hook(&DegradedNotice {
                        operation: operation.to_string(),
                        attempts: state.attempt,
                        last_error: err.to_string(),
                        next_delay: delay,
                    });
                }

                if self.on_exhausted == ExhaustedPolicy::Abort {
                    return Err(RetryError::Exhausted {
                        operation: operation.to_string(),
                        attempts: state.attempt,
                        last: err,
                    });
                }
            }

            warn!(
                operation,
                attempt = state.attempt,
                delay_secs = delay.as_secs(),
                error = %err,
                "Transient failure, backing off"
            );

            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                _ = self.signal.cancelled() => {
                    info!(operation, "Cancelled during backoff");
                    return Err(RetryError::Cancelled { last: err });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::retry::RecordingSleeper;

    fn unavailable() -> ApiError {
        ApiError::Unavailable("HTTP 503".into())
    }

    fn policy_with(sleeper: Arc<RecordingSleeper>) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(30), Duration::from_secs(300), 5).with_sleeper(sleeper)
    }

    #[test]
    fn test_delay_sequence_caps_at_max() {
        let policy = RetryPolicy::new(Duration::from_secs(30), Duration::from_secs(300), 5);
        let secs: Vec<u64> = (1..=7).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(secs, vec![30, 60, 120, 240, 300, 300, 300]);
        assert_eq!(policy.delay_for(100).as_secs(), 300);
    }

    #[tokio::test]
    async fn test_five_transient_failures_wait_exact_sequence() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = policy_with(sleeper.clone());
        let calls = AtomicU32::new(0);
        let mut state = RetryState::default();

        let result = policy
            .run("list", &mut state, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 5 { Err(unavailable()) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.unwrap(), 5);
        assert_eq!(sleeper.wait_secs(), vec![30, 60, 120, 240, 300]);
        assert_eq!(state, RetryState::default());
    }

    #[tokio::test]
    async fn test_permanent_error_returns_without_waiting() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = policy_with(sleeper.clone());
        let mut state = RetryState::default();

        let result: Result<(), _> = policy
            .run("get", &mut state, || async {
                Err(ApiError::Unauthorized("HTTP 401".into()))
            })
            .await;

        assert!(matches!(result, Err(RetryError::Permanent(ApiError::Unauthorized(_)))));
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_persist_keeps_retrying_and_signals_degraded_once() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let notices = Arc::new(AtomicU32::new(0));
        let seen = notices.clone();
        let policy = policy_with(sleeper.clone()).with_degraded_hook(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let calls = AtomicU32::new(0);
        let mut state = RetryState::default();

        let result = policy
            .run("post", &mut state, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 8 { Err(unavailable()) } else { Ok(()) } }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(notices.load(Ordering::SeqCst), 1);
        assert_eq!(
            sleeper.wait_secs(),
            vec![30, 60, 120, 240, 300, 300, 300, 300]
        );
    }

    #[tokio::test]
    async fn test_abort_policy_surfaces_exhaustion() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = policy_with(sleeper.clone()).with_exhausted_policy(ExhaustedPolicy::Abort);
        let mut state = RetryState::default();

        let result: Result<(), _> = policy
            .run("list", &mut state, || async { Err(unavailable()) })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(sleeper.wait_secs(), vec![30, 60, 120, 240]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let signal = SignalHandler::new();
        let policy = RetryPolicy::new(Duration::from_secs(30), Duration::from_secs(300), 5)
            .with_signal(signal.clone());
        let mut state = RetryState::default();

        let canceller = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = policy
            .run("list", &mut state, || async { Err(unavailable()) })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { .. })));
        assert_eq!(state.attempt, 1);
    }
}
