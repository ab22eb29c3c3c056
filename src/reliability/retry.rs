use crate::errors::{BoxError, ErrorClassifier};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum RetryError {
    #[error("Retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("Giving up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: BoxError,
    },

    #[error("Not retryable: {source}")]
    NotRetryable {
        #[source]
        source: BoxError,
    },

    #[error("Invalid retry configuration: {0}")]
    InvalidConfig(String),
}

impl RetryError {
    /// The error of the final attempt, if one ran.
    pub fn last_error(&self) -> Option<&BoxError> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::NotRetryable { source } => Some(source),
            RetryError::Cancelled { .. } | RetryError::InvalidConfig(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    ExponentialBackoff,
    LinearBackoff,
    FixedDelay,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_millis = self.base_delay.as_millis() as u64;
        let delay = match self.strategy {
            RetryStrategy::ExponentialBackoff => {
                let multiplier = 2_u64.saturating_pow(attempt);
                Duration::from_millis(base_millis.saturating_mul(multiplier))
            }
            RetryStrategy::LinearBackoff => {
                Duration::from_millis(base_millis.saturating_mul(u64::from(attempt) + 1))
            }
            RetryStrategy::FixedDelay => self.base_delay,
        };

        let capped = delay.min(self.max_delay);

        if self.jitter {
            Self::apply_jitter(capped)
        } else {
            capped
        }
    }

    fn apply_jitter(delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let factor = rng.random_range(0.5..1.5); // ±50%
        Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
    }

    /// Runs `op` until it succeeds, fails with an error the classifier does
    /// not consider retryable, runs out of attempts, or `token` is cancelled.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        classifier: &ErrorClassifier,
        token: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            if token.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let err = tokio::select! {
                _ = token.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                result = op(attempt) => match result {
                    Ok(value) => return Ok(value),
                    Err(err) => err,
                },
            };

            let analysis = classifier.analyze(&*err, None);
            if !analysis.retryable {
                return Err(RetryError::NotRetryable { source: err });
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.calculate_delay(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                category = analysis.category.as_str(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient failure"
            );

            tokio::select! {
                _ = token.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApiError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            strategy: RetryStrategy::FixedDelay,
            jitter: false,
        }
    }

    #[test]
    fn test_exponential_backoff_timing() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: false,
        };
        let delays: Vec<_> = (0..5).map(|a| policy.calculate_delay(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1600),
            ]
        );
    }

    #[test]
    fn test_linear_and_cap() {
        let policy = RetryPolicy {
            strategy: RetryStrategy::LinearBackoff,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(5), Duration::from_millis(250));
        assert_eq!(
            RetryPolicy {
                strategy: RetryStrategy::ExponentialBackoff,
                ..policy
            }
            .calculate_delay(64),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(200),
            strategy: RetryStrategy::FixedDelay,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.calculate_delay(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast_policy(5)
            .run(&ErrorClassifier::new(), &CancellationToken::new(), move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err::<u32, BoxError>(ApiError::Transient.into())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(assert_ok!(result), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast_policy(5)
            .run(&ErrorClassifier::new(), &CancellationToken::new(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), BoxError>(ApiError::Unauthorized.into()) }
            })
            .await;
        assert!(matches!(assert_err!(result), RetryError::NotRetryable { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_keeps_last_error() {
        let result = fast_policy(2)
            .run(&ErrorClassifier::new(), &CancellationToken::new(), |attempt| async move {
                Err::<(), BoxError>(format!("connection reset on attempt {attempt}").into())
            })
            .await;
        let err = assert_err!(result);
        assert!(matches!(err, RetryError::Exhausted { attempts: 2, .. }));
        assert_eq!(
            err.last_error().unwrap().to_string(),
            "connection reset on attempt 2"
        );
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            strategy: RetryStrategy::FixedDelay,
            jitter: false,
        };

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = policy
            .run(&ErrorClassifier::new(), &token, |_| async {
                Err::<(), BoxError>(ApiError::Transient.into())
            })
            .await;
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_rejected() {
        let result = fast_policy(0)
            .run(&ErrorClassifier::new(), &CancellationToken::new(), |_| async {
                Ok::<(), BoxError>(())
            })
            .await;
        assert!(matches!(result, Err(RetryError::InvalidConfig(_))));
    }
}
