use std::time::Duration;

use log::warn;

use crate::config::RetryConfig;
use crate::error::ProcessError;

/// Bounded retry with exponential backoff for external provider calls.
/// Exhausted retries surface as the last error; the engine turns that into
/// provider fallback rather than job failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    pub fn run<T>(
        &self,
        operation: &str,
        mut f: impl FnMut() -> Result<T, ProcessError>,
    ) -> Result<T, ProcessError> {
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} failed: {}",
                        operation, attempt, self.max_attempts, e
                    );
                    last_err = Some(e);
                    if attempt < self.max_attempts {
                        let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ProcessError::OcrFailed(format!("{operation}: no attempts executed"))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(0))
    }

    #[test]
    fn test_first_attempt_success() {
        let mut calls = 0;
        let result = policy(3).run("op", || {
            calls += 1;
            Ok::<_, ProcessError>(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retries_until_success() {
        let mut calls = 0;
        let result = policy(3).run("op", || {
            calls += 1;
            if calls < 3 {
                Err(ProcessError::OcrFailed("transient".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_exhausted_retries_return_last_error() {
        let mut calls = 0;
        let result: Result<(), _> = policy(2).run("op", || {
            calls += 1;
            Err(ProcessError::OcrFailed(format!("attempt {calls}")))
        });
        assert_eq!(calls, 2);
        match result {
            Err(ProcessError::OcrFailed(msg)) => assert_eq!(msg, "attempt 2"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let mut calls = 0;
        let _ = policy(0).run("op", || {
            calls += 1;
            Ok::<_, ProcessError>(())
        });
        assert_eq!(calls, 1);
    }
}
