use std::time::Duration;

use libvimbridge_core::config::RpcConfig;
use tracing::debug;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RpcConfig) -> Self {
        Self {
            attempts: config.connect_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// A single attempt, no waiting
    pub fn once() -> Self {
        Self {
            attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after the failed attempt number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. Returns the last error and the number of attempts.
    pub fn run<T, E, F, R>(&self, mut op: F, retryable: R) -> Result<T, (E, u32)>
    where
        F: FnMut(u32) -> Result<T, E>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts || !retryable(&e) {
                        return Err((e, attempt));
                    }
                    let delay = self.delay(attempt - 1);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying");
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let p = policy(5);
        assert_eq!(p.delay(0), Duration::from_millis(1));
        assert_eq!(p.delay(1), Duration::from_millis(2));
        assert_eq!(p.delay(2), Duration::from_millis(4));
        assert_eq!(p.delay(3), Duration::from_millis(4));
        assert_eq!(p.delay(40), Duration::from_millis(4));
    }

    #[test]
    fn test_run_retries_until_success() {
        let result: Result<u32, (String, u32)> = policy(5).run(
            |attempt| if attempt < 2 { Err("refused".to_string()) } else { Ok(attempt) },
            |_| true,
        );
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn test_run_gives_up() {
        let mut calls = 0;
        let result: Result<(), (String, u32)> = policy(3).run(
            |_| {
                calls += 1;
                Err("refused".to_string())
            },
            |_| true,
        );
        assert_eq!(result, Err(("refused".to_string(), 3)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_non_retryable_stops_early() {
        let result: Result<(), (String, u32)> =
            policy(3).run(|_| Err("fatal".to_string()), |e| e != "fatal");
        assert_eq!(result, Err(("fatal".to_string(), 1)));
    }
}
