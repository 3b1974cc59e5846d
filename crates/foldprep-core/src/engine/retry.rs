use super::config::RetryConfig;
use super::error::EngineError;
use tracing::warn;

/// Run a network-dependent operation with bounded retries and linear
/// backoff. Only errors marked retryable are retried; the last error is
/// returned once attempts are exhausted.
pub fn with_retries<T>(
    retry: &RetryConfig,
    what: &str,
    mut op: impl FnMut() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let mut attempt: u32 = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                warn!(attempt, max = retry.max_attempts, "{what} failed: {e}; retrying");
                std::thread::sleep(retry.backoff() * attempt);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::ParseError;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            backoff_secs: 0,
        }
    }

    #[test]
    fn non_retryable_errors_surface_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = with_retries(&fast_retry(), "parse", || {
            calls += 1;
            Err(EngineError::Parse {
                source: ParseError::Empty,
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn succeeds_without_retry() {
        let result = with_retries(&fast_retry(), "noop", || Ok(7));
        assert_eq!(result.unwrap(), 7);
    }
}
