//! Bounded retry of a fallible action.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("max attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    /// Every attempt failed; only the last attempt's error is kept.
    #[error("gave up after {attempts} attempt(s): {source}")]
    Exhausted { attempts: u32, source: E },
}

impl<E> RetryError<E> {
    /// The last attempt's error, if any attempt ran.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::InvalidMaxAttempts(_) => None,
            RetryError::Exhausted { source, .. } => Some(source),
        }
    }
}

/// Invokes `action` until it succeeds or `max_attempts` invocations were made.
///
/// Returns the 1-based attempt number of the first success. Earlier failures
/// are discarded.
pub fn retry<E, F>(max_attempts: u32, mut action: F) -> Result<u32, RetryError<E>>
where
    F: FnMut() -> Result<(), E>,
{
    if max_attempts == 0 {
        return Err(RetryError::InvalidMaxAttempts(max_attempts));
    }

    let mut attempt = 1;
    loop {
        match action() {
            Ok(()) => return Ok(attempt),
            Err(source) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source,
                });
            }
            Err(_) => {
                debug!(attempt, max_attempts, "attempt failed, retrying");
                attempt += 1;
            }
        }
    }
}
