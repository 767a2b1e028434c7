//! I/O helpers for the file store.

use std::io::ErrorKind;
use std::time::Duration;

use crate::error::FlexError;

/// Maps an I/O error to a persistence error, flagging retryable kinds.
pub fn classify_io_error(error: std::io::Error, context: &str) -> FlexError {
    let message = format!("{}: {}", context, error);
    match error.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            FlexError::TransientIoError(message)
        }
        _ => FlexError::IoError(message),
    }
}

/// Retry settings for store operations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Runs `operation`, retrying only transient I/O errors.
    pub fn run<T, F>(&self, context: &str, mut operation: F) -> Result<T, FlexError>
    where
        F: FnMut() -> Result<T, FlexError>,
    {
        let mut attempt = 0;
        loop {
            match operation() {
                Err(err @ FlexError::TransientIoError(_)) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Transient I/O error in {} (attempt {}/{}): {}",
                        context,
                        attempt,
                        self.max_retries,
                        err
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
                result => return result,
            }
        }
    }
}
