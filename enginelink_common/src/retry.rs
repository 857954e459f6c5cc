//! A retry strategy that works with rusts native [`std::error::Error`] type.
//!
//! Transient failures (network drops, timeouts) are worth a few more attempts;
//! everything else should surface immediately. Errors opt in through
//! [`RetryableError`].

use crate::time::Duration;

/// Specifies which errors are retryable.
/// All Errors are not retryable by-default.
pub trait RetryableError: std::error::Error {
    fn is_retryable(&self) -> bool;
}

/// Options to specify how to retry a function.
///
/// The pause before attempt `n` scales linearly: `delay * n`.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Retry {
    max_retries: usize,
    delay: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(1000),
        }
    }
}

impl Retry {
    /// Get the builder for [`Retry`]
    pub fn builder() -> RetryBuilder {
        RetryBuilder::default()
    }

    /// Get the number of retries this is configured with.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Get the duration to wait before the given attempt (1-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        self.delay * attempt as u32
    }
}

/// Builder for [`Retry`].
///
/// # Example
/// ```
/// use enginelink_common::retry::RetryBuilder;
///
/// RetryBuilder::default()
///     .max_retries(5)
///     .delay(std::time::Duration::from_millis(1000))
///     .build();
/// ```
#[derive(Default, PartialEq, Eq, Copy, Clone)]
pub struct RetryBuilder {
    max_retries: Option<usize>,
    delay: Option<Duration>,
}

impl RetryBuilder {
    /// Specify the number of retries to allow
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Specify the base duration to wait before retrying again
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Build the Retry Strategy
    pub fn build(self) -> Retry {
        let mut retry = Retry::default();

        if let Some(max_retries) = self.max_retries {
            retry.max_retries = max_retries;
        }

        if let Some(delay) = self.delay {
            retry.delay = delay;
        }

        retry
    }
}

/// Retry a fallible async block, specifying the strategy with `$retry`.
///
/// Only errors whose [`RetryableError::is_retryable`] holds are attempted
/// again; attempts are bounded by `max_retries`, so the loop never spins
/// forever.
///
/// # Example
/// ```
/// use enginelink_common::{retry_async, retry::{RetryableError, Retry}};
/// use thiserror::Error;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Debug, Error)]
/// enum MyError {
///     #[error("A retryable error")]
///     Retryable,
///     #[error("An error we don't want to retry")]
///     NotRetryable,
/// }
///
/// impl RetryableError for MyError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, Self::Retryable)
///     }
/// }
///
/// async fn fallable_fn(attempts: &AtomicUsize) -> Result<(), MyError> {
///     if attempts.fetch_add(1, Ordering::SeqCst) == 2 {
///         return Ok(());
///     }
///     Err(MyError::Retryable)
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), MyError> {
///     let attempts = AtomicUsize::new(0);
///     retry_async!(Retry::default(), (async {
///         fallable_fn(&attempts).await
///     }))
/// }
/// ```
#[macro_export]
macro_rules! retry_async {
    ($retry: expr, $code: tt) => {{
        #[allow(unused)]
        use $crate::retry::RetryableError;
        let retry = $retry;
        let mut attempts = 0;
        loop {
            #[allow(clippy::redundant_closure_call)]
            let res = $code.await;
            match res {
                Ok(v) => break Ok(v),
                Err(e) => {
                    if (&e).is_retryable() && attempts < retry.max_retries() {
                        attempts += 1;
                        tracing::info!(
                            "retrying function that failed with error=`{}`",
                            e.to_string()
                        );
                        $crate::time::sleep(retry.delay(attempts)).await;
                    } else {
                        break Err(e);
                    }
                }
            }
        }
    }};
}

#[macro_export]
macro_rules! retryable {
    ($error: ident) => {{
        #[allow(unused)]
        use $crate::retry::RetryableError;
        $error.is_retryable()
    }};
    ($error: expr) => {{
        use $crate::retry::RetryableError;
        $error.is_retryable()
    }};
}
