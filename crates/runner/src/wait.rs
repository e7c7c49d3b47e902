//! Retried assertion checks
//!
//! Page state changes asynchronously after navigation or interaction,
//! so assertion actions are not one-shot checks: the underlying query
//! is repeated against the driver until it holds or a bounded timeout
//! elapses.

use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::driver::PageDriver;
use crate::error::{RunnerError, RunnerResult};

/// Default assertion/wait timeout (5 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default poll interval (100 ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        )
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::with_timeout_ms(DEFAULT_TIMEOUT_MS)
    }
}

/// One retriable assertion condition against the current page.
#[derive(Debug, Clone, Copy)]
pub enum AssertCheck<'a> {
    Visible(&'a str),
    Hidden(&'a str),
    TextContains { selector: &'a str, text: &'a str },
    Value { selector: &'a str, value: &'a str },
    Url(&'a str),
}

impl std::fmt::Display for AssertCheck<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssertCheck::Visible(selector) => write!(f, "'{}' visible", selector),
            AssertCheck::Hidden(selector) => write!(f, "'{}' hidden", selector),
            AssertCheck::TextContains { selector, text } => {
                write!(f, "'{}' text contains '{}'", selector, text)
            }
            AssertCheck::Value { selector, value } => {
                write!(f, "'{}' has value '{}'", selector, value)
            }
            AssertCheck::Url(url) => write!(f, "page url is '{}'", url),
        }
    }
}

/// Polls `check` until it holds or the timeout elapses.
///
/// A check that does not hold yet, or that fails transiently (the
/// element may not be attached right after a navigation), keeps the
/// wait going; only the timeout surfaces as an error, carrying the
/// condition description.
pub async fn wait_for_assertion(
    driver: &mut dyn PageDriver,
    check: AssertCheck<'_>,
    config: WaitConfig,
) -> RunnerResult<()> {
    let start = Instant::now();

    loop {
        let holds = match check {
            AssertCheck::Visible(selector) => driver.is_visible(selector).await,
            AssertCheck::Hidden(selector) => driver.is_hidden(selector).await,
            AssertCheck::TextContains { selector, text } => driver
                .text_content(selector)
                .await
                .map(|content| content.contains(text)),
            AssertCheck::Value { selector, value } => driver
                .input_value(selector)
                .await
                .map(|current| current == value),
            AssertCheck::Url(url) => driver.current_url().await.map(|current| current == url),
        };

        if let Ok(true) = holds {
            return Ok(());
        }

        if start.elapsed() >= config.timeout {
            return Err(RunnerError::Timeout {
                condition: check.to_string(),
                timeout_ms: config.timeout.as_millis() as u64,
            });
        }

        sleep(config.poll_interval).await;
    }
}
