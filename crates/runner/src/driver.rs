//! Page driver seam
//!
//! The runner consumes browser automation through this narrow trait
//! pair. The shipped implementation is the Playwright sidecar in
//! [`crate::playwright`]; tests substitute a scripted driver.

use async_trait::async_trait;
use std::path::Path;

use crate::error::RunnerResult;
use crate::spec::{Viewport, WaitState};

/// One isolated browsing context with a single page.
///
/// Stateful waits (`wait_for_selector`, `wait_for_url`) block until the
/// condition holds or the driver's own timeout fires. The query methods
/// (`is_visible`, `text_content`, ...) are one-shot: the runner wraps
/// them in its own retry loop for assertions.
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> RunnerResult<()>;
    async fn click(&mut self, selector: &str) -> RunnerResult<()>;
    async fn fill(&mut self, selector: &str, value: &str) -> RunnerResult<()>;
    async fn type_text(&mut self, selector: &str, value: &str) -> RunnerResult<()>;
    async fn press(&mut self, key: &str) -> RunnerResult<()>;
    async fn hover(&mut self, selector: &str) -> RunnerResult<()>;
    async fn select(&mut self, selector: &str, value: &str) -> RunnerResult<()>;
    async fn check(&mut self, selector: &str) -> RunnerResult<()>;
    async fn uncheck(&mut self, selector: &str) -> RunnerResult<()>;

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout_ms: u64,
    ) -> RunnerResult<()>;

    async fn wait_for_url(&mut self, url: &str, timeout_ms: u64) -> RunnerResult<()>;

    /// Writes a PNG screenshot of the current page to `path`.
    ///
    /// Must succeed even before any navigation (a blank page is a
    /// valid subject).
    async fn screenshot(&mut self, path: &Path) -> RunnerResult<()>;

    async fn is_visible(&mut self, selector: &str) -> RunnerResult<bool>;
    async fn is_hidden(&mut self, selector: &str) -> RunnerResult<bool>;
    async fn text_content(&mut self, selector: &str) -> RunnerResult<String>;
    async fn input_value(&mut self, selector: &str) -> RunnerResult<String>;
    async fn current_url(&mut self) -> RunnerResult<String>;

    /// Releases the browsing context. Called on every exit path.
    async fn close(&mut self) -> RunnerResult<()>;
}

/// Creates one fresh driver per test. Tests never share browser state.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self, viewport: Option<Viewport>) -> RunnerResult<Box<dyn PageDriver>>;
}
