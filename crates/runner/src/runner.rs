//! Action test runner
//!
//! Executes each test's steps in order against a freshly created
//! browsing context, short-circuiting a test on the first failing step
//! and always releasing the context. A failing step never aborts the
//! suite; every test produces a verdict and, on failure, an error
//! screenshot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::driver::{DriverFactory, PageDriver};
use crate::error::{RunnerError, RunnerResult};
use crate::spec::{Action, Step, Test};
use crate::wait::{wait_for_assertion, AssertCheck, WaitConfig, DEFAULT_TIMEOUT_MS};

/// Result of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    /// Explicit screenshots plus the error screenshot, in capture order
    pub screenshots: Vec<PathBuf>,
    pub error: Option<String>,
}

impl TestResult {
    fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            duration_ms: 0,
            steps: vec![],
            screenshots: vec![],
            error: Some(error),
        }
    }
}

/// Result of a whole run. `passed + failed` always equals `total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub results: Vec<TestResult>,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration threaded into the runner at construction.
///
/// Output paths and the base URL are explicit here rather than read
/// from process-wide state.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Base URL that relative step URLs resolve against
    pub base_url: String,

    /// Directory screenshots are written to
    pub screenshot_dir: PathBuf,

    /// Timeout for assertions and stateful waits
    pub timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            screenshot_dir: PathBuf::from("test_screenshots"),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Runs tests sequentially against drivers from a [`DriverFactory`].
pub struct TestRunner<F: DriverFactory> {
    config: RunnerConfig,
    factory: F,
}

impl<F: DriverFactory> TestRunner<F> {
    pub fn new(config: RunnerConfig, factory: F) -> Self {
        Self { config, factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Runs every test in sequence order and tallies pass/fail.
    ///
    /// Each test gets a fresh driver sized to its viewport; the driver
    /// is closed on every exit path. A driver that cannot be created
    /// fails that test and the suite moves on.
    pub async fn run_suite(&self, tests: &[Test]) -> RunnerResult<SuiteResult> {
        std::fs::create_dir_all(&self.config.screenshot_dir)?;

        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(tests.len());
        let mut passed = 0;
        let mut failed = 0;

        for test in tests {
            println!("\nRunning: {}", test.name);

            let result = match self.factory.create(test.viewport).await {
                Ok(mut driver) => {
                    let result = self.run_test(test, driver.as_mut()).await;
                    if let Err(e) = driver.close().await {
                        warn!("failed to close driver for '{}': {}", test.name, e);
                    }
                    result
                }
                Err(e) => {
                    println!("  FAILED: {}", e);
                    TestResult::failed(&test.name, e.to_string())
                }
            };

            if result.passed {
                passed += 1;
            } else {
                failed += 1;
            }
            results.push(result);
        }

        println!("\nResults: {} passed, {} failed", passed, failed);

        Ok(SuiteResult {
            total: tests.len(),
            passed,
            failed,
            duration_ms: start.elapsed().as_millis() as u64,
            started_at,
            results,
        })
    }

    /// Executes one test's steps in order against `driver`.
    ///
    /// Step i+1 starts only after step i completed without error. The
    /// first failing step marks the test failed, captures an error
    /// screenshot, and skips the remaining steps; the failure is not
    /// retried.
    pub async fn run_test(&self, test: &Test, driver: &mut dyn PageDriver) -> TestResult {
        let start = Instant::now();
        let mut steps = Vec::new();
        let mut screenshots = Vec::new();
        let mut test_error: Option<String> = None;

        for (index, step) in test.steps.iter().enumerate() {
            println!("  Step {}: {}", index + 1, step.kind());
            let step_start = Instant::now();

            let outcome = match step {
                Step::Action(action) => self.run_action(driver, action).await,
                Step::Malformed { kind, reason } => Err(RunnerError::MalformedAction {
                    kind: kind.clone(),
                    reason: reason.clone(),
                }),
            };

            let duration_ms = step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(screenshot_path) => {
                    if let Some(path) = &screenshot_path {
                        screenshots.push(path.clone());
                    }
                    steps.push(StepResult {
                        step: step.kind().to_string(),
                        success: true,
                        duration_ms,
                        error: None,
                        screenshot_path,
                    });
                }
                Err(e) => {
                    println!("  FAILED: {}", e);

                    let error_shot = self.capture_error_screenshot(driver, &test.name, index + 1).await;
                    if let Some(path) = &error_shot {
                        println!("  Error screenshot: {}", path.display());
                        screenshots.push(path.clone());
                    }

                    steps.push(StepResult {
                        step: step.kind().to_string(),
                        success: false,
                        duration_ms,
                        error: Some(e.to_string()),
                        screenshot_path: error_shot,
                    });
                    test_error = Some(e.to_string());
                    break;
                }
            }
        }

        let passed = test_error.is_none();
        if passed {
            println!("  PASSED");
        }

        TestResult {
            name: test.name.clone(),
            passed,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            screenshots,
            error: test_error,
        }
    }

    /// Dispatches one action to one driver operation.
    ///
    /// Returns the screenshot path for `screenshot` actions, `None`
    /// otherwise.
    pub async fn run_action(
        &self,
        driver: &mut dyn PageDriver,
        action: &Action,
    ) -> RunnerResult<Option<PathBuf>> {
        let wait = WaitConfig::with_timeout_ms(self.config.timeout_ms);
        debug!("dispatching action: {}", action.kind());

        match action {
            Action::Goto { url } => {
                driver.goto(&resolve_url(&self.config.base_url, url)).await?;
            }
            Action::Click { selector } => driver.click(selector).await?,
            Action::Fill { selector, value } => driver.fill(selector, value).await?,
            Action::Type { selector, value } => driver.type_text(selector, value).await?,
            Action::Press { key } => driver.press(key).await?,
            Action::Screenshot { name } => {
                let path = self.config.screenshot_dir.join(format!("{}.png", name));
                driver.screenshot(&path).await?;
                println!("  Screenshot saved: {}", path.display());
                return Ok(Some(path));
            }
            Action::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Action::WaitForSelector { selector, state } => {
                driver
                    .wait_for_selector(selector, *state, self.config.timeout_ms)
                    .await?;
            }
            Action::WaitForUrl { url } => {
                let url = resolve_url(&self.config.base_url, url);
                driver.wait_for_url(&url, self.config.timeout_ms).await?;
            }
            Action::AssertVisible { selector } => {
                wait_for_assertion(driver, AssertCheck::Visible(selector), wait).await?;
            }
            Action::AssertHidden { selector } => {
                wait_for_assertion(driver, AssertCheck::Hidden(selector), wait).await?;
            }
            Action::AssertText { selector, text } => {
                wait_for_assertion(driver, AssertCheck::TextContains { selector, text }, wait)
                    .await?;
            }
            Action::AssertValue { selector, value } => {
                wait_for_assertion(driver, AssertCheck::Value { selector, value }, wait).await?;
            }
            Action::AssertUrl { url } => {
                let url = resolve_url(&self.config.base_url, url);
                wait_for_assertion(driver, AssertCheck::Url(&url), wait).await?;
            }
            Action::Hover { selector } => driver.hover(selector).await?,
            Action::Select { selector, value } => driver.select(selector, value).await?,
            Action::Check { selector } => driver.check(selector).await?,
            Action::Uncheck { selector } => driver.uncheck(selector).await?,
        }

        Ok(None)
    }

    /// Best-effort screenshot after a failed step, keyed by test name
    /// and 1-based step index so fast sequential runs cannot collide.
    async fn capture_error_screenshot(
        &self,
        driver: &mut dyn PageDriver,
        test_name: &str,
        step_number: usize,
    ) -> Option<PathBuf> {
        let path = self
            .config
            .screenshot_dir
            .join(error_screenshot_name(test_name, step_number));

        match driver.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("error screenshot failed for '{}': {}", test_name, e);
                None
            }
        }
    }

    /// Writes the suite result as pretty JSON.
    pub fn write_results(&self, results: &SuiteResult, path: &Path) -> RunnerResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Resolves a step URL against the base URL.
///
/// URLs beginning with `/` are concatenated with the base URL, whose
/// trailing slash is stripped first; anything else passes through.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}

/// Filename for the error screenshot of a failed step.
pub fn error_screenshot_name(test_name: &str, step_number: usize) -> String {
    let sanitized: String = test_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("error_{}_step{}.png", sanitized, step_number)
}
