//! Playwright sidecar driver
//!
//! Drives Playwright through a long-lived Node.js process. The driver
//! script is embedded in the binary and written to a temp directory at
//! spawn time; every [`PageDriver`] call becomes one JSON command line
//! on the child's stdin and one JSON response line on its stdout. One
//! sidecar owns exactly one browser context and one page, so each test
//! gets a fresh process and no state leaks between tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::driver::{DriverFactory, PageDriver};
use crate::error::{RunnerError, RunnerResult};
use crate::spec::{Viewport, WaitState};

/// Browser engine the sidecar launches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Chromium => "chromium",
            Engine::Firefox => "firefox",
            Engine::Webkit => "webkit",
        }
    }

    /// Parses an engine name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "chromium" => Some(Engine::Chromium),
            "firefox" => Some(Engine::Firefox),
            "webkit" => Some(Engine::Webkit),
            _ => None,
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the Playwright sidecar.
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub engine: Engine,
    pub headless: bool,

    /// Upper bound on a single command round-trip. Wait commands get
    /// their own JS-side timeout plus slack on top of this.
    pub command_timeout: Duration,

    /// Node executable to run the sidecar with.
    pub node_binary: String,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Chromium,
            headless: true,
            command_timeout: Duration::from_secs(30),
            node_binary: "node".to_string(),
        }
    }
}

/// Checks that Playwright is installed and reachable via npx.
pub fn check_playwright_installed() -> RunnerResult<()> {
    let status = std::process::Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(RunnerError::PlaywrightNotFound),
    }
}

/// Wire command sent to the sidecar, one JSON object per line.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum SidecarCommand<'a> {
    Goto { url: &'a str },
    Click { selector: &'a str },
    Fill { selector: &'a str, value: &'a str },
    Type { selector: &'a str, value: &'a str },
    Press { key: &'a str },
    Hover { selector: &'a str },
    Select { selector: &'a str, value: &'a str },
    Check { selector: &'a str },
    Uncheck { selector: &'a str },
    WaitForSelector {
        selector: &'a str,
        state: &'a str,
        timeout_ms: u64,
    },
    WaitForUrl { url: &'a str, timeout_ms: u64 },
    Screenshot { path: &'a str },
    IsVisible { selector: &'a str },
    IsHidden { selector: &'a str },
    TextContent { selector: &'a str },
    InputValue { selector: &'a str },
    CurrentUrl,
    Close,
}

/// Wire response from the sidecar.
#[derive(Debug, Deserialize)]
struct SidecarResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct SidecarOptions<'a> {
    engine: &'a str,
    headless: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewport: Option<Viewport>,
}

/// A running sidecar process holding one page.
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    command_timeout: Duration,
    closed: bool,
    // Holds the driver script on disk for the child's lifetime
    _script_dir: tempfile::TempDir,
}

impl PlaywrightDriver {
    /// Spawns the sidecar and waits for its ready line.
    pub async fn spawn(
        config: &PlaywrightConfig,
        viewport: Option<Viewport>,
    ) -> RunnerResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_JS)?;

        let options = serde_json::to_string(&SidecarOptions {
            engine: config.engine.as_str(),
            headless: config.headless,
            viewport,
        })?;

        debug!("Spawning Playwright sidecar: {} {:?}", config.engine, viewport);

        let mut child = Command::new(&config.node_binary)
            .arg(&script_path)
            .arg(&options)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RunnerError::DriverStartup(format!("failed to spawn {}: {}", config.node_binary, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RunnerError::DriverStartup("sidecar stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::DriverStartup("sidecar stdout unavailable".to_string()))?;

        let mut driver = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            command_timeout: config.command_timeout,
            closed: false,
            _script_dir: script_dir,
        };

        // Browser launch is the slow part; give it the full budget
        let ready = driver.read_response(config.command_timeout, "launch").await?;
        if !ready.ok {
            let reason = ready.error.unwrap_or_else(|| "unknown launch error".to_string());
            return Err(RunnerError::DriverStartup(reason));
        }

        Ok(driver)
    }

    async fn read_response(
        &mut self,
        budget: Duration,
        command: &str,
    ) -> RunnerResult<SidecarResponse> {
        let line = timeout(budget, self.lines.next_line())
            .await
            .map_err(|_| RunnerError::DriverTimeout {
                command: command.to_string(),
                timeout_ms: budget.as_millis() as u64,
            })?
            .map_err(RunnerError::Io)?
            .ok_or_else(|| {
                RunnerError::DriverProtocol("sidecar exited unexpectedly".to_string())
            })?;

        serde_json::from_str(&line)
            .map_err(|e| RunnerError::DriverProtocol(format!("bad response line {:?}: {}", line, e)))
    }

    async fn request(&mut self, command: SidecarCommand<'_>) -> RunnerResult<Option<serde_json::Value>> {
        self.request_with_budget(command, self.command_timeout).await
    }

    async fn request_with_budget(
        &mut self,
        command: SidecarCommand<'_>,
        budget: Duration,
    ) -> RunnerResult<Option<serde_json::Value>> {
        let mut line = serde_json::to_string(&command)?;
        line.push('\n');

        debug!("sidecar <- {}", line.trim_end());
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let name = command_name(&command);
        let response = self.read_response(budget, name).await?;
        debug!("sidecar -> ok={} value={:?}", response.ok, response.value);

        if response.ok {
            Ok(response.value)
        } else {
            Err(RunnerError::Driver(
                response.error.unwrap_or_else(|| format!("{} failed", name)),
            ))
        }
    }

    /// Budget for commands that carry their own JS-side timeout.
    fn wait_budget(&self, timeout_ms: u64) -> Duration {
        self.command_timeout
            .max(Duration::from_millis(timeout_ms) + Duration::from_secs(5))
    }

    fn expect_bool(value: Option<serde_json::Value>) -> RunnerResult<bool> {
        value
            .and_then(|v| v.as_bool())
            .ok_or_else(|| RunnerError::DriverProtocol("expected boolean value".to_string()))
    }

    fn expect_string(value: Option<serde_json::Value>) -> RunnerResult<String> {
        value
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| RunnerError::DriverProtocol("expected string value".to_string()))
    }
}

fn command_name(command: &SidecarCommand<'_>) -> &'static str {
    match command {
        SidecarCommand::Goto { .. } => "goto",
        SidecarCommand::Click { .. } => "click",
        SidecarCommand::Fill { .. } => "fill",
        SidecarCommand::Type { .. } => "type",
        SidecarCommand::Press { .. } => "press",
        SidecarCommand::Hover { .. } => "hover",
        SidecarCommand::Select { .. } => "select",
        SidecarCommand::Check { .. } => "check",
        SidecarCommand::Uncheck { .. } => "uncheck",
        SidecarCommand::WaitForSelector { .. } => "wait_for_selector",
        SidecarCommand::WaitForUrl { .. } => "wait_for_url",
        SidecarCommand::Screenshot { .. } => "screenshot",
        SidecarCommand::IsVisible { .. } => "is_visible",
        SidecarCommand::IsHidden { .. } => "is_hidden",
        SidecarCommand::TextContent { .. } => "text_content",
        SidecarCommand::InputValue { .. } => "input_value",
        SidecarCommand::CurrentUrl => "current_url",
        SidecarCommand::Close => "close",
    }
}

#[async_trait]
impl PageDriver for PlaywrightDriver {
    async fn goto(&mut self, url: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Goto { url }).await.map(|_| ())
    }

    async fn click(&mut self, selector: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Click { selector }).await.map(|_| ())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Fill { selector, value }).await.map(|_| ())
    }

    async fn type_text(&mut self, selector: &str, value: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Type { selector, value }).await.map(|_| ())
    }

    async fn press(&mut self, key: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Press { key }).await.map(|_| ())
    }

    async fn hover(&mut self, selector: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Hover { selector }).await.map(|_| ())
    }

    async fn select(&mut self, selector: &str, value: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Select { selector, value }).await.map(|_| ())
    }

    async fn check(&mut self, selector: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Check { selector }).await.map(|_| ())
    }

    async fn uncheck(&mut self, selector: &str) -> RunnerResult<()> {
        self.request(SidecarCommand::Uncheck { selector }).await.map(|_| ())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout_ms: u64,
    ) -> RunnerResult<()> {
        let budget = self.wait_budget(timeout_ms);
        self.request_with_budget(
            SidecarCommand::WaitForSelector {
                selector,
                state: state.as_str(),
                timeout_ms,
            },
            budget,
        )
        .await
        .map(|_| ())
    }

    async fn wait_for_url(&mut self, url: &str, timeout_ms: u64) -> RunnerResult<()> {
        let budget = self.wait_budget(timeout_ms);
        self.request_with_budget(SidecarCommand::WaitForUrl { url, timeout_ms }, budget)
            .await
            .map(|_| ())
    }

    async fn screenshot(&mut self, path: &Path) -> RunnerResult<()> {
        let path = path.to_string_lossy();
        self.request(SidecarCommand::Screenshot { path: path.as_ref() })
            .await
            .map(|_| ())
    }

    async fn is_visible(&mut self, selector: &str) -> RunnerResult<bool> {
        let value = self.request(SidecarCommand::IsVisible { selector }).await?;
        Self::expect_bool(value)
    }

    async fn is_hidden(&mut self, selector: &str) -> RunnerResult<bool> {
        let value = self.request(SidecarCommand::IsHidden { selector }).await?;
        Self::expect_bool(value)
    }

    async fn text_content(&mut self, selector: &str) -> RunnerResult<String> {
        let value = self.request(SidecarCommand::TextContent { selector }).await?;
        Self::expect_string(value)
    }

    async fn input_value(&mut self, selector: &str) -> RunnerResult<String> {
        let value = self.request(SidecarCommand::InputValue { selector }).await?;
        Self::expect_string(value)
    }

    async fn current_url(&mut self) -> RunnerResult<String> {
        let value = self.request(SidecarCommand::CurrentUrl).await?;
        Self::expect_string(value)
    }

    async fn close(&mut self) -> RunnerResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Best effort: ask the sidecar to shut the browser down, then
        // reap the child. kill_on_drop covers every other exit path.
        if let Err(e) = self.request(SidecarCommand::Close).await {
            warn!("sidecar close command failed: {}", e);
        }

        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(RunnerError::Io(e)),
            Err(_) => {
                warn!("sidecar did not exit, killing");
                self.child.kill().await.map_err(RunnerError::Io)
            }
        }
    }
}

/// Launches one fresh sidecar per test.
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
}

impl PlaywrightFactory {
    /// Verifies the Playwright installation and builds the factory.
    ///
    /// Failing here means no browser is ever launched and no test is
    /// attempted.
    pub fn new(config: PlaywrightConfig) -> RunnerResult<Self> {
        check_playwright_installed()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl DriverFactory for PlaywrightFactory {
    async fn create(&self, viewport: Option<Viewport>) -> RunnerResult<Box<dyn PageDriver>> {
        let driver = PlaywrightDriver::spawn(&self.config, viewport).await?;
        Ok(Box::new(driver))
    }
}

/// The Node.js driver script executed by the sidecar.
const DRIVER_JS: &str = r#"
'use strict';

const readline = require('readline');
const { chromium, firefox, webkit } = require('playwright');

const engines = { chromium, firefox, webkit };

function send(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

async function dispatch(page, cmd) {
  switch (cmd.cmd) {
    case 'goto':
      await page.goto(cmd.url);
      return;
    case 'click':
      await page.locator(cmd.selector).click();
      return;
    case 'fill':
      await page.locator(cmd.selector).fill(cmd.value);
      return;
    case 'type':
      await page.locator(cmd.selector).type(cmd.value);
      return;
    case 'press':
      await page.keyboard.press(cmd.key);
      return;
    case 'hover':
      await page.locator(cmd.selector).hover();
      return;
    case 'select':
      await page.locator(cmd.selector).selectOption(cmd.value);
      return;
    case 'check':
      await page.locator(cmd.selector).check();
      return;
    case 'uncheck':
      await page.locator(cmd.selector).uncheck();
      return;
    case 'wait_for_selector':
      await page.locator(cmd.selector).first().waitFor({ state: cmd.state, timeout: cmd.timeout_ms });
      return;
    case 'wait_for_url':
      await page.waitForURL(cmd.url, { timeout: cmd.timeout_ms });
      return;
    case 'screenshot':
      await page.screenshot({ path: cmd.path });
      return;
    case 'is_visible':
      return await page.locator(cmd.selector).first().isVisible();
    case 'is_hidden':
      return await page.locator(cmd.selector).first().isHidden();
    case 'text_content':
      return (await page.locator(cmd.selector).first().textContent()) || '';
    case 'input_value':
      return await page.locator(cmd.selector).first().inputValue();
    case 'current_url':
      return page.url();
    case 'close':
      return;
    default:
      throw new Error('unknown command: ' + cmd.cmd);
  }
}

async function main() {
  const opts = JSON.parse(process.argv[2]);
  const launcher = engines[opts.engine];
  if (!launcher) {
    throw new Error('unknown engine: ' + opts.engine);
  }

  const browser = await launcher.launch({ headless: opts.headless });
  const context = await browser.newContext(opts.viewport ? { viewport: opts.viewport } : {});
  const page = await context.newPage();

  send({ ok: true });

  const rl = readline.createInterface({ input: process.stdin, terminal: false });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let cmd;
    try {
      cmd = JSON.parse(line);
    } catch (e) {
      send({ ok: false, error: 'bad command line: ' + e.message });
      continue;
    }
    try {
      const value = await dispatch(page, cmd);
      send(value === undefined ? { ok: true } : { ok: true, value });
    } catch (e) {
      send({ ok: false, error: e.message });
    }
    if (cmd.cmd === 'close') break;
  }

  await browser.close();
}

main().catch((e) => {
  send({ ok: false, error: e.message });
  process.exit(1);
});
"#;
