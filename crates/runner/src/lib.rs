//! Pagetest runner core
//!
//! A declarative browser-action test runner: a test is an ordered list
//! of steps (navigate, interact, wait, assert, screenshot) executed
//! against a fresh browsing context, reporting pass/fail per test with
//! screenshot evidence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    TestRunner                            │
//! │   run_suite(tests)  -> SuiteResult (tally, results json) │
//! │     run_test(test)  -> TestResult  (short-circuit, shot  │
//! │                                     on first failure)    │
//! │       run_action()  -> one PageDriver call per step      │
//! ├──────────────────────────────────────────────────────────┤
//! │  PageDriver / DriverFactory (trait seam)                 │
//! │    └── PlaywrightDriver: Node sidecar, JSON over stdio   │
//! ├──────────────────────────────────────────────────────────┤
//! │  Test source: {"tests": [...]} file (JSON/YAML) or       │
//! │  inline JSON step array                                  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod playwright;
pub mod runner;
pub mod spec;
pub mod wait;

pub use driver::{DriverFactory, PageDriver};
pub use error::{RunnerError, RunnerResult};
pub use playwright::{Engine, PlaywrightConfig, PlaywrightFactory};
pub use runner::{RunnerConfig, SuiteResult, TestResult, TestRunner};
pub use spec::{Action, Step, Test, Viewport, WaitState};
