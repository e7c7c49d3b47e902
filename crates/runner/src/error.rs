//! Error types for the action test runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Playwright not found. Install with: npm i playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Driver failed to start: {0}")]
    DriverStartup(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Driver protocol error: {0}")]
    DriverProtocol(String),

    #[error("Driver did not answer within {timeout_ms} ms: {command}")]
    DriverTimeout { command: String, timeout_ms: u64 },

    #[error("Malformed action '{kind}': {reason}")]
    MalformedAction { kind: String, reason: String },

    #[error("Timeout waiting for: {condition} (after {timeout_ms} ms)")]
    Timeout { condition: String, timeout_ms: u64 },

    #[error("Test source parse error: {0}")]
    SpecParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
