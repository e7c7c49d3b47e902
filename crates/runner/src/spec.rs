//! Declarative test specification
//!
//! A test source is either a file holding `{"tests": [...]}` (or a
//! single `{"steps": [...]}` object), or an inline JSON array of steps.
//! Files ending in `.yaml`/`.yml` are parsed as YAML, everything else
//! as JSON.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::{RunnerError, RunnerResult};

/// A single named test: an ordered step list and an optional viewport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    /// Name for reporting. Not required to be unique.
    #[serde(default = "default_test_name")]
    pub name: String,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// Viewport size for this test's browsing context
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

fn default_test_name() -> String {
    "Unnamed test".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Element state awaited by `wait_for_selector`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// One declarative browser operation, closed over the supported kinds.
///
/// Each variant carries only the payload its kind requires; a missing
/// field is a schema error at load time, never a silent no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Navigate to a URL (relative URLs resolve against the base URL)
    Goto { url: String },

    /// Click an element
    Click { selector: String },

    /// Fill an input field
    Fill { selector: String, value: String },

    /// Type into an element with keyboard simulation
    Type { selector: String, value: String },

    /// Press a key
    Press { key: String },

    /// Take a screenshot named `{name}.png` in the screenshot directory
    Screenshot { name: String },

    /// Unconditional pause, no polling
    Wait { ms: u64 },

    /// Wait for an element to reach a state
    WaitForSelector {
        selector: String,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait until the page URL matches
    WaitForUrl { url: String },

    /// Assert an element is visible (retried until timeout)
    AssertVisible { selector: String },

    /// Assert an element is hidden (retried until timeout)
    AssertHidden { selector: String },

    /// Assert an element's text contains the given text
    AssertText { selector: String, text: String },

    /// Assert an input's value
    AssertValue { selector: String, value: String },

    /// Assert the current page URL
    AssertUrl { url: String },

    /// Hover over an element
    Hover { selector: String },

    /// Select an option from a dropdown
    Select { selector: String, value: String },

    /// Check a checkbox
    Check { selector: String },

    /// Uncheck a checkbox
    Uncheck { selector: String },
}

impl Action {
    /// The wire name of this action's kind, for progress lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Goto { .. } => "goto",
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::Type { .. } => "type",
            Action::Press { .. } => "press",
            Action::Screenshot { .. } => "screenshot",
            Action::Wait { .. } => "wait",
            Action::WaitForSelector { .. } => "wait_for_selector",
            Action::WaitForUrl { .. } => "wait_for_url",
            Action::AssertVisible { .. } => "assert_visible",
            Action::AssertHidden { .. } => "assert_hidden",
            Action::AssertText { .. } => "assert_text",
            Action::AssertValue { .. } => "assert_value",
            Action::AssertUrl { .. } => "assert_url",
            Action::Hover { .. } => "hover",
            Action::Select { .. } => "select",
            Action::Check { .. } => "check",
            Action::Uncheck { .. } => "uncheck",
        }
    }
}

/// A step as loaded from the test source.
///
/// A step whose kind is unknown or whose required fields are missing
/// is kept as `Malformed` instead of failing suite loading; reaching
/// it at execution time fails the enclosing test, and only that test.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Step {
    Action(Action),
    Malformed {
        /// The declared action kind, or "<missing>"
        kind: String,
        /// Why the step did not parse
        reason: String,
    },
}

impl Step {
    /// The declared kind, for progress lines.
    pub fn kind(&self) -> &str {
        match self {
            Step::Action(action) => action.kind(),
            Step::Malformed { kind, .. } => kind,
        }
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if !value.is_object() {
            return Err(D::Error::custom("step must be an object"));
        }

        let kind = value
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or("<missing>")
            .to_string();

        match Action::deserialize(value.clone()) {
            Ok(action) => Ok(Step::Action(action)),
            Err(e) => Ok(Step::Malformed {
                kind,
                reason: e.to_string(),
            }),
        }
    }
}

/// Loads tests from a structured file.
///
/// Accepts either `{"tests": [Test, ...]}` or a single test object
/// with a `steps` field.
pub fn load_file(path: &Path) -> RunnerResult<Vec<Test>> {
    let content = std::fs::read_to_string(path)?;

    let is_yaml = path
        .extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false);

    let value: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    tests_from_value(value)
}

/// Builds a single ad-hoc test from an inline JSON array of steps.
pub fn from_inline_steps(json: &str) -> RunnerResult<Vec<Test>> {
    let steps: Vec<Step> = serde_json::from_str(json)
        .map_err(|e| RunnerError::SpecParse(format!("invalid --actions JSON: {}", e)))?;

    Ok(vec![Test {
        name: "Quick test".to_string(),
        steps,
        viewport: None,
    }])
}

fn tests_from_value(value: serde_json::Value) -> RunnerResult<Vec<Test>> {
    if let Some(tests) = value.get("tests") {
        return serde_json::from_value(tests.clone()).map_err(RunnerError::from);
    }

    if value.get("steps").is_some() {
        let test: Test = serde_json::from_value(value)?;
        return Ok(vec![test]);
    }

    Err(RunnerError::SpecParse(
        "test file must contain a \"tests\" array or a \"steps\" field".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suite_file() {
        let json = r##"{
            "tests": [
                {
                    "name": "login",
                    "steps": [
                        {"action": "goto", "url": "/login"},
                        {"action": "fill", "selector": "#user", "value": "a"},
                        {"action": "click", "selector": "#submit"},
                        {"action": "assert_url", "url": "/home"}
                    ]
                }
            ]
        }"##;
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        let tests = tests_from_value(value).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].name, "login");
        assert_eq!(tests[0].steps.len(), 4);
        assert!(matches!(
            tests[0].steps[0],
            Step::Action(Action::Goto { .. })
        ));
    }

    #[test]
    fn test_parse_single_test_object() {
        let json = r#"{
            "steps": [
                {"action": "goto", "url": "/"},
                {"action": "screenshot", "name": "home"}
            ],
            "viewport": {"width": 390, "height": 844}
        }"#;
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        let tests = tests_from_value(value).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].name, "Unnamed test");
        assert_eq!(tests[0].viewport.unwrap().width, 390);
    }

    #[test]
    fn test_parse_yaml_spec() {
        let yaml = r#"
tests:
  - name: dashboard
    steps:
      - action: goto
        url: /
      - action: wait_for_selector
        selector: '[data-testid="app-shell"]'
      - action: screenshot
        name: dashboard
"#;
        let value: serde_json::Value = serde_yaml::from_str(yaml).unwrap();
        let tests = tests_from_value(value).unwrap();
        assert_eq!(tests[0].name, "dashboard");
        assert_eq!(tests[0].steps.len(), 3);
    }

    #[test]
    fn test_unknown_action_kept_as_malformed() {
        let json = r#"[{"action": "goto", "url": "/"}, {"action": "scroll"}]"#;
        let tests = from_inline_steps(json).unwrap();
        let steps = &tests[0].steps;
        assert!(matches!(steps[0], Step::Action(_)));
        match &steps[1] {
            Step::Malformed { kind, .. } => assert_eq!(kind, "scroll"),
            other => panic!("expected malformed step, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let json = r#"[{"action": "click"}]"#;
        let tests = from_inline_steps(json).unwrap();
        match &tests[0].steps[0] {
            Step::Malformed { kind, reason } => {
                assert_eq!(kind, "click");
                assert!(reason.contains("selector"), "reason: {}", reason);
            }
            other => panic!("expected malformed step, got {:?}", other),
        }
    }

    #[test]
    fn test_wait_for_selector_state_defaults_to_visible() {
        let json = r##"[{"action": "wait_for_selector", "selector": "#x"}]"##;
        let tests = from_inline_steps(json).unwrap();
        match &tests[0].steps[0] {
            Step::Action(Action::WaitForSelector { state, .. }) => {
                assert_eq!(*state, WaitState::Visible);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_inline_steps_must_be_an_array() {
        assert!(matches!(
            from_inline_steps(r#"{"action": "goto"}"#),
            Err(RunnerError::SpecParse(_))
        ));
    }

    #[test]
    fn test_file_without_tests_or_steps_is_rejected() {
        let value: serde_json::Value = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert!(matches!(
            tests_from_value(value),
            Err(RunnerError::SpecParse(_))
        ));
    }
}
