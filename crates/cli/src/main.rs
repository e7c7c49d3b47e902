//! Pagetest CLI - Main Entry Point
//!
//! Runs declarative browser-action tests against a running
//! application. Exit code 0 when every test passed, 1 when any test
//! failed, 2 on usage or environment errors.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use anyhow::bail;
use pagetest_runner::playwright::{Engine, PlaywrightConfig, PlaywrightFactory};
use pagetest_runner::runner::{RunnerConfig, TestRunner};
use pagetest_runner::spec;

/// Pagetest - declarative browser tests with screenshot evidence
#[derive(Parser, Debug)]
#[command(name = "pagetest")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["test_file", "actions"])
))]
struct Args {
    /// Base URL of the application under test
    #[arg(long)]
    url: String,

    /// JSON or YAML file containing test definitions
    #[arg(long)]
    test_file: Option<PathBuf>,

    /// Inline JSON array of steps for a quick ad-hoc test
    #[arg(long)]
    actions: Option<String>,

    /// Screenshot output directory
    #[arg(long, default_value = "test_screenshots")]
    screenshot_dir: PathBuf,

    /// Run the browser headless (the default)
    #[arg(long, overrides_with = "no_headless")]
    headless: bool,

    /// Show the browser window
    #[arg(long, overrides_with = "headless")]
    no_headless: bool,

    /// Browser engine to run against
    #[arg(long, default_value = "chromium", value_parser = ["chromium", "firefox", "webkit"])]
    browser: String,

    /// Run only the test with this name
    #[arg(long)]
    name: Option<String>,

    /// Timeout for assertions and waits, in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Write the suite result as JSON to this path
    #[arg(long)]
    results: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(2);
        }
    };
    match rt.block_on(run(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let mut tests = if let Some(path) = &args.test_file {
        spec::load_file(path)?
    } else {
        // The arg group guarantees --actions is present here
        spec::from_inline_steps(args.actions.as_deref().unwrap_or_default())?
    };

    if let Some(name) = &args.name {
        tests.retain(|t| &t.name == name);
        if tests.is_empty() {
            bail!("no test named '{}'", name);
        }
    }

    let engine = Engine::from_name(&args.browser).unwrap_or_default();
    // The two flags override each other; headless unless --no-headless won
    let headless = args.headless || !args.no_headless;
    tracing::debug!(
        tests = tests.len(),
        timeout_ms = args.timeout_ms,
        "starting suite"
    );

    println!("Testing: {}", args.url);
    println!("Browser: {} (headless={})", engine, headless);
    println!("Tests to run: {}", tests.len());

    // Fails before any browser is launched when Playwright is missing
    let factory = PlaywrightFactory::new(PlaywrightConfig {
        engine,
        headless,
        ..Default::default()
    })?;

    let runner = TestRunner::new(
        RunnerConfig {
            base_url: args.url,
            screenshot_dir: args.screenshot_dir,
            timeout_ms: args.timeout_ms,
        },
        factory,
    );

    let suite = runner.run_suite(&tests).await?;

    if let Some(path) = &args.results {
        runner.write_results(&suite, path)?;
        println!("Results written to: {}", path.display());
    }

    Ok(suite.all_passed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_exactly_one_input_mode() {
        assert!(Args::try_parse_from(["pagetest", "--url", "http://x"]).is_err());

        assert!(Args::try_parse_from([
            "pagetest",
            "--url",
            "http://x",
            "--test-file",
            "t.json",
            "--actions",
            "[]",
        ])
        .is_err());

        assert!(Args::try_parse_from([
            "pagetest",
            "--url",
            "http://x",
            "--test-file",
            "t.json",
        ])
        .is_ok());
    }

    #[test]
    fn test_url_is_required() {
        assert!(Args::try_parse_from(["pagetest", "--actions", "[]"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let args =
            Args::try_parse_from(["pagetest", "--url", "http://x", "--actions", "[]"]).unwrap();
        assert_eq!(args.screenshot_dir, PathBuf::from("test_screenshots"));
        assert_eq!(args.browser, "chromium");
        assert!(!args.no_headless, "headless is the default");
        assert_eq!(args.timeout_ms, 5000);
    }

    #[test]
    fn test_browser_choices_are_closed() {
        assert!(Args::try_parse_from([
            "pagetest",
            "--url",
            "http://x",
            "--actions",
            "[]",
            "--browser",
            "opera",
        ])
        .is_err());

        for engine in ["chromium", "firefox", "webkit"] {
            assert!(Args::try_parse_from([
                "pagetest",
                "--url",
                "http://x",
                "--actions",
                "[]",
                "--browser",
                engine,
            ])
            .is_ok());
        }
    }
}
