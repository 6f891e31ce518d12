use std::path::Path;

use {
    anyhow::Result,
    clap::Subcommand,
    graphbox_config::{GraphboxConfig, OutputFormat, Severity, ValidationResult, validate},
    graphbox_resilience::CancellationToken,
};

use crate::settings::{Overrides, Session};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration with secrets redacted.
    Show,
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

/// Runs without a preloaded session: `check` must reach the diagnostics even
/// when the file does not parse.
pub fn handle_config(
    action: ConfigAction,
    overrides: &Overrides,
    cancel: CancellationToken,
) -> Result<()> {
    match action {
        ConfigAction::Show => show(&Session::load(overrides, cancel)?),
        ConfigAction::Check { verbose } => check(overrides.config.as_deref(), verbose),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn show(session: &Session) -> Result<()> {
    match &session.loaded.path {
        Some(path) => eprintln!("# from {}", path.display()),
        None => eprintln!("# no config file found; defaults plus environment and flags"),
    }
    println!("{}", render(session.config(), session.format())?);

    if let Some(path) = &session.loaded.path {
        let result = validate(Some(path.as_path()));
        let problems = result.count(Severity::Error) + result.count(Severity::Warning);
        if problems > 0 {
            eprintln!(
                "\n{problems} issue(s) in {}; run `graphbox config check` for details",
                path.display()
            );
        }
    }
    Ok(())
}

fn render(config: &GraphboxConfig, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Text => toml::to_string_pretty(config)?,
    })
}

fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate(path);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    report(&result, verbose);

    if result.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

fn report(result: &ValidationResult, verbose: bool) {
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{}{RESET} [{}] {}", d.severity, d.category, d.message);
        } else {
            eprintln!(
                "  {BOLD}{color}{}{RESET} [{}] {}: {}",
                d.severity, d.category, d.path, d.message
            );
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}
