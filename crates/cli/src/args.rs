//! Argument groups shared by several subcommands.

use std::path::{Path, PathBuf};

use {
    chrono::{DateTime, Duration, Utc},
    clap::Args,
    graphbox_common::{Error, Result},
    graphbox_graph::{BodyType, TimeWindow},
};

graphbox_common::impl_context!();

/// Parse an RFC 3339 timestamp, or `now`.
pub fn parse_time(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if raw.trim().eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 time such as 2026-03-02T09:00:00Z ({e})"))
}

#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Start of the window (RFC 3339 or `now`). Defaults to now.
    #[arg(long, value_parser = parse_time)]
    pub start: Option<DateTime<Utc>>,

    /// End of the window (RFC 3339).
    #[arg(long, value_parser = parse_time, conflicts_with = "duration_mins")]
    pub end: Option<DateTime<Utc>>,

    /// Window length when --end is not given.
    #[arg(long)]
    pub duration_mins: Option<u32>,
}

impl WindowArgs {
    pub fn resolve(&self, now: DateTime<Utc>, default_mins: u32) -> anyhow::Result<TimeWindow> {
        let start = self.start.unwrap_or(now);
        let end = match self.end {
            Some(end) => end,
            None => start + Duration::minutes(i64::from(self.duration_mins.unwrap_or(default_mins))),
        };
        Ok(TimeWindow::new(start, end)?)
    }
}

#[derive(Args, Debug, Clone)]
pub struct BodyArgs {
    /// Body text.
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the body from a file (`-` for stdin).
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Send the body as HTML instead of plain text.
    #[arg(long)]
    pub html: bool,
}

impl BodyArgs {
    pub fn body_type(&self) -> BodyType {
        if self.html {
            BodyType::Html
        } else {
            BodyType::Text
        }
    }

    pub fn read(&self) -> Result<Option<String>> {
        match (&self.body, &self.body_file) {
            (Some(_), Some(_)) => Err(Error::message(
                "--body and --body-file cannot be used together",
            )),
            (Some(text), None) => Ok(Some(text.clone())),
            (None, Some(path)) => read_body_file(path).map(Some),
            (None, None) => Ok(None),
        }
    }
}

fn read_body_file(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("reading body from stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("reading body from {}", path.display()))
}
