mod args;
mod auth_commands;
mod config_commands;
mod events_commands;
mod invite_commands;
mod mail_commands;
mod output;
mod schedule_commands;
mod settings;

use std::{io::IsTerminal, time::Duration};

use {
    clap::{Parser, Subcommand},
    graphbox_resilience::CancellationToken,
    tracing::{debug, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::settings::{Overrides, Session};

#[derive(Parser)]
#[command(
    name = "graphbox",
    version,
    about = "graphbox: mailbox and calendar automation for Microsoft Graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: Overrides,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calendar events.
    Events {
        #[command(subcommand)]
        action: events_commands::EventsAction,
    },
    /// Outgoing mail.
    Mail {
        #[command(subcommand)]
        action: mail_commands::MailAction,
    },
    /// Meeting invitations.
    Invite {
        #[command(subcommand)]
        action: invite_commands::InviteAction,
    },
    /// Free/busy lookups.
    Schedule {
        #[command(subcommand)]
        action: schedule_commands::ScheduleAction,
    },
    /// Credential diagnostics.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Configuration inspection and validation.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Logs go to stderr; stdout carries command output only.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Ctrl-C and the optional deadline both cancel `cancel`, which stops the
/// in-flight attempt and any pending backoff wait.
fn spawn_cancel_triggers(cancel: &CancellationToken, deadline: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    if let Some(deadline) = deadline {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!(deadline_secs = deadline.as_secs(), "deadline reached, cancelling");
            on_deadline.cancel();
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "graphbox starting");

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, cli.overrides.deadline());
    let session = || Session::load(&cli.overrides, cancel.clone());

    match cli.command {
        Commands::Events { action } => events_commands::handle_events(action, &session()?).await,
        Commands::Mail { action } => mail_commands::handle_mail(action, &session()?).await,
        Commands::Invite { action } => invite_commands::handle_invite(action, &session()?).await,
        Commands::Schedule { action } => {
            schedule_commands::handle_schedule(action, &session()?).await
        },
        Commands::Auth { action } => auth_commands::handle_auth(action, &session()?).await,
        Commands::Config { action } => {
            config_commands::handle_config(action, &cli.overrides, cancel.clone())
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "graphbox",
            "events",
            "list",
            "--mailbox",
            "room-101@contoso.com",
            "--top",
            "50",
            "--output",
            "json",
            "--max-retries",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.overrides.mailbox.as_deref(), Some("room-101@contoso.com"));
        assert_eq!(cli.overrides.output, Some(settings::OutputArg::Json));
        assert_eq!(cli.overrides.max_retries, Some(0));
        assert!(matches!(
            cli.command,
            Commands::Events {
                action: events_commands::EventsAction::List { top: Some(50), .. }
            }
        ));
    }

    #[test]
    fn recipients_split_on_commas() {
        let cli = Cli::try_parse_from([
            "graphbox",
            "mail",
            "send",
            "--to",
            "ana@contoso.com,bo@contoso.com",
            "--to",
            "cy@contoso.com",
            "--subject",
            "Hi",
            "--body",
            "Hello",
        ])
        .unwrap();
        let Commands::Mail {
            action: mail_commands::MailAction::Send { to, no_save, .. },
        } = cli.command
        else {
            panic!("expected mail send");
        };
        assert_eq!(to, ["ana@contoso.com", "bo@contoso.com", "cy@contoso.com"]);
        assert!(!no_save);
    }

    #[test]
    fn body_and_body_file_conflict() {
        let result = Cli::try_parse_from([
            "graphbox",
            "mail",
            "send",
            "--to",
            "ana@contoso.com",
            "--subject",
            "Hi",
            "--body",
            "Hello",
            "--body-file",
            "body.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn schedule_check_requires_a_mailbox_to_look_up() {
        assert!(Cli::try_parse_from(["graphbox", "schedule", "check"]).is_err());
    }
}
