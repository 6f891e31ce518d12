use {
    anyhow::Result,
    chrono::Utc,
    clap::Subcommand,
    graphbox_graph::{ScheduleQuery, schedule},
};

use crate::{args::WindowArgs, output, settings::Session};

/// Default lookup: one working day from the start time.
const DEFAULT_WINDOW_MINS: u32 = 8 * 60;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Show free/busy for one or more mailboxes.
    Check {
        /// Mailbox to look up; repeat or separate with commas.
        #[arg(long = "who", required = true, value_delimiter = ',')]
        schedules: Vec<String>,
        #[command(flatten)]
        window: WindowArgs,
        /// Slot length in minutes (5-1440).
        #[arg(long, default_value_t = 30)]
        interval: u32,
    },
}

pub async fn handle_schedule(action: ScheduleAction, session: &Session) -> Result<()> {
    match action {
        ScheduleAction::Check {
            schedules,
            window,
            interval,
        } => {
            let query = ScheduleQuery {
                schedules,
                window: window.resolve(Utc::now(), DEFAULT_WINDOW_MINS)?,
                interval_minutes: interval,
            };
            let mailbox = session.mailbox()?;
            let pipeline = session.pipeline()?;
            let info = schedule::check_availability(&pipeline, &mailbox, &query).await?;
            output::print(session.format(), &info[..], output::schedules_text)
        },
    }
}
