use {anyhow::Result, chrono::Utc, clap::Subcommand, graphbox_graph::calendar};

use crate::{args::WindowArgs, output, settings::Session};

/// Default `events list` window: the next 24 hours.
const DEFAULT_WINDOW_MINS: u32 = 24 * 60;

#[derive(Subcommand)]
pub enum EventsAction {
    /// List events (recurrences expanded) overlapping a time window.
    List {
        #[command(flatten)]
        window: WindowArgs,
        /// Page size requested from Graph (1-1000).
        #[arg(long)]
        top: Option<u32>,
    },
}

pub async fn handle_events(action: EventsAction, session: &Session) -> Result<()> {
    match action {
        EventsAction::List { window, top } => {
            let window = window.resolve(Utc::now(), DEFAULT_WINDOW_MINS)?;
            let mailbox = session.mailbox()?;
            let pipeline = session.pipeline()?;
            let events = calendar::list_events(&pipeline, &mailbox, &window, top).await?;
            output::print(session.format(), &events[..], output::events_text)
        },
    }
}
