use {
    anyhow::Result,
    chrono::Utc,
    clap::Subcommand,
    graphbox_graph::{NewInvite, calendar},
};

use crate::{
    args::{BodyArgs, WindowArgs},
    output,
    settings::Session,
};

const DEFAULT_MEETING_MINS: u32 = 30;

#[derive(Subcommand)]
pub enum InviteAction {
    /// Create a meeting on the mailbox's calendar and invite attendees.
    Create {
        #[arg(long)]
        subject: String,
        #[command(flatten)]
        window: WindowArgs,
        /// Required attendee; repeat or separate with commas.
        #[arg(long, value_delimiter = ',')]
        attendee: Vec<String>,
        /// Optional attendee; repeat or separate with commas.
        #[arg(long, value_delimiter = ',')]
        optional: Vec<String>,
        #[arg(long)]
        location: Option<String>,
        #[command(flatten)]
        body: BodyArgs,
        /// Attach a Teams meeting.
        #[arg(long)]
        teams: bool,
    },
}

pub async fn handle_invite(action: InviteAction, session: &Session) -> Result<()> {
    match action {
        InviteAction::Create {
            subject,
            window,
            attendee,
            optional,
            location,
            body,
            teams,
        } => {
            let invite = NewInvite {
                subject,
                window: window.resolve(Utc::now(), DEFAULT_MEETING_MINS)?,
                attendees: attendee,
                optional_attendees: optional,
                location,
                body: body.read()?,
                body_type: body.body_type(),
                online_meeting: teams,
            };
            let mailbox = session.mailbox()?;
            let pipeline = session.pipeline()?;
            let event = calendar::create_invite(&pipeline, &mailbox, &invite).await?;
            output::print(session.format(), &event, output::event_created_text)
        },
    }
}
