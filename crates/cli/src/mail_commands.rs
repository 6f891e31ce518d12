use {
    anyhow::Result,
    clap::Subcommand,
    graphbox_graph::{OutgoingMail, mail},
};

use crate::{
    args::BodyArgs,
    output::{self, MailSent},
    settings::Session,
};

#[derive(Subcommand)]
pub enum MailAction {
    /// Send a message from the mailbox.
    Send {
        /// Recipient address; repeat or separate with commas.
        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        cc: Vec<String>,
        #[arg(long)]
        subject: String,
        #[command(flatten)]
        body: BodyArgs,
        /// Do not keep a copy in Sent Items.
        #[arg(long)]
        no_save: bool,
    },
}

pub async fn handle_mail(action: MailAction, session: &Session) -> Result<()> {
    match action {
        MailAction::Send {
            to,
            cc,
            subject,
            body,
            no_save,
        } => {
            let message = OutgoingMail {
                body: body.read()?.unwrap_or_default(),
                body_type: body.body_type(),
                subject,
                to,
                cc,
                save_to_sent_items: !no_save,
            };
            let mailbox = session.mailbox()?;
            let pipeline = session.pipeline()?;
            mail::send_mail(&pipeline, &mailbox, &message).await?;

            let sent = MailSent {
                mailbox: &mailbox,
                subject: &message.subject,
                recipients: message.to.len() + message.cc.len(),
            };
            output::print(session.format(), &sent, output::mail_sent_text)
        },
    }
}
