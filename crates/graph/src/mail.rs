//! Mail actions: send a message from a mailbox.

use {graphbox_resilience::RetryError, tracing::info};

use crate::{calendar::user_path, error::GraphError, pipeline::Pipeline, types::OutgoingMail};

/// Send `mail` from `mailbox`. Graph answers `202 Accepted` with no body.
pub async fn send_mail(
    pipeline: &Pipeline,
    mailbox: &str,
    mail: &OutgoingMail,
) -> Result<(), RetryError<GraphError>> {
    mail.validate().map_err(RetryError::Permanent)?;
    let path = user_path(mailbox, "sendMail").map_err(RetryError::Permanent)?;
    let body = mail.to_graph();

    let path = &path;
    let body = &body;
    pipeline
        .run("mail send", move |client, token| async move {
            client.post_no_content(&token, path, body).await
        })
        .await?;

    info!(mailbox, recipients = mail.to.len() + mail.cc.len(), "mail accepted for delivery");
    Ok(())
}
