//! Calendar actions: list events in a window, create meeting invites.

use {graphbox_resilience::RetryError, tracing::info};

use crate::{
    error::GraphError,
    pipeline::Pipeline,
    types::{Event, NewInvite, TimeWindow, iso},
};

const EVENT_FIELDS: &str =
    "id,subject,start,end,location,organizer,isAllDay,isCancelled,webLink";

/// Largest `$top` Graph accepts on `calendarView`.
pub const MAX_PAGE_SIZE: u32 = 1000;

pub(crate) fn user_path(mailbox: &str, rest: &str) -> Result<String, GraphError> {
    let mailbox = mailbox.trim();
    if mailbox.is_empty() {
        return Err(GraphError::message("mailbox must not be empty"));
    }
    Ok(format!("/users/{}/{rest}", urlencoding::encode(mailbox)))
}

/// Events (with recurrences expanded) overlapping `window`, ordered by start.
pub async fn list_events(
    pipeline: &Pipeline,
    mailbox: &str,
    window: &TimeWindow,
    top: Option<u32>,
) -> Result<Vec<Event>, RetryError<GraphError>> {
    let path = user_path(mailbox, "calendarView").map_err(RetryError::Permanent)?;
    let mut query = vec![
        ("startDateTime", iso(&window.start)),
        ("endDateTime", iso(&window.end)),
        ("$orderby", "start/dateTime".to_string()),
        ("$select", EVENT_FIELDS.to_string()),
    ];
    if let Some(top) = top {
        query.push(("$top", top.clamp(1, MAX_PAGE_SIZE).to_string()));
    }

    let path = &path;
    let query = &query[..];
    let events = pipeline
        .run("events list", move |client, token| async move {
            client.get_paged::<Event>(&token, path, query).await
        })
        .await?;

    info!(mailbox, count = events.len(), "listed calendar events");
    Ok(events)
}

/// Create an event with attendees on `mailbox`'s calendar; Exchange sends
/// the invitations.
pub async fn create_invite(
    pipeline: &Pipeline,
    mailbox: &str,
    invite: &NewInvite,
) -> Result<Event, RetryError<GraphError>> {
    invite.validate().map_err(RetryError::Permanent)?;
    let path = user_path(mailbox, "events").map_err(RetryError::Permanent)?;
    let body = invite.to_graph(&uuid::Uuid::new_v4().to_string());

    let path = &path;
    let body = &body;
    let event = pipeline
        .run("invite create", move |client, token| async move {
            client.post_json::<_, Event>(&token, path, body).await
        })
        .await?;

    info!(
        mailbox,
        event_id = %event.id,
        attendees = invite.attendees.len() + invite.optional_attendees.len(),
        "created meeting invite"
    );
    Ok(event)
}
