//! Free/busy lookups through `getSchedule`.

use {graphbox_resilience::RetryError, serde::Deserialize, tracing::info};

use crate::{
    calendar::user_path,
    error::GraphError,
    pipeline::Pipeline,
    types::{ScheduleInformation, ScheduleQuery},
};

#[derive(Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    value: Vec<ScheduleInformation>,
}

/// Free/busy for `query.schedules`, as seen from `mailbox`.
pub async fn check_availability(
    pipeline: &Pipeline,
    mailbox: &str,
    query: &ScheduleQuery,
) -> Result<Vec<ScheduleInformation>, RetryError<GraphError>> {
    query.validate().map_err(RetryError::Permanent)?;
    let path = user_path(mailbox, "calendar/getSchedule").map_err(RetryError::Permanent)?;
    let body = query.to_graph();

    let path = &path;
    let body = &body;
    let response = pipeline
        .run("schedule check", move |client, token| async move {
            client
                .post_json::<_, ScheduleResponse>(&token, path, body)
                .await
        })
        .await?;

    let free = response.value.iter().filter(|s| s.is_free()).count();
    info!(
        mailbox,
        schedules = response.value.len(),
        free,
        "checked availability"
    );
    Ok(response.value)
}
