//! Rendering of command results on stdout.
//!
//! JSON mode prints one pretty-printed document per command; text mode
//! prints short human-readable lines. Logs go to stderr in both modes.

use std::fmt::Write as _;

use {
    graphbox_config::OutputFormat,
    graphbox_graph::{Event, ScheduleInformation},
    serde::Serialize,
};

pub fn print<T, F>(format: OutputFormat, value: &T, text: F) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", text(value)),
    }
    Ok(())
}

pub fn events_text(events: &[Event]) -> String {
    if events.is_empty() {
        return "No events in this window.\n".into();
    }
    let mut out = String::new();
    for event in events {
        let when = |t: &Option<graphbox_graph::DateTimeTimeZone>| {
            t.as_ref().map_or("?", |t| t.date_time.as_str()).to_string()
        };
        let _ = write!(
            out,
            "{}  {}  {}",
            when(&event.start),
            when(&event.end),
            event.subject.as_deref().unwrap_or("(no subject)")
        );
        if let Some(place) = event.location.as_ref().and_then(|l| l.display_name.as_deref())
            && !place.is_empty()
        {
            let _ = write!(out, "  @ {place}");
        }
        if event.is_cancelled {
            out.push_str("  [cancelled]");
        }
        out.push('\n');
    }
    out
}

pub fn event_created_text(event: &Event) -> String {
    let mut out = format!(
        "Created event {}: {}\n",
        event.id,
        event.subject.as_deref().unwrap_or("(no subject)")
    );
    if let Some(link) = &event.web_link {
        let _ = writeln!(out, "  {link}");
    }
    out
}

pub fn schedules_text(schedules: &[ScheduleInformation]) -> String {
    let mut out = String::new();
    for info in schedules {
        if let Some(error) = &info.error {
            let _ = writeln!(
                out,
                "{}: lookup failed ({})",
                info.schedule_id,
                error.message.as_deref().unwrap_or("no details")
            );
            continue;
        }
        let verdict = if info.is_free() { "free" } else { "busy" };
        let _ = writeln!(out, "{}: {verdict}", info.schedule_id);
        for item in &info.schedule_items {
            let _ = writeln!(
                out,
                "  {}  {} - {}",
                item.status, item.start.date_time, item.end.date_time
            );
        }
    }
    out
}

#[derive(Debug, Serialize)]
pub struct MailSent<'a> {
    pub mailbox: &'a str,
    pub subject: &'a str,
    pub recipients: usize,
}

pub fn mail_sent_text(sent: &MailSent<'_>) -> String {
    format!(
        "Sent \"{}\" from {} to {} recipient(s).\n",
        sent.subject, sent.mailbox, sent.recipients
    )
}

/// `auth check` result. Never carries the token itself.
#[derive(Debug, Serialize)]
pub struct TokenStatus {
    pub method: &'static str,
    pub scope: String,
    pub expires_in_secs: u64,
}

pub fn token_status_text(status: &TokenStatus) -> String {
    format!(
        "Authenticated with {} for {} (token valid for {} s).\n",
        status.method, status.scope, status.expires_in_secs
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: serde_json::Value) -> Event {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn events_render_one_line_each() {
        let events = vec![
            event(serde_json::json!({
                "id": "e1",
                "subject": "Standup",
                "start": { "dateTime": "2026-03-02T09:00:00", "timeZone": "UTC" },
                "end": { "dateTime": "2026-03-02T09:15:00", "timeZone": "UTC" },
                "location": { "displayName": "Room 101" },
            })),
            event(serde_json::json!({ "id": "e2", "isCancelled": true })),
        ];
        let text = events_text(&events);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "2026-03-02T09:00:00  2026-03-02T09:15:00  Standup  @ Room 101"
        );
        assert_eq!(lines[1], "?  ?  (no subject)  [cancelled]");
    }

    #[test]
    fn empty_event_list_says_so() {
        assert_eq!(events_text(&[]), "No events in this window.\n");
    }

    #[test]
    fn schedules_show_verdict_and_failures() {
        let schedules: Vec<ScheduleInformation> = serde_json::from_value(serde_json::json!([
            { "scheduleId": "ana@contoso.com", "availabilityView": "00" },
            {
                "scheduleId": "ghost@contoso.com",
                "error": { "message": "mailbox not found", "responseCode": "ErrorMailRecipientNotFound" },
            },
        ]))
        .unwrap();
        let text = schedules_text(&schedules);
        assert!(text.contains("ana@contoso.com: free"));
        assert!(text.contains("ghost@contoso.com: lookup failed (mailbox not found)"));
    }

    #[test]
    fn token_status_json_has_no_token_field() {
        let status = TokenStatus {
            method: "client secret",
            scope: "https://graph.microsoft.com/.default".into(),
            expires_in_secs: 3599,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["expires_in_secs"], 3599);
        assert!(json.get("token").is_none());
        assert!(token_status_text(&status).contains("client secret"));
    }
}
