//! Typed structs for the Graph resources graphbox reads and writes.

use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
};

use crate::error::GraphError;

/// One page of a Graph collection.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, GraphError> {
        if end <= start {
            return Err(GraphError::message(format!(
                "time window end {} must be after start {}",
                iso(&end),
                iso(&start)
            )));
        }
        Ok(Self { start, end })
    }
}

pub(crate) fn iso(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Graph `dateTimeTimeZone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    pub time_zone: String,
}

impl DateTimeTimeZone {
    #[must_use]
    pub fn utc(t: &DateTime<Utc>) -> Self {
        Self {
            date_time: t.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: "UTC".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            email_address: EmailAddress {
                address: Some(address.into()),
                name: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub display_name: Option<String>,
}

/// Calendar event summary (the `$select`ed subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub subject: Option<String>,
    pub start: Option<DateTimeTimeZone>,
    pub end: Option<DateTimeTimeZone>,
    pub location: Option<Location>,
    pub organizer: Option<Recipient>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub is_cancelled: bool,
    pub web_link: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    #[default]
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "HTML")]
    Html,
}

/// Meeting request created on the organizer mailbox's calendar.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub subject: String,
    pub window: TimeWindow,
    pub attendees: Vec<String>,
    pub optional_attendees: Vec<String>,
    pub location: Option<String>,
    pub body: Option<String>,
    pub body_type: BodyType,
    /// Attach a Teams meeting.
    pub online_meeting: bool,
}

impl NewInvite {
    pub(crate) fn validate(&self) -> Result<(), GraphError> {
        if self.subject.trim().is_empty() {
            return Err(GraphError::message("invite subject must not be empty"));
        }
        if self.attendees.is_empty() && self.optional_attendees.is_empty() {
            return Err(GraphError::message("an invite needs at least one attendee"));
        }
        check_addresses(self.attendees.iter().chain(&self.optional_attendees))
    }

    /// Graph `event` body. `transaction_id` lets the service drop a
    /// duplicate create when a retried POST had already been applied.
    pub(crate) fn to_graph(&self, transaction_id: &str) -> serde_json::Value {
        let attendee = |address: &String, kind: &str| {
            serde_json::json!({
                "emailAddress": { "address": address },
                "type": kind,
            })
        };
        let attendees: Vec<_> = self
            .attendees
            .iter()
            .map(|a| attendee(a, "required"))
            .chain(self.optional_attendees.iter().map(|a| attendee(a, "optional")))
            .collect();

        let mut event = serde_json::json!({
            "subject": self.subject,
            "start": DateTimeTimeZone::utc(&self.window.start),
            "end": DateTimeTimeZone::utc(&self.window.end),
            "attendees": attendees,
            "transactionId": transaction_id,
        });
        if let Some(obj) = event.as_object_mut() {
            if let Some(body) = &self.body {
                obj.insert(
                    "body".into(),
                    serde_json::json!({ "contentType": self.body_type, "content": body }),
                );
            }
            if let Some(location) = &self.location {
                obj.insert(
                    "location".into(),
                    serde_json::json!({ "displayName": location }),
                );
            }
            if self.online_meeting {
                obj.insert("isOnlineMeeting".into(), serde_json::Value::Bool(true));
                obj.insert(
                    "onlineMeetingProvider".into(),
                    serde_json::Value::String("teamsForBusiness".into()),
                );
            }
        }
        event
    }
}

/// Message sent from the mailbox.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub body_type: BodyType,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub save_to_sent_items: bool,
}

impl OutgoingMail {
    pub(crate) fn validate(&self) -> Result<(), GraphError> {
        if self.to.is_empty() && self.cc.is_empty() {
            return Err(GraphError::message("mail needs at least one recipient"));
        }
        check_addresses(self.to.iter().chain(&self.cc))
    }

    pub(crate) fn to_graph(&self) -> serde_json::Value {
        let recipients =
            |list: &[String]| list.iter().map(Recipient::new).collect::<Vec<Recipient>>();
        serde_json::json!({
            "message": {
                "subject": self.subject,
                "body": { "contentType": self.body_type, "content": self.body },
                "toRecipients": recipients(&self.to),
                "ccRecipients": recipients(&self.cc),
            },
            "saveToSentItems": self.save_to_sent_items,
        })
    }
}

/// Free/busy lookup for one or more mailboxes.
#[derive(Debug, Clone)]
pub struct ScheduleQuery {
    pub schedules: Vec<String>,
    pub window: TimeWindow,
    /// Slot length of `availabilityView`, 5 to 1440 minutes.
    pub interval_minutes: u32,
}

impl ScheduleQuery {
    pub const MIN_INTERVAL: u32 = 5;
    pub const MAX_INTERVAL: u32 = 1440;

    pub(crate) fn validate(&self) -> Result<(), GraphError> {
        if self.schedules.is_empty() {
            return Err(GraphError::message("schedule check needs at least one mailbox"));
        }
        if !(Self::MIN_INTERVAL..=Self::MAX_INTERVAL).contains(&self.interval_minutes) {
            return Err(GraphError::message(format!(
                "interval must be between {} and {} minutes",
                Self::MIN_INTERVAL,
                Self::MAX_INTERVAL
            )));
        }
        check_addresses(self.schedules.iter())
    }

    pub(crate) fn to_graph(&self) -> serde_json::Value {
        serde_json::json!({
            "schedules": self.schedules,
            "startTime": DateTimeTimeZone::utc(&self.window.start),
            "endTime": DateTimeTimeZone::utc(&self.window.end),
            "availabilityViewInterval": self.interval_minutes,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub status: String,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    pub subject: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeBusyError {
    pub message: Option<String>,
    pub response_code: Option<String>,
}

/// Availability of one mailbox over the queried window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInformation {
    pub schedule_id: String,
    /// One digit per slot: 0 free, 1 tentative, 2 busy, 3 away, 4 elsewhere.
    #[serde(default)]
    pub availability_view: String,
    #[serde(default)]
    pub schedule_items: Vec<ScheduleItem>,
    pub error: Option<FreeBusyError>,
}

impl ScheduleInformation {
    /// `true` when every slot is free and the lookup itself succeeded.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.error.is_none() && self.availability_view.chars().all(|c| c == '0')
    }
}

fn check_addresses<'a>(addresses: impl Iterator<Item = &'a String>) -> Result<(), GraphError> {
    for address in addresses {
        let valid = address
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(GraphError::message(format!(
                "'{address}' is not an email address"
            )));
        }
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn window_must_be_forward() {
        let t = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert!(TimeWindow::new(t, t).is_err());
    }

    #[test]
    fn invite_body_uses_graph_shapes() {
        let invite = NewInvite {
            subject: "Quarterly review".into(),
            window: window(),
            attendees: vec!["ana@contoso.com".into()],
            optional_attendees: vec!["bo@contoso.com".into()],
            location: Some("Room 101".into()),
            body: Some("<p>Agenda</p>".into()),
            body_type: BodyType::Html,
            online_meeting: true,
        };
        invite.validate().unwrap();
        let body = invite.to_graph("tx-1");
        assert_eq!(body["start"]["dateTime"], "2026-03-02T09:00:00");
        assert_eq!(body["start"]["timeZone"], "UTC");
        assert_eq!(body["attendees"][0]["type"], "required");
        assert_eq!(body["attendees"][1]["emailAddress"]["address"], "bo@contoso.com");
        assert_eq!(body["body"]["contentType"], "HTML");
        assert_eq!(body["location"]["displayName"], "Room 101");
        assert_eq!(body["onlineMeetingProvider"], "teamsForBusiness");
        assert_eq!(body["transactionId"], "tx-1");
    }

    #[test]
    fn invite_without_attendees_is_rejected() {
        let invite = NewInvite {
            subject: "Solo".into(),
            window: window(),
            attendees: vec![],
            optional_attendees: vec![],
            location: None,
            body: None,
            body_type: BodyType::Text,
            online_meeting: false,
        };
        assert!(invite.validate().is_err());
    }

    #[test]
    fn mail_body_lists_recipients() {
        let mail = OutgoingMail {
            subject: "Hi".into(),
            body: "Hello".into(),
            body_type: BodyType::Text,
            to: vec!["ana@contoso.com".into()],
            cc: vec![],
            save_to_sent_items: false,
        };
        mail.validate().unwrap();
        let body = mail.to_graph();
        assert_eq!(
            body["message"]["toRecipients"][0]["emailAddress"]["address"],
            "ana@contoso.com"
        );
        assert_eq!(body["message"]["body"]["contentType"], "text");
        assert_eq!(body["saveToSentItems"], false);
    }

    #[test]
    fn bad_address_is_named() {
        let mail = OutgoingMail {
            subject: "Hi".into(),
            body: "Hello".into(),
            body_type: BodyType::Text,
            to: vec!["not-an-address".into()],
            cc: vec![],
            save_to_sent_items: true,
        };
        assert!(mail.validate().unwrap_err().to_string().contains("not-an-address"));
    }

    #[test]
    fn schedule_interval_is_bounded() {
        let mut query = ScheduleQuery {
            schedules: vec!["room-101@contoso.com".into()],
            window: window(),
            interval_minutes: 30,
        };
        query.validate().unwrap();
        assert_eq!(query.to_graph()["availabilityViewInterval"], 30);
        query.interval_minutes = 2;
        assert!(query.validate().is_err());
    }

    #[test]
    fn free_means_all_zero_and_no_error() {
        let info: ScheduleInformation = serde_json::from_value(serde_json::json!({
            "scheduleId": "room-101@contoso.com",
            "availabilityView": "000",
            "scheduleItems": [],
        }))
        .unwrap();
        assert!(info.is_free());

        let busy: ScheduleInformation = serde_json::from_value(serde_json::json!({
            "scheduleId": "room-101@contoso.com",
            "availabilityView": "020",
        }))
        .unwrap();
        assert!(!busy.is_free());
    }
}
