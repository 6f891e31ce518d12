//! Microsoft Graph client, error taxonomy, and the mailbox/calendar actions
//! graphbox runs through the retrying [`Pipeline`].

pub mod calendar;
pub mod client;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod schedule;
pub mod types;

pub use {
    client::GraphClient,
    error::{ApiError, GraphError},
    pipeline::{DEFAULT_SCOPE, Pipeline, enrich},
    types::{
        BodyType, DateTimeTimeZone, Event, NewInvite, OutgoingMail, ScheduleInformation,
        ScheduleItem, ScheduleQuery, TimeWindow,
    },
};
