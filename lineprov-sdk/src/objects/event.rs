//! Event request and response types for the HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coefficient::Coefficient;
use super::status::EventStatus;

/// An event as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub uid: Uuid,
    pub coefficient: Coefficient,
    pub status: EventStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: time::OffsetDateTime,
}

/// Request body for `POST /events`.
///
/// New events always start as [`EventStatus::NotFinished`], so there is no
/// status field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub coefficient: Coefficient,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: time::OffsetDateTime,
}

/// Request body for `PUT /events/{uid}`.
///
/// Partial update: omitted fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficient: Option<Coefficient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub deadline: Option<time::OffsetDateTime>,
}

/// Query string for `GET /events`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEventsQuery {
    /// Only return events whose deadline has not passed yet.
    #[serde(default)]
    pub current: Option<bool>,
}
