//! Events API handlers.
//!
//! # Endpoints
//!
//! - `GET  /events`       – list events, `?current=true` keeps only open ones
//! - `POST /events`       – create a new event
//! - `GET  /events/{uid}` – get one event
//! - `PUT  /events/{uid}` – partially update an event

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use kanau::processor::Processor;
use lineprov_core::entities::Event;
use lineprov_core::processors::{UpdateError, UpdateEvent};
use lineprov_core::store::StoreError;
use lineprov_sdk::objects::{CreateEventRequest, EventResponse, ListEventsQuery, UpdateEventRequest};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

/// Build the Events API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{uid}", get(get_event).put(update_event))
}

/// `GET /events`: list events.
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<impl IntoResponse, EventsApiError> {
    let current_only = query.current.unwrap_or(false);
    tracing::info!(current_only, "Listing events");

    let mut events = state.store.list().await.map_err(EventsApiError::Storage)?;
    if current_only {
        let now = time::OffsetDateTime::now_utc();
        events.retain(|event| event.is_current(now));
    }

    Ok(Json(
        events.iter().map(EventResponse::from).collect::<Vec<_>>(),
    ))
}

/// `POST /events`: create a new event.
///
/// Every new event starts as `NotFinished`.
async fn create_event(
    State(state): State<AppState>,
    Json(body): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, EventsApiError> {
    let event = Event::create(body.coefficient, body.deadline);
    state
        .store
        .insert(event.clone())
        .await
        .map_err(EventsApiError::Storage)?;
    tracing::info!(event_id = %event.id, coefficient = %event.coefficient, "Event created");

    Ok((StatusCode::CREATED, Json(EventResponse::from(&event))))
}

/// `GET /events/{uid}`: get one event.
async fn get_event(
    State(state): State<AppState>,
    Path(uid): Path<Uuid>,
) -> Result<impl IntoResponse, EventsApiError> {
    let event = state
        .store
        .get(uid)
        .await
        .map_err(EventsApiError::Storage)?
        .ok_or(EventsApiError::NotFound)?;

    Ok(Json(EventResponse::from(&event)))
}

/// `PUT /events/{uid}`: partially update an event.
///
/// Returns as soon as the store write is committed. A status change is
/// published to the broker afterwards; its outcome is not reported here.
async fn update_event(
    State(state): State<AppState>,
    Path(uid): Path<Uuid>,
    Json(body): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, EventsApiError> {
    tracing::info!(event_id = %uid, update = ?body, "Updating event");

    // Detached so that a client hanging up mid-request cannot cancel a
    // committed write before its notification has been queued.
    let orchestrator = state.orchestrator.clone();
    let updated = tokio::spawn(async move {
        orchestrator
            .process(UpdateEvent {
                id: uid,
                patch: body.into(),
            })
            .await
    })
    .await
    .map_err(|e| EventsApiError::Internal(e.to_string()))??;

    Ok(Json(EventResponse::from(&updated)))
}

/// Error body, shaped `{"detail": "..."}`.
#[derive(Serialize)]
struct ErrorBody {
    detail: &'static str,
}

/// Errors that can occur in Events API handlers.
#[derive(Debug)]
enum EventsApiError {
    /// The requested event was not found.
    NotFound,
    /// The store refused or failed an update.
    UpdateFailed(StoreError),
    /// A store read or insert failed.
    Storage(StoreError),
    /// The update task itself failed.
    Internal(String),
}

impl From<UpdateError> for EventsApiError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::NotFound(_) => EventsApiError::NotFound,
            UpdateError::Storage(e) => EventsApiError::UpdateFailed(e),
        }
    }
}

impl IntoResponse for EventsApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, detail) = match self {
            EventsApiError::NotFound => (StatusCode::NOT_FOUND, "Event Not Found"),
            EventsApiError::UpdateFailed(e) => {
                tracing::error!(error = %e, "Event update failed in storage");
                (StatusCode::INSUFFICIENT_STORAGE, "Update failed")
            }
            EventsApiError::Storage(e) => {
                tracing::error!(error = %e, "Events API storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            EventsApiError::Internal(e) => {
                tracing::error!(error = %e, "Events API internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
