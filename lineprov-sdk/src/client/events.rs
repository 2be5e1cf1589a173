//! Events API client (bet-maker → line provider).

use reqwest::Client;
use url::Url;
use uuid::Uuid;

use super::{ClientError, parse_response};
use crate::objects::{CreateEventRequest, EventResponse, UpdateEventRequest};

/// Typed HTTP client for the `/events` API.
#[derive(Debug, Clone)]
pub struct LineProviderClient {
    http: Client,
    base_url: Url,
}

impl LineProviderClient {
    /// Create a new client rooted at `base_url` (e.g. `http://line-provider:8080`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /events` – list events, optionally only those still open.
    pub async fn list_events(&self, current_only: bool) -> Result<Vec<EventResponse>, ClientError> {
        let mut url = self.base_url.join("/events")?;
        if current_only {
            url.query_pairs_mut().append_pair("current", "true");
        }
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /events/{uid}` – fetch a single event.
    pub async fn get_event(&self, uid: Uuid) -> Result<EventResponse, ClientError> {
        let url = self.base_url.join(&format!("/events/{uid}"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `POST /events` – create a new event.
    pub async fn create_event(
        &self,
        request: &CreateEventRequest,
    ) -> Result<EventResponse, ClientError> {
        let url = self.base_url.join("/events")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `PUT /events/{uid}` – partially update an event.
    pub async fn update_event(
        &self,
        uid: Uuid,
        request: &UpdateEventRequest,
    ) -> Result<EventResponse, ClientError> {
        let url = self.base_url.join(&format!("/events/{uid}"))?;
        let resp = self.http.put(url).json(request).send().await?;
        parse_response(resp).await
    }
}
