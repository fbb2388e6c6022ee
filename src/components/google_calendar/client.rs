use crate::config::Config;
use crate::error::{conflict_error, upstream_error, BotResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;
use url::Url;

use super::models::{Attendee, CalendarEvent, TimeWindow};
use super::time::{event_window, EventTime};
use super::token::TokenManager;
use super::CalendarApi;

/// Base URL of the calendar REST API
const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// One page of an event listing
#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<EventResource>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Wire representation of a single event
#[derive(Debug, Deserialize)]
struct EventResource {
    id: String,
    summary: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
    #[serde(default)]
    start: EventTime,
    #[serde(default)]
    end: EventTime,
    #[serde(default)]
    attendees: Vec<AttendeeResource>,
}

#[derive(Debug, Deserialize)]
struct AttendeeResource {
    email: Option<String>,
}

impl EventResource {
    /// Convert to the domain event, skipping resources the service
    /// returned without a usable time span (e.g. cancellations)
    fn into_event(self, tz: Tz) -> BotResult<Option<CalendarEvent>> {
        let window = match event_window(&self.start, &self.end, tz)? {
            Some(window) => window,
            None => {
                warn!("Skipping event {} without a usable time span", self.id);
                return Ok(None);
            }
        };
        let attendees = self
            .attendees
            .into_iter()
            .filter_map(|a| a.email)
            .collect();
        Ok(Some(CalendarEvent {
            id: self.id,
            summary: self.summary,
            start: window.start,
            end: window.end,
            attendees,
            html_link: self.html_link,
        }))
    }
}

/// Thin typed wrapper over the remote calendar API, scoped to the single
/// configured calendar identity
#[derive(Clone)]
pub struct GoogleCalendarClient {
    config: Arc<RwLock<Config>>,
    token_manager: TokenManager,
    client: Client,
    api_base: String,
}

impl GoogleCalendarClient {
    pub fn new(config: Arc<RwLock<Config>>, token_manager: TokenManager) -> Self {
        Self {
            config,
            token_manager,
            client: Client::new(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Point the client at a different API base (used by tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn request_context(&self) -> BotResult<(String, Tz, Duration)> {
        let config_read = self.config.read().await;
        let tz = config_read.tz()?;
        Ok((
            config_read.google_calendar_id.clone(),
            tz,
            Duration::from_secs(config_read.http_timeout_secs),
        ))
    }

    fn events_url(&self, calendar_id: &str) -> BotResult<Url> {
        let url_str = format!("{}/calendars/{}/events", self.api_base, calendar_id);
        Url::parse(&url_str).map_err(|e| upstream_error(&format!("Failed to parse URL: {}", e)))
    }

    /// Fetch every page of an event listing, converting as we go
    async fn fetch_all_pages(
        &self,
        base_url: Url,
        access_token: &str,
        tz: Tz,
        timeout: Duration,
    ) -> BotResult<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = base_url.clone();
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let response = self
                .client
                .get(url)
                .header("Authorization", format!("Bearer {}", access_token))
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| upstream_error(&format!("Failed to fetch events: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Could not read error response".to_string());
                return Err(upstream_error(&format!(
                    "Failed to fetch events: HTTP {} - {}",
                    status, error_body
                )));
            }

            let page: EventsPage = response
                .json()
                .await
                .map_err(|e| upstream_error(&format!("Failed to parse events response: {}", e)))?;

            for resource in page.items {
                if let Some(event) = resource.into_event(tz)? {
                    events.push(event);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }
}

#[async_trait::async_trait]
impl CalendarApi for GoogleCalendarClient {
    /// List events inside the window, ascending by start instant.
    /// An empty listing is a valid result, distinct from failure.
    async fn list_events(&self, window: &TimeWindow) -> BotResult<Vec<CalendarEvent>> {
        let (calendar_id, tz, timeout) = self.request_context().await?;
        let token = self.token_manager.get_token().await?;

        let mut url = self.events_url(&calendar_id)?;
        url.query_pairs_mut()
            .append_pair("timeMin", &window.start.to_rfc3339())
            .append_pair("timeMax", &window.end.to_rfc3339())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime")
            .append_pair("maxResults", "250");

        self.fetch_all_pages(url, &token.access_token, tz, timeout)
            .await
    }

    /// Create an event spanning exactly the requested window. Conflict
    /// checking is the booking operation's job; this layer only surfaces
    /// a rejection by the service itself.
    async fn insert_event(
        &self,
        title: &str,
        window: &TimeWindow,
        attendees: &[Attendee],
    ) -> BotResult<CalendarEvent> {
        let (calendar_id, tz, timeout) = self.request_context().await?;
        let token = self.token_manager.get_token().await?;

        let send_updates = {
            let config_read = self.config.read().await;
            if config_read.send_email_updates {
                "all"
            } else {
                "none"
            }
        };

        let mut url = self.events_url(&calendar_id)?;
        url.query_pairs_mut().append_pair("sendUpdates", send_updates);

        let body = serde_json::json!({
            "summary": title,
            "start": EventTime::from_instant(window.start, tz),
            "end": EventTime::from_instant(window.end, tz),
            "attendees": attendees
                .iter()
                .map(|a| serde_json::json!({
                    "email": a.email,
                    "displayName": a.display_name,
                }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", token.access_token))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| upstream_error(&format!("Failed to create event: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            if status == reqwest::StatusCode::CONFLICT {
                return Err(conflict_error(&format!(
                    "Calendar service rejected the event: {}",
                    error_body
                )));
            }
            return Err(upstream_error(&format!(
                "Failed to create event: HTTP {} - {}",
                status, error_body
            )));
        }

        let resource: EventResource = response
            .json()
            .await
            .map_err(|e| upstream_error(&format!("Failed to parse event response: {}", e)))?;

        let event = resource
            .into_event(tz)?
            .ok_or_else(|| upstream_error("Created event came back without a time span"))?;

        if event.start != window.start || event.end != window.end {
            warn!(
                "Calendar service adjusted the requested window: asked {} - {}, got {} - {}",
                window.start, window.end, event.start, event.end
            );
        }

        Ok(event)
    }

    /// Search future events where the given email is an attendee,
    /// exhausting all pages before returning
    async fn search_events_by_attendee(
        &self,
        email: &str,
        from: DateTime<Utc>,
    ) -> BotResult<Vec<CalendarEvent>> {
        let (calendar_id, tz, timeout) = self.request_context().await?;
        let token = self.token_manager.get_token().await?;

        let mut url = self.events_url(&calendar_id)?;
        url.query_pairs_mut()
            .append_pair("timeMin", &from.to_rfc3339())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime")
            .append_pair("maxResults", "250");

        let events = self
            .fetch_all_pages(url, &token.access_token, tz, timeout)
            .await?;

        Ok(events
            .into_iter()
            .filter(|event| {
                event
                    .attendees
                    .iter()
                    .any(|attendee| attendee.eq_ignore_ascii_case(email))
            })
            .collect())
    }
}
