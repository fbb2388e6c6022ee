use crate::config::Config;
use crate::error::BotResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::actor::{GoogleCalendarActor, GoogleCalendarActorHandle};
use super::models::{Attendee, CalendarEvent, TimeWindow};
use super::token::TokenManager;
use super::CalendarApi;

/// Handle for interacting with the calendar actor. Cloneable; all clones
/// talk to the one spawned actor, which serializes upstream calls.
#[derive(Clone)]
pub struct GoogleCalendarHandle {
    actor_handle: GoogleCalendarActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl GoogleCalendarHandle {
    /// Create a new handle and spawn the actor behind it
    pub fn new(config: Arc<RwLock<Config>>, token_manager: TokenManager) -> Self {
        let (mut actor, handle) = GoogleCalendarActor::new(config, token_manager);

        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        self.actor_handle.shutdown().await
    }
}

#[async_trait::async_trait]
impl CalendarApi for GoogleCalendarHandle {
    async fn list_events(&self, window: &TimeWindow) -> BotResult<Vec<CalendarEvent>> {
        self.actor_handle.list_events(*window).await
    }

    async fn insert_event(
        &self,
        title: &str,
        window: &TimeWindow,
        attendees: &[Attendee],
    ) -> BotResult<CalendarEvent> {
        self.actor_handle
            .insert_event(title.to_string(), *window, attendees.to_vec())
            .await
    }

    async fn search_events_by_attendee(
        &self,
        email: &str,
        from: DateTime<Utc>,
    ) -> BotResult<Vec<CalendarEvent>> {
        self.actor_handle
            .search_by_attendee(email.to_string(), from)
            .await
    }
}
