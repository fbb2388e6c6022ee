use crate::config::Config;
use crate::error::{upstream_error, BotResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

use super::client::GoogleCalendarClient;
use super::models::{Attendee, CalendarEvent, TimeWindow};
use super::token::TokenManager;
use super::CalendarApi;

/// The calendar actor that processes commands one at a time
pub struct GoogleCalendarActor {
    client: GoogleCalendarClient,
    command_rx: mpsc::Receiver<CalendarCommand>,
}

/// Commands that can be sent to the calendar actor
pub enum CalendarCommand {
    ListEvents {
        window: TimeWindow,
        respond_to: mpsc::Sender<BotResult<Vec<CalendarEvent>>>,
    },
    InsertEvent {
        title: String,
        window: TimeWindow,
        attendees: Vec<Attendee>,
        respond_to: mpsc::Sender<BotResult<CalendarEvent>>,
    },
    SearchByAttendee {
        email: String,
        from: DateTime<Utc>,
        respond_to: mpsc::Sender<BotResult<Vec<CalendarEvent>>>,
    },
    Shutdown,
}

/// Handle for communicating with the calendar actor
#[derive(Clone)]
pub struct GoogleCalendarActorHandle {
    command_tx: mpsc::Sender<CalendarCommand>,
}

impl GoogleCalendarActorHandle {
    pub async fn list_events(&self, window: TimeWindow) -> BotResult<Vec<CalendarEvent>> {
        let (respond_to, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(CalendarCommand::ListEvents { window, respond_to })
            .await
            .map_err(|e| upstream_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| upstream_error("Response channel closed"))?
    }

    pub async fn insert_event(
        &self,
        title: String,
        window: TimeWindow,
        attendees: Vec<Attendee>,
    ) -> BotResult<CalendarEvent> {
        let (respond_to, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(CalendarCommand::InsertEvent {
                title,
                window,
                attendees,
                respond_to,
            })
            .await
            .map_err(|e| upstream_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| upstream_error("Response channel closed"))?
    }

    pub async fn search_by_attendee(
        &self,
        email: String,
        from: DateTime<Utc>,
    ) -> BotResult<Vec<CalendarEvent>> {
        let (respond_to, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(CalendarCommand::SearchByAttendee {
                email,
                from,
                respond_to,
            })
            .await
            .map_err(|e| upstream_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| upstream_error("Response channel closed"))?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        let _ = self.command_tx.send(CalendarCommand::Shutdown).await;
        Ok(())
    }
}

impl GoogleCalendarActor {
    /// Create a new actor and return its handle
    pub fn new(
        config: Arc<RwLock<Config>>,
        token_manager: TokenManager,
    ) -> (Self, GoogleCalendarActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            client: GoogleCalendarClient::new(config, token_manager),
            command_rx,
        };

        let handle = GoogleCalendarActorHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Calendar actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                CalendarCommand::ListEvents { window, respond_to } => {
                    let result = self.client.list_events(&window).await;
                    let _ = respond_to.send(result).await;
                }
                CalendarCommand::InsertEvent {
                    title,
                    window,
                    attendees,
                    respond_to,
                } => {
                    let result = self.client.insert_event(&title, &window, &attendees).await;
                    let _ = respond_to.send(result).await;
                }
                CalendarCommand::SearchByAttendee {
                    email,
                    from,
                    respond_to,
                } => {
                    let result = self.client.search_events_by_attendee(&email, from).await;
                    let _ = respond_to.send(result).await;
                }
                CalendarCommand::Shutdown => {
                    info!("Calendar actor shutting down");
                    break;
                }
            }
        }

        info!("Calendar actor shut down");
    }
}
