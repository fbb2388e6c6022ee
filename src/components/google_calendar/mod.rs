mod actor;
mod client;
mod handle;
pub mod models;
pub mod time;
pub mod token;

pub use client::GoogleCalendarClient;
pub use handle::GoogleCalendarHandle;
pub use models::{Attendee, CalendarEvent, TimeWindow};

use crate::error::BotResult;
use chrono::{DateTime, Utc};

/// Seam between the calendar service and everything above it. Implemented
/// by the HTTP client, by the actor-backed handle, and by test doubles.
///
/// All operations are idempotent reads except `insert_event`; a retried
/// insert after a transport failure may duplicate-create, and callers
/// must not blindly re-send it.
#[async_trait::async_trait]
pub trait CalendarApi: Send + Sync {
    /// Events inside the window, ascending by start instant
    async fn list_events(&self, window: &TimeWindow) -> BotResult<Vec<CalendarEvent>>;

    /// Create an event spanning exactly the requested window
    async fn insert_event(
        &self,
        title: &str,
        window: &TimeWindow,
        attendees: &[Attendee],
    ) -> BotResult<CalendarEvent>;

    /// Future events where the email appears as an attendee
    async fn search_events_by_attendee(
        &self,
        email: &str,
        from: DateTime<Utc>,
    ) -> BotResult<Vec<CalendarEvent>>;
}
