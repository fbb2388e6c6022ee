use crate::components::google_calendar::models::{Attendee, CalendarEvent, TimeWindow};
use crate::components::google_calendar::time::format_local;
use crate::components::google_calendar::CalendarApi;
use crate::error::{
    out_of_hours_error, past_time_error, slot_conflict_error, weekend_error, BotResult,
};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::availability::{self, BUSINESS_CLOSE_HOUR, BUSINESS_OPEN_HOUR, SLOT_MINUTES};

/// A window proposed for booking, fixed to the appointment length
#[derive(Debug, Clone, Copy)]
pub struct SlotCandidate {
    window: TimeWindow,
}

impl SlotCandidate {
    /// Candidate appointment beginning at the given instant
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            window: TimeWindow {
                start,
                end: start + Duration::minutes(SLOT_MINUTES),
            },
        }
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

/// Books validated appointment slots through the calendar seam.
///
/// Validation happens here, not in the calendar client, so a suggestion
/// that went stale between `nearest_slot` and the user's confirmation is
/// caught by a fresh conflict check immediately before insertion.
pub struct BookingService {
    calendar: Arc<dyn CalendarApi>,
    tz: Tz,
    title: String,
    /// Serializes the conflict re-check and the insert, so two
    /// conversations racing for one slot resolve to a single winner
    commit_lock: Mutex<()>,
}

impl BookingService {
    pub fn new(calendar: Arc<dyn CalendarApi>, tz: Tz, title: impl Into<String>) -> Self {
        Self {
            calendar,
            tz,
            title: title.into(),
            commit_lock: Mutex::new(()),
        }
    }

    /// Validate the candidate and create the appointment. Failures are
    /// guidance the conversation can relay: a past start, a slot outside
    /// 08:00-20:00, a weekend day, or a slot taken in the meantime.
    pub async fn book(
        &self,
        candidate: SlotCandidate,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> BotResult<CalendarEvent> {
        let window = candidate.window();
        let local_start = window.start.with_timezone(&self.tz);
        let local_end = window.end.with_timezone(&self.tz);

        if window.start <= now {
            return Err(past_time_error(&format!(
                "{} has already passed; please pick a future time",
                format_local(window.start, self.tz)
            )));
        }

        let opens = BUSINESS_OPEN_HOUR * 60;
        let closes = BUSINESS_CLOSE_HOUR * 60;
        let start_minutes = local_start.hour() * 60 + local_start.minute();
        let end_minutes = local_end.hour() * 60 + local_end.minute();
        let crosses_midnight = local_start.date_naive() != local_end.date_naive();
        let ends_after_close =
            end_minutes > closes || (end_minutes == closes && local_end.second() > 0);
        if crosses_midnight || start_minutes < opens || ends_after_close {
            return Err(out_of_hours_error(&format!(
                "Appointments run {:02}:00 to {:02}:00; {} does not fit",
                BUSINESS_OPEN_HOUR,
                BUSINESS_CLOSE_HOUR,
                format_local(window.start, self.tz)
            )));
        }

        if matches!(local_start.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(weekend_error(&format!(
                "{} falls on a weekend; appointments are Monday to Friday",
                local_start.date_naive()
            )));
        }

        // Fresh busy data immediately before insertion closes the window
        // between suggesting a slot and committing it
        let _guard = self.commit_lock.lock().await;

        let day = availability::day_window(local_start.date_naive(), self.tz)?;
        let events = self.calendar.list_events(&day).await?;
        let busy = availability::busy_intervals(&events);
        if busy.iter().any(|interval| interval.blocks(&window)) {
            return Err(slot_conflict_error(&format!(
                "The {} slot was just taken; please choose another time",
                format_local(window.start, self.tz)
            )));
        }

        let attendees = vec![Attendee::new(name, email)];
        let event = self
            .calendar
            .insert_event(&self.title, &window, &attendees)
            .await?;

        info!(
            "Booked {} at {} for {}",
            self.title,
            format_local(window.start, self.tz),
            email
        );

        Ok(event)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}
