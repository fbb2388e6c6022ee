use crate::components::google_calendar::models::{CalendarEvent, TimeWindow};
use crate::components::google_calendar::time::{format_local, parse_local_datetime};
use crate::components::scheduling::{
    busy_intervals, free_slots, nearest_slot, today_window, week_window, SlotCandidate,
    SLOT_MINUTES,
};
use crate::error::{invalid_argument, slot_conflict_error, BotResult, Error};
use chrono::{DateTime, Datelike, Utc, Weekday};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, Toolbox};

/// Arguments for booking an appointment
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateEventParams {
    /// Appointment start in clinic-local time, e.g. 2026-03-02T15:00:00
    pub start_time: String,
    /// Full name of the patient
    pub user_name: String,
    /// Email address the invitation is registered to
    pub user_email: String,
}

/// Arguments for looking up a guest's appointments
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchEventsParams {
    /// Email address of the guest to look up
    pub guest_email: String,
}

fn render_event(event: &CalendarEvent, tz: Tz, with_attendees: bool) -> Value {
    let mut rendered = json!({
        "summary": event.summary.clone().unwrap_or_else(|| "No Title".to_string()),
        "start": format_local(event.start, tz),
        "end": format_local(event.end, tz),
    });
    if with_attendees {
        rendered["attendees"] = json!(event.attendees);
    }
    rendered
}

fn render_slots(slots: impl Iterator<Item = TimeWindow>, tz: Tz) -> Vec<String> {
    slots.map(|slot| format_local(slot.start, tz)).collect()
}

/// The clinic calendar for the current day, with the open slots already
/// computed so the model never derives availability itself
pub(crate) async fn get_today_events(toolbox: &Toolbox) -> BotResult<Value> {
    let tz = toolbox.tz;
    let now = Utc::now();
    let local_now = now.with_timezone(&tz);
    let window = today_window(local_now)?;

    let events = toolbox.calendar.list_events(&window).await?;
    let busy = busy_intervals(&events);

    let weekend = matches!(local_now.weekday(), Weekday::Sat | Weekday::Sun);
    let open_slots = if weekend {
        Vec::new()
    } else {
        // only slots that have not already started
        match TimeWindow::new(now.max(window.start), window.end) {
            Some(remaining) => render_slots(free_slots(&busy, remaining, tz, SLOT_MINUTES), tz),
            None => Vec::new(),
        }
    };

    let message = if weekend {
        Some("The clinic is closed on weekends; appointments run Monday to Friday.")
    } else if events.is_empty() {
        Some("No appointments scheduled for today.")
    } else {
        None
    };

    Ok(json!({
        "date": local_now.date_naive().to_string(),
        "events": events.iter().map(|e| render_event(e, tz, false)).collect::<Vec<_>>(),
        "free_slots": open_slots,
        "message": message,
    }))
}

/// The clinic calendar for the remaining business week. On a weekend the
/// window already starts the following Monday.
pub(crate) async fn get_week_events(toolbox: &Toolbox) -> BotResult<Value> {
    let tz = toolbox.tz;
    let local_now = Utc::now().with_timezone(&tz);
    let window = week_window(local_now)?;

    let events = toolbox.calendar.list_events(&window).await?;
    let busy = busy_intervals(&events);
    let open_slots = render_slots(free_slots(&busy, window, tz, SLOT_MINUTES), tz);

    let message = if events.is_empty() {
        Some("No appointments scheduled for the remaining workweek.")
    } else {
        None
    };

    Ok(json!({
        "from": format_local(window.start, tz),
        "to": format_local(window.end, tz),
        "events": events.iter().map(|e| render_event(e, tz, false)).collect::<Vec<_>>(),
        "free_slots": open_slots,
        "message": message,
    }))
}

/// Book a 30-minute appointment. On a booking race, the error carries
/// the nearest still-open slot so the conversation can offer it.
pub(crate) async fn create_event(toolbox: &Toolbox, arguments: Value) -> BotResult<Value> {
    let params: CreateEventParams = parse_args(arguments)?;

    let name = params.user_name.trim();
    if name.is_empty() {
        return Err(invalid_argument("user_name must not be empty"));
    }
    let email = params.user_email.trim();
    validate_email(email)?;

    let tz = toolbox.tz;
    let start = parse_local_datetime(&params.start_time, tz)?;
    let candidate = SlotCandidate::starting_at(start);

    match toolbox.booking.book(candidate, name, email, Utc::now()).await {
        Ok(event) => Ok(json!({
            "id": event.id,
            "summary": event.summary,
            "start": format_local(event.start, tz),
            "end": format_local(event.end, tz),
            "html_link": event.html_link,
        })),
        Err(Error::SlotConflict(message)) => match suggest_alternative(toolbox, start).await {
            Some(slot) => Err(slot_conflict_error(&format!(
                "{}. The nearest open {}-minute slot starts at {}",
                message,
                SLOT_MINUTES,
                format_local(slot.start, tz)
            ))),
            None => Err(Error::SlotConflict(message)),
        },
        Err(error) => Err(error),
    }
}

/// Future appointments where the given email appears as a guest
pub(crate) async fn search_events_by_guest_email(
    toolbox: &Toolbox,
    arguments: Value,
) -> BotResult<Value> {
    let params: SearchEventsParams = parse_args(arguments)?;
    let email = params.guest_email.trim();
    validate_email(email)?;

    let tz = toolbox.tz;
    let events = toolbox
        .calendar
        .search_events_by_attendee(email, Utc::now())
        .await?;

    let message = if events.is_empty() {
        Some(format!("No upcoming appointments found for {}.", email))
    } else {
        None
    };

    Ok(json!({
        "events": events.iter().map(|e| render_event(e, tz, true)).collect::<Vec<_>>(),
        "message": message,
    }))
}

/// The upstream model passes through whatever the user typed; accept
/// only something shaped like an address
fn validate_email(email: &str) -> BotResult<()> {
    let valid = email.len() >= 3
        && email.contains('@')
        && !email.starts_with('@')
        && !email.ends_with('@')
        && !email.contains(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(invalid_argument(&format!(
            "'{}' does not look like an email address",
            email
        )))
    }
}

/// Best-effort alternative for a lost race; failures here must not mask
/// the original booking error
async fn suggest_alternative(toolbox: &Toolbox, after: DateTime<Utc>) -> Option<TimeWindow> {
    let window = week_window(after.with_timezone(&toolbox.tz)).ok()?;
    let events = toolbox.calendar.list_events(&window).await.ok()?;
    let busy = busy_intervals(&events);
    nearest_slot(&busy, after, toolbox.tz).ok().flatten()
}
