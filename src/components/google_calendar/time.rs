use crate::error::{invalid_argument, upstream_error, BotResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::models::TimeWindow;

/// Wire representation of an event boundary. Timed events carry
/// `dateTime`, all-day events carry `date`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    /// Wire value for a concrete instant, tagged with the business timezone
    pub fn from_instant(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            date_time: Some(instant.with_timezone(&tz).to_rfc3339()),
            date: None,
            time_zone: Some(tz.name().to_string()),
        }
    }

    /// Resolve the boundary to an instant. All-day `date` values resolve
    /// to local midnight (the service already makes the end date
    /// exclusive). Returns `None` when the service sent neither form.
    pub fn instant(&self, tz: Tz) -> BotResult<Option<DateTime<Utc>>> {
        if let Some(date_time) = &self.date_time {
            let parsed = DateTime::parse_from_rfc3339(date_time).map_err(|e| {
                upstream_error(&format!("Failed to parse event time '{}': {}", date_time, e))
            })?;
            return Ok(Some(parsed.with_timezone(&Utc)));
        }
        if let Some(date) = &self.date {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
                upstream_error(&format!("Failed to parse event date '{}': {}", date, e))
            })?;
            let midnight = day
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| upstream_error("Failed to create datetime"))?;
            let instant = local_to_utc(midnight, tz).map_err(|_| {
                upstream_error(&format!("Could not resolve all-day boundary {} in {}", day, tz))
            })?;
            return Ok(Some(instant));
        }
        Ok(None)
    }
}

/// Resolve a naive local datetime in the given timezone, rejecting
/// ambiguous and nonexistent wall-clock times
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> BotResult<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(_, _) => Err(invalid_argument(&format!(
            "{} is ambiguous in {} (clocks change that night); pick another time",
            naive, tz
        ))),
        chrono::LocalResult::None => Err(invalid_argument(&format!(
            "{} does not exist in {} (clocks change that night); pick another time",
            naive, tz
        ))),
    }
}

/// Parse a free-text local date-time supplied by the agent runtime.
/// The upstream model is not a trusted caller, so accept only a few
/// unambiguous shapes and reject everything else with guidance.
pub fn parse_local_datetime(text: &str, tz: Tz) -> BotResult<DateTime<Utc>> {
    let text = text.trim();
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
        .map_err(|_| {
            invalid_argument(&format!(
                "Could not parse '{}' as a date and time; expected YYYY-MM-DDTHH:MM:SS",
                text
            ))
        })?;
    local_to_utc(naive, tz)
}

/// Format an instant for the agent to read back, in the business timezone
pub fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).to_rfc3339()
}

/// Resolve an event resource's span to a window, skipping events the
/// service returned without usable boundaries (e.g. cancellations)
pub fn event_window(start: &EventTime, end: &EventTime, tz: Tz) -> BotResult<Option<TimeWindow>> {
    let start = start.instant(tz)?;
    let end = end.instant(tz)?;
    match (start, end) {
        (Some(start), Some(end)) => Ok(TimeWindow::new(start, end)),
        _ => Ok(None),
    }
}
