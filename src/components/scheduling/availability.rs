use crate::components::google_calendar::models::{CalendarEvent, TimeWindow};
use crate::error::{other_error, BotResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// First bookable hour of a business day, local time
pub const BUSINESS_OPEN_HOUR: u32 = 8;
/// Hour the clinic closes; slots must end at or before it
pub const BUSINESS_CLOSE_HOUR: u32 = 20;
/// Appointment length
pub const SLOT_MINUTES: i64 = 30;

/// An occupied span derived from an existing event. Never persisted;
/// exists only for availability computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<&CalendarEvent> for BusyInterval {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            start: event.start,
            end: event.end,
        }
    }
}

impl BusyInterval {
    /// Half-open overlap: a slot ending exactly when this interval
    /// starts is not blocked by it.
    pub fn blocks(&self, window: &TimeWindow) -> bool {
        window.start < self.end && self.start < window.end
    }
}

/// Derive busy intervals from a day's or week's events
pub fn busy_intervals(events: &[CalendarEvent]) -> Vec<BusyInterval> {
    events.iter().map(BusyInterval::from).collect()
}

/// Resolve a local wall-clock time to an instant. When clocks fall back
/// and the time occurs twice, the first occurrence wins.
fn local_instant(date: NaiveDate, hour: u32, minute: u32, second: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, second)?;
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(first, _) => Some(first.with_timezone(&Utc)),
        chrono::LocalResult::None => None,
    }
}

/// Window spanning one calendar day, local midnight to 23:59:59
pub fn day_window(date: NaiveDate, tz: Tz) -> BotResult<TimeWindow> {
    let start = local_instant(date, 0, 0, 0, tz)
        .ok_or_else(|| other_error(&format!("Could not resolve local midnight on {}", date)))?;
    let end = local_instant(date, 23, 59, 59, tz)
        .ok_or_else(|| other_error(&format!("Could not resolve end of day on {}", date)))?;
    TimeWindow::new(start, end).ok_or_else(|| other_error("Day window collapsed"))
}

/// Window spanning the calendar day of `now`
pub fn today_window(now: DateTime<Tz>) -> BotResult<TimeWindow> {
    day_window(now.date_naive(), now.timezone())
}

/// Window spanning the remaining business week. On a weekend this starts
/// the following Monday at local midnight; on a business day it starts at
/// `now` itself, so the partial current day stays queryable. Ends at
/// 23:59:59 on that week's Friday.
pub fn week_window(now: DateTime<Tz>) -> BotResult<TimeWindow> {
    let tz = now.timezone();
    let weekday = now.weekday();

    let (start, anchor) = if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        let days_to_monday = (7 - weekday.num_days_from_monday()) as i64;
        let monday = now.date_naive() + Duration::days(days_to_monday);
        let start = local_instant(monday, 0, 0, 0, tz).ok_or_else(|| {
            other_error(&format!("Could not resolve local midnight on {}", monday))
        })?;
        (start, monday)
    } else {
        (now.with_timezone(&Utc), now.date_naive())
    };

    let days_until_friday =
        (Weekday::Fri.num_days_from_monday() - anchor.weekday().num_days_from_monday()) as i64;
    let friday = anchor + Duration::days(days_until_friday);
    let end = local_instant(friday, 23, 59, 59, tz)
        .ok_or_else(|| other_error(&format!("Could not resolve end of day on {}", friday)))?;

    TimeWindow::new(start, end)
        .ok_or_else(|| other_error("Business week has already ended at the given instant"))
}

/// All free, slot-aligned candidate windows inside `window` clamped to
/// business hours, ascending by start. A pure function of its inputs:
/// calling it again restarts the sequence.
pub fn free_slots(
    busy: &[BusyInterval],
    window: TimeWindow,
    tz: Tz,
    slot_minutes: i64,
) -> impl Iterator<Item = TimeWindow> {
    let slot_minutes = slot_minutes.max(1);
    FreeSlots {
        cursor: align_up(window.start, tz, slot_minutes),
        window_end: window.end,
        tz,
        slot: Duration::minutes(slot_minutes),
        busy: busy.to_vec(),
    }
}

/// First free slot starting at or after `after`, within the remaining
/// business week. `None` means no availability before Friday close, a
/// normal negative result.
pub fn nearest_slot(
    busy: &[BusyInterval],
    after: DateTime<Utc>,
    tz: Tz,
) -> BotResult<Option<TimeWindow>> {
    let window = week_window(after.with_timezone(&tz))?;
    Ok(free_slots(busy, window, tz, SLOT_MINUTES).next())
}

struct FreeSlots {
    cursor: DateTime<Utc>,
    window_end: DateTime<Utc>,
    tz: Tz,
    slot: Duration,
    busy: Vec<BusyInterval>,
}

impl Iterator for FreeSlots {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        loop {
            if self.cursor >= self.window_end {
                return None;
            }

            let local = self.cursor.with_timezone(&self.tz);
            let date = local.date_naive();

            // Before opening: move up to today's first slot
            if local.hour() < BUSINESS_OPEN_HOUR {
                let Some(open) = local_instant(date, BUSINESS_OPEN_HOUR, 0, 0, self.tz) else {
                    self.cursor += Duration::days(1);
                    continue;
                };
                self.cursor = open;
                continue;
            }

            // Past the last slot that still fits before closing: move to
            // the next day's opening
            let Some(close) = local_instant(date, BUSINESS_CLOSE_HOUR, 0, 0, self.tz) else {
                self.cursor += Duration::days(1);
                continue;
            };
            let end = self.cursor + self.slot;
            if end > close {
                let Some(next_open) =
                    local_instant(date + Duration::days(1), BUSINESS_OPEN_HOUR, 0, 0, self.tz)
                else {
                    self.cursor += Duration::days(1);
                    continue;
                };
                self.cursor = next_open;
                continue;
            }

            if end > self.window_end {
                return None;
            }

            let slot = TimeWindow {
                start: self.cursor,
                end,
            };
            self.cursor = end;

            if self.busy.iter().any(|interval| interval.blocks(&slot)) {
                continue;
            }
            return Some(slot);
        }
    }
}

/// Round an instant up to the next slot boundary on the local wall clock
fn align_up(instant: DateTime<Utc>, tz: Tz, slot_minutes: i64) -> DateTime<Utc> {
    let local = instant.with_timezone(&tz);
    let total_minutes = local.hour() as i64 * 60 + local.minute() as i64;
    let has_subminute = local.second() > 0 || local.nanosecond() > 0;
    let remainder = total_minutes % slot_minutes;

    if remainder == 0 && !has_subminute {
        return instant;
    }

    let aligned_minutes = total_minutes - remainder + slot_minutes;
    let date = local.date_naive();
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return instant;
    };
    let naive = midnight + Duration::minutes(aligned_minutes);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        chrono::LocalResult::None => instant,
    }
}
