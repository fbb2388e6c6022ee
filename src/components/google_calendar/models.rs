use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Simplified calendar event representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: Option<String>,
    /// Start instant of the event span
    pub start: DateTime<Utc>,
    /// End instant of the event span
    pub end: DateTime<Utc>,
    /// Attendee email addresses in upstream order
    pub attendees: Vec<String>,
    /// Link to the event in the calendar UI, when the service returns one
    pub html_link: Option<String>,
}

/// A guest invited to an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    pub display_name: Option<String>,
}

impl Attendee {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            email: email.to_string(),
            display_name: Some(name.to_string()),
        }
    }
}

/// A half-open time range. Invariant: start < end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted ranges
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Half-open overlap test: a window ending exactly when another
    /// starts does not overlap it.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}
