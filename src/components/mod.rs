// Export components
pub mod google_calendar;
pub mod scheduling;

// Re-export the calendar seam and handle
pub use google_calendar::{CalendarApi, GoogleCalendarHandle};
