pub mod availability;
pub mod booking;

pub use availability::{
    busy_intervals, day_window, free_slots, nearest_slot, today_window, week_window, BusyInterval,
    BUSINESS_CLOSE_HOUR, BUSINESS_OPEN_HOUR, SLOT_MINUTES,
};
pub use booking::{BookingService, SlotCandidate};
