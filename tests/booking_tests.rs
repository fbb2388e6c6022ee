use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use deskbotti::components::google_calendar::models::{Attendee, CalendarEvent, TimeWindow};
use deskbotti::components::google_calendar::CalendarApi;
use deskbotti::components::scheduling::{nearest_slot, BookingService, BusyInterval, SlotCandidate};
use deskbotti::error::{BotResult, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

fn tz() -> Tz {
    "America/New_York".parse().unwrap()
}

/// Local clinic time; 2026-03-02 is a Monday
fn instant(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    tz().with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// In-memory calendar standing in for the remote service
#[derive(Default)]
struct MockCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    next_id: AtomicUsize,
}

impl MockCalendar {
    async fn seed(&self, start: DateTime<Utc>, end: DateTime<Utc>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.events.lock().await.push(CalendarEvent {
            id: format!("seed{}", id),
            summary: Some("Existing appointment".to_string()),
            start,
            end,
            attendees: Vec::new(),
            html_link: None,
        });
    }

    async fn count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn list_events(&self, window: &TimeWindow) -> BotResult<Vec<CalendarEvent>> {
        let mut events: Vec<CalendarEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|event| window.start < event.end && event.start < window.end)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start);
        Ok(events)
    }

    async fn insert_event(
        &self,
        title: &str,
        window: &TimeWindow,
        attendees: &[Attendee],
    ) -> BotResult<CalendarEvent> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = CalendarEvent {
            id: format!("evt{}", id),
            summary: Some(title.to_string()),
            start: window.start,
            end: window.end,
            attendees: attendees.iter().map(|a| a.email.clone()).collect(),
            html_link: Some(format!("https://calendar.example/evt{}", id)),
        };
        self.events.lock().await.push(event.clone());
        Ok(event)
    }

    async fn search_events_by_attendee(
        &self,
        email: &str,
        from: DateTime<Utc>,
    ) -> BotResult<Vec<CalendarEvent>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|event| event.end > from)
            .filter(|event| event.attendees.iter().any(|a| a.eq_ignore_ascii_case(email)))
            .cloned()
            .collect())
    }
}

fn service(calendar: &Arc<MockCalendar>) -> BookingService {
    let api: Arc<dyn CalendarApi> = calendar.clone();
    BookingService::new(api, tz(), "Dentist Appointment")
}

#[tokio::test]
async fn booking_a_free_slot_succeeds() {
    let calendar = Arc::new(MockCalendar::default());
    let booking = service(&calendar);

    let now = instant(2026, 3, 2, 8, 0);
    let candidate = SlotCandidate::starting_at(instant(2026, 3, 4, 10, 0));

    let event = booking
        .book(candidate, "John Doe", "johndoe@example.com", now)
        .await
        .unwrap();

    assert_eq!(event.start, instant(2026, 3, 4, 10, 0));
    assert_eq!(event.end, instant(2026, 3, 4, 10, 30));
    assert_eq!(event.attendees, vec!["johndoe@example.com".to_string()]);
    assert!(event.html_link.is_some());
    assert_eq!(calendar.count().await, 1);
}

#[tokio::test]
async fn booking_in_the_past_is_rejected_first() {
    let calendar = Arc::new(MockCalendar::default());
    let booking = service(&calendar);

    // a past Sunday: the past check fires before the weekend check
    let now = instant(2026, 3, 2, 10, 0);
    let candidate = SlotCandidate::starting_at(instant(2026, 3, 1, 10, 0));

    let result = booking.book(candidate, "John Doe", "j@example.com", now).await;
    assert!(matches!(result, Err(Error::PastTime(_))));
    assert_eq!(calendar.count().await, 0);
}

#[tokio::test]
async fn booking_one_hour_ago_is_rejected() {
    let calendar = Arc::new(MockCalendar::default());
    let booking = service(&calendar);

    let now = instant(2026, 3, 4, 11, 0);
    let candidate = SlotCandidate::starting_at(instant(2026, 3, 4, 10, 0));

    let result = booking.book(candidate, "John Doe", "j@example.com", now).await;
    assert!(matches!(result, Err(Error::PastTime(_))));
}

#[tokio::test]
async fn booking_before_opening_is_rejected() {
    let calendar = Arc::new(MockCalendar::default());
    let booking = service(&calendar);

    let now = instant(2026, 3, 2, 8, 0);
    let candidate = SlotCandidate::starting_at(instant(2026, 3, 4, 7, 30));

    let result = booking.book(candidate, "John Doe", "j@example.com", now).await;
    assert!(matches!(result, Err(Error::OutOfHours(_))));
}

#[tokio::test]
async fn booking_that_would_end_after_close_is_rejected() {
    let calendar = Arc::new(MockCalendar::default());
    let booking = service(&calendar);

    let now = instant(2026, 3, 2, 8, 0);
    // starts inside hours but ends 20:15
    let candidate = SlotCandidate::starting_at(instant(2026, 3, 4, 19, 45));

    let result = booking.book(candidate, "John Doe", "j@example.com", now).await;
    assert!(matches!(result, Err(Error::OutOfHours(_))));
}

#[tokio::test]
async fn booking_on_saturday_is_rejected() {
    let calendar = Arc::new(MockCalendar::default());
    let booking = service(&calendar);

    let now = instant(2026, 3, 2, 8, 0);
    let candidate = SlotCandidate::starting_at(instant(2026, 3, 7, 10, 0));

    let result = booking.book(candidate, "John Doe", "j@example.com", now).await;
    assert!(matches!(result, Err(Error::Weekend(_))));
}

#[tokio::test]
async fn booking_an_occupied_slot_is_rejected() {
    let calendar = Arc::new(MockCalendar::default());
    calendar
        .seed(instant(2026, 3, 4, 10, 0), instant(2026, 3, 4, 10, 30))
        .await;
    let booking = service(&calendar);

    let now = instant(2026, 3, 2, 8, 0);

    // exact collision
    let result = booking
        .book(
            SlotCandidate::starting_at(instant(2026, 3, 4, 10, 0)),
            "John Doe",
            "j@example.com",
            now,
        )
        .await;
    assert!(matches!(result, Err(Error::SlotConflict(_))));

    // partial overlap collides too
    let result = booking
        .book(
            SlotCandidate::starting_at(instant(2026, 3, 4, 10, 15)),
            "John Doe",
            "j@example.com",
            now,
        )
        .await;
    assert!(matches!(result, Err(Error::SlotConflict(_))));

    // back to back is fine: the occupied slot ends exactly as this starts
    let result = booking
        .book(
            SlotCandidate::starting_at(instant(2026, 3, 4, 10, 30)),
            "John Doe",
            "j@example.com",
            now,
        )
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn nearest_slot_can_be_booked_immediately() {
    let calendar = Arc::new(MockCalendar::default());
    calendar
        .seed(instant(2026, 3, 2, 9, 30), instant(2026, 3, 2, 10, 0))
        .await;
    let booking = service(&calendar);

    let now = instant(2026, 3, 2, 9, 5);
    let busy = vec![BusyInterval {
        start: instant(2026, 3, 2, 9, 30),
        end: instant(2026, 3, 2, 10, 0),
    }];

    let slot = nearest_slot(&busy, now, tz()).unwrap().unwrap();
    assert_eq!(slot.start, instant(2026, 3, 2, 10, 0));

    let result = booking
        .book(SlotCandidate::starting_at(slot.start), "John Doe", "j@example.com", now)
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn concurrent_bookings_of_one_slot_have_a_single_winner() {
    let calendar = Arc::new(MockCalendar::default());
    let booking = Arc::new(service(&calendar));

    let now = instant(2026, 3, 2, 8, 0);
    let candidate = SlotCandidate::starting_at(instant(2026, 3, 4, 10, 0));

    let first = {
        let booking = Arc::clone(&booking);
        tokio::spawn(async move { booking.book(candidate, "Alice", "alice@example.com", now).await })
    };
    let second = {
        let booking = Arc::clone(&booking);
        tokio::spawn(async move { booking.book(candidate, "Bob", "bob@example.com", now).await })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert!(first.is_ok() != second.is_ok(), "exactly one booking must win");
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(Error::SlotConflict(_))));
    assert_eq!(calendar.count().await, 1);
}
