use chrono::{TimeZone, Utc};
use deskbotti::components::google_calendar::models::{Attendee, TimeWindow};
use deskbotti::components::google_calendar::token::{StoredToken, TokenManager, TokenStore};
use deskbotti::components::google_calendar::{CalendarApi, GoogleCalendarClient};
use deskbotti::config::Config;
use deskbotti::error::Error;
use mockito::Matcher;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

fn base_config(token_path: &Path) -> Arc<RwLock<Config>> {
    Arc::new(RwLock::new(Config {
        google_client_id: "client-id".to_string(),
        google_client_secret: "client-secret".to_string(),
        google_calendar_id: "primary".to_string(),
        timezone: "America/New_York".to_string(),
        token_store_path: token_path.to_string_lossy().into_owned(),
        appointment_title: "Dentist Appointment".to_string(),
        send_email_updates: false,
        http_timeout_secs: 5,
    }))
}

fn seed_token(token_path: &Path, expires_in: i64) {
    TokenStore::new(token_path)
        .save(&StoredToken {
            access_token: "test-access".to_string(),
            refresh_token: "test-refresh".to_string(),
            expires_at: Utc::now().timestamp() + expires_in,
            scopes: vec![],
        })
        .unwrap();
}

/// Client wired to the mock server with a valid stored credential
fn client_for(server: &mockito::ServerGuard, dir: &tempfile::TempDir) -> GoogleCalendarClient {
    let token_path = dir.path().join("token.json");
    seed_token(&token_path, 3600);
    let config = base_config(&token_path);
    GoogleCalendarClient::new(config.clone(), TokenManager::new(config)).with_api_base(server.url())
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn event_json(id: &str, start: &str, end: &str) -> serde_json::Value {
    json!({
        "id": id,
        "summary": "Checkup",
        "htmlLink": format!("https://calendar.example/{}", id),
        "start": { "dateTime": start },
        "end": { "dateTime": end },
        "attendees": [{ "email": "pat@example.com", "displayName": "Pat" }],
    })
}

/// The exact query the client sends for a listing, built the same way
fn list_query(window: &TimeWindow) -> String {
    let mut url = url::Url::parse("http://localhost/").unwrap();
    url.query_pairs_mut()
        .append_pair("timeMin", &window.start.to_rfc3339())
        .append_pair("timeMax", &window.end.to_rfc3339())
        .append_pair("singleEvents", "true")
        .append_pair("orderBy", "startTime")
        .append_pair("maxResults", "250");
    url.query().unwrap().to_string()
}

#[tokio::test]
async fn list_events_exhausts_all_pages() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server, &dir);

    let window = TimeWindow::new(utc(2026, 3, 4, 13, 0), utc(2026, 3, 4, 15, 0)).unwrap();
    let first_query = list_query(&window);
    let second_query = format!("{}&pageToken=tok2", first_query);

    let page1 = server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Exact(first_query))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [event_json("e1", "2026-03-04T08:00:00-05:00", "2026-03-04T08:30:00-05:00")],
                "nextPageToken": "tok2",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let page2 = server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Exact(second_query))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [event_json("e2", "2026-03-04T09:00:00-05:00", "2026-03-04T09:30:00-05:00")],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let events = client.list_events(&window).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, "e1");
    assert_eq!(events[1].id, "e2");
    // 08:00 Eastern is 13:00 UTC
    assert_eq!(events[0].start, utc(2026, 3, 4, 13, 0));
    assert_eq!(events[0].attendees, vec!["pat@example.com".to_string()]);

    page1.assert_async().await;
    page2.assert_async().await;
}

#[tokio::test]
async fn all_day_events_span_their_local_day() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server, &dir);

    let window = TimeWindow::new(utc(2026, 3, 4, 0, 0), utc(2026, 3, 5, 0, 0)).unwrap();
    let _mock = server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::UrlEncoded("singleEvents".into(), "true".into()))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [{
                    "id": "closure",
                    "summary": "Clinic closed",
                    "start": { "date": "2026-03-04" },
                    "end": { "date": "2026-03-05" },
                }],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let events = client.list_events(&window).await.unwrap();

    assert_eq!(events.len(), 1);
    // local midnight in America/New_York is 05:00 UTC
    assert_eq!(events[0].start, utc(2026, 3, 4, 5, 0));
    assert_eq!(events[0].end, utc(2026, 3, 5, 5, 0));
}

#[tokio::test]
async fn server_failure_is_an_upstream_error() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server, &dir);

    let _mock = server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let window = TimeWindow::new(utc(2026, 3, 4, 13, 0), utc(2026, 3, 4, 15, 0)).unwrap();
    let result = client.list_events(&window).await;
    assert!(matches!(result, Err(Error::Upstream(_))));
}

#[tokio::test]
async fn insert_event_sends_the_exact_window() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server, &dir);

    let insert = server
        .mock("POST", "/calendars/primary/events")
        .match_query(Matcher::UrlEncoded("sendUpdates".into(), "none".into()))
        .match_body(Matcher::PartialJson(json!({
            "summary": "Dentist Appointment",
            "start": { "dateTime": "2026-03-04T10:00:00-05:00" },
            "end": { "dateTime": "2026-03-04T10:30:00-05:00" },
            "attendees": [{ "email": "johndoe@example.com", "displayName": "John Doe" }],
        })))
        .with_header("content-type", "application/json")
        .with_body(
            event_json("created", "2026-03-04T10:00:00-05:00", "2026-03-04T10:30:00-05:00")
                .to_string(),
        )
        .create_async()
        .await;

    // 10:00 Eastern
    let window = TimeWindow::new(utc(2026, 3, 4, 15, 0), utc(2026, 3, 4, 15, 30)).unwrap();
    let event = client
        .insert_event(
            "Dentist Appointment",
            &window,
            &[Attendee::new("John Doe", "johndoe@example.com")],
        )
        .await
        .unwrap();

    assert_eq!(event.id, "created");
    assert_eq!(event.start, window.start);
    assert_eq!(event.end, window.end);
    assert!(event.html_link.is_some());
    insert.assert_async().await;
}

#[tokio::test]
async fn upstream_rejection_is_a_conflict() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server, &dir);

    let _mock = server
        .mock("POST", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .with_status(409)
        .with_body(json!({"error": {"message": "The requested identifier already exists."}}).to_string())
        .create_async()
        .await;

    let window = TimeWindow::new(utc(2026, 3, 4, 15, 0), utc(2026, 3, 4, 15, 30)).unwrap();
    let result = client
        .insert_event("Dentist Appointment", &window, &[])
        .await;
    assert!(matches!(result, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn search_filters_to_the_requested_guest() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server, &dir);

    let _mock = server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::UrlEncoded("orderBy".into(), "startTime".into()))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [
                    event_json("match", "2026-03-04T08:00:00-05:00", "2026-03-04T08:30:00-05:00"),
                    {
                        "id": "other",
                        "summary": "Staff meeting",
                        "start": { "dateTime": "2026-03-04T09:00:00-05:00" },
                        "end": { "dateTime": "2026-03-04T09:30:00-05:00" },
                    },
                ],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let events = client
        .search_events_by_attendee("pat@example.com", utc(2026, 3, 1, 0, 0))
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "match");
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");

    TokenStore::new(&token_path)
        .save(&StoredToken {
            access_token: "stale".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: Utc::now().timestamp() - 10,
            scopes: vec![],
        })
        .unwrap();

    let refresh = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(json!({"access_token": "fresh", "expires_in": 3600}).to_string())
        .create_async()
        .await;

    let manager = TokenManager::new(base_config(&token_path))
        .with_token_url(format!("{}/token", server.url()));

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.access_token, "fresh");
    assert_eq!(token.refresh_token, "refresh-1");
    assert!(!token.is_expired(Utc::now().timestamp()));

    // the refreshed credential is persisted for the next run
    let stored = TokenStore::new(&token_path).load().unwrap();
    assert_eq!(stored.access_token, "fresh");
    refresh.assert_async().await;
}

#[tokio::test]
async fn missing_credential_asks_for_interactive_consent() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");

    let manager = TokenManager::new(base_config(&token_path));
    let result = manager.get_token().await;
    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn corrupt_credential_store_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    std::fs::write(&token_path, "definitely { not json").unwrap();

    let manager = TokenManager::new(base_config(&token_path));
    let result = manager.get_token().await;
    assert!(matches!(result, Err(Error::Auth(_))));
}
