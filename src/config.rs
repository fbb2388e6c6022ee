use crate::error::{config_error, env_error, BotResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

/// Default event title for booked appointments
pub const DEFAULT_APPOINTMENT_TITLE: &str = "Dentist Appointment";

/// Default business timezone for the clinic calendar
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Main configuration structure for the assistant core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google Calendar API client ID
    pub google_client_id: String,
    /// Google Calendar API client secret
    pub google_client_secret: String,
    /// Calendar identity all operations are scoped to
    pub google_calendar_id: String,
    /// Business timezone (fixed, never auto-detected)
    pub timezone: String,
    /// Path of the persisted OAuth credential
    pub token_store_path: String,
    /// Title used for events created by the booking operation
    pub appointment_title: String,
    /// Whether the calendar service should email invitations to attendees
    pub send_email_updates: bool,
    /// Upper bound for a single calendar API call, in seconds
    pub http_timeout_secs: u64,
}

/// Optional overrides loaded from `config/settings.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Overrides {
    timezone: Option<String>,
    token_store_path: Option<String>,
    appointment_title: Option<String>,
    send_email_updates: Option<bool>,
    http_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> BotResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        // Required environment variables
        let google_client_id =
            env::var("GOOGLE_CLIENT_ID").map_err(|_| env_error("GOOGLE_CLIENT_ID"))?;
        let google_client_secret =
            env::var("GOOGLE_CLIENT_SECRET").map_err(|_| env_error("GOOGLE_CLIENT_SECRET"))?;

        // "primary" addresses the main calendar of the authorized account
        let google_calendar_id =
            env::var("GOOGLE_CALENDAR_ID").unwrap_or_else(|_| String::from("primary"));

        let timezone =
            env::var("BUSINESS_TIMEZONE").unwrap_or_else(|_| String::from(DEFAULT_TIMEZONE));

        let token_store_path =
            env::var("TOKEN_STORE_PATH").unwrap_or_else(|_| String::from("config/token.json"));

        let appointment_title = env::var("APPOINTMENT_TITLE")
            .unwrap_or_else(|_| String::from(DEFAULT_APPOINTMENT_TITLE));

        let send_email_updates = env::var("SEND_EMAIL_UPDATES")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let mut config = Config {
            google_client_id,
            google_client_secret,
            google_calendar_id,
            timezone,
            token_store_path,
            appointment_title,
            send_email_updates,
            http_timeout_secs,
        };

        // Apply overrides from file if it exists
        if let Ok(content) = fs::read_to_string("config/settings.toml") {
            if let Ok(overrides) = toml::from_str::<Overrides>(&content) {
                config.apply(overrides);
            }
        }

        Ok(config)
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(timezone) = overrides.timezone {
            self.timezone = timezone;
        }
        if let Some(token_store_path) = overrides.token_store_path {
            self.token_store_path = token_store_path;
        }
        if let Some(appointment_title) = overrides.appointment_title {
            self.appointment_title = appointment_title;
        }
        if let Some(send_email_updates) = overrides.send_email_updates {
            self.send_email_updates = send_email_updates;
        }
        if let Some(http_timeout_secs) = overrides.http_timeout_secs {
            self.http_timeout_secs = http_timeout_secs;
        }
    }

    /// Parse the configured business timezone
    pub fn tz(&self) -> BotResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Invalid timezone: {}", self.timezone)))
    }
}
