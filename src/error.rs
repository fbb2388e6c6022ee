use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(deskbotti::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(deskbotti::config))]
    Config(String),

    #[error("Authorization error: {0}")]
    #[diagnostic(code(deskbotti::auth))]
    Auth(String),

    #[error("Token refresh error: {0}")]
    #[diagnostic(code(deskbotti::refresh))]
    Refresh(String),

    #[error("Calendar service error: {0}")]
    #[diagnostic(code(deskbotti::upstream))]
    Upstream(String),

    #[error("Calendar rejected the event: {0}")]
    #[diagnostic(code(deskbotti::conflict))]
    Conflict(String),

    #[error("Slot no longer available: {0}")]
    #[diagnostic(code(deskbotti::slot_conflict))]
    SlotConflict(String),

    #[error("Requested time is in the past: {0}")]
    #[diagnostic(code(deskbotti::past_time))]
    PastTime(String),

    #[error("Outside business hours: {0}")]
    #[diagnostic(code(deskbotti::out_of_hours))]
    OutOfHours(String),

    #[error("Weekends are not bookable: {0}")]
    #[diagnostic(code(deskbotti::weekend))]
    Weekend(String),

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(deskbotti::invalid_argument))]
    InvalidArgument(String),

    #[error(transparent)]
    #[diagnostic(code(deskbotti::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(deskbotti::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(deskbotti::other))]
    Other(String),
}

// Implement From for TOML serialization errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// Implement From for JSON errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type BotResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create authorization errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create token refresh errors
pub fn refresh_error(message: &str) -> Error {
    Error::Refresh(message.to_string())
}

/// Helper to create calendar service errors
pub fn upstream_error(message: &str) -> Error {
    Error::Upstream(message.to_string())
}

/// Helper to create upstream conflict errors
pub fn conflict_error(message: &str) -> Error {
    Error::Conflict(message.to_string())
}

/// Helper to create booking race errors
pub fn slot_conflict_error(message: &str) -> Error {
    Error::SlotConflict(message.to_string())
}

/// Helper to create past-time validation errors
pub fn past_time_error(message: &str) -> Error {
    Error::PastTime(message.to_string())
}

/// Helper to create business-hours validation errors
pub fn out_of_hours_error(message: &str) -> Error {
    Error::OutOfHours(message.to_string())
}

/// Helper to create weekend validation errors
pub fn weekend_error(message: &str) -> Error {
    Error::Weekend(message.to_string())
}

/// Helper to create argument validation errors
pub fn invalid_argument(message: &str) -> Error {
    Error::InvalidArgument(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}

impl Error {
    /// Whether this error is correctable by the end user rephrasing or
    /// choosing a different slot, as opposed to a system fault.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Error::PastTime(_)
                | Error::OutOfHours(_)
                | Error::Weekend(_)
                | Error::InvalidArgument(_)
                | Error::SlotConflict(_)
                | Error::Conflict(_)
        )
    }

    /// Whether the caller may retry the same operation after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Upstream(_) | Error::Refresh(_))
    }
}
