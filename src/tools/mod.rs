//! The boundary the hosted conversational model calls through.
//!
//! Tools are the only way the model reaches the calendar: each one has a
//! fixed argument schema, validates its free-text-derived inputs, and
//! returns a structured value the model can read back into conversation.
//! Which tools a conversational role may call is declarative data, not
//! duplicated control flow.

mod calendar;

use crate::components::google_calendar::CalendarApi;
use crate::components::scheduling::BookingService;
use crate::error::{invalid_argument, BotResult, Error};
use chrono_tz::Tz;
use schemars::schema_for;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub use calendar::{CreateEventParams, SearchEventsParams};

pub const TOOL_GET_TODAY_EVENTS: &str = "get_today_events";
pub const TOOL_GET_WEEK_EVENTS: &str = "get_week_events";
pub const TOOL_CREATE_EVENT: &str = "create_event";
pub const TOOL_SEARCH_BY_GUEST_EMAIL: &str = "search_events_by_guest_email";
pub const TOOL_LIST_TOOLS: &str = "list_tools";

/// Every tool the core exposes
pub const ALL_TOOL_NAMES: &[&str] = &[
    TOOL_GET_TODAY_EVENTS,
    TOOL_GET_WEEK_EVENTS,
    TOOL_CREATE_EVENT,
    TOOL_SEARCH_BY_GUEST_EMAIL,
    TOOL_LIST_TOOLS,
];

/// Callable tool description handed to the agent runtime
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: schemars::schema::RootSchema,
}

/// Empty argument schema for tools that take none
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct EmptyParams {}

/// Which tools and handoffs one conversational role sees
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgentProfile {
    pub name: &'static str,
    pub description: &'static str,
    pub tools: &'static [&'static str],
    pub handoffs: &'static [&'static str],
}

/// The greeting role: checks availability, collects patient details,
/// then hands off to the booking role
pub const FRONT_DESK: AgentProfile = AgentProfile {
    name: "front_desk",
    description: "Front desk assistant for checking appointment availability",
    tools: &[
        TOOL_GET_TODAY_EVENTS,
        TOOL_GET_WEEK_EVENTS,
        TOOL_SEARCH_BY_GUEST_EMAIL,
    ],
    handoffs: &["new_appointment"],
};

/// The booking role: creates the confirmed appointment
pub const NEW_APPOINTMENT: AgentProfile = AgentProfile {
    name: "new_appointment",
    description: "Booking role that finalizes a confirmed appointment",
    tools: &[TOOL_CREATE_EVENT],
    handoffs: &[],
};

pub fn agent_profiles() -> &'static [AgentProfile] {
    &[FRONT_DESK, NEW_APPOINTMENT]
}

/// Specs for every exposed tool
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: TOOL_GET_TODAY_EVENTS,
            description:
                "Fetch the clinic calendar for the current day, including the open 30-minute slots",
            parameters: schema_for!(EmptyParams),
        },
        ToolSpec {
            name: TOOL_GET_WEEK_EVENTS,
            description: "Fetch the clinic calendar for the remaining business week (Monday to Friday), including the open 30-minute slots",
            parameters: schema_for!(EmptyParams),
        },
        ToolSpec {
            name: TOOL_CREATE_EVENT,
            description: "Book a 30-minute appointment at the given local start time for the named patient",
            parameters: schema_for!(CreateEventParams),
        },
        ToolSpec {
            name: TOOL_SEARCH_BY_GUEST_EMAIL,
            description: "Search future appointments where the given email address is a guest",
            parameters: schema_for!(SearchEventsParams),
        },
        ToolSpec {
            name: TOOL_LIST_TOOLS,
            description: "List the available tools and agent profiles",
            parameters: schema_for!(EmptyParams),
        },
    ]
}

/// One line of the tool server's stdin
#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Deserialize tool arguments, surfacing schema mismatches as guidance
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> BotResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| invalid_argument(&format!("Invalid tool arguments: {}", e)))
}

fn error_code(error: &Error) -> &'static str {
    match error {
        Error::Environment(_) => "environment",
        Error::Config(_) => "config",
        Error::Auth(_) => "auth",
        Error::Refresh(_) => "refresh",
        Error::Upstream(_) => "upstream",
        Error::Conflict(_) => "conflict",
        Error::SlotConflict(_) => "slot_conflict",
        Error::PastTime(_) => "past_time",
        Error::OutOfHours(_) => "out_of_hours",
        Error::Weekend(_) => "weekend",
        Error::InvalidArgument(_) => "invalid_argument",
        Error::Io(_) => "io",
        Error::Serialization(_) => "serialization",
        Error::Other(_) => "other",
    }
}

/// Serialize an error for the agent runtime. `validation` errors carry
/// guidance the conversation should relay to the user; `transient` ones
/// deserve an apology and a retry; `fatal` ones neither.
pub fn error_payload(error: &Error) -> Value {
    let kind = if error.is_user_correctable() {
        "validation"
    } else if error.is_transient() {
        "transient"
    } else {
        "fatal"
    };
    json!({
        "code": error_code(error),
        "kind": kind,
        "message": error.to_string(),
    })
}

/// Dispatches validated tool calls from the agent runtime
pub struct Toolbox {
    pub(crate) calendar: Arc<dyn CalendarApi>,
    pub(crate) booking: Arc<BookingService>,
    pub(crate) tz: Tz,
}

impl Toolbox {
    pub fn new(calendar: Arc<dyn CalendarApi>, booking: Arc<BookingService>, tz: Tz) -> Self {
        Self {
            calendar,
            booking,
            tz,
        }
    }

    /// Route one tool call. Unknown names are a caller error, not a
    /// crash.
    pub async fn dispatch(&self, tool: &str, arguments: Value) -> BotResult<Value> {
        match tool {
            TOOL_GET_TODAY_EVENTS => calendar::get_today_events(self).await,
            TOOL_GET_WEEK_EVENTS => calendar::get_week_events(self).await,
            TOOL_CREATE_EVENT => calendar::create_event(self, arguments).await,
            TOOL_SEARCH_BY_GUEST_EMAIL => {
                calendar::search_events_by_guest_email(self, arguments).await
            }
            TOOL_LIST_TOOLS => Ok(json!({
                "tools": tool_specs(),
                "profiles": agent_profiles(),
            })),
            other => Err(invalid_argument(&format!("Unknown tool: {}", other))),
        }
    }

    /// Handle one request line. Every failure path becomes a response
    /// payload; nothing here may take the host process down.
    pub async fn handle_line(&self, line: &str) -> Value {
        match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => {
                let id = request.id.clone();
                match self.dispatch(&request.tool, request.arguments).await {
                    Ok(result) => json!({ "id": id, "ok": true, "result": result }),
                    Err(error) => json!({ "id": id, "ok": false, "error": error_payload(&error) }),
                }
            }
            Err(e) => json!({
                "id": null,
                "ok": false,
                "error": {
                    "code": "invalid_request",
                    "kind": "validation",
                    "message": format!("Could not parse tool request: {}", e),
                },
            }),
        }
    }
}
