use chrono::Utc;
use deskbotti::components::google_calendar::token::{StoredToken, TokenManager, CALENDAR_SCOPE};
use deskbotti::config::Config;
use deskbotti::error::{other_error, refresh_error, BotResult};
use std::sync::Arc;
use tokio::sync::RwLock;

const REDIRECT_URI: &str = "http://localhost:8080";

#[tokio::main]
async fn main() -> BotResult<()> {
    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(RwLock::new(config));

    // Create token manager backed by the configured file store
    let token_manager = TokenManager::new(config.clone());

    // Get client ID and secret
    let client_id = config.read().await.google_client_id.clone();
    let client_secret = config.read().await.google_client_secret.clone();

    // Generate random state for security
    let state = uuid::Uuid::new_v4().to_string();

    // Construct authorization URL
    let auth_url = url::Url::parse_with_params(
        "https://accounts.google.com/o/oauth2/v2/auth",
        &[
            ("client_id", client_id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("scope", CALENDAR_SCOPE),
            ("state", state.as_str()),
        ],
    )
    .map_err(|e| other_error(&format!("Failed to build authorization URL: {}", e)))?;

    // Open browser for authorization
    println!("Opening browser for Google Calendar authorization...");
    webbrowser::open(auth_url.as_str())?;

    // Start local server to receive the callback
    let server = tiny_http::Server::http("0.0.0.0:8080")
        .map_err(|e| other_error(&format!("Failed to start callback listener: {}", e)))?;
    println!("Waiting for authorization callback...");

    // Handle the callback
    let request = server.recv()?;
    let callback_url = request.url().to_string();

    // Parse the authorization code and state from the callback query
    let query = callback_url.split('?').nth(1).unwrap_or("");
    let mut code = None;
    let mut returned_state = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => returned_state = Some(value.into_owned()),
            _ => {}
        }
    }

    let code = code.ok_or_else(|| other_error("No authorization code found in callback"))?;
    if returned_state.as_deref() != Some(state.as_str()) {
        return Err(other_error("State mismatch in authorization callback"));
    }

    // Exchange code for tokens
    let client = reqwest::Client::new();
    let response = client
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", REDIRECT_URI.to_string()),
            ("grant_type", "authorization_code".to_string()),
        ])
        .send()
        .await
        .map_err(|e| refresh_error(&format!("Failed to exchange authorization code: {}", e)))?;

    if !response.status().is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(refresh_error(&format!("Failed to get token: {}", error_text)));
    }

    let token_data: serde_json::Value = response
        .json()
        .await
        .map_err(|e| refresh_error(&format!("Failed to parse token response: {}", e)))?;

    let access_token = token_data
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| refresh_error("Token response missing 'access_token' field"))?
        .to_string();

    let refresh_token = token_data
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| refresh_error("Token response missing 'refresh_token' field"))?
        .to_string();

    let expires_in = token_data
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .unwrap_or(3600);

    // Save token through the manager
    token_manager
        .set_token(StoredToken {
            access_token,
            refresh_token,
            expires_at: Utc::now().timestamp() + expires_in,
            scopes: vec![CALENDAR_SCOPE.to_string()],
        })
        .await?;

    // Send success response to browser
    let response =
        tiny_http::Response::from_string("Authorization successful! You can close this window.");
    request.respond(response)?;

    let store_path = config.read().await.token_store_path.clone();
    println!("Token successfully saved to {}", store_path);

    Ok(())
}
