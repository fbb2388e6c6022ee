use crate::config::Config;
use crate::error::{auth_error, refresh_error, BotResult};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// OAuth scope required for reading and booking appointments
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Google OAuth token endpoint
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Refresh this many seconds before nominal expiry so a request already
/// in flight does not outlive its credential
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Persisted OAuth credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp after which the access token is no longer valid
    pub expires_at: i64,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now + EXPIRY_LEEWAY_SECS
    }
}

/// File-backed credential store. The persisted blob is untrusted input:
/// a missing, unreadable, or corrupt file all read as "no credential".
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credential, if there is a usable one
    pub fn load(&self) -> Option<StoredToken> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredToken>(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "Ignoring unreadable credential store {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist the credential. Writes to a temp file and renames it into
    /// place so a concurrent reader never observes a partial write.
    pub fn save(&self, token: &StoredToken) -> BotResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(token)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Credential provider for the calendar service. Acquires lazily, caches
/// through the file store, and refreshes expired tokens in place.
#[derive(Clone)]
pub struct TokenManager {
    config: Arc<RwLock<Config>>,
    client: Client,
    token_url: String,
    /// Serializes refresh-and-persist across concurrent conversations
    refresh_lock: Arc<Mutex<()>>,
}

impl TokenManager {
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        Self {
            config,
            client: Client::new(),
            token_url: TOKEN_ENDPOINT.to_string(),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Point token refresh at a different endpoint (used by tests)
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    async fn store(&self) -> TokenStore {
        let path = {
            let config_read = self.config.read().await;
            config_read.token_store_path.clone()
        };
        TokenStore::new(path)
    }

    /// Get a credential valid for immediate use, refreshing and
    /// persisting it first if the stored one has expired
    pub async fn get_token(&self) -> BotResult<StoredToken> {
        let _guard = self.refresh_lock.lock().await;

        let store = self.store().await;
        let token = store.load().ok_or_else(|| {
            auth_error(&format!(
                "No stored credential at {}. Run the get_calendar_token binary to authorize calendar access.",
                store.path().display()
            ))
        })?;

        if !token.is_expired(Utc::now().timestamp()) {
            return Ok(token);
        }

        if token.refresh_token.is_empty() {
            return Err(auth_error(
                "Stored credential has expired and carries no refresh token. Run the get_calendar_token binary again.",
            ));
        }

        let refreshed = self.refresh(&token).await?;
        store.save(&refreshed)?;
        info!("Refreshed calendar credential");
        Ok(refreshed)
    }

    /// Exchange the refresh token for a fresh access token
    async fn refresh(&self, token: &StoredToken) -> BotResult<StoredToken> {
        let (client_id, client_secret) = {
            let config_read = self.config.read().await;
            (
                config_read.google_client_id.clone(),
                config_read.google_client_secret.clone(),
            )
        };

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", token.refresh_token.clone()),
            ("grant_type", "refresh_token".to_string()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| refresh_error(&format!("Failed to refresh token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(refresh_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error_body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| refresh_error(&format!("Failed to parse token response: {}", e)))?;

        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| refresh_error("Token response missing 'access_token' field"))?
            .to_string();

        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .unwrap_or(3600);

        Ok(StoredToken {
            access_token,
            refresh_token: token.refresh_token.clone(),
            expires_at: Utc::now().timestamp() + expires_in,
            scopes: token.scopes.clone(),
        })
    }

    /// Persist an externally acquired credential (called by the
    /// interactive consent flow)
    pub async fn set_token(&self, token: StoredToken) -> BotResult<()> {
        let _guard = self.refresh_lock.lock().await;
        self.store().await.save(&token)
    }
}
