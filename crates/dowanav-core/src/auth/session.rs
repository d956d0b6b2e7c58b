use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::{build_http_client, ApiError};
use crate::config::Config;
use crate::models::{
    ErrorBody, LoginOutcome, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    UserProfile,
};

use super::storage::{StorageError, StorageResult, TokenStorage};

/// Storage key of the access token
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Storage key of the JSON-encoded user profile
pub const USER_KEY: &str = "current_user";

const LOGIN_FAILED: &str = "Login failed";
const NETWORK_ERROR: &str = "Network error";
const STORE_FAILED: &str = "Failed to store session";

struct Inner {
    client: Client,
    storage: Arc<dyn TokenStorage>,
    login_url: String,
    refresh_url: String,
    logout_url: String,
    /// Serializes refresh exchanges so concurrent 401s share one network call.
    refresh_lock: Mutex<()>,
}

/// Owns the persisted session (access token, refresh token, cached profile)
/// and talks to the auth endpoints.
///
/// Clone is cheap; clones share storage, the connection pool and the refresh
/// lock.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a session manager with its own HTTP client.
    pub fn new(config: &Config, storage: Arc<dyn TokenStorage>) -> Result<Self, ApiError> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(client, config, storage))
    }

    /// Create a session manager sharing an existing connection pool.
    pub fn with_client(client: Client, config: &Config, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                storage,
                login_url: config.auth_url("login"),
                refresh_url: config.auth_url("refresh"),
                logout_url: config.auth_url("logout"),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    // ===== Accessors =====

    fn read(&self, key: &str) -> Option<String> {
        match self.inner.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read session storage");
                None
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> StorageResult<()> {
        self.inner.storage.set(TOKEN_KEY, token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.inner.storage.set(REFRESH_TOKEN_KEY, token)
    }

    /// Cached profile; an undecodable record reads as absent.
    pub fn current_user(&self) -> Option<UserProfile> {
        let json = self.read(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Failed to parse cached user profile");
                None
            }
        }
    }

    pub fn set_current_user(&self, user: &UserProfile) -> StorageResult<()> {
        let json = serde_json::to_string(user)?;
        self.inner.storage.set(USER_KEY, &json)
    }

    /// Remove all three session keys. Every removal is attempted; the first
    /// error, if any, is returned.
    pub fn clear(&self) -> StorageResult<()> {
        let mut first_err: Option<StorageError> = None;
        for key in [TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.inner.storage.remove(key) {
                warn!(key = key, error = %e, "Failed to remove session key");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Presence of an access token is all that counts; expiry is discovered
    /// by the server answering 401.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    // ===== Auth endpoints =====

    /// Exchange credentials for a session.
    pub async fn login(&self, username: &str, password: &str) -> LoginOutcome {
        let response = match self
            .inner
            .client
            .post(&self.inner.login_url)
            .json(&LoginRequest { username, password })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Login request failed");
                return LoginOutcome::Failure {
                    error: NETWORK_ERROR.to_string(),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| LOGIN_FAILED.to_string());
            warn!(status = %status, "Login rejected");
            return LoginOutcome::Failure { error: message };
        }

        let data: LoginResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "Failed to parse login response");
                return LoginOutcome::Failure {
                    error: LOGIN_FAILED.to_string(),
                };
            }
        };

        if let Err(e) = self.store_login(&data) {
            error!(error = %e, "Failed to persist session after login");
            return LoginOutcome::Failure {
                error: STORE_FAILED.to_string(),
            };
        }

        info!(username = %data.user.username, "Login successful");
        LoginOutcome::Success { user: data.user }
    }

    fn store_login(&self, data: &LoginResponse) -> StorageResult<()> {
        let user = serde_json::to_string(&data.user)?;
        let mut writes = vec![(TOKEN_KEY, data.access_token.as_str())];
        if let Some(ref refresh) = data.refresh_token {
            writes.push((REFRESH_TOKEN_KEY, refresh.as_str()));
        }
        writes.push((USER_KEY, user.as_str()));
        self.write_all(&writes)
    }

    /// Write several keys as one unit. If any write fails, every key touched
    /// so far is put back to its previous value before the error is returned.
    fn write_all(&self, writes: &[(&str, &str)]) -> StorageResult<()> {
        let storage = &self.inner.storage;
        let mut previous: Vec<(&str, Option<String>)> = Vec::with_capacity(writes.len());
        for &(key, _) in writes {
            previous.push((key, storage.get(key)?));
        }

        for (done, &(key, value)) in writes.iter().enumerate() {
            if let Err(e) = storage.set(key, value) {
                for (key, old) in previous.iter().take(done + 1) {
                    let restored = match old {
                        Some(old) => storage.set(key, old),
                        None => storage.remove(key),
                    };
                    if let Err(restore_err) = restored {
                        error!(key = *key, error = %restore_err, "Failed to restore session key");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns false without any network call when no refresh token is
    /// stored. Nothing is written unless the exchange fully succeeds.
    pub async fn refresh(&self) -> bool {
        let _guard = self.inner.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh on behalf of a request that was rejected while carrying
    /// `stale`.
    ///
    /// Waits for any refresh already in flight. If the stored token has
    /// changed from `stale` by then, that refresh is reused and no new
    /// exchange is made.
    pub async fn refresh_after(&self, stale: Option<&str>) -> bool {
        let _guard = self.inner.refresh_lock.lock().await;
        if let Some(current) = self.token() {
            if Some(current.as_str()) != stale {
                debug!("Token already replaced by a concurrent refresh");
                return true;
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let Some(refresh_token) = self.refresh_token() else {
            debug!("No refresh token stored, skipping refresh");
            return false;
        };

        let response = match self
            .inner
            .client
            .post(&self.inner.refresh_url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Token refresh failed");
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Token refresh rejected");
            return false;
        }

        let data: RefreshResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "Failed to parse refresh response");
                return false;
            }
        };

        let mut writes = vec![(TOKEN_KEY, data.access_token.as_str())];
        if let Some(ref rotated) = data.refresh_token {
            writes.push((REFRESH_TOKEN_KEY, rotated.as_str()));
        }
        if let Err(e) = self.write_all(&writes) {
            error!(error = %e, "Failed to persist refreshed token");
            return false;
        }

        info!(rotated = data.refresh_token.is_some(), "Access token refreshed");
        true
    }

    /// Best-effort server logout followed by an unconditional local clear.
    pub async fn logout(&self) {
        if let Some(token) = self.token() {
            match self
                .inner
                .client
                .post(&self.inner.logout_url)
                .bearer_auth(&token)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    debug!("Server session closed");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Logout rejected by server");
                }
                Err(e) => {
                    warn!(error = %e, "Logout failed");
                }
            }
        }

        if let Err(e) = self.clear() {
            error!(error = %e, "Failed to clear local session");
        }
        info!("Logged out");
    }
}
