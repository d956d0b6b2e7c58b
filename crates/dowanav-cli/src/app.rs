//! Host-side state for the dowanav CLI.
//!
//! `App` owns the configuration, the session manager and the authenticated
//! API client, and implements the flows the navigation bar drives: startup
//! auth check, login, logout and ad-hoc API calls.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use dowanav_core::api::build_http_client;
use dowanav_core::{
    ApiClient, ApiError, Config, LoginOutcome, MemoryStorage, NavigationStatus, RequestOptions,
    SessionManager, TokenStorage, UserProfile,
};
use reqwest::{Method, StatusCode};
use tracing::{debug, error, info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

const CREDENTIALS_REQUIRED: &str = "Username and password required";

/// Shown when a request was rejected and the session could not be renewed.
pub const SESSION_EXPIRED_MESSAGE: &str =
    "Your session has expired. Please login again with `dowanav login`.";

/// Result of the startup auth check.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Authenticated(UserProfile),
    Unauthenticated,
}

pub struct App {
    pub config: Config,
    pub session: SessionManager,
    pub api: ApiClient,
    /// Config file that records the last username. `None` writes nothing.
    config_path: Option<PathBuf>,
}

impl App {
    /// Create the application with the storage backend the config selects.
    pub fn new(config: Config) -> Result<Self> {
        let storage = config.open_storage()?;
        let config_path = match Config::config_path() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Config file location unavailable");
                None
            }
        };
        Self::with_storage(config, storage, config_path)
    }

    /// Create an application whose session lives only in memory and whose
    /// config is never written back.
    pub fn ephemeral(config: Config) -> Result<Self> {
        Self::with_storage(config, Arc::new(MemoryStorage::new()), None)
    }

    /// Record logins in the config file at `path`.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    fn with_storage(
        config: Config,
        storage: Arc<dyn TokenStorage>,
        config_path: Option<PathBuf>,
    ) -> Result<Self> {
        // One connection pool for auth and API traffic
        let client = build_http_client(&config).context("Failed to build HTTP client")?;
        let session = SessionManager::with_client(client.clone(), &config, storage);
        let api = ApiClient::with_client(client, &config)
            .with_session(session.clone())
            .with_login_required(|| eprintln!("{}", SESSION_EXPIRED_MESSAGE));
        debug!(base_url = %config.base_url, storage = ?config.storage, "App initialized");

        Ok(Self {
            config,
            session,
            api,
            config_path,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Confirm a stored token against the server and refresh the cached
    /// profile.
    ///
    /// The session is cleared only when the server answers with an error
    /// status. Network failures and unreadable bodies leave it in place so the
    /// next run can try again.
    pub async fn check_auth_status(&self) -> AuthStatus {
        if !self.session.is_authenticated() {
            return AuthStatus::Unauthenticated;
        }

        match self.api.fetch_current_user().await {
            Ok(user) => {
                if let Err(e) = self.session.set_current_user(&user) {
                    warn!(error = %e, "Failed to cache user profile");
                }
                info!(username = %user.username, "User authenticated");
                AuthStatus::Authenticated(user)
            }
            Err(e) if e.is_rejection() => {
                warn!(error = %e, "Stored token rejected");
                if let Err(e) = self.session.clear() {
                    warn!(error = %e, "Failed to clear session");
                }
                AuthStatus::Unauthenticated
            }
            Err(e) => {
                error!(error = %e, "Auth check failed");
                AuthStatus::Unauthenticated
            }
        }
    }

    /// Validate credentials and log in.
    ///
    /// On failure the error carries the user-facing message.
    pub async fn attempt_login(&mut self, username: &str, password: &str) -> Result<UserProfile> {
        let (username, password) =
            validate_credentials(username, password).map_err(|msg| anyhow::anyhow!(msg))?;

        match self.session.login(&username, &password).await {
            LoginOutcome::Success { user } => {
                if let Some(ref path) = self.config_path {
                    if let Err(e) = Config::remember_username(path, &username) {
                        warn!(error = %e, "Failed to save config");
                    }
                }
                self.config.last_username = Some(username);
                Ok(user)
            }
            LoginOutcome::Failure { error } => Err(anyhow::anyhow!(error)),
        }
    }

    /// Prompt on the terminal for any credentials not supplied.
    pub async fn login_interactive(&mut self, username: Option<String>) -> Result<UserProfile> {
        let username = match username.or_else(|| std::env::var("DOWANAV_USERNAME").ok()) {
            Some(u) => u,
            None => Self::prompt_username(self.config.last_username.as_deref())?,
        };
        let password = match std::env::var("DOWANAV_PASSWORD") {
            Ok(p) if !p.is_empty() => p,
            _ => rpassword::prompt_password("Password: ")?,
        };

        eprintln!("Authenticating...");
        self.attempt_login(&username, &password).await
    }

    fn prompt_username(last_user: Option<&str>) -> Result<String> {
        match last_user {
            Some(last) => eprint!("Username [{}]: ", last),
            None => eprint!("Username: "),
        }
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();
        if input.is_empty() {
            Ok(last_user.unwrap_or_default().to_string())
        } else {
            Ok(input.to_string())
        }
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub async fn navigation_status(&self) -> Result<NavigationStatus, ApiError> {
        self.api.navigation_status().await
    }

    /// Issue an arbitrary call against the navigation API and return the
    /// final status and body text.
    pub async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(StatusCode, String)> {
        let mut options = RequestOptions::new(method);
        if let Some(body) = body {
            options = options.json(body)?;
        }
        let response = self
            .api
            .request(endpoint, &options)
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;
        let status = response.status();
        let text = response.text().await.context("Failed to read response body")?;
        Ok((status, text))
    }
}

// ============================================================================
// Input validation helpers
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

fn is_valid_field(value: &str, max_len: usize) -> bool {
    value.chars().count() <= max_len && value.chars().all(is_valid_input_char)
}

/// Trim the username and check both fields before any network call.
pub fn validate_credentials(username: &str, password: &str) -> Result<(String, String), &'static str> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(CREDENTIALS_REQUIRED);
    }
    if !is_valid_field(username, MAX_USERNAME_LENGTH) {
        return Err("Username is too long or contains invalid characters");
    }
    if !is_valid_field(password, MAX_PASSWORD_LENGTH) {
        return Err("Password is too long or contains invalid characters");
    }
    Ok((username.to_string(), password.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
