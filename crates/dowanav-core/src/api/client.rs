//! API client for the navigation backend.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests against `/api/navigation/*` with transparent token refresh.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::SessionManager;
use crate::config::Config;
use crate::models::{NavigationStatus, UserProfile};

use super::ApiError;

/// Host route reporting whether the navigation extension is loaded
const STATUS_PATH: &str = "/dowa/navigation/status";

/// Endpoint returning the profile of the token's owner
const CURRENT_USER_ENDPOINT: &str = "/user/me";

/// Build the shared HTTP client with the configured request timeout.
pub fn build_http_client(config: &Config) -> Result<Client, ApiError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?)
}

/// Notified when a request was rejected and the session could not be
/// refreshed. The owner is expected to prompt for a fresh login.
pub trait LoginRequired: Send + Sync {
    fn login_required(&self);
}

impl<F> LoginRequired for F
where
    F: Fn() + Send + Sync,
{
    fn login_required(&self) {
        self()
    }
}

/// Method, body and header overrides of a single call.
///
/// The same options are used for the first send and for the retry after a
/// token refresh; only the bearer header differs between the two.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<String>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// JSON-encode `body` as the request payload.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

/// API client for the navigation backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    origin: String,
    api_base: String,
    session: Option<SessionManager>,
    login_required: Option<Arc<dyn LoginRequired>>,
}

impl ApiClient {
    /// Create a new API client with its own connection pool
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    /// Create a new API client sharing an existing connection pool
    pub fn with_client(client: Client, config: &Config) -> Self {
        let origin = config.origin().to_string();
        let api_base = format!("{}{}", origin, config.api_base_path.trim_end_matches('/'));
        Self {
            client,
            origin,
            api_base,
            session: None,
            login_required: None,
        }
    }

    /// Attach the session manager that supplies tokens and refreshes them.
    pub fn with_session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    /// Install the handler invoked when re-authentication is needed.
    pub fn with_login_required<L: LoginRequired + 'static>(mut self, handler: L) -> Self {
        self.login_required = Some(Arc::new(handler));
        self
    }

    pub fn session(&self) -> Option<&SessionManager> {
        self.session.as_ref()
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.is_empty() || endpoint.starts_with('/') {
            format!("{}{}", self.api_base, endpoint)
        } else {
            format!("{}/{}", self.api_base, endpoint)
        }
    }

    fn current_token(&self) -> Option<String> {
        self.session.as_ref().and_then(|s| s.token())
    }

    /// Default JSON content type, then caller overrides, then the bearer
    /// token which always wins when present.
    fn build_headers(options: &RequestOptions, token: Option<&str>) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(options.headers.clone());

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn send(
        &self,
        url: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let mut builder = self
            .client
            .request(options.method.clone(), url)
            .headers(Self::build_headers(options, token)?);
        if let Some(ref body) = options.body {
            builder = builder.body(body.clone());
        }

        builder.send().await.map_err(|e| {
            error!(url = url, error = %e, "API request failed");
            ApiError::from(e)
        })
    }

    /// Send a request to `endpoint` under the navigation API base path.
    ///
    /// A 401 with a session attached triggers one refresh. If it succeeds the
    /// request is sent a second time with the new token and that response is
    /// returned whatever its status. If it fails the session is cleared, the
    /// login-required handler fires, and the original 401 is returned.
    /// Transport errors are returned as `ApiError::NetworkError` and never
    /// retried.
    pub async fn request(&self, endpoint: &str, options: &RequestOptions) -> Result<Response, ApiError> {
        let url = self.url(endpoint);

        // Initial send
        let token = self.current_token();
        let response = self.send(&url, options, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(ref session) = self.session else {
            return Ok(response);
        };

        debug!(url = %url, "Received 401, attempting token refresh");
        if session.refresh_after(token.as_deref()).await {
            // Retry send: final, whatever the status
            info!(url = %url, "Token refreshed, retrying request");
            let token = session.token();
            return self.send(&url, options, token.as_deref()).await;
        }

        warn!(url = %url, "Token refresh failed, login required");
        if let Err(e) = session.clear() {
            error!(error = %e, "Failed to clear session after refresh failure");
        }
        self.notify_login_required();
        Ok(response)
    }

    fn notify_login_required(&self) {
        match self.login_required {
            Some(ref handler) => handler.login_required(),
            None => debug!("No login-required handler installed"),
        }
    }

    // ===== Convenience verbs =====

    pub async fn get(&self, endpoint: &str) -> Result<Response, ApiError> {
        self.request(endpoint, &RequestOptions::new(Method::GET)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Response, ApiError> {
        let options = RequestOptions::new(Method::POST).json(body)?;
        self.request(endpoint, &options).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Response, ApiError> {
        let options = RequestOptions::new(Method::PUT).json(body)?;
        self.request(endpoint, &options).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Response, ApiError> {
        self.request(endpoint, &RequestOptions::new(Method::DELETE)).await
    }

    // ===== Typed helpers =====

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// GET `endpoint` and decode a successful JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let response = Self::check_response(self.get(endpoint).await?).await?;
        Self::decode(response).await
    }

    /// Fetch the profile of the signed-in user
    pub async fn fetch_current_user(&self) -> Result<UserProfile, ApiError> {
        self.get_json(CURRENT_USER_ENDPOINT).await
    }

    /// Query the host's navigation health route. Not authenticated.
    pub async fn navigation_status(&self) -> Result<NavigationStatus, ApiError> {
        let url = format!("{}{}", self.origin, STATUS_PATH);
        let response = self.client.get(&url).send().await.map_err(|e| {
            error!(url = %url, error = %e, "Status request failed");
            ApiError::from(e)
        })?;
        let response = Self::check_response(response).await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base_url: &str) -> ApiClient {
        let config = Config {
            base_url: base_url.to_string(),
            ..Config::default()
        };
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client_for("http://localhost:8188/");
        assert_eq!(api.url("/user/me"), "http://localhost:8188/api/navigation/user/me");
        assert_eq!(api.url("templates"), "http://localhost:8188/api/navigation/templates");
        assert_eq!(api.url(""), "http://localhost:8188/api/navigation");
    }

    #[test]
    fn test_default_content_type() {
        let headers = ApiClient::build_headers(&RequestOptions::default(), None).unwrap();
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let options = RequestOptions::default()
            .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .header(HeaderName::from_static("x-workspace"), HeaderValue::from_static("lab"));
        let headers = ApiClient::build_headers(&options, None).unwrap();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers["x-workspace"], "lab");
        assert_eq!(headers.get_all(header::CONTENT_TYPE).iter().count(), 1);
    }

    #[test]
    fn test_token_overrides_caller_authorization() {
        let options = RequestOptions::default()
            .header(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        let headers = ApiClient::build_headers(&options, Some("tok")).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer tok");
        assert!(headers[header::AUTHORIZATION].is_sensitive());

        // Without a token the caller's value passes through
        let headers = ApiClient::build_headers(&options, None).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Basic abc");
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let result = ApiClient::build_headers(&RequestOptions::default(), Some("bad\ntoken"));
        assert!(matches!(result, Err(ApiError::InvalidHeader(_))));
    }

    #[test]
    fn test_json_body_encoding() {
        let options = RequestOptions::new(Method::POST)
            .json(&serde_json::json!({"name": "flow"}))
            .unwrap();
        assert_eq!(options.body.as_deref(), Some(r#"{"name":"flow"}"#));
    }

    #[test]
    fn test_closure_is_login_required_handler() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let api = client_for("http://localhost:8188")
            .with_login_required(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        api.notify_login_required();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
