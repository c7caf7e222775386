//! Authenticated request pipeline.
//!
//! Wraps the rate-limited HTTP client so that every outgoing request carries
//! the current credentials, and transparently recovers from exactly one class
//! of failure: access token expiry. Callers hand a plain request to
//! [`Pipeline::send`] and never deal with tokens themselves.
//!
//! # Retry discipline
//!
//! A request that comes back 401 is retried at most once, after a refresh:
//!
//! 1. The retry copy of the request is cloned *before* the first send, so the
//!    attempt context is structural rather than a mutable flag on a shared
//!    request object.
//! 2. The refresh call is guarded by a mutex. Concurrent 401s coalesce: a
//!    waiter whose access token was already replaced while it queued adopts
//!    the replacement instead of issuing a redundant refresh.
//! 3. A refresh failure propagates to the caller without a resend; a 401 on
//!    the retried send is returned as-is. Every other response passes through
//!    untouched.
//!
//! Timeouts are ordinary failures, never a retry trigger.
//!
//! # Session lifecycle
//!
//! Tokens are created by [`Pipeline::login`], replaced in place by
//! [`Pipeline::refresh`], and cleared together with the cached user by
//! [`Pipeline::logout`]. Reacting to an irrecoverable refresh failure
//! (typically by logging out and prompting for credentials) is the caller's
//! responsibility.

use std::sync::Arc;

use reqwest::{
    header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::{Error, Result},
    http::Client as HttpClient,
    protocol::{
        self,
        auth::{LoginRequest, LoginResponse, RefreshResponse},
        users::User,
        Envelope,
    },
    session::SessionStore,
};

/// Authenticated request pipeline over the dashboard API.
pub struct Pipeline {
    http_client: HttpClient,
    store: Arc<dyn SessionStore>,
    base_url: url::Url,

    /// Serializes refresh attempts so concurrent 401s trigger one network
    /// call instead of racing each other's token writes.
    refresh_lock: Mutex<()>,
}

impl Pipeline {
    /// Login endpoint, relative to the API base URL.
    const LOGIN_ENDPOINT: &'static str = "auth/login";

    /// Refresh endpoint; takes the refresh token as bearer credential.
    const REFRESH_ENDPOINT: &'static str = "auth/refresh";

    /// Current-user endpoint.
    const ME_ENDPOINT: &'static str = "auth/me";

    /// The `Content-Type` header value for request bodies.
    const JSON_CONTENT: HeaderValue = HeaderValue::from_static("application/json");

    /// An empty JSON object, the body of bodyless POST requests.
    const EMPTY_JSON_OBJECT: &'static str = "{}";

    /// Fallback message when a login failure envelope carries no error string.
    const LOGIN_FALLBACK: &'static str = "login failed";

    /// Creates a pipeline over the given session store.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the HTTP client cannot be created.
    pub fn new(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let http_client = HttpClient::new(config)?;

        Ok(Self {
            http_client,
            store,
            base_url: config.base_url.clone(),
            refresh_lock: Mutex::new(()),
        })
    }

    /// The session store backing this pipeline.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Access to the underlying HTTP client for building requests.
    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    /// Resolves an endpoint path against the API base URL.
    fn endpoint(&self, path: &str) -> Result<url::Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(Into::into)
    }

    /// Attaches `Authorization: Bearer <token>` when a token is given.
    ///
    /// Replaces any bearer header already present, so the retry send carries
    /// the refreshed token rather than the expired one. The header is marked
    /// sensitive to keep it out of any debug output.
    fn with_bearer(mut request: reqwest::Request, token: Option<&str>) -> Result<reqwest::Request> {
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }

    /// Sends a request with current credentials attached.
    ///
    /// When an access token is stored the request goes out with a bearer
    /// header; otherwise it is sent unauthenticated and the server decides
    /// whether to accept it. On a first-time 401 the pipeline refreshes the
    /// access token once and resends a clone of the original request; the
    /// result of that single retry, success or failure, is what the caller
    /// gets. Any non-401 response is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the network fails, or if the refresh triggered by a
    /// 401 fails (including the fail-fast case of no stored refresh token).
    pub async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        let token = self.store.access_token();

        // Clone before sending: the retry context lives on the stack of this
        // call, not as a flag on the request.
        let retry = request.try_clone();

        let request = Self::with_bearer(request, token.as_deref())?;
        let response = self.http_client.execute(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(retry) = retry else {
            // Streaming bodies cannot be replayed. Surface the 401 as-is.
            debug!("401 on non-replayable request; skipping refresh");
            return Ok(response);
        };

        debug!("access token rejected; attempting refresh");
        let fresh = self.refresh_stale(token.as_deref()).await?;

        let retry = Self::with_bearer(retry, Some(&fresh))?;
        self.http_client.execute(retry).await
    }

    /// Obtains a new access token using the stored refresh token.
    ///
    /// Fails fast without any network call when no refresh token is stored.
    /// On success the new access token is stored and returned; the refresh
    /// token is reused, not rotated. On failure stored state is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `Err` if no refresh token is stored, the network fails, or the
    /// server rejects the refresh token.
    pub async fn refresh(&self) -> Result<String> {
        self.refresh_stale(self.store.access_token().as_deref()).await
    }

    /// Refresh keyed on the access token the caller saw fail.
    ///
    /// Holding the lock, compares the stored access token against `stale`: a
    /// difference means another task already refreshed while this one queued,
    /// and its token is adopted without a second network call.
    async fn refresh_stale(&self, stale: Option<&str>) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.store.access_token() {
            if stale != Some(current.as_str()) {
                debug!("refresh coalesced with a concurrent attempt");
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.store.refresh_token() else {
            return Err(Error::failed_precondition("no refresh token stored"));
        };

        let request = self
            .http_client
            .post(self.endpoint(Self::REFRESH_ENDPOINT)?, Self::EMPTY_JSON_OBJECT);
        let request = Self::with_bearer(request, Some(&refresh_token))?;

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("token refresh rejected ({status})");
            return Err(protocol::status_error(status, &body, "failed to refresh token"));
        }

        let refreshed = protocol::json::<Envelope<RefreshResponse>>(&body, Self::REFRESH_ENDPOINT)?
            .into_result("failed to refresh token")?;

        self.store.set_access_token(&refreshed.access_token);
        debug!("access token refreshed");

        Ok(refreshed.access_token)
    }

    /// Exchanges credentials for a session.
    ///
    /// On success both tokens and the user snapshot are stored and the user
    /// is returned. On failure the error carries the server's message, or a
    /// generic fallback when the server did not provide one; stored state is
    /// not modified.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the network fails or the server rejects the
    /// credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let body = serde_json::to_string(&LoginRequest {
            username: username.to_owned(),
            password: password.to_owned(),
        })?;

        let mut request = self
            .http_client
            .post(self.endpoint(Self::LOGIN_ENDPOINT)?, body);
        request
            .headers_mut()
            .try_insert(CONTENT_TYPE, Self::JSON_CONTENT)?;

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(protocol::status_error(status, &body, Self::LOGIN_FALLBACK));
        }

        let envelope = protocol::json::<Envelope<LoginResponse>>(&body, Self::LOGIN_ENDPOINT)?;
        if !envelope.success {
            let message = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| Self::LOGIN_FALLBACK.to_owned());
            return Err(Error::unauthenticated(message));
        }

        let payload = envelope
            .data
            .ok_or_else(|| Error::data_loss("login response without data"))?;

        self.store
            .set_tokens(&payload.access_token, &payload.refresh_token);
        self.store.set_user(&payload.user);
        info!("logged in as {}", payload.user.username);

        Ok(payload.user)
    }

    /// Clears the session: both tokens and the cached user, unconditionally.
    ///
    /// Purely local, cannot fail, and is idempotent.
    pub fn logout(&self) {
        self.store.clear();
        info!("session cleared");
    }

    /// Fetches the authenticated user from the server.
    ///
    /// Goes through [`Pipeline::send`], so an expired access token is
    /// refreshed transparently. The cached snapshot is overwritten on
    /// success: the server is the source of truth and the local copy is only
    /// a denormalized cache.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the request fails or the caller is not
    /// authenticated.
    pub async fn current_user(&self) -> Result<User> {
        let request = self
            .http_client
            .get(self.endpoint(Self::ME_ENDPOINT)?, "");

        let response = self.send(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(protocol::status_error(status, &body, "not authenticated"));
        }

        let user = protocol::json::<Envelope<User>>(&body, Self::ME_ENDPOINT)?
            .into_result("not authenticated")?;

        self.store.set_user(&user);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> reqwest::Request {
        reqwest::Request::new(
            reqwest::Method::GET,
            url::Url::parse("https://rsdd.example.edu/api/auth/me").expect("valid url"),
        )
    }

    #[test]
    fn bearer_attached_when_token_present() {
        let request = Pipeline::with_bearer(request(), Some("token-1")).expect("valid header");
        let header = request.headers().get(AUTHORIZATION).expect("bearer header");
        assert_eq!(header.as_bytes(), b"Bearer token-1");
        assert!(header.is_sensitive());
    }

    #[test]
    fn no_bearer_without_token() {
        let request = Pipeline::with_bearer(request(), None).expect("request unchanged");
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn bearer_replaces_previous_token() {
        let request = Pipeline::with_bearer(request(), Some("stale")).expect("valid header");
        let request = Pipeline::with_bearer(request, Some("fresh")).expect("valid header");

        let headers: Vec<_> = request.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].as_bytes(), b"Bearer fresh");
    }
}
