//! Typed client for the dashboard API.
//!
//! One async method per remote operation, in the shape the pages of the
//! original dashboard consume them: paginated meeting and user lists, single
//! record lookups, and profile self-service. Every request goes through the
//! [`crate::auth::Pipeline`], so callers never see tokens or the
//! refresh-and-retry dance.
//!
//! Responses are checked in two steps: the HTTP status first (an error status
//! maps to an [`crate::error::ErrorKind`] and carries the server's error
//! string), then the `{success, data|error}` envelope.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use url::Url;

use crate::{
    auth::Pipeline,
    config::Config,
    error::{Error, Result},
    protocol::{
        self,
        auth::ChangePasswordRequest,
        meetings::{CreateMeeting, Meeting, MeetingFilter, UpdateMeeting},
        users::{CreateUser, UpdateProfile, UpdateUser, User, UserFilter},
        Envelope, Paginated,
    },
    session::SessionStore,
};

/// High-level dashboard operations over an authenticated pipeline.
pub struct Dashboard {
    pipeline: Pipeline,
    base_url: Url,
}

impl Dashboard {
    /// Meetings collection endpoint.
    const MEETINGS_ENDPOINT: &'static str = "meetings";

    /// Users collection endpoint.
    const USERS_ENDPOINT: &'static str = "users";

    /// Profile self-service endpoint.
    const PROFILE_ENDPOINT: &'static str = "profile";

    /// Password change endpoint.
    const PASSWORD_ENDPOINT: &'static str = "auth/change-password";

    /// Minimum password length enforced by the server; checked here first to
    /// save a round trip.
    const MIN_PASSWORD_LEN: usize = 8;

    /// Creates a dashboard client over the given session store.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the HTTP client cannot be created.
    pub fn new(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        Ok(Self {
            pipeline: Pipeline::new(config, store)?,
            base_url: config.base_url.clone(),
        })
    }

    /// The underlying pipeline, for login/logout/refresh.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(Into::into)
    }

    fn endpoint_with_query(&self, path: &str, pairs: &[(&str, String)]) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Builds a JSON request through the pipeline's HTTP client.
    fn json_request<T>(&self, method: reqwest::Method, url: Url, body: &T) -> Result<reqwest::Request>
    where
        T: Serialize,
    {
        let mut request = self
            .pipeline
            .http_client()
            .request(method, url, serde_json::to_string(body)?);
        request.headers_mut().try_insert(
            CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        )?;
        Ok(request)
    }

    /// Sends a request and unwraps the enveloped payload.
    async fn perform<T>(&self, request: reqwest::Request, origin: &str) -> Result<T>
    where
        T: for<'de> serde::Deserialize<'de> + std::fmt::Debug,
    {
        let response = self.pipeline.send(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(protocol::status_error(status, &body, origin));
        }

        protocol::json::<Envelope<T>>(&body, origin)?.into_result(origin)
    }

    /// Sends a request expecting an acknowledgement without payload.
    async fn perform_ack(&self, request: reqwest::Request, origin: &str) -> Result<()> {
        let response = self.pipeline.send(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(protocol::status_error(status, &body, origin));
        }

        protocol::json::<Envelope<serde_json::Value>>(&body, origin)?.into_ack(origin)
    }

    /// Lists meetings matching the filter, one page at a time.
    pub async fn meetings(&self, filter: &MeetingFilter) -> Result<Paginated<Meeting>> {
        let url = self.endpoint_with_query(Self::MEETINGS_ENDPOINT, &filter.query_pairs())?;
        let request = self.pipeline.http_client().get(url, "");
        self.perform(request, Self::MEETINGS_ENDPOINT).await
    }

    /// Fetches one meeting by id.
    pub async fn meeting(&self, id: u64) -> Result<Meeting> {
        let url = self.endpoint(&format!("{}/{id}", Self::MEETINGS_ENDPOINT))?;
        let request = self.pipeline.http_client().get(url, "");
        self.perform(request, Self::MEETINGS_ENDPOINT).await
    }

    /// Creates a meeting and returns the stored record.
    pub async fn create_meeting(&self, body: &CreateMeeting) -> Result<Meeting> {
        let url = self.endpoint(Self::MEETINGS_ENDPOINT)?;
        let request = self.json_request(reqwest::Method::POST, url, body)?;
        self.perform(request, Self::MEETINGS_ENDPOINT).await
    }

    /// Updates a meeting in place.
    pub async fn update_meeting(&self, id: u64, body: &UpdateMeeting) -> Result<Meeting> {
        let url = self.endpoint(&format!("{}/{id}", Self::MEETINGS_ENDPOINT))?;
        let request = self.json_request(reqwest::Method::PUT, url, body)?;
        self.perform(request, Self::MEETINGS_ENDPOINT).await
    }

    /// Deletes a meeting.
    pub async fn delete_meeting(&self, id: u64) -> Result<()> {
        let url = self.endpoint(&format!("{}/{id}", Self::MEETINGS_ENDPOINT))?;
        let request = self.pipeline.http_client().delete(url, "");
        self.perform_ack(request, Self::MEETINGS_ENDPOINT).await
    }

    /// Lists user accounts matching the filter, one page at a time.
    pub async fn users(&self, filter: &UserFilter) -> Result<Paginated<User>> {
        let url = self.endpoint_with_query(Self::USERS_ENDPOINT, &filter.query_pairs())?;
        let request = self.pipeline.http_client().get(url, "");
        self.perform(request, Self::USERS_ENDPOINT).await
    }

    /// Fetches one user by id.
    pub async fn user(&self, id: u64) -> Result<User> {
        let url = self.endpoint(&format!("{}/{id}", Self::USERS_ENDPOINT))?;
        let request = self.pipeline.http_client().get(url, "");
        self.perform(request, Self::USERS_ENDPOINT).await
    }

    /// Creates a user account.
    pub async fn create_user(&self, body: &CreateUser) -> Result<User> {
        let url = self.endpoint(Self::USERS_ENDPOINT)?;
        let request = self.json_request(reqwest::Method::POST, url, body)?;
        self.perform(request, Self::USERS_ENDPOINT).await
    }

    /// Updates a user account; unset fields are left untouched.
    pub async fn update_user(&self, id: u64, body: &UpdateUser) -> Result<User> {
        let url = self.endpoint(&format!("{}/{id}", Self::USERS_ENDPOINT))?;
        let request = self.json_request(reqwest::Method::PUT, url, body)?;
        self.perform(request, Self::USERS_ENDPOINT).await
    }

    /// Deletes a user account.
    pub async fn delete_user(&self, id: u64) -> Result<()> {
        let url = self.endpoint(&format!("{}/{id}", Self::USERS_ENDPOINT))?;
        let request = self.pipeline.http_client().delete(url, "");
        self.perform_ack(request, Self::USERS_ENDPOINT).await
    }

    /// Activates or deactivates a user account.
    pub async fn set_user_active(&self, id: u64, active: bool) -> Result<User> {
        self.update_user(
            id,
            &UpdateUser {
                is_active: Some(active),
                ..UpdateUser::default()
            },
        )
        .await
    }

    /// Fetches the caller's profile.
    pub async fn profile(&self) -> Result<User> {
        let url = self.endpoint(Self::PROFILE_ENDPOINT)?;
        let request = self.pipeline.http_client().get(url, "");
        self.perform(request, Self::PROFILE_ENDPOINT).await
    }

    /// Updates the caller's profile.
    pub async fn update_profile(&self, body: &UpdateProfile) -> Result<User> {
        let url = self.endpoint(Self::PROFILE_ENDPOINT)?;
        let request = self.json_request(reqwest::Method::PUT, url, body)?;
        self.perform(request, Self::PROFILE_ENDPOINT).await
    }

    /// Changes the caller's password.
    ///
    /// The server validates too; checking here first turns the common
    /// mistakes into immediate errors without a network call.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        if new.chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(Error::invalid_argument(format!(
                "password must be at least {} characters",
                Self::MIN_PASSWORD_LEN
            )));
        }
        let body = ChangePasswordRequest {
            current_password: current.to_owned(),
            new_password: new.to_owned(),
            confirm_password: new.to_owned(),
        };
        let url = self.endpoint(Self::PASSWORD_ENDPOINT)?;
        let request = self.json_request(reqwest::Method::PUT, url, &body)?;
        self.perform_ack(request, Self::PASSWORD_ENDPOINT).await
    }
}
