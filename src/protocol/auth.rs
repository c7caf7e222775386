//! Authentication payloads.
//!
//! Types for the three credential endpoints:
//! * `POST /auth/login` - exchanges a username and password for a token pair
//!   and a user snapshot
//! * `POST /auth/refresh` - exchanges the refresh token for a new access token
//! * `PUT /auth/change-password` - rotates the account password
//!
//! # Example Response
//!
//! ```json
//! {
//!     "access_token": "secret",
//!     "refresh_token": "secret",
//!     "token_type": "Bearer",
//!     "expires_in": 3600,
//!     "user": { "id": 1, "username": "jdoe" }
//! }
//! ```
//!
//! Token values are redacted from all `Debug` output.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use veil::Redact;

use super::users::User;

/// Credentials sent to the login endpoint.
#[derive(Clone, Eq, PartialEq, Serialize, Redact)]
pub struct LoginRequest {
    pub username: String,

    #[redact]
    pub password: String,
}

/// Token pair and user snapshot from a successful login.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Redact)]
pub struct LoginResponse {
    /// Short-lived credential sent on every authenticated request.
    #[redact]
    pub access_token: String,

    /// Longer-lived credential used solely to obtain a new access token.
    #[redact]
    pub refresh_token: String,

    /// Always `Bearer` for this API.
    pub token_type: String,

    /// How long the access token remains valid.
    #[serde_as(as = "Option<DurationSeconds<u64, Flexible>>")]
    #[serde(default)]
    pub expires_in: Option<Duration>,

    /// Snapshot of the authenticated user, cached alongside the tokens.
    pub user: User,
}

/// New access token from the refresh endpoint.
///
/// The refresh token is reused, not rotated: the response carries no
/// replacement for it.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Redact)]
pub struct RefreshResponse {
    #[redact]
    pub access_token: String,

    pub token_type: String,

    #[serde_as(as = "Option<DurationSeconds<u64, Flexible>>")]
    #[serde(default)]
    pub expires_in: Option<Duration>,
}

/// Body of the password change endpoint.
///
/// The server re-validates all three fields; the client checks them first to
/// save a round trip.
#[derive(Clone, Eq, PartialEq, Serialize, Redact)]
pub struct ChangePasswordRequest {
    #[redact]
    pub current_password: String,

    #[redact]
    pub new_password: String,

    #[redact]
    pub confirm_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_parses_and_redacts() {
        let response: LoginResponse = serde_json::from_str(
            r#"{
                "access_token": "aaa",
                "refresh_token": "rrr",
                "token_type": "Bearer",
                "expires_in": 3600,
                "user": {"id": 1, "username": "jdoe"}
            }"#,
        )
        .expect("valid login response");

        assert_eq!(response.access_token, "aaa");
        assert_eq!(response.expires_in, Some(Duration::from_secs(3600)));
        assert_eq!(response.user.username, "jdoe");

        let debug = format!("{response:?}");
        assert!(!debug.contains("aaa"));
        assert!(!debug.contains("rrr"));
    }

    #[test]
    fn refresh_response_tolerates_missing_expiry() {
        let response: RefreshResponse =
            serde_json::from_str(r#"{"access_token": "aaa", "token_type": "Bearer"}"#)
                .expect("valid refresh response");
        assert_eq!(response.expires_in, None);
    }
}
