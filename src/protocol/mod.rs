//! Wire types for the dashboard API.
//!
//! This module contains the data types and parsing logic shared across the
//! dashboard endpoints:
//!
//! # Submodules
//!
//! * [`auth`] - Login, refresh and password change payloads
//! * [`meetings`] - Meeting records, filters and mutation bodies
//! * [`users`] - User accounts, profiles and roles
//!
//! # Response Envelope
//!
//! Every endpoint answers with the same envelope convention: a `success`
//! boolean paired with either a `data` payload or an `error` string.
//! [`Envelope::into_result`] collapses that convention into a [`Result`].
//! List endpoints wrap their items in [`Paginated`].

pub mod auth;
pub mod meetings;
pub mod users;

use serde::Deserialize;
use std::fmt::Debug;

use crate::error::{Error, Result};

/// Parses and logs JSON responses from the dashboard API.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Description of API endpoint for logging
///
/// # Errors
///
/// Returns error if:
/// * Response body is not valid JSON
/// * JSON structure doesn't match type `T`
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{}: {result:#?}", origin);
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{}: {json:#?}", origin);
            } else {
                error!("{}: failed parsing response ({e:?})", origin);
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

/// Response envelope used by every dashboard endpoint.
///
/// `success: true` pairs with a `data` payload and an optional informational
/// `message`; `success: false` pairs with an `error` string and an optional
/// machine-readable `code`.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,

    pub data: Option<T>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub code: Option<String>,
}

impl<T> Envelope<T> {
    /// Collapses the envelope into a `Result`.
    ///
    /// A failure envelope becomes an error carrying the server's `error`
    /// string, falling back to `fallback` when the server did not provide one.
    /// A success envelope without `data` is a protocol violation and reported
    /// as such.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the envelope reports failure or carries no data.
    pub fn into_result(self, fallback: &str) -> Result<T> {
        if self.success {
            self.data
                .ok_or_else(|| Error::data_loss(format!("{fallback}: envelope without data")))
        } else {
            let message = self.error.or(self.message).unwrap_or_else(|| fallback.to_owned());
            Err(Error::unknown(message))
        }
    }

    /// Like [`Envelope::into_result`] but for envelopes without a payload,
    /// e.g. deletions.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the envelope reports failure.
    pub fn into_ack(self, fallback: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            let message = self.error.or(self.message).unwrap_or_else(|| fallback.to_owned());
            Err(Error::unknown(message))
        }
    }
}

/// Builds an error for an HTTP error status, preferring the server's own
/// error string.
///
/// Error statuses usually still carry a failure envelope; its `error` (or
/// `message`) field makes a better diagnostic than the bare status line. Falls
/// back to `fallback` when the body is not an envelope.
#[must_use]
pub fn status_error(status: reqwest::StatusCode, body: &str, fallback: &str) -> Error {
    let message = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.error.or(envelope.message))
        .unwrap_or_else(|| fallback.to_owned());
    Error::from_status(status, message)
}

/// Page description attached to list responses.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Paginated list payload: the items of one page plus its description.
#[derive(Clone, Debug, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
