//! Meeting records, list filters and mutation bodies.
//!
//! The server stores a calendar date and a wall-clock time separately, both
//! optional, and reports derived flags (`is_past`, `is_upcoming`) computed
//! against its own clock. The client keeps the server's verdict rather than
//! recomputing it locally.
//!
//! Date fields travel as `YYYY-MM-DD`. Time fields travel as `HH:MM:SS` in
//! responses but `HH:MM` in mutation bodies, matching the forms the original
//! dashboard submits.

use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, Time};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(iso_time, Time, "[hour]:[minute]:[second]");
time::serde::format_description!(short_time, Time, "[hour]:[minute]");

/// Attendee summary nested inside a meeting.
///
/// A trimmed projection of [`super::users::User`]: the list endpoint inlines
/// only what the meeting views need.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Attendee {
    pub id: u64,
    pub username: String,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

/// A scheduled meeting.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Meeting {
    pub id: u64,
    pub title: String,

    #[serde(with = "iso_date::option", default)]
    pub date: Option<Date>,

    #[serde(with = "iso_time::option", default)]
    pub time: Option<Time>,

    /// Server-side path of the uploaded agenda document.
    #[serde(default)]
    pub agenda: Option<String>,

    #[serde(default)]
    pub has_agenda: bool,

    #[serde(default)]
    pub is_past: bool,

    #[serde(default)]
    pub is_upcoming: bool,

    #[serde(default)]
    pub attendees: Vec<Attendee>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Filters and paging for the meeting list endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MeetingFilter {
    pub search: Option<String>,
    pub date_from: Option<Date>,
    pub date_to: Option<Date>,
    pub attendee_id: Option<u64>,
    pub upcoming: bool,
    pub past: bool,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl MeetingFilter {
    /// Renders the filter as query pairs, omitting unset fields.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let date_format = format_description!("[year]-[month]-[day]");

        let mut pairs = Vec::new();
        if let Some(ref search) = self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(date) = self.date_from {
            if let Ok(formatted) = date.format(&date_format) {
                pairs.push(("date_from", formatted));
            }
        }
        if let Some(date) = self.date_to {
            if let Ok(formatted) = date.format(&date_format) {
                pairs.push(("date_to", formatted));
            }
        }
        if let Some(id) = self.attendee_id {
            pairs.push(("attendee_id", id.to_string()));
        }
        if self.upcoming {
            pairs.push(("upcoming", "true".to_owned()));
        }
        if self.past {
            pairs.push(("past", "true".to_owned()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        pairs
    }
}

/// Body for creating a meeting.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CreateMeeting {
    pub title: String,

    #[serde(with = "iso_date")]
    pub date: Date,

    #[serde(with = "short_time")]
    pub time: Time,

    pub attendee_ids: Vec<u64>,
}

/// Body for updating a meeting; unset fields are left untouched.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UpdateMeeting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(with = "iso_date::option", skip_serializing_if = "Option::is_none")]
    pub date: Option<Date>,

    #[serde(with = "short_time::option", skip_serializing_if = "Option::is_none")]
    pub time: Option<Time>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendee_ids: Option<Vec<u64>>,
}

#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::*;

    #[test]
    fn meeting_parses_server_shape() {
        let meeting: Meeting = serde_json::from_str(
            r#"{
                "id": 12,
                "title": "Board Meeting",
                "date": "2025-12-15",
                "time": "14:00:00",
                "agenda": "uploads/agendas/12.pdf",
                "has_agenda": true,
                "is_past": false,
                "is_upcoming": true,
                "attendees": [{"id": 1, "username": "jdoe", "full_name": "John Doe"}],
                "created_at": "2025-12-01T09:30:00",
                "updated_at": "2025-12-01T09:30:00"
            }"#,
        )
        .expect("valid meeting");

        assert_eq!(meeting.date, Some(date!(2025 - 12 - 15)));
        assert_eq!(meeting.time, Some(time!(14:00:00)));
        assert_eq!(meeting.attendees.len(), 1);
        assert!(meeting.is_upcoming);
    }

    #[test]
    fn meeting_tolerates_null_date_and_time() {
        let meeting: Meeting =
            serde_json::from_str(r#"{"id": 1, "title": "TBD", "date": null, "time": null}"#)
                .expect("valid meeting");
        assert_eq!(meeting.date, None);
        assert_eq!(meeting.time, None);
    }

    #[test]
    fn create_body_uses_short_time() {
        let body = CreateMeeting {
            title: "Board Meeting".to_owned(),
            date: date!(2025 - 12 - 15),
            time: time!(14:00),
            attendee_ids: vec![1, 3, 5],
        };
        let json = serde_json::to_value(&body).expect("serializable");
        assert_eq!(json["date"], "2025-12-15");
        assert_eq!(json["time"], "14:00");
    }

    #[test]
    fn filter_renders_dates_and_flags() {
        let filter = MeetingFilter {
            search: Some("board".to_owned()),
            date_from: Some(date!(2025 - 01 - 01)),
            upcoming: true,
            per_page: Some(50),
            ..MeetingFilter::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("search", "board".to_owned()),
                ("date_from", "2025-01-01".to_owned()),
                ("upcoming", "true".to_owned()),
                ("per_page", "50".to_owned()),
            ]
        );
    }
}
