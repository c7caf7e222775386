//! User account and profile types.
//!
//! The dashboard serializes users with a nested, denormalized `profile`
//! object. The client treats the whole structure as read-mostly: the server is
//! the source of truth and the locally cached snapshot is overwritten on every
//! successful `GET /auth/me`.
//!
//! Timestamps (`date_joined`, `last_login`) are carried as the server's ISO
//! strings; the client displays them but never computes with them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Account roles recognized by the dashboard.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Dean,
    Director,
    Secretary,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "dean" => Ok(Self::Dean),
            "director" => Ok(Self::Director),
            "secretary" => Ok(Self::Secretary),
            other => Err(format!(
                "unknown role \"{other}\" (expected admin, dean, director or secretary)"
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admin => "admin",
            Self::Dean => "dean",
            Self::Director => "director",
            Self::Secretary => "secretary",
        };
        write!(f, "{name}")
    }
}

/// Academic title attached to a profile, e.g. "Prof." or "Dr.".
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Title {
    pub id: u64,
    pub name: String,
}

/// Extended profile information nested inside [`User`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub role: Option<Role>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub university: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub profile_picture: Option<String>,

    #[serde(default)]
    pub initials: Option<String>,

    #[serde(default)]
    pub titles: Vec<Title>,
}

/// A dashboard user account.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: u64,
    pub username: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub is_staff: Option<bool>,

    #[serde(default)]
    pub is_superuser: Option<bool>,

    #[serde(default)]
    pub date_joined: Option<String>,

    #[serde(default)]
    pub last_login: Option<String>,

    #[serde(default)]
    pub profile: Option<Profile>,
}

impl User {
    /// Display name: full name when the server provided one, username
    /// otherwise.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }

    /// Role out of the nested profile, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().and_then(|profile| profile.role)
    }
}

/// Filters and paging for the user list endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub sort_by: Option<String>,
    pub descending: bool,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl UserFilter {
    /// Renders the filter as query pairs, omitting unset fields.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref search) = self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(role) = self.role {
            pairs.push(("role", role.to_string()));
        }
        if let Some(active) = self.is_active {
            pairs.push(("is_active", active.to_string()));
        }
        if let Some(ref sort_by) = self.sort_by {
            pairs.push(("sort_by", sort_by.clone()));
        }
        if self.descending {
            pairs.push(("order", "desc".to_owned()));
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

/// Body for creating a user account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Body for updating a user account; unset fields are left untouched.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Body for updating the caller's own profile.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UpdateProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_ids: Option<Vec<u64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_parses_with_nested_profile() {
        let user: User = serde_json::from_str(
            r#"{
                "id": 3,
                "username": "adem",
                "full_name": "Adem Kaya",
                "is_active": true,
                "profile": {"id": 3, "role": "dean", "initials": "AK", "titles": []}
            }"#,
        )
        .expect("valid user");

        assert_eq!(user.display_name(), "Adem Kaya");
        assert_eq!(user.role(), Some(Role::Dean));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let user: User =
            serde_json::from_str(r#"{"id": 1, "username": "jdoe"}"#).expect("valid user");
        assert_eq!(user.display_name(), "jdoe");
    }

    #[test]
    fn filter_renders_only_set_fields() {
        let filter = UserFilter {
            role: Some(Role::Secretary),
            descending: true,
            page: Some(2),
            ..UserFilter::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("role", "secretary".to_owned()),
                ("order", "desc".to_owned()),
                ("page", "2".to_owned()),
            ]
        );
    }
}
