//! Session state: tokens and the cached user snapshot.
//!
//! The pipeline never touches ambient global state; it is handed a
//! [`SessionStore`] and all token reads and writes go through it. Two
//! implementations are provided:
//!
//! * [`MemoryStore`] - plain in-memory state, used in tests and by embedders
//!   that manage persistence themselves
//! * [`FileStore`] - write-through persistence to a JSON document on disk,
//!   holding the same three independent values the original dashboard kept in
//!   browser storage (access token, refresh token, serialized user)
//!
//! # Invariants
//!
//! * The access token may be absent: requests then go out unauthenticated.
//! * An absent refresh token means refresh is impossible and must fail fast.
//! * The cached user is set when tokens are set and cleared when tokens are
//!   cleared; it has no independent lifecycle.
//! * Writes are last-write-wins; no cross-process locking is attempted.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde::{Deserialize, Serialize};
use veil::Redact;

use crate::{error::Result, protocol::users::User};

/// Interface between the pipeline and wherever session state lives.
///
/// All methods take `&self`: implementations guard their state internally so
/// a store can be shared across concurrent requests.
pub trait SessionStore: Send + Sync {
    /// Currently stored access token, if any.
    fn access_token(&self) -> Option<String>;

    /// Currently stored refresh token, if any.
    fn refresh_token(&self) -> Option<String>;

    /// Cached snapshot of the authenticated user, if any.
    fn user(&self) -> Option<User>;

    /// Stores a fresh token pair, replacing any previous one.
    fn set_tokens(&self, access: &str, refresh: &str);

    /// Replaces only the access token, keeping the refresh token.
    ///
    /// Used after a refresh: this API reuses refresh tokens rather than
    /// rotating them.
    fn set_access_token(&self, access: &str);

    /// Overwrites the cached user snapshot.
    fn set_user(&self, user: &User);

    /// Clears all three values together. Idempotent.
    fn clear(&self);
}

/// The three persisted values, together forming one session.
#[derive(Clone, Default, Deserialize, PartialEq, Serialize, Redact)]
struct State {
    #[redact]
    #[serde(default)]
    access_token: Option<String>,

    #[redact]
    #[serde(default)]
    refresh_token: Option<String>,

    #[serde(default)]
    user: Option<User>,
}

/// In-memory session store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn access_token(&self) -> Option<String> {
        self.state.read().expect("session lock").access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.state.read().expect("session lock").refresh_token.clone()
    }

    fn user(&self) -> Option<User> {
        self.state.read().expect("session lock").user.clone()
    }

    fn set_tokens(&self, access: &str, refresh: &str) {
        let mut state = self.state.write().expect("session lock");
        state.access_token = Some(access.to_owned());
        state.refresh_token = Some(refresh.to_owned());
    }

    fn set_access_token(&self, access: &str) {
        self.state.write().expect("session lock").access_token = Some(access.to_owned());
    }

    fn set_user(&self, user: &User) {
        self.state.write().expect("session lock").user = Some(user.clone());
    }

    fn clear(&self) {
        *self.state.write().expect("session lock") = State::default();
    }
}

/// Session store persisted to a JSON file.
///
/// Every mutation is written through to disk immediately. Persistence
/// failures are logged and otherwise swallowed: losing a session to a full
/// disk degrades to "log in again", which matches the browser-storage
/// behavior this replaces.
pub struct FileStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl FileStore {
    /// Maximum size of a session file.
    ///
    /// Prevents an out-of-memory condition on a corrupted or hostile file;
    /// a legitimate session is a few kilobytes at most.
    const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Opens a session store at `path`, loading any persisted state.
    ///
    /// A missing file is not an error: the store starts out empty and the
    /// file is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file exists but cannot be read or parsed, or
    /// exceeds the size limit.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::metadata(&path) {
            Ok(attributes) => {
                if attributes.len() > Self::MAX_FILE_SIZE {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{} is too large", path.display()),
                    )
                    .into());
                }
                let contents = fs::read_to_string(&path)?;
                serde_json::from_str(&contents)?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn persist(&self, state: &State) {
        match serde_json::to_string_pretty(state) {
            Ok(contents) => {
                if let Err(e) = fs::write(&self.path, contents) {
                    warn!("failed persisting session to {}: {e}", self.path.display());
                }
            }
            Err(e) => warn!("failed serializing session: {e}"),
        }
    }
}

impl SessionStore for FileStore {
    fn access_token(&self) -> Option<String> {
        self.state.read().expect("session lock").access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.state.read().expect("session lock").refresh_token.clone()
    }

    fn user(&self) -> Option<User> {
        self.state.read().expect("session lock").user.clone()
    }

    fn set_tokens(&self, access: &str, refresh: &str) {
        let mut state = self.state.write().expect("session lock");
        state.access_token = Some(access.to_owned());
        state.refresh_token = Some(refresh.to_owned());
        self.persist(&state);
    }

    fn set_access_token(&self, access: &str) {
        let mut state = self.state.write().expect("session lock");
        state.access_token = Some(access.to_owned());
        self.persist(&state);
    }

    fn set_user(&self, user: &User) {
        let mut state = self.state.write().expect("session lock");
        state.user = Some(user.clone());
        self.persist(&state);
    }

    fn clear(&self) {
        let mut state = self.state.write().expect("session lock");
        *state = State::default();
        self.persist(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, username: &str) -> User {
        serde_json::from_value(serde_json::json!({"id": id, "username": username}))
            .expect("valid user")
    }

    #[test]
    fn memory_store_roundtrips_tokens_and_user() {
        let store = MemoryStore::new();
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);

        store.set_tokens("access", "refresh");
        store.set_user(&user(1, "jdoe"));

        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
        assert_eq!(store.user().map(|u| u.username), Some("jdoe".to_owned()));

        store.set_access_token("access2");
        assert_eq!(store.access_token().as_deref(), Some("access2"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn clear_is_total_and_idempotent() {
        let store = MemoryStore::new();
        store.clear();

        store.set_tokens("access", "refresh");
        store.set_user(&user(1, "jdoe"));
        store.clear();

        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(store.user().is_none());

        store.clear();
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn file_store_starts_empty_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let store = FileStore::open(&path).expect("open");
        assert_eq!(store.access_token(), None);

        store.set_tokens("access", "refresh");
        store.set_user(&user(2, "dean"));

        let reopened = FileStore::open(&path).expect("reopen");
        assert_eq!(reopened.access_token().as_deref(), Some("access"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("refresh"));
        assert_eq!(reopened.user().map(|u| u.id), Some(2));
    }

    #[test]
    fn file_store_clear_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let store = FileStore::open(&path).expect("open");
        store.set_tokens("access", "refresh");
        store.clear();

        let reopened = FileStore::open(&path).expect("reopen");
        assert_eq!(reopened.access_token(), None);
        assert_eq!(reopened.refresh_token(), None);
    }

    #[test]
    fn file_store_rejects_oversized_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "0".repeat(128 * 1024)).expect("write");

        assert!(FileStore::open(&path).is_err());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let state = State {
            access_token: Some("secret-access".to_owned()),
            refresh_token: Some("secret-refresh".to_owned()),
            user: None,
        };
        let debug = format!("{state:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
