//! Client-side notes and notification collections.
//!
//! These never touch the network: the original dashboard keeps both purely in
//! browser storage, as arrays under a couple of fixed keys. Here they live in
//! one JSON document on disk, mutated in memory and written through on every
//! change. Semantics are deliberately simple: CRUD on sequences, last write
//! wins, ids monotonically increasing within the file.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Result;

/// Category of a notification, driving its badge in the dashboard.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Meeting,
    Reminder,
    System,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Meeting => "meeting",
            Self::Reminder => "reminder",
            Self::System => "system",
        };
        write!(f, "{name}")
    }
}

/// A free-form note.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub body: String,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A notification shown on the dashboard.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,

    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,

    pub read: bool,
}

/// On-disk shape of the local collections.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
struct State {
    #[serde(default)]
    notes: Vec<Note>,

    #[serde(default)]
    notifications: Vec<Notification>,

    /// Next id to hand out, shared by both sequences.
    #[serde(default)]
    next_id: u64,
}

/// The local collections, write-through persisted to one JSON file.
pub struct LocalData {
    path: PathBuf,
    state: State,
}

impl LocalData {
    /// Maximum size of a data file, guarding against corrupted input.
    const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

    /// Opens the collections at `path`, loading any persisted state.
    ///
    /// A missing file is not an error: the collections start out empty and
    /// the file is created on the first write.
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

        Ok(Self { path, state })
    }

    fn persist(&self) {
        match serde_json::to_string_pretty(&self.state) {
            Ok(contents) => {
                if let Err(e) = fs::write(&self.path, contents) {
                    warn!("failed persisting local data to {}: {e}", self.path.display());
                }
            }
            Err(e) => warn!("failed serializing local data: {e}"),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.state.next_id += 1;
        self.state.next_id
    }

    /// Notes, newest first.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.state.notes.iter().rev()
    }

    /// Adds a note and returns its id.
    pub fn add_note(&mut self, title: &str, body: &str) -> u64 {
        let id = self.next_id();
        let now = OffsetDateTime::now_utc();
        self.state.notes.push(Note {
            id,
            title: title.to_owned(),
            body: body.to_owned(),
            created_at: now,
            updated_at: now,
        });
        self.persist();
        id
    }

    /// Rewrites a note's title and body, bumping its update timestamp.
    ///
    /// Returns `false` when no note has the given id.
    pub fn edit_note(&mut self, id: u64, title: &str, body: &str) -> bool {
        let Some(note) = self.state.notes.iter_mut().find(|note| note.id == id) else {
            return false;
        };
        note.title = title.to_owned();
        note.body = body.to_owned();
        note.updated_at = OffsetDateTime::now_utc();
        self.persist();
        true
    }

    /// Removes a note. Returns `false` when no note has the given id.
    pub fn remove_note(&mut self, id: u64) -> bool {
        let before = self.state.notes.len();
        self.state.notes.retain(|note| note.id != id);
        let removed = self.state.notes.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Notifications, newest first.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.state.notifications.iter().rev()
    }

    /// Count of unread notifications.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.state
            .notifications
            .iter()
            .filter(|notification| !notification.read)
            .count()
    }

    /// Pushes a new, unread notification and returns its id.
    pub fn push_notification(
        &mut self,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> u64 {
        let id = self.next_id();
        self.state.notifications.push(Notification {
            id,
            title: title.to_owned(),
            message: message.to_owned(),
            kind,
            time: OffsetDateTime::now_utc(),
            read: false,
        });
        self.persist();
        id
    }

    /// Marks one notification as read.
    ///
    /// Returns `false` when no notification has the given id.
    pub fn mark_read(&mut self, id: u64) -> bool {
        let Some(notification) = self
            .state
            .notifications
            .iter_mut()
            .find(|notification| notification.id == id)
        else {
            return false;
        };
        notification.read = true;
        self.persist();
        true
    }

    /// Marks every notification as read.
    pub fn mark_all_read(&mut self) {
        for notification in &mut self.state.notifications {
            notification.read = true;
        }
        self.persist();
    }

    /// Removes a notification. Returns `false` when no notification has the
    /// given id.
    pub fn remove_notification(&mut self, id: u64) -> bool {
        let before = self.state.notifications.len();
        self.state
            .notifications
            .retain(|notification| notification.id != id);
        let removed = self.state.notifications.len() != before;
        if removed {
            self.persist();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> LocalData {
        LocalData::open(dir.path().join("remdash.json")).expect("open")
    }

    #[test]
    fn notes_crud_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut data = open(&dir);

        let first = data.add_note("shopping", "milk");
        let second = data.add_note("agenda", "prepare slides");
        assert_ne!(first, second);

        // Newest first.
        let titles: Vec<_> = data.notes().map(|note| note.title.as_str()).collect();
        assert_eq!(titles, vec!["agenda", "shopping"]);

        assert!(data.edit_note(first, "shopping", "milk, coffee"));
        assert!(!data.edit_note(999, "nope", "nope"));

        assert!(data.remove_note(second));
        assert!(!data.remove_note(second));
        assert_eq!(data.notes().count(), 1);
    }

    #[test]
    fn notifications_read_tracking() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut data = open(&dir);

        let a = data.push_notification(NotificationKind::System, "welcome", "account created");
        let b = data.push_notification(NotificationKind::Meeting, "reminder", "board meeting at 14:00");
        assert_eq!(data.unread_count(), 2);

        assert!(data.mark_read(a));
        assert_eq!(data.unread_count(), 1);

        data.mark_all_read();
        assert_eq!(data.unread_count(), 0);

        assert!(data.remove_notification(b));
        assert_eq!(data.notifications().count(), 1);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let note_id;
        {
            let mut data = open(&dir);
            note_id = data.add_note("persisted", "still here");
            data.push_notification(NotificationKind::Reminder, "ping", "pong");
        }

        let data = open(&dir);
        assert_eq!(
            data.notes().map(|note| note.id).collect::<Vec<_>>(),
            vec![note_id]
        );
        assert_eq!(data.unread_count(), 1);
    }

    #[test]
    fn ids_keep_increasing_after_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first;
        {
            let mut data = open(&dir);
            first = data.add_note("one", "");
        }

        let mut data = open(&dir);
        let second = data.add_note("two", "");
        assert!(second > first);
    }
}
