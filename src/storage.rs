use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::models::{Photo, Profile, SyncStatus};
use crate::schema::init_store_schema;

const KIND_PHOTOS: &str = "photos";
const KIND_PROFILE: &str = "profile";
const KIND_LAST_SYNC: &str = "last_sync";

/// Errors from the local journal store
#[derive(Debug)]
pub enum StoreError {
    /// Database error (rusqlite)
    Database(rusqlite::Error),
    /// Payload could not be encoded or decoded
    Serialization(serde_json::Error),
    /// Filesystem error
    Io(std::io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Io(e) => write!(f, "Filesystem error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Durable per-user storage for the journal: the photo collection, the
/// profile and the time of the last successful sync, each held as one JSON
/// payload per user.
///
/// The `load_*`/`save_*` methods never fail: a missing or corrupt payload
/// degrades to an empty collection or a default profile with a log line, and
/// a failed write is logged while the in-memory state stays authoritative.
/// The `try_*` twins expose the underlying `Result` for callers that want to
/// retry persistence themselves.
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Opens the store at `path`, creating parent directories and the schema
    /// as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        init_store_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_store_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock still holds a usable connection.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_payload(&self, user_id: &str, kind: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT payload FROM journal_store WHERE user_id = ?1 AND kind = ?2",
            rusqlite::params![user_id, kind],
            |row| row.get(0),
        );
        match result {
            Ok(payload) => Ok(Some(payload)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    fn write_payload(&self, user_id: &str, kind: &str, payload: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO journal_store (user_id, kind, payload) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, kind, payload],
        )?;
        Ok(())
    }

    pub fn try_load_photos(&self, user_id: &str) -> Result<Vec<Photo>, StoreError> {
        match self.read_payload(user_id, KIND_PHOTOS)? {
            Some(json) => {
                let mut photos: Vec<Photo> = serde_json::from_str(&json)?;
                // A transient state on disk means a pass was interrupted.
                for photo in &mut photos {
                    match photo.sync_status {
                        SyncStatus::Uploading => photo.sync_status = SyncStatus::Pending,
                        SyncStatus::Downloading => photo.sync_status = SyncStatus::Synced,
                        _ => {}
                    }
                }
                Ok(photos)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Loads the photo collection; any failure degrades to an empty journal.
    pub fn load_photos(&self, user_id: &str) -> Vec<Photo> {
        match self.try_load_photos(user_id) {
            Ok(photos) => photos,
            Err(e) => {
                log::warn!(
                    "Failed to load photos for user {}: {} - starting empty",
                    user_id,
                    e
                );
                Vec::new()
            }
        }
    }

    pub fn try_save_photos(&self, user_id: &str, photos: &[Photo]) -> Result<(), StoreError> {
        let json = serde_json::to_string(photos)?;
        self.write_payload(user_id, KIND_PHOTOS, &json)
    }

    /// Persists the photo collection; a failure is logged and swallowed.
    pub fn save_photos(&self, user_id: &str, photos: &[Photo]) {
        if let Err(e) = self.try_save_photos(user_id, photos) {
            log::error!("Failed to save photos for user {}: {}", user_id, e);
        }
    }

    pub fn try_load_profile(&self, user_id: &str) -> Result<Profile, StoreError> {
        match self.read_payload(user_id, KIND_PROFILE)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Profile::default()),
        }
    }

    /// Loads the profile; any failure degrades to the default profile.
    pub fn load_profile(&self, user_id: &str) -> Profile {
        match self.try_load_profile(user_id) {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!(
                    "Failed to load profile for user {}: {} - using default",
                    user_id,
                    e
                );
                Profile::default()
            }
        }
    }

    pub fn try_save_profile(&self, user_id: &str, profile: &Profile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.write_payload(user_id, KIND_PROFILE, &json)
    }

    /// Persists the profile; a failure is logged and swallowed.
    pub fn save_profile(&self, user_id: &str, profile: &Profile) {
        if let Err(e) = self.try_save_profile(user_id, profile) {
            log::error!("Failed to save profile for user {}: {}", user_id, e);
        }
    }

    /// Epoch millis of the last successful sync, if one has completed.
    pub fn last_sync(&self, user_id: &str) -> Option<i64> {
        match self.read_payload(user_id, KIND_LAST_SYNC) {
            Ok(Some(payload)) => match payload.parse() {
                Ok(ts) => Some(ts),
                Err(_) => {
                    log::warn!("Unreadable last sync time for user {}", user_id);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read last sync time for user {}: {}", user_id, e);
                None
            }
        }
    }

    pub fn set_last_sync(&self, user_id: &str, timestamp_ms: i64) {
        if let Err(e) = self.write_payload(user_id, KIND_LAST_SYNC, &timestamp_ms.to_string()) {
            log::error!("Failed to save last sync time for user {}: {}", user_id, e);
        }
    }
}
