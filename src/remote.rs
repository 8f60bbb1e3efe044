use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Photo, Profile, SyncStatus};

/// Errors from the remote journal service
#[derive(Debug)]
pub enum RemoteError {
    /// Transport failure: no route, DNS, timeout
    Network(String),
    /// The service answered with a non-success status
    Api { status: u16, message: String },
    /// Local file I/O during a blob transfer
    Io(std::io::Error),
    /// Response body could not be decoded
    Serialization(serde_json::Error),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RemoteError::Network(msg) => write!(f, "Network error: {}", msg),
            RemoteError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            RemoteError::Io(e) => write!(f, "Filesystem error: {}", e),
            RemoteError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        RemoteError::Io(e)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Serialization(e)
    }
}

impl RemoteError {
    /// Transport failures retry cleanly; API and local errors need attention.
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

/// Photo record as the remote service stores it. `uri` is the canonical
/// blob URL once the blob has been uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemotePhoto {
    pub id: String,
    pub user_id: String,
    pub uri: String,
    pub timestamp: i64,
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub version: i64,
    pub last_modified: i64,
}

impl RemotePhoto {
    /// Builds the wire record for a local photo. `uri` is the remote blob
    /// URL when one exists, otherwise the local uri travels as a placeholder
    /// until the blob upload completes.
    pub fn from_photo(photo: &Photo, user_id: &str, uri: String) -> Self {
        Self {
            id: photo.id.clone(),
            user_id: user_id.to_string(),
            uri,
            timestamp: photo.timestamp,
            date_iso: photo.date_iso.clone(),
            location_name: photo.location_name.clone(),
            title: photo.title.clone(),
            note: photo.note.clone(),
            version: photo.version,
            last_modified: photo.last_modified,
        }
    }

    /// Materializes a local record for a photo that only exists remotely.
    /// `local_uri` points at the downloaded blob.
    pub fn into_photo(self, local_uri: String) -> Photo {
        Photo {
            server_id: Some(self.id.clone()),
            id: self.id,
            uri: local_uri,
            timestamp: self.timestamp,
            date_iso: self.date_iso,
            location_name: self.location_name,
            title: self.title,
            note: self.note,
            version: self.version,
            last_modified: self.last_modified,
            sync_status: SyncStatus::Synced,
            needs_upload: false,
            deleted: false,
        }
    }

    /// Overwrites a local record's metadata with the remote state. The uri
    /// is left alone; blob handling is the caller's concern.
    pub fn apply_to(&self, photo: &mut Photo) {
        photo.location_name = self.location_name.clone();
        photo.title = self.title.clone();
        photo.note = self.note.clone();
        photo.timestamp = self.timestamp;
        photo.version = self.version;
        photo.last_modified = self.last_modified;
        photo.sync_status = SyncStatus::Synced;
        photo.needs_upload = false;
        photo.server_id = Some(self.id.clone());
    }
}

/// Profile record as the remote service stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_uri: Option<String>,
    pub version: i64,
    pub last_modified: i64,
}

impl RemoteProfile {
    pub fn from_profile(profile: &Profile, user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: profile.name.clone(),
            avatar_uri: profile.avatar_uri.clone(),
            version: profile.version,
            last_modified: profile.last_modified,
        }
    }

    pub fn into_profile(self) -> Profile {
        Profile {
            name: self.name,
            avatar_uri: self.avatar_uri,
            version: self.version,
            last_modified: self.last_modified,
            sync_status: SyncStatus::Synced,
        }
    }
}

/// Deterministic storage path for a photo's blob on the remote service.
pub fn photo_blob_path(user_id: &str, photo_id: &str) -> String {
    format!("photos/{}/{}.jpg", user_id, photo_id)
}

/// Remote side of the journal: record CRUD, blob transfer and the
/// reachability probe. [`crate::http::HttpRemote`] talks to the REST
/// service; [`crate::memory::MemoryRemote`] backs tests and local runs.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Cheap reachability probe; never errors, just answers yes or no.
    async fn check_connectivity(&self) -> bool;

    /// All photo records for a user, newest change first.
    async fn list_photos(&self, user_id: &str) -> Result<Vec<RemotePhoto>, RemoteError>;

    async fn get_photo(&self, id: &str) -> Result<Option<RemotePhoto>, RemoteError>;

    /// Upserts a record, keyed by its id.
    async fn put_photo(&self, photo: &RemotePhoto) -> Result<(), RemoteError>;

    async fn delete_photo(&self, id: &str) -> Result<(), RemoteError>;

    /// Pushes the blob at `local_path` to `remote_path` and returns the
    /// canonical URL it is now served under.
    async fn upload_blob(&self, local_path: &str, remote_path: &str)
        -> Result<String, RemoteError>;

    /// Fetches a blob to `dest_path` (parent directories are created) and
    /// returns the local path written.
    async fn download_blob(&self, url: &str, dest_path: &str) -> Result<String, RemoteError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, RemoteError>;

    async fn put_profile(&self, profile: &RemoteProfile) -> Result<(), RemoteError>;
}
