use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current epoch time in milliseconds, the clock all records are stamped with.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// UTC calendar key for an epoch-millisecond instant, e.g. "2025-06-14".
pub fn date_iso_for(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|instant| instant.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Today's calendar key in UTC.
pub fn today_iso() -> String {
    date_iso_for(now_ms())
}

/// Lifecycle of a record relative to the remote journal service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Pending,
    Uploading,
    Downloading,
    Conflict,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Pending => "pending",
            SyncStatus::Uploading => "uploading",
            SyncStatus::Downloading => "downloading",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
        }
    }

    /// True while the record carries local edits the remote has not confirmed.
    pub fn has_unsynced_edits(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Error)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A journal entry: one photo with its metadata and sync bookkeeping.
///
/// `version` and `last_modified` move together through [`Photo::touch`];
/// `date_iso` is fixed at creation and groups entries by calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    /// Local file path, or the remote URL until the blob has been fetched.
    pub uri: String,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Remote document id, set once the server has confirmed the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub version: i64,
    pub last_modified: i64,
    pub sync_status: SyncStatus,
    /// The blob at `uri` still has to be pushed to remote storage.
    #[serde(default)]
    pub needs_upload: bool,
    /// Tombstone: removal confirmed locally, remote delete still outstanding.
    #[serde(default)]
    pub deleted: bool,
}

impl Photo {
    /// Creates a fresh entry for a locally captured photo.
    pub fn new(uri: String, location_name: Option<String>) -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            uri,
            timestamp: now,
            date_iso: date_iso_for(now),
            location_name,
            title: None,
            note: None,
            server_id: None,
            version: 1,
            last_modified: now,
            sync_status: SyncStatus::Pending,
            needs_upload: true,
            deleted: false,
        }
    }

    /// Records a local edit: bumps the version, advances `last_modified`
    /// strictly (even under a coarse clock) and marks the record pending.
    pub fn touch(&mut self) {
        self.version += 1;
        self.last_modified = now_ms().max(self.last_modified + 1);
        self.sync_status = SyncStatus::Pending;
    }

    /// Applies a partial edit; untouched fields keep their value.
    pub fn apply_edit(&mut self, edit: &PhotoEdit) {
        if let Some(title) = &edit.title {
            self.title = Some(title.clone());
        }
        if let Some(note) = &edit.note {
            self.note = Some(note.clone());
        }
        if let Some(location_name) = &edit.location_name {
            self.location_name = Some(location_name.clone());
        }
        self.touch();
    }
}

/// Partial update for a photo; `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct PhotoEdit {
    pub title: Option<String>,
    pub note: Option<String>,
    pub location_name: Option<String>,
}

/// The single per-user profile record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_uri: Option<String>,
    pub version: i64,
    pub last_modified: i64,
    pub sync_status: SyncStatus,
}

impl Profile {
    pub fn new(name: String) -> Self {
        Self {
            name,
            avatar_uri: None,
            version: 1,
            last_modified: now_ms(),
            sync_status: SyncStatus::Pending,
        }
    }

    /// Same edit bookkeeping as [`Photo::touch`].
    pub fn touch(&mut self) {
        self.version += 1;
        self.last_modified = now_ms().max(self.last_modified + 1);
        self.sync_status = SyncStatus::Pending;
    }

    pub fn apply_edit(&mut self, edit: &ProfileEdit) {
        if let Some(name) = &edit.name {
            self.name = name.clone();
        }
        if let Some(avatar_uri) = &edit.avatar_uri {
            self.avatar_uri = Some(avatar_uri.clone());
        }
        self.touch();
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new("Traveler".to_string())
    }
}

/// Partial update for the profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub avatar_uri: Option<String>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    pub uploaded: usize,
    pub downloaded: usize,
    pub conflicts: usize,
    /// One entry per record that failed, scoped to that record.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// How a manual conflict resolution should come out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    KeepLocal,
    KeepServer,
}

/// User-tunable sync behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    pub auto_sync_enabled: bool,
    pub sync_interval_minutes: u64,
    pub max_retries: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync_enabled: true,
            sync_interval_minutes: 15,
            max_retries: 3,
        }
    }
}
