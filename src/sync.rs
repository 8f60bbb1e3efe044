//! Reconciliation engine
//!
//! One pass works in four phases: push local changes (finishing deferred
//! deletions first), pull remote changes and flag conflicts, auto-resolve
//! flagged records by last writer wins, then bring the profile in line.
//! At most one pass per user runs at a time; a second attempt fails fast.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::error::SyncError;
use crate::models::{ConflictStrategy, Photo, Profile, SyncResult, SyncStatus};
use crate::remote::{photo_blob_path, RemoteError, RemotePhoto, RemoteProfile, RemoteStore};
use crate::storage::LocalStore;

const MAX_PARALLEL_UPLOADS: usize = 3;

/// State handed back by a completed pass.
#[derive(Debug)]
pub struct SyncOutcome {
    pub photos: Vec<Photo>,
    pub profile: Profile,
    pub result: SyncResult,
}

/// Runs reconciliation passes for one user against one remote.
pub struct SyncEngine {
    user_id: String,
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    storage_path: String,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag on every exit path.
#[derive(Debug)]
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    pub fn new(
        user_id: &str,
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        storage_path: &str,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            store,
            remote,
            storage_path: storage_path.to_string(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a pass (or a manual resolution) holds the in-flight flag.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<InFlightGuard, SyncError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }
        Ok(InFlightGuard {
            flag: self.in_flight.clone(),
        })
    }

    /// Runs one full reconciliation pass over the given snapshot and returns
    /// the reconciled state. Per-record failures are collected in the result;
    /// only being offline or a pass already running fail the call, and both
    /// leave local state untouched.
    pub async fn run(
        &self,
        photos: Vec<Photo>,
        profile: Profile,
    ) -> Result<SyncOutcome, SyncError> {
        let _guard = self.acquire()?;
        let started = Instant::now();

        if !self.remote.check_connectivity().await {
            log::info!("Sync skipped for user {}: offline", self.user_id);
            return Err(SyncError::Offline);
        }

        log::info!("Starting sync for user {}", self.user_id);
        let mut photos = photos;
        let mut result = SyncResult::default();

        self.upload_phase(&mut photos, &mut result).await;
        self.download_phase(&mut photos, &mut result).await;
        self.resolve_phase(&mut photos, &mut result).await;
        let profile = self.sync_profile(profile, &mut result).await;

        self.store.save_photos(&self.user_id, &photos);
        self.store.save_profile(&self.user_id, &profile);

        result.duration_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Sync finished for user {}: {} uploaded, {} downloaded, {} conflicts, {} errors in {}ms",
            self.user_id,
            result.uploaded,
            result.downloaded,
            result.conflicts,
            result.errors.len(),
            result.duration_ms
        );
        Ok(SyncOutcome {
            photos,
            profile,
            result,
        })
    }

    /// Phase 1: finish deferred deletions, then push every record with
    /// unsynced edits. Uploads run on a JoinSet, at most
    /// `MAX_PARALLEL_UPLOADS` at a time.
    async fn upload_phase(&self, photos: &mut Vec<Photo>, result: &mut SyncResult) {
        let mut confirmed: Vec<String> = Vec::new();
        for photo in photos.iter().filter(|p| p.deleted) {
            match self.remote.delete_photo(&photo.id).await {
                Ok(()) => {
                    log::info!("Confirmed deletion of {}", photo.id);
                    confirmed.push(photo.id.clone());
                }
                Err(e) => {
                    log::warn!("Deletion of {} still pending: {}", photo.id, e);
                    result.errors.push(format!("delete {}: {}", photo.id, e));
                }
            }
        }
        photos.retain(|p| !confirmed.contains(&p.id));

        let dirty: Vec<Photo> = photos
            .iter()
            .filter(|p| !p.deleted && p.sync_status.has_unsynced_edits())
            .cloned()
            .collect();
        if dirty.is_empty() {
            return;
        }
        log::info!("Uploading {} changed records", dirty.len());

        for photo in photos
            .iter_mut()
            .filter(|p| !p.deleted && p.sync_status.has_unsynced_edits())
        {
            photo.sync_status = SyncStatus::Uploading;
        }

        let mut join_set = JoinSet::new();
        let mut outcomes: Vec<(String, Result<(), RemoteError>)> = Vec::new();

        for photo in dirty {
            let remote = self.remote.clone();
            let user_id = self.user_id.clone();

            while join_set.len() >= MAX_PARALLEL_UPLOADS {
                if let Some(Ok(outcome)) = join_set.join_next().await {
                    outcomes.push(outcome);
                }
            }

            join_set.spawn(async move {
                let outcome = push_photo(remote.as_ref(), &user_id, &photo).await;
                (photo.id, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Ok(outcome) = joined {
                outcomes.push(outcome);
            }
        }

        for (id, outcome) in outcomes {
            if let Some(photo) = photos.iter_mut().find(|p| p.id == id) {
                match outcome {
                    Ok(()) => {
                        mark_uploaded(photo);
                        result.uploaded += 1;
                    }
                    Err(e) => {
                        log::error!("Upload of {} failed: {}", id, e);
                        photo.sync_status = SyncStatus::Error;
                        result.errors.push(format!("upload {}: {}", id, e));
                    }
                }
            }
        }
    }

    /// Phase 2: pull the remote listing, materialize records this device has
    /// never seen, flag diverged records as conflicts and adopt newer remote
    /// copies of clean records. Tombstones are never resurrected.
    async fn download_phase(&self, photos: &mut Vec<Photo>, result: &mut SyncResult) {
        let remote_photos = match self.remote.list_photos(&self.user_id).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("Failed to list remote photos: {}", e);
                result.errors.push(format!("list photos: {}", e));
                return;
            }
        };

        for remote_photo in remote_photos {
            match photos.iter().position(|p| p.id == remote_photo.id) {
                None => {
                    let dest = self.blob_dest(&remote_photo.id);
                    match self.remote.download_blob(&remote_photo.uri, &dest).await {
                        Ok(local_uri) => {
                            photos.push(remote_photo.into_photo(local_uri));
                            result.downloaded += 1;
                        }
                        Err(e) => {
                            log::error!("Download of {} failed: {}", remote_photo.id, e);
                            result
                                .errors
                                .push(format!("download {}: {}", remote_photo.id, e));
                        }
                    }
                }
                Some(idx) => {
                    let local = &mut photos[idx];
                    if local.deleted {
                        continue;
                    }
                    if local.sync_status.has_unsynced_edits()
                        && local.last_modified != remote_photo.last_modified
                    {
                        log::warn!(
                            "Conflict on {}: local modified at {}, remote at {}",
                            local.id,
                            local.last_modified,
                            remote_photo.last_modified
                        );
                        local.sync_status = SyncStatus::Conflict;
                        result.conflicts += 1;
                    } else if remote_photo.last_modified > local.last_modified
                        && local.sync_status == SyncStatus::Synced
                    {
                        match self.adopt_remote(local, &remote_photo).await {
                            Ok(()) => result.downloaded += 1,
                            Err(e) => {
                                log::error!(
                                    "Failed to adopt newer copy of {}: {}",
                                    remote_photo.id,
                                    e
                                );
                                result
                                    .errors
                                    .push(format!("download {}: {}", remote_photo.id, e));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Phase 3: settle every flagged record by last writer wins against the
    /// freshest remote copy. A failed resolution keeps the record in conflict
    /// for manual intervention.
    async fn resolve_phase(&self, photos: &mut Vec<Photo>, result: &mut SyncResult) {
        for photo in photos
            .iter_mut()
            .filter(|p| p.sync_status == SyncStatus::Conflict && !p.deleted)
        {
            if let Err(e) = self.resolve_by_lww(photo).await {
                log::error!("Auto-resolution of {} failed: {}", photo.id, e);
                photo.sync_status = SyncStatus::Conflict;
                result.errors.push(format!("resolve {}: {}", photo.id, e));
            }
        }
    }

    async fn resolve_by_lww(&self, photo: &mut Photo) -> Result<(), RemoteError> {
        match self.remote.get_photo(&photo.id).await? {
            Some(remote_photo) if remote_photo.last_modified > photo.last_modified => {
                log::info!(
                    "Conflict on {}: remote wins ({} > {})",
                    photo.id,
                    remote_photo.last_modified,
                    photo.last_modified
                );
                self.adopt_remote(photo, &remote_photo).await?;
            }
            _ => {
                // Local wins; also covers a remote copy that has vanished.
                log::info!("Conflict on {}: local wins", photo.id);
                push_photo(self.remote.as_ref(), &self.user_id, photo).await?;
                mark_uploaded(photo);
            }
        }
        Ok(())
    }

    /// Phase 4: the profile is a single-record edition of the same scheme.
    /// A strictly newer remote copy wins; otherwise local edits are pushed.
    /// Failures mark the profile, they never fail the pass.
    async fn sync_profile(&self, mut profile: Profile, result: &mut SyncResult) -> Profile {
        let remote_copy = match self.remote.get_profile(&self.user_id).await {
            Ok(copy) => copy,
            Err(e) => {
                log::error!("Failed to fetch remote profile: {}", e);
                result.errors.push(format!("profile: {}", e));
                profile.sync_status = SyncStatus::Error;
                return profile;
            }
        };

        match remote_copy {
            Some(remote_profile) if remote_profile.last_modified > profile.last_modified => {
                if profile.sync_status.has_unsynced_edits() {
                    log::warn!(
                        "Profile conflict: remote wins ({} > {})",
                        remote_profile.last_modified,
                        profile.last_modified
                    );
                    result.conflicts += 1;
                }
                profile = remote_profile.into_profile();
                result.downloaded += 1;
            }
            _ => {
                if profile.sync_status.has_unsynced_edits() {
                    let record = RemoteProfile::from_profile(&profile, &self.user_id);
                    match self.remote.put_profile(&record).await {
                        Ok(()) => {
                            profile.sync_status = SyncStatus::Synced;
                            result.uploaded += 1;
                        }
                        Err(e) => {
                            log::error!("Profile upload failed: {}", e);
                            result.errors.push(format!("profile: {}", e));
                            profile.sync_status = SyncStatus::Error;
                        }
                    }
                }
            }
        }
        profile
    }

    /// Applies a manual conflict decision to one record. Serialized against
    /// running passes through the same in-flight flag.
    pub async fn resolve_photo(
        &self,
        mut photo: Photo,
        strategy: ConflictStrategy,
    ) -> Result<Photo, SyncError> {
        let _guard = self.acquire()?;

        match strategy {
            ConflictStrategy::KeepLocal => {
                push_photo(self.remote.as_ref(), &self.user_id, &photo).await?;
                mark_uploaded(&mut photo);
                Ok(photo)
            }
            ConflictStrategy::KeepServer => {
                let remote_photo =
                    self.remote.get_photo(&photo.id).await?.ok_or_else(|| {
                        SyncError::Validation(format!("no remote copy of {} to keep", photo.id))
                    })?;
                self.adopt_remote(&mut photo, &remote_photo).await?;
                Ok(photo)
            }
        }
    }

    /// Overwrites a local record with the remote state, fetching the blob
    /// again when the local file is gone or was never downloaded.
    async fn adopt_remote(
        &self,
        local: &mut Photo,
        remote_photo: &RemotePhoto,
    ) -> Result<(), RemoteError> {
        if is_remote_uri(&local.uri) || !Path::new(local_path(&local.uri)).exists() {
            local.sync_status = SyncStatus::Downloading;
            let dest = self.blob_dest(&local.id);
            match self.remote.download_blob(&remote_photo.uri, &dest).await {
                Ok(local_uri) => local.uri = local_uri,
                Err(e) => {
                    // Keep the stale copy consistent rather than half-updated.
                    local.sync_status = SyncStatus::Synced;
                    return Err(e);
                }
            }
        }
        remote_photo.apply_to(local);
        Ok(())
    }

    fn blob_dest(&self, photo_id: &str) -> String {
        format!(
            "{}/{}.jpg",
            self.storage_path.trim_end_matches('/'),
            photo_id
        )
    }
}

/// Pushes one record: blob first when it still lives only on this device,
/// then the metadata upsert keyed by the record id. A metadata-only change
/// keeps whatever blob location the remote record already carries.
async fn push_photo(
    remote: &dyn RemoteStore,
    user_id: &str,
    photo: &Photo,
) -> Result<(), RemoteError> {
    let mut remote_uri = photo.uri.clone();
    if !is_remote_uri(&photo.uri) {
        if photo.needs_upload {
            let blob_path = photo_blob_path(user_id, &photo.id);
            remote_uri = remote
                .upload_blob(local_path(&photo.uri), &blob_path)
                .await?;
        } else if let Some(existing) = remote.get_photo(&photo.id).await? {
            remote_uri = existing.uri;
        }
    }
    let record = RemotePhoto::from_photo(photo, user_id, remote_uri);
    remote.put_photo(&record).await
}

fn mark_uploaded(photo: &mut Photo) {
    photo.sync_status = SyncStatus::Synced;
    photo.needs_upload = false;
    photo.server_id = Some(photo.id.clone());
}

/// A uri that is already served remotely needs no blob upload.
fn is_remote_uri(uri: &str) -> bool {
    !uri.starts_with("file://") && uri.contains("://")
}

/// Filesystem path behind a local uri.
fn local_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}
