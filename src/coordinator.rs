//! Journal coordinator
//!
//! Owns the canonical in-memory collection, persists every mutation, runs
//! the periodic auto-sync task and publishes state snapshots over a watch
//! channel. All user-facing operations go through here.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::models::{
    now_ms, ConflictStrategy, Photo, PhotoEdit, Profile, ProfileEdit, SyncResult, SyncSettings,
    SyncStatus,
};
use crate::remote::RemoteStore;
use crate::storage::LocalStore;
use crate::sync::SyncEngine;

/// Snapshot published to subscribers after every mutation and sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync: Option<i64>,
    pub pending_count: usize,
    pub conflict_count: usize,
}

struct JournalState {
    photos: Vec<Photo>,
    profile: Profile,
    /// Ids whose remote copy was confirmed deleted since the last merge.
    /// A pass snapshotted before the removal still carries these records.
    removed_ids: HashSet<String>,
}

pub struct SyncCoordinator {
    user_id: String,
    engine: SyncEngine,
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    settings: SyncSettings,
    state: Mutex<JournalState>,
    is_online: AtomicBool,
    last_sync_ms: AtomicI64,
    auto_sync: Mutex<Option<JoinHandle<()>>>,
    state_tx: watch::Sender<SyncState>,
}

impl SyncCoordinator {
    /// Loads the user's journal from the store and builds the coordinator.
    /// Loads are recovering, so construction never fails. Connectivity starts
    /// optimistic; call [`refresh_connectivity`](Self::refresh_connectivity)
    /// for an actual probe.
    pub fn new(
        user_id: &str,
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        settings: SyncSettings,
        storage_path: &str,
    ) -> Arc<Self> {
        let photos = store.load_photos(user_id);
        let profile = store.load_profile(user_id);
        let last_sync = store.last_sync(user_id);
        log::info!(
            "Loaded journal for user {}: {} photos",
            user_id,
            photos.len()
        );

        let engine = SyncEngine::new(user_id, store.clone(), remote.clone(), storage_path);
        let initial = SyncState {
            is_online: true,
            is_syncing: false,
            last_sync,
            pending_count: pending_count(&photos, &profile),
            conflict_count: conflict_count(&photos),
        };
        let (state_tx, _) = watch::channel(initial);

        Arc::new(Self {
            user_id: user_id.to_string(),
            engine,
            store,
            remote,
            settings,
            state: Mutex::new(JournalState {
                photos,
                profile,
                removed_ids: HashSet::new(),
            }),
            is_online: AtomicBool::new(true),
            last_sync_ms: AtomicI64::new(last_sync.unwrap_or(0)),
            auto_sync: Mutex::new(None),
            state_tx,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, JournalState> {
        // A poisoned lock still holds a usable collection.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.sync_state());
    }

    /// Creates a record for a freshly captured photo and persists it.
    pub fn add_photo(&self, uri: String, location_name: Option<String>) -> Photo {
        let photo = Photo::new(uri, location_name);
        log::info!("Added photo {}", photo.id);
        {
            let mut state = self.lock_state();
            state.photos.insert(0, photo.clone());
            self.store.save_photos(&self.user_id, &state.photos);
        }
        self.publish_state();
        photo
    }

    /// Applies a metadata patch to one photo. Records with an unresolved
    /// conflict reject edits until the conflict is settled.
    pub fn update_photo(&self, id: &str, edit: &PhotoEdit) -> Result<Photo, SyncError> {
        let updated = {
            let mut state = self.lock_state();
            let photo = state
                .photos
                .iter_mut()
                .find(|p| p.id == id && !p.deleted)
                .ok_or_else(|| SyncError::NotFound(format!("photo {}", id)))?;
            if photo.sync_status == SyncStatus::Conflict {
                return Err(SyncError::Validation(format!(
                    "photo {} has an unresolved conflict",
                    id
                )));
            }
            photo.apply_edit(edit);
            let updated = photo.clone();
            self.store.save_photos(&self.user_id, &state.photos);
            updated
        };
        self.publish_state();
        Ok(updated)
    }

    /// Removes a photo. The remote copy is deleted first; when that fails the
    /// record is tombstoned and the next sync pass finishes the job.
    pub async fn remove_photo(&self, id: &str) -> Result<(), SyncError> {
        {
            let state = self.lock_state();
            if !state.photos.iter().any(|p| p.id == id && !p.deleted) {
                return Err(SyncError::NotFound(format!("photo {}", id)));
            }
        }

        match self.remote.delete_photo(id).await {
            Ok(()) => {
                log::info!("Removed photo {}", id);
                let mut state = self.lock_state();
                state.photos.retain(|p| p.id != id);
                state.removed_ids.insert(id.to_string());
                self.store.save_photos(&self.user_id, &state.photos);
            }
            Err(e) => {
                log::warn!("Remote deletion of {} failed, deferring: {}", id, e);
                let mut state = self.lock_state();
                if let Some(photo) = state.photos.iter_mut().find(|p| p.id == id) {
                    photo.deleted = true;
                }
                self.store.save_photos(&self.user_id, &state.photos);
            }
        }
        self.publish_state();
        Ok(())
    }

    /// Applies a patch to the profile.
    pub fn set_profile(&self, edit: &ProfileEdit) -> Result<Profile, SyncError> {
        let updated = {
            let mut state = self.lock_state();
            if state.profile.sync_status == SyncStatus::Conflict {
                return Err(SyncError::Validation(
                    "profile has an unresolved conflict".to_string(),
                ));
            }
            state.profile.apply_edit(edit);
            self.store.save_profile(&self.user_id, &state.profile);
            state.profile.clone()
        };
        self.publish_state();
        Ok(updated)
    }

    /// Live photos, newest first. Tombstones awaiting deletion are hidden.
    pub fn photos(&self) -> Vec<Photo> {
        self.lock_state()
            .photos
            .iter()
            .filter(|p| !p.deleted)
            .cloned()
            .collect()
    }

    pub fn profile(&self) -> Profile {
        self.lock_state().profile.clone()
    }

    /// Runs one sync pass over a snapshot of the collection and merges the
    /// reconciled state back in. Edits that land while the pass is running
    /// are kept and picked up by the next pass.
    pub async fn sync_now(&self) -> Result<SyncResult, SyncError> {
        let (photos, profile) = {
            let state = self.lock_state();
            (state.photos.clone(), state.profile.clone())
        };

        let outcome = match self.engine.run(photos, profile).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, SyncError::Offline) {
                    self.is_online.store(false, Ordering::SeqCst);
                    self.publish_state();
                }
                return Err(e);
            }
        };

        self.is_online.store(true, Ordering::SeqCst);
        let now = now_ms();
        self.last_sync_ms.store(now, Ordering::SeqCst);
        self.store.set_last_sync(&self.user_id, now);

        {
            let mut state = self.lock_state();
            let removed = std::mem::take(&mut state.removed_ids);
            let mut photos = outcome.photos;
            // A removal confirmed mid-pass never comes back from the snapshot.
            photos.retain(|p| !removed.contains(&p.id));
            for current in state.photos.drain(..) {
                match photos.iter_mut().find(|p| p.id == current.id) {
                    Some(reconciled) => {
                        // An edit or removal that landed mid-pass wins over
                        // the reconciled copy and syncs next time.
                        if current.last_modified > reconciled.last_modified
                            || (current.deleted && !reconciled.deleted)
                        {
                            *reconciled = current;
                        }
                    }
                    None => {
                        if !current.deleted && current.sync_status.has_unsynced_edits() {
                            photos.push(current);
                        }
                    }
                }
            }
            state.photos = photos;
            if state.profile.last_modified <= outcome.profile.last_modified {
                state.profile = outcome.profile;
            }
            self.store.save_photos(&self.user_id, &state.photos);
            self.store.save_profile(&self.user_id, &state.profile);
        }
        self.publish_state();
        Ok(outcome.result)
    }

    /// Starts or stops the periodic background sync. Idempotent in both
    /// directions. The task holds only a weak handle, so dropping the
    /// coordinator ends the loop.
    pub fn enable_auto_sync(self: &Arc<Self>, enabled: bool) {
        let mut task = self.auto_sync.lock().unwrap_or_else(|e| e.into_inner());
        if !enabled {
            if let Some(handle) = task.take() {
                handle.abort();
                log::info!("Auto-sync stopped");
            }
            return;
        }
        if task.is_some() {
            return;
        }

        let interval = Duration::from_secs(self.settings.sync_interval_minutes * 60);
        let coordinator = Arc::downgrade(self);
        log::info!(
            "Auto-sync started: every {} minutes",
            self.settings.sync_interval_minutes
        );
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                if coordinator.engine.is_syncing() {
                    log::debug!("Auto-sync tick skipped: a sync is already running");
                    continue;
                }
                if let Err(e) = coordinator.sync_now().await {
                    log::warn!("Auto-sync failed: {}", e);
                }
            }
        }));
    }

    /// Settles one conflicted record with an explicit decision.
    pub async fn resolve_conflict(
        &self,
        id: &str,
        strategy: ConflictStrategy,
    ) -> Result<Photo, SyncError> {
        let photo = {
            let state = self.lock_state();
            state
                .photos
                .iter()
                .find(|p| p.id == id && !p.deleted)
                .cloned()
                .ok_or_else(|| SyncError::NotFound(format!("photo {}", id)))?
        };
        if photo.sync_status != SyncStatus::Conflict {
            return Err(SyncError::Validation(format!(
                "photo {} is not in conflict",
                id
            )));
        }

        let resolved = self.engine.resolve_photo(photo, strategy).await?;
        log::info!("Conflict on {} resolved: {:?}", id, strategy);
        {
            let mut state = self.lock_state();
            if let Some(slot) = state.photos.iter_mut().find(|p| p.id == id) {
                *slot = resolved.clone();
            }
            self.store.save_photos(&self.user_id, &state.photos);
        }
        self.publish_state();
        Ok(resolved)
    }

    /// Current counts and flags, computed on demand.
    pub fn sync_state(&self) -> SyncState {
        let state = self.lock_state();
        let last = self.last_sync_ms.load(Ordering::SeqCst);
        SyncState {
            is_online: self.is_online.load(Ordering::SeqCst),
            is_syncing: self.engine.is_syncing(),
            last_sync: (last != 0).then_some(last),
            pending_count: pending_count(&state.photos, &state.profile),
            conflict_count: conflict_count(&state.photos),
        }
    }

    /// Probes the remote and records the result.
    pub async fn refresh_connectivity(&self) -> bool {
        let online = self.remote.check_connectivity().await;
        self.is_online.store(online, Ordering::SeqCst);
        self.publish_state();
        online
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self
            .auto_sync
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

fn pending_count(photos: &[Photo], profile: &Profile) -> usize {
    photos
        .iter()
        .filter(|p| p.deleted || p.sync_status.has_unsynced_edits())
        .count()
        + usize::from(profile.sync_status.has_unsynced_edits())
}

fn conflict_count(photos: &[Photo]) -> usize {
    photos
        .iter()
        .filter(|p| p.sync_status == SyncStatus::Conflict && !p.deleted)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRemote;
    use crate::models::SyncStatus;
    use std::path::Path;

    struct Rig {
        coordinator: Arc<SyncCoordinator>,
        remote: Arc<MemoryRemote>,
        store: Arc<LocalStore>,
        dir: tempfile::TempDir,
    }

    fn rig() -> Rig {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        let coordinator = SyncCoordinator::new(
            "alice",
            store.clone(),
            remote.clone(),
            SyncSettings::default(),
            dir.path().to_str().unwrap(),
        );
        Rig {
            coordinator,
            remote,
            store,
            dir,
        }
    }

    fn photo_file(dir: &Path, name: &str) -> String {
        let path = dir.join(format!("{}.jpg", name));
        std::fs::write(&path, b"jpeg").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_mutations_update_counts_and_last_sync() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");

        let photo = rig.coordinator.add_photo(uri, Some("Lisbon".to_string()));
        let state = rig.coordinator.sync_state();
        // The photo plus the never-synced default profile.
        assert_eq!(state.pending_count, 2);
        assert_eq!(state.conflict_count, 0);
        assert_eq!(state.last_sync, None);

        let result = rig.coordinator.sync_now().await.unwrap();
        assert_eq!(result.uploaded, 2);
        let state = rig.coordinator.sync_state();
        assert_eq!(state.pending_count, 0);
        assert!(state.last_sync.is_some());
        assert!(state.is_online);
        assert_eq!(rig.store.last_sync("alice"), state.last_sync);

        let updated = rig
            .coordinator
            .update_photo(
                &photo.id,
                &PhotoEdit {
                    title: Some("Tram 28".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.version > photo.version);
        assert_eq!(rig.coordinator.sync_state().pending_count, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_photo_is_not_found() {
        let rig = rig();
        let err = rig
            .coordinator
            .update_photo("missing", &PhotoEdit::default())
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_state_survives_a_restart() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        rig.coordinator.add_photo(uri, None);
        rig.coordinator.sync_now().await.unwrap();

        // A second coordinator on the same store sees the synced journal.
        let reopened = SyncCoordinator::new(
            "alice",
            rig.store.clone(),
            rig.remote.clone(),
            SyncSettings::default(),
            rig.dir.path().to_str().unwrap(),
        );
        assert_eq!(reopened.photos().len(), 1);
        assert_eq!(reopened.photos()[0].sync_status, SyncStatus::Synced);
        assert_eq!(reopened.sync_state().pending_count, 0);
        assert!(reopened.sync_state().last_sync.is_some());
    }

    #[tokio::test]
    async fn test_conflicted_photo_locks_edits_until_resolved() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        let photo = rig.coordinator.add_photo(uri, None);
        rig.coordinator.sync_now().await.unwrap();

        // Diverge: local edit that cannot upload, remote copy even newer.
        rig.remote.fail_puts_for(&photo.id);
        rig.coordinator
            .update_photo(
                &photo.id,
                &PhotoEdit {
                    title: Some("Mine".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let mut newer = rig.remote.stored_photo(&photo.id).unwrap();
        newer.title = Some("Theirs".to_string());
        newer.last_modified = rig.coordinator.photos()[0].last_modified + 1_000;
        rig.remote.seed_photo(newer);

        // The pass flags the divergence and auto-resolves it to the newer
        // remote copy, so nothing stays locked.
        rig.coordinator.sync_now().await.unwrap();
        assert_eq!(rig.coordinator.sync_state().conflict_count, 0);
        assert_eq!(
            rig.coordinator.photos()[0].title.as_deref(),
            Some("Theirs")
        );

        // With puts still failing a local-newer conflict stays unresolved.
        rig.coordinator
            .update_photo(
                &photo.id,
                &PhotoEdit {
                    note: Some("offline note".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        rig.coordinator.sync_now().await.unwrap();
        let state = rig.coordinator.sync_state();
        assert_eq!(state.conflict_count, 1);

        let err = rig
            .coordinator
            .update_photo(
                &photo.id,
                &PhotoEdit {
                    note: Some("locked".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        // Manual resolution unlocks the record again.
        rig.remote.clear_failures();
        let resolved = rig
            .coordinator
            .resolve_conflict(&photo.id, ConflictStrategy::KeepLocal)
            .await
            .unwrap();
        assert_eq!(resolved.sync_status, SyncStatus::Synced);
        assert_eq!(rig.coordinator.sync_state().conflict_count, 0);
        assert!(rig
            .coordinator
            .update_photo(
                &photo.id,
                &PhotoEdit {
                    note: Some("unlocked".to_string()),
                    ..Default::default()
                },
            )
            .is_ok());
    }

    #[tokio::test]
    async fn test_resolving_a_clean_photo_is_rejected() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        let photo = rig.coordinator.add_photo(uri, None);

        let err = rig
            .coordinator
            .resolve_conflict(&photo.id, ConflictStrategy::KeepLocal)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let err = rig
            .coordinator
            .resolve_conflict("missing", ConflictStrategy::KeepLocal)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_photo_defers_while_unreachable() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        let photo = rig.coordinator.add_photo(uri, None);
        rig.coordinator.sync_now().await.unwrap();

        rig.remote.set_online(false);
        rig.coordinator.remove_photo(&photo.id).await.unwrap();

        // Hidden locally, tombstone pending, remote copy still there.
        assert!(rig.coordinator.photos().is_empty());
        assert_eq!(rig.coordinator.sync_state().pending_count, 1);
        assert!(rig.remote.stored_photo(&photo.id).is_some());

        rig.remote.set_online(true);
        rig.coordinator.sync_now().await.unwrap();
        assert!(rig.remote.stored_photo(&photo.id).is_none());
        assert_eq!(rig.coordinator.sync_state().pending_count, 0);
        assert!(rig.store.load_photos("alice").is_empty());
    }

    #[tokio::test]
    async fn test_remove_local_only_photo_is_immediate() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        let photo = rig.coordinator.add_photo(uri, None);

        rig.coordinator.remove_photo(&photo.id).await.unwrap();
        assert!(rig.coordinator.photos().is_empty());
        // No tombstone: there was never a remote copy to delete.
        assert!(rig.store.load_photos("alice").is_empty());

        let err = rig.coordinator.remove_photo(&photo.id).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_offline_sync_flips_connectivity() {
        let rig = rig();
        rig.remote.set_online(false);

        let err = rig.coordinator.sync_now().await.unwrap_err();
        assert!(matches!(err, SyncError::Offline));
        assert!(!rig.coordinator.sync_state().is_online);

        rig.remote.set_online(true);
        assert!(rig.coordinator.refresh_connectivity().await);
        assert!(rig.coordinator.sync_state().is_online);
    }

    #[tokio::test]
    async fn test_watch_channel_tracks_mutations() {
        let rig = rig();
        let mut rx = rig.coordinator.subscribe_state();
        assert_eq!(rx.borrow_and_update().pending_count, 1);

        let uri = photo_file(rig.dir.path(), "a");
        rig.coordinator.add_photo(uri, None);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().pending_count, 2);

        rig.coordinator.sync_now().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.pending_count, 0);
        assert!(state.last_sync.is_some());
    }

    #[tokio::test]
    async fn test_profile_edit_round_trip() {
        let rig = rig();
        let profile = rig
            .coordinator
            .set_profile(&ProfileEdit {
                name: Some("Alice".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.sync_status, SyncStatus::Pending);

        rig.coordinator.sync_now().await.unwrap();
        assert_eq!(rig.coordinator.profile().sync_status, SyncStatus::Synced);
        assert_eq!(rig.remote.stored_profile("alice").unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_edit_during_sync_is_not_lost() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        rig.coordinator.add_photo(uri, None);
        rig.coordinator.sync_now().await.unwrap();

        // Slow the remote down, then edit while a pass is in flight.
        rig.remote.set_latency(Duration::from_millis(50));
        let coordinator = rig.coordinator.clone();
        let pass = tokio::spawn(async move { coordinator.sync_now().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let uri = photo_file(rig.dir.path(), "b");
        let late = rig.coordinator.add_photo(uri, None);
        pass.await.unwrap().unwrap();

        // The mid-pass addition survived the merge and is still pending.
        let photos = rig.coordinator.photos();
        assert_eq!(photos.len(), 2);
        let kept = photos.iter().find(|p| p.id == late.id).unwrap();
        assert_eq!(kept.sync_status, SyncStatus::Pending);
        assert_eq!(rig.coordinator.sync_state().pending_count, 1);
    }

    #[tokio::test]
    async fn test_remove_during_sync_is_not_resurrected() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        let photo = rig.coordinator.add_photo(uri, None);
        rig.coordinator.sync_now().await.unwrap();

        // Remove the photo while a pass holding its snapshot is in flight.
        rig.remote.set_latency(Duration::from_millis(50));
        let coordinator = rig.coordinator.clone();
        let pass = tokio::spawn(async move { coordinator.sync_now().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        rig.coordinator.remove_photo(&photo.id).await.unwrap();
        assert!(rig.coordinator.photos().is_empty());
        assert!(rig.remote.stored_photo(&photo.id).is_none());
        pass.await.unwrap().unwrap();

        // The pass's reconciled copy does not bring the photo back.
        assert!(rig.coordinator.photos().is_empty());
        assert!(rig.store.load_photos("alice").is_empty());
        assert_eq!(rig.coordinator.sync_state().pending_count, 0);
        assert!(rig.remote.stored_photo(&photo.id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_sync_runs_on_its_interval() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        rig.coordinator.add_photo(uri, None);

        rig.coordinator.enable_auto_sync(true);
        // Enabling twice must not spawn a second loop.
        rig.coordinator.enable_auto_sync(true);

        tokio::time::sleep(Duration::from_secs(15 * 60 + 1)).await;
        tokio::task::yield_now().await;
        assert_eq!(rig.remote.photo_count(), 1);
        assert_eq!(rig.coordinator.sync_state().pending_count, 0);

        rig.coordinator.enable_auto_sync(false);
        let uri = photo_file(rig.dir.path(), "b");
        rig.coordinator.add_photo(uri, None);
        tokio::time::sleep(Duration::from_secs(16 * 60)).await;
        assert_eq!(rig.remote.photo_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_sync_tick_skips_while_a_pass_runs() {
        let rig = rig();
        let uri = photo_file(rig.dir.path(), "a");
        rig.coordinator.add_photo(uri, None);
        rig.coordinator.enable_auto_sync(true);

        // Each remote call outlasts the whole interval, so the manual pass
        // below is still inside its first call when the tick fires.
        rig.remote.set_latency(Duration::from_secs(1_000));
        let coordinator = rig.coordinator.clone();
        let pass = tokio::spawn(async move { coordinator.sync_now().await });

        tokio::time::sleep(Duration::from_secs(16 * 60)).await;
        assert!(rig.coordinator.sync_state().is_syncing);
        // The tick did not start a second pass.
        assert_eq!(rig.remote.connectivity_checks(), 1);

        pass.await.unwrap().unwrap();
        assert_eq!(rig.remote.photo_count(), 1);
        assert_eq!(rig.remote.connectivity_checks(), 1);

        // The first tick after the pass completes syncs again.
        tokio::time::sleep(Duration::from_secs(15 * 60 + 1)).await;
        assert_eq!(rig.remote.connectivity_checks(), 2);
        assert!(rig.coordinator.sync_state().is_syncing);
    }
}
