//! In-memory remote store
//!
//! Mirrors the REST service for tests and local development: records live in
//! maps, blobs are moved through real files, and switches simulate going
//! offline or individual writes failing.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::remote::{RemoteError, RemotePhoto, RemoteProfile, RemoteStore};

#[derive(Default)]
struct Inner {
    photos: HashMap<String, RemotePhoto>,
    profiles: HashMap<String, RemoteProfile>,
    blobs: HashMap<String, Vec<u8>>,
    failing_puts: HashSet<String>,
    failing_deletes: HashSet<String>,
    fail_profile_put: bool,
}

/// Remote store living entirely in process memory.
pub struct MemoryRemote {
    inner: Mutex<Inner>,
    online: AtomicBool,
    latency: Mutex<Option<Duration>>,
    connectivity_checks: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            online: AtomicBool::new(true),
            latency: Mutex::new(None),
            connectivity_checks: AtomicUsize::new(0),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulates losing or regaining the connection.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Every operation sleeps this long first, to widen race windows in tests.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = Some(latency);
    }

    /// Makes `put_photo` fail for this record id until cleared.
    pub fn fail_puts_for(&self, id: &str) {
        self.inner().failing_puts.insert(id.to_string());
    }

    /// Makes `delete_photo` fail for this record id until cleared.
    pub fn fail_deletes_for(&self, id: &str) {
        self.inner().failing_deletes.insert(id.to_string());
    }

    /// Makes `put_profile` fail until cleared.
    pub fn fail_profile_put(&self, fail: bool) {
        self.inner().fail_profile_put = fail;
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner();
        inner.failing_puts.clear();
        inner.failing_deletes.clear();
        inner.fail_profile_put = false;
    }

    /// Seeds a record directly, as if another device had synced it.
    pub fn seed_photo(&self, photo: RemotePhoto) {
        self.inner().photos.insert(photo.id.clone(), photo);
    }

    pub fn seed_profile(&self, profile: RemoteProfile) {
        self.inner()
            .profiles
            .insert(profile.user_id.clone(), profile);
    }

    pub fn seed_blob(&self, url: &str, bytes: Vec<u8>) {
        self.inner().blobs.insert(url.to_string(), bytes);
    }

    pub fn stored_photo(&self, id: &str) -> Option<RemotePhoto> {
        self.inner().photos.get(id).cloned()
    }

    pub fn stored_profile(&self, user_id: &str) -> Option<RemoteProfile> {
        self.inner().profiles.get(user_id).cloned()
    }

    pub fn stored_blob(&self, url: &str) -> Option<Vec<u8>> {
        self.inner().blobs.get(url).cloned()
    }

    pub fn photo_count(&self) -> usize {
        self.inner().photos.len()
    }

    /// Number of reachability probes answered so far.
    pub fn connectivity_checks(&self) -> usize {
        self.connectivity_checks.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> Result<(), RemoteError> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("remote unreachable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn check_connectivity(&self) -> bool {
        self.connectivity_checks.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.online.load(Ordering::SeqCst)
    }

    async fn list_photos(&self, user_id: &str) -> Result<Vec<RemotePhoto>, RemoteError> {
        self.simulate().await?;
        let mut photos: Vec<RemotePhoto> = self
            .inner()
            .photos
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(photos)
    }

    async fn get_photo(&self, id: &str) -> Result<Option<RemotePhoto>, RemoteError> {
        self.simulate().await?;
        Ok(self.inner().photos.get(id).cloned())
    }

    async fn put_photo(&self, photo: &RemotePhoto) -> Result<(), RemoteError> {
        self.simulate().await?;
        let mut inner = self.inner();
        if inner.failing_puts.contains(&photo.id) {
            return Err(RemoteError::Api {
                status: 500,
                message: "write rejected".to_string(),
            });
        }
        inner.photos.insert(photo.id.clone(), photo.clone());
        Ok(())
    }

    async fn delete_photo(&self, id: &str) -> Result<(), RemoteError> {
        self.simulate().await?;
        let mut inner = self.inner();
        if inner.failing_deletes.contains(id) {
            return Err(RemoteError::Api {
                status: 500,
                message: "delete rejected".to_string(),
            });
        }
        inner.photos.remove(id);
        Ok(())
    }

    async fn upload_blob(
        &self,
        local_path: &str,
        remote_path: &str,
    ) -> Result<String, RemoteError> {
        self.simulate().await?;
        let bytes = std::fs::read(local_path)?;
        let url = format!("memory://{}", remote_path);
        self.inner().blobs.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn download_blob(&self, url: &str, dest_path: &str) -> Result<String, RemoteError> {
        self.simulate().await?;
        let bytes = match self.inner().blobs.get(url) {
            Some(bytes) => bytes.clone(),
            None => {
                return Err(RemoteError::Api {
                    status: 404,
                    message: format!("no blob at {}", url),
                })
            }
        };
        if let Some(parent) = Path::new(dest_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest_path, &bytes)?;
        Ok(dest_path.to_string())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, RemoteError> {
        self.simulate().await?;
        Ok(self.inner().profiles.get(user_id).cloned())
    }

    async fn put_profile(&self, profile: &RemoteProfile) -> Result<(), RemoteError> {
        self.simulate().await?;
        let mut inner = self.inner();
        if inner.fail_profile_put {
            return Err(RemoteError::Api {
                status: 500,
                message: "write rejected".to_string(),
            });
        }
        inner
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Photo;

    fn remote_photo(id: &str, user_id: &str, last_modified: i64) -> RemotePhoto {
        let mut photo = Photo::new(format!("file:///{}.jpg", id), None);
        photo.id = id.to_string();
        photo.last_modified = last_modified;
        RemotePhoto::from_photo(&photo, user_id, photo.uri.clone())
    }

    #[tokio::test]
    async fn test_offline_rejects_calls() {
        let remote = MemoryRemote::new();
        remote.set_online(false);
        assert!(!remote.check_connectivity().await);
        let err = remote.list_photos("alice").await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_per_user() {
        let remote = MemoryRemote::new();
        remote.seed_photo(remote_photo("a", "alice", 100));
        remote.seed_photo(remote_photo("b", "alice", 300));
        remote.seed_photo(remote_photo("c", "alice", 200));
        remote.seed_photo(remote_photo("d", "bob", 400));

        let photos = remote.list_photos("alice").await.unwrap();
        let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_blob_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.jpg");
        std::fs::write(&src, b"jpeg bytes").unwrap();

        let remote = MemoryRemote::new();
        let url = remote
            .upload_blob(src.to_str().unwrap(), "photos/alice/p.jpg")
            .await
            .unwrap();
        assert_eq!(url, "memory://photos/alice/p.jpg");

        let dest = dir.path().join("nested/dest.jpg");
        remote
            .download_blob(&url, dest.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_put_failure_is_scoped_to_one_record() {
        let remote = MemoryRemote::new();
        remote.fail_puts_for("bad");
        assert!(remote.put_photo(&remote_photo("bad", "alice", 1)).await.is_err());
        assert!(remote.put_photo(&remote_photo("good", "alice", 1)).await.is_ok());
        assert_eq!(remote.photo_count(), 1);
    }
}
