//! # Journal Sync
//!
//! An offline-first synchronization core for a photo journaling app.
//!
//! This crate keeps a per-user photo journal usable without connectivity and
//! reconciles it with a remote backend when one is reachable, including:
//! - Versioned photo and profile records with explicit sync states
//! - A local SQLite store that absorbs corruption instead of failing startup
//! - A four-phase sync pass: upload, download, conflict resolution, profile
//! - Last-writer-wins conflict handling with a manual override
//! - A coordinator with periodic background sync and a live state feed
//!
//! ## Remote Backends
//!
//! The engine talks to any [`RemoteStore`] implementation. [`HttpRemote`]
//! speaks the journal REST API; [`MemoryRemote`] backs tests and local
//! development.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use journal_sync::{HttpRemote, LocalStore, RemoteConfig, SyncCoordinator, SyncSettings};
//!
//! let store = Arc::new(LocalStore::open("/data/journal.db")?);
//! let remote = Arc::new(HttpRemote::new(RemoteConfig {
//!     api_url: "https://journal.example.com/api".to_string(),
//!     auth_token: token,
//! }));
//!
//! let coordinator = SyncCoordinator::new("user-1", store, remote, SyncSettings::default(), "/data/photos");
//! coordinator.enable_auto_sync(true);
//! let photo = coordinator.add_photo("/data/photos/capture.jpg".to_string(), None);
//! coordinator.sync_now().await?;
//! ```

pub mod coordinator;
pub mod error;
pub mod http;
pub mod memory;
pub mod models;
pub mod remote;
pub mod schema;
pub mod storage;
pub mod sync;

pub use coordinator::{SyncCoordinator, SyncState};
pub use error::SyncError;
pub use http::{HttpRemote, RemoteConfig};
pub use memory::MemoryRemote;
pub use models::{
    date_iso_for, today_iso, ConflictStrategy, Photo, PhotoEdit, Profile, ProfileEdit, SyncResult,
    SyncSettings, SyncStatus,
};
pub use remote::{photo_blob_path, RemoteError, RemotePhoto, RemoteProfile, RemoteStore};
pub use schema::init_store_schema;
pub use storage::{LocalStore, StoreError};
pub use sync::{SyncEngine, SyncOutcome};
