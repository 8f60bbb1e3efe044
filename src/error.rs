use std::fmt;

use crate::remote::RemoteError;
use crate::storage::StoreError;

/// Central error type for sync operations
#[derive(Debug)]
pub enum SyncError {
    /// Remote service unreachable; nothing was attempted
    Offline,
    /// Another sync pass for this user is already in flight
    AlreadyRunning,
    /// Remote API or transfer failure
    Remote(RemoteError),
    /// Local persistence failure
    Store(StoreError),
    /// Record not found
    NotFound(String),
    /// Operation rejected in the record's current state
    Validation(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyncError::Offline => write!(f, "Device is offline"),
            SyncError::AlreadyRunning => write!(f, "Sync already in progress"),
            SyncError::Remote(e) => write!(f, "Remote error: {}", e),
            SyncError::Store(e) => write!(f, "Storage error: {}", e),
            SyncError::NotFound(msg) => write!(f, "Not found: {}", msg),
            SyncError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

// Conversions from other error types
impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        SyncError::Remote(e)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}

impl SyncError {
    /// Whether retrying later without operator attention makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Offline | SyncError::AlreadyRunning => true,
            SyncError::Remote(e) => e.is_network(),
            SyncError::Store(_) | SyncError::NotFound(_) | SyncError::Validation(_) => false,
        }
    }
}
