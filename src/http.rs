//! REST client for the journal sync service
//!
//! Record endpoints exchange JSON under bearer-token auth; blob endpoints
//! move raw bytes. The connectivity probe is a cheap HEAD against /health.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::remote::{RemoteError, RemotePhoto, RemoteProfile, RemoteStore};

/// Configuration for the REST remote
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_url: String,
    pub auth_token: String,
}

/// Remote store backed by the journal REST service
pub struct HttpRemote {
    config: RemoteConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct BlobLocation {
    url: String,
}

impl HttpRemote {
    /// Create a new REST remote
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Upload a blob with retry logic
    pub async fn upload_blob_with_retry(
        &self,
        local_path: &str,
        remote_path: &str,
        max_retries: u32,
    ) -> Result<String, RemoteError> {
        let mut retries = 0;

        loop {
            match self.upload_blob(local_path, remote_path).await {
                Ok(url) => return Ok(url),
                Err(e) if retries < max_retries && e.is_network() => {
                    retries += 1;
                    let backoff = calculate_backoff(retries);
                    log::warn!(
                        "Blob upload failed (attempt {}/{}): {}. Retrying in {}s...",
                        retries,
                        max_retries + 1,
                        e,
                        backoff
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Download a blob with retry logic
    pub async fn download_blob_with_retry(
        &self,
        url: &str,
        dest_path: &str,
        max_retries: u32,
    ) -> Result<String, RemoteError> {
        let mut retries = 0;

        loop {
            match self.download_blob(url, dest_path).await {
                Ok(path) => return Ok(path),
                Err(e) if retries < max_retries && e.is_network() => {
                    retries += 1;
                    let backoff = calculate_backoff(retries);
                    log::warn!(
                        "Blob download failed (attempt {}/{}): {}. Retrying in {}s...",
                        retries,
                        max_retries + 1,
                        e,
                        backoff
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Checks the response status, turning non-success answers into API errors.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn check_connectivity(&self) -> bool {
        let result = self
            .client
            .head(self.endpoint("health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::debug!("Connectivity probe failed: {}", e);
                false
            }
        }
    }

    async fn list_photos(&self, user_id: &str) -> Result<Vec<RemotePhoto>, RemoteError> {
        let resp = self
            .client
            .get(self.endpoint("photos"))
            .query(&[("userId", user_id)])
            .bearer_auth(&self.config.auth_token)
            .send()
            .await
            .map_err(transport_error)?;
        let body = check_status(resp)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_photo(&self, id: &str) -> Result<Option<RemotePhoto>, RemoteError> {
        let resp = self
            .client
            .get(self.endpoint(&format!("photos/{}", id)))
            .bearer_auth(&self.config.auth_token)
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = check_status(resp)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn put_photo(&self, photo: &RemotePhoto) -> Result<(), RemoteError> {
        let resp = self
            .client
            .put(self.endpoint(&format!("photos/{}", photo.id)))
            .bearer_auth(&self.config.auth_token)
            .json(photo)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await?;
        Ok(())
    }

    async fn delete_photo(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .client
            .delete(self.endpoint(&format!("photos/{}", id)))
            .bearer_auth(&self.config.auth_token)
            .send()
            .await
            .map_err(transport_error)?;
        // A record that is already gone counts as deleted.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp).await?;
        Ok(())
    }

    async fn upload_blob(
        &self,
        local_path: &str,
        remote_path: &str,
    ) -> Result<String, RemoteError> {
        let file_data = std::fs::read(local_path)?;

        let resp = self
            .client
            .put(self.endpoint(&format!("blobs/{}", remote_path)))
            .bearer_auth(&self.config.auth_token)
            .body(file_data)
            .send()
            .await
            .map_err(transport_error)?;
        let body = check_status(resp)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        let location: BlobLocation = serde_json::from_str(&body)?;

        log::info!("Uploaded blob {} to {}", local_path, remote_path);
        Ok(location.url)
    }

    async fn download_blob(&self, url: &str, dest_path: &str) -> Result<String, RemoteError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.config.auth_token)
            .send()
            .await
            .map_err(transport_error)?;
        let bytes = check_status(resp)
            .await?
            .bytes()
            .await
            .map_err(transport_error)?;

        if let Some(parent) = Path::new(dest_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest_path, &bytes)?;

        log::info!("Downloaded blob {} to {}", url, dest_path);
        Ok(dest_path.to_string())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, RemoteError> {
        let resp = self
            .client
            .get(self.endpoint("profile"))
            .query(&[("userId", user_id)])
            .bearer_auth(&self.config.auth_token)
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = check_status(resp)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn put_profile(&self, profile: &RemoteProfile) -> Result<(), RemoteError> {
        let resp = self
            .client
            .put(self.endpoint("profile"))
            .bearer_auth(&self.config.auth_token)
            .json(profile)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await?;
        Ok(())
    }
}

/// Calculate exponential backoff delay with jitter
fn calculate_backoff(retry: u32) -> u64 {
    use rand::Rng;

    let base_delay = 60 * (1 << (retry - 1).min(4)); // 60s, 120s, 240s, 480s, 960s
    let max_delay = base_delay.min(300); // Cap at 300s (5 minutes)
    rand::rng().random_range(0..=max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_stays_capped() {
        for retry in 1..=10 {
            assert!(calculate_backoff(retry) <= 300);
        }
    }

    #[test]
    fn test_endpoint_join() {
        let remote = HttpRemote::new(RemoteConfig {
            api_url: "https://journal.example.com/api/".to_string(),
            auth_token: "token".to_string(),
        });
        assert_eq!(
            remote.endpoint("photos"),
            "https://journal.example.com/api/photos"
        );
        assert_eq!(
            remote.endpoint("/photos/abc"),
            "https://journal.example.com/api/photos/abc"
        );
    }
}
