use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::config::BackendSection;

use super::error::{BackendError, BackendResult};
use super::models::{Account, ListingBatch, ListingStats, Listing, Location, MediaJob, RecordId};

/// Typed operations against the listing backend.
#[async_trait(?Send)]
pub trait BackendApi {
    async fn accounts_to_update(&self) -> BackendResult<Vec<Account>>;
    async fn accounts_to_clear(&self) -> BackendResult<Vec<Account>>;
    async fn pending_listings(&self) -> BackendResult<Vec<Listing>>;
    async fn pending_media(&self) -> BackendResult<Vec<MediaJob>>;
    async fn location(&self, posting_id: &RecordId) -> BackendResult<Location>;
    async fn update_account(&self, account_id: &RecordId, stats: &ListingStats)
        -> BackendResult<()>;
    async fn mark_listing_published(
        &self,
        listing_id: &RecordId,
        location_id: &RecordId,
    ) -> BackendResult<()>;
    async fn mark_listing_unpublished(&self, listing_id: &RecordId, reason: &str)
        -> BackendResult<()>;
    async fn mark_media_done(&self, job_id: &RecordId) -> BackendResult<()>;
    async fn mark_account_dropped(&self, account_id: &RecordId) -> BackendResult<()>;
    async fn upload_photo(&self, group_id: &RecordId, path: &Path) -> BackendResult<()>;
    /// Streams `url` into `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> BackendResult<u64>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendSection) -> BackendResult<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|err| BackendError::Url(format!("{base}: {err}")))?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|source| BackendError::Request {
                path: base.to_string(),
                source,
            })?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base
            .join(path)
            .map_err(|err| BackendError::Url(format!("{path}: {err}")))
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> BackendResult<String> {
        let response = request.send().await.map_err(|source| BackendError::Request {
            path: path.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        response.text().await.map_err(|source| BackendError::Request {
            path: path.to_string(),
            source,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "backend get");
        let body = self.send(path, self.client.get(url)).await?;
        decode(path, &body)
    }

    async fn post_json(&self, path: &str, payload: &Value) -> BackendResult<Value> {
        let url = self.endpoint(path)?;
        debug!(%url, "backend post");
        let body = self.send(path, self.client.post(url).json(payload)).await?;
        decode(path, &body)
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> BackendResult<T> {
    serde_json::from_str(body).map_err(|err| BackendError::Decode {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

#[async_trait(?Send)]
impl BackendApi for HttpBackend {
    async fn accounts_to_update(&self) -> BackendResult<Vec<Account>> {
        self.get_json("accounts/toupdate").await
    }

    async fn accounts_to_clear(&self) -> BackendResult<Vec<Account>> {
        self.get_json("listings/remove").await
    }

    async fn pending_listings(&self) -> BackendResult<Vec<Listing>> {
        let batch: ListingBatch = self.get_json("listings/get").await?;
        Ok(batch.into_listings())
    }

    async fn pending_media(&self) -> BackendResult<Vec<MediaJob>> {
        self.get_json("videos/get").await
    }

    async fn location(&self, posting_id: &RecordId) -> BackendResult<Location> {
        self.get_json(&format!("locations/{posting_id}/get")).await
    }

    async fn update_account(
        &self,
        account_id: &RecordId,
        stats: &ListingStats,
    ) -> BackendResult<()> {
        let payload = json!({
            "title": stats.title,
            "clicks": stats.clicks,
            "location": stats.location,
        });
        self.post_json(&format!("accounts/{account_id}/update"), &payload)
            .await
            .map(drop)
    }

    async fn mark_listing_published(
        &self,
        listing_id: &RecordId,
        location_id: &RecordId,
    ) -> BackendResult<()> {
        let payload = json!({ "state": "published", "location": location_id });
        self.post_json(&format!("listings/{listing_id}/published"), &payload)
            .await
            .map(drop)
    }

    async fn mark_listing_unpublished(
        &self,
        listing_id: &RecordId,
        reason: &str,
    ) -> BackendResult<()> {
        let payload = json!({ "state": "unpublished", "exception": reason });
        self.post_json(&format!("listings/{listing_id}/unpublished"), &payload)
            .await
            .map(drop)
    }

    async fn mark_media_done(&self, job_id: &RecordId) -> BackendResult<()> {
        let payload = json!({ "state": "published" });
        self.post_json(&format!("videos/{job_id}/published"), &payload)
            .await
            .map(drop)
    }

    async fn mark_account_dropped(&self, account_id: &RecordId) -> BackendResult<()> {
        let payload = json!({ "state": "droped" });
        self.post_json(&format!("accounts/{account_id}/droped"), &payload)
            .await
            .map(drop)
    }

    async fn upload_photo(&self, group_id: &RecordId, path: &Path) -> BackendResult<()> {
        let route = format!("photos/{group_id}/add");
        let url = self.endpoint(&route)?;
        let data = fs::read(path).await.map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame.jpg".to_string());
        let form = Form::new().part("photo", Part::bytes(data).file_name(file_name));
        let body = self
            .send(&route, self.client.post(url).multipart(form))
            .await?;
        decode::<Value>(&route, &body).map(drop)
    }

    async fn download(&self, url: &str, dest: &Path) -> BackendResult<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| BackendError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| BackendError::Request {
                path: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(BackendError::Status {
                status: response.status().as_u16(),
                path: url.to_string(),
            });
        }
        let mut file = fs::File::create(dest)
            .await
            .map_err(|source| BackendError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let data = chunk.map_err(|source| BackendError::Request {
                path: url.to_string(),
                source,
            })?;
            file.write_all(&data)
                .await
                .map_err(|source| BackendError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;
            written += data.len() as u64;
        }
        file.flush().await.map_err(|source| BackendError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        info!(%url, dest = %dest.display(), bytes = written, "download finished");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_the_base_path() {
        let backend = HttpBackend::new(&BackendSection {
            base_url: "https://backend.example/api".into(),
            ..BackendSection::default()
        })
        .unwrap();
        assert_eq!(
            backend.endpoint("listings/9/published").unwrap().as_str(),
            "https://backend.example/api/listings/9/published"
        );
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let err = decode::<Value>("videos/get", "<html>oops</html>").unwrap_err();
        assert!(matches!(err, BackendError::Decode { ref path, .. } if path == "videos/get"));
    }
}
