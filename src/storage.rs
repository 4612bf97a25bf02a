//! Artifact persistence
//!
//! Every artifact is a pretty-printed JSON document written to
//! `<data_dir>/<name>.json`, fully overwritten each run. When an object store
//! is configured the same bytes are pushed to it afterwards; an upload failure
//! is logged and otherwise ignored.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::StorageError;

/// Timeout for a single upload
const UPLOAD_TIMEOUT_SECS: u64 = 30;

/// A document written to disk, ready to be uploaded
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub body: Vec<u8>,
}

// ============================================
// LOCAL JSON STORE
// ============================================

pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Serialize `value` and overwrite `<dir>/<name>.json`
    pub fn save<T>(&self, name: &str, value: &T) -> Result<Artifact, StorageError>
    where
        T: Serialize + ?Sized,
    {
        let file_name = format!("{}.json", name);
        let path = self.dir.join(&file_name);

        let json = serde_json::to_string_pretty(value)
            .map_err(|source| StorageError::Json { name: file_name.clone(), source })?;

        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;
        fs::write(&path, json.as_bytes()).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;

        debug!("Saved {} ({} bytes)", path.display(), json.len());
        Ok(Artifact { file_name, body: json.into_bytes() })
    }
}

// ============================================
// OBJECT STORE
// ============================================

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;
}

/// Plain HTTP PUT of `<base_url>/<key>`
pub struct HttpObjectStore {
    http_client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StorageError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| StorageError::Upload { key: String::new(), message: e.to_string() })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let upload_error = |message: String| StorageError::Upload { key: key.to_string(), message };

        let response = self
            .http_client
            .put(self.url_for(key))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(upload_error(format!("HTTP {}", status)));
        }
        Ok(())
    }
}

/// Push every artifact concurrently. Returns how many uploads succeeded.
pub async fn upload_artifacts(store: &dyn ObjectStore, artifacts: Vec<Artifact>) -> usize {
    let total = artifacts.len();
    let uploads = artifacts.into_iter().map(|artifact| async move {
        let result = store.put(&artifact.file_name, artifact.body).await;
        (artifact.file_name, result)
    });

    let mut uploaded = 0;
    for (file_name, result) in join_all(uploads).await {
        match result {
            Ok(()) => uploaded += 1,
            Err(e) => warn!("Upload of {} failed: {}", file_name, e),
        }
    }

    info!("Uploaded {}/{} artifacts", uploaded, total);
    uploaded
}
