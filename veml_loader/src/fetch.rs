//! Stock fetcher and store implementations.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::collaborators::{FetchError, FetchResponse, LocalStore, ResourceFetcher};

/// Serves `file://` URIs from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

#[async_trait]
impl ResourceFetcher for FileFetcher {
    async fn fetch(&self, uri: &Url) -> Result<FetchResponse, FetchError> {
        if uri.scheme() != "file" {
            return Err(FetchError::UnsupportedScheme(uri.clone()));
        }
        let path = uri
            .to_file_path()
            .map_err(|()| FetchError::UnsupportedScheme(uri.clone()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchResponse::ok(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(FetchResponse::not_found()),
            Err(err) => Err(FetchError::Transport {
                uri: uri.clone(),
                message: err.to_string(),
            }),
        }
    }
}

/// Serves a fixed set of resources from memory; unknown URIs are 404.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    latency: Mutex<HashMap<String, Duration>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: &Url, bytes: impl Into<Vec<u8>>) {
        self.resources.lock().insert(uri.to_string(), bytes.into());
    }

    /// Holds every fetch of `uri` for `latency` before answering.
    pub fn delay(&self, uri: &Url, latency: Duration) {
        self.latency.lock().insert(uri.to_string(), latency);
    }
}

#[async_trait]
impl ResourceFetcher for MemoryFetcher {
    async fn fetch(&self, uri: &Url) -> Result<FetchResponse, FetchError> {
        let latency = self.latency.lock().get(uri.as_str()).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self
            .resources
            .lock()
            .get(uri.as_str())
            .cloned()
            .map(FetchResponse::ok)
            .unwrap_or_else(FetchResponse::not_found))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LocalStore for MemoryStore {
    fn contains(&self, uri: &Url) -> bool {
        self.entries.lock().contains_key(uri.as_str())
    }

    fn read(&self, uri: &Url) -> Option<Vec<u8>> {
        self.entries.lock().get(uri.as_str()).cloned()
    }

    fn write(&self, uri: &Url, bytes: &[u8]) {
        self.entries.lock().insert(uri.to_string(), bytes.to_vec());
    }
}
