//! Byte loading for bundles and audio sources, from disk or over HTTP.

use anyhow::{Context, Result};
use hifz_core::error::MediaFailure;
use reqwest::blocking::Client;
use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PREFETCH_CAPACITY: usize = 4;

pub fn is_remote(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Building HTTP client")
}

/// Read a whole file or URL into memory.
pub fn read_location(client: &Client, location: &str) -> Result<Vec<u8>> {
    if is_remote(location) {
        let response = client
            .get(location)
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Requesting {location}"))?;
        let bytes = response
            .bytes()
            .with_context(|| format!("Reading response body from {location}"))?;
        Ok(bytes.to_vec())
    } else {
        fs::read(location).with_context(|| format!("Reading {location}"))
    }
}

/// Audio fetcher with a small shared cache filled by background prefetches.
#[derive(Clone)]
pub struct SourceFetcher {
    client: Client,
    cache: Arc<Mutex<VecDeque<(String, Arc<[u8]>)>>>,
}

impl SourceFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Arc::new(Mutex::new(VecDeque::with_capacity(PREFETCH_CAPACITY))),
        }
    }

    /// Fetch `url`, serving from the prefetch cache when possible.
    pub fn fetch(&self, url: &str) -> Result<Arc<[u8]>, MediaFailure> {
        if let Some(bytes) = self.cached(url) {
            debug!(%url, "Serving audio from prefetch cache");
            return Ok(bytes);
        }
        let bytes: Arc<[u8]> = read_location(&self.client, url)
            .map_err(|err| {
                warn!(%url, "Audio fetch failed: {err:#}");
                MediaFailure::Network
            })?
            .into();
        self.store(url, bytes.clone());
        Ok(bytes)
    }

    /// Warm the cache for `url` without blocking the caller.
    pub fn prefetch(&self, url: &str) {
        if self.cached(url).is_some() {
            return;
        }
        let fetcher = self.clone();
        let url = url.to_string();
        let spawned = thread::Builder::new()
            .name("audio-prefetch".into())
            .spawn(move || match read_location(&fetcher.client, &url) {
                Ok(bytes) => {
                    info!(%url, bytes = bytes.len(), "Prefetched next source");
                    fetcher.store(&url, bytes.into());
                }
                Err(err) => warn!(%url, "Prefetch failed: {err:#}"),
            });
        if let Err(err) = spawned {
            warn!("Failed to spawn prefetch thread: {err}");
        }
    }

    fn cached(&self, url: &str) -> Option<Arc<[u8]>> {
        let cache = self.cache.lock().ok()?;
        cache
            .iter()
            .find(|(key, _)| key == url)
            .map(|(_, bytes)| bytes.clone())
    }

    fn store(&self, url: &str, bytes: Arc<[u8]>) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        cache.retain(|(key, _)| key != url);
        if cache.len() >= PREFETCH_CAPACITY {
            cache.pop_front();
        }
        cache.push_back((url.to_string(), bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_file(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("hifz-coach-{name}-{nanos}.bin"))
    }

    #[test]
    fn remote_detection_ignores_case_and_padding() {
        assert!(is_remote("https://cdn.example/a.mp3"));
        assert!(is_remote("  HTTP://cdn.example/a.mp3"));
        assert!(!is_remote("/tmp/a.mp3"));
        assert!(!is_remote("audio/https.mp3"));
    }

    #[test]
    fn local_fetch_is_cached_and_bounded() {
        let fetcher = SourceFetcher::new(Client::new());
        let path = unique_temp_file("fetch");
        fs::write(&path, b"abc").unwrap();
        let location = path.to_string_lossy().to_string();

        let bytes = fetcher.fetch(&location).unwrap();
        assert_eq!(&bytes[..], b"abc");
        fs::remove_file(&path).unwrap();
        assert_eq!(&fetcher.fetch(&location).unwrap()[..], b"abc");

        for idx in 0..PREFETCH_CAPACITY {
            fetcher.store(&format!("other-{idx}"), Arc::from(&b"x"[..]));
        }
        assert!(fetcher.cached(&location).is_none());
    }

    #[test]
    fn missing_file_reports_network_failure() {
        let fetcher = SourceFetcher::new(Client::new());
        let path = unique_temp_file("missing");
        assert_eq!(
            fetcher.fetch(&path.to_string_lossy()).unwrap_err(),
            MediaFailure::Network
        );
    }
}
