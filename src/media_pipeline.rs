//! Handles prefetching of upcoming hero video assets.
//!
//! This module is responsible for:
//! - Defining the `PrefetchHint` seam the preload scheduler calls into.
//! - `RecordingPrefetch`, which keeps the hints in order the way a page keeps
//!   `<link rel="prefetch" as="video">` elements in its head.
//! - `HttpPrefetcher`, which warms an HTTP cache by fetching the asset in the
//!   background with `reqwest`.
//!
//! Prefetching is best-effort: a failed hint degrades to a normal load when the
//! asset is played, so nothing here reports errors to the caller.

use crate::errors::PrefetchError;
use log::{debug, info, trace};
use reqwest::Client as ReqwestClient;
use std::sync::{Mutex, PoisonError};

/// Low-priority fetch hint for an asset that will be needed soon.
pub trait PrefetchHint: Send + Sync {
    fn hint(&self, key: &str, path: &str);
}

/// A prefetch hint as the page would render it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkHint {
    pub rel: &'static str,
    pub as_type: &'static str,
    pub href: String,
}

/// Records every hint in insertion order. Hints are never removed.
#[derive(Debug, Default)]
pub struct RecordingPrefetch {
    links: Mutex<Vec<LinkHint>>,
}

impl RecordingPrefetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// The hinted paths, in the order they were hinted.
    pub fn hints(&self) -> Vec<String> {
        self.links().into_iter().map(|l| l.href).collect()
    }

    pub fn links(&self) -> Vec<LinkHint> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PrefetchHint for RecordingPrefetch {
    fn hint(&self, key: &str, path: &str) {
        trace!("Recording prefetch link for '{}': {}", key, path);
        self.links.lock().unwrap_or_else(PoisonError::into_inner).push(LinkHint {
            rel: "prefetch",
            as_type: "video",
            href: path.to_string(),
        });
    }
}

/// Fetches assets from an HTTP origin in the background and discards the body.
#[derive(Clone, Debug)]
pub struct HttpPrefetcher {
    client: ReqwestClient,
    origin: String,
}

impl HttpPrefetcher {
    pub fn new(client: ReqwestClient, origin: &str) -> Self {
        Self { client, origin: origin.trim_end_matches('/').to_string() }
    }

    /// Full URL for an asset path relative to the origin.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.origin, path.trim_start_matches('/'))
    }

    /// Downloads the asset fully. Returns the number of bytes received.
    #[must_use = "prefetching can fail; the Result must be handled"]
    pub async fn fetch(&self, path: &str) -> Result<u64, PrefetchError> {
        let url = self.url_for(path);
        debug!("Prefetching {}", url);
        let mut response = self.client.get(&url).send().await?.error_for_status()?;
        let mut received = 0u64;
        while let Some(chunk) = response.chunk().await? {
            received += chunk.len() as u64;
        }
        info!("Prefetched {} ({} bytes)", url, received);
        Ok(received)
    }

    /// Spawns `fetch` on the current runtime.
    pub fn spawn_fetch(&self, path: &str) -> Result<(), PrefetchError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| PrefetchError::NoRuntime)?;
        let this = self.clone();
        let path = path.to_string();
        handle.spawn(async move {
            if let Err(e) = this.fetch(&path).await {
                debug!("Prefetch of '{}' failed (ignored): {}", path, e);
            }
        });
        Ok(())
    }
}

impl PrefetchHint for HttpPrefetcher {
    fn hint(&self, key: &str, path: &str) {
        if let Err(e) = self.spawn_fetch(path) {
            debug!("Prefetch hint for '{}' dropped: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_prefetch_keeps_order() {
        let prefetch = RecordingPrefetch::new();
        prefetch.hint("b", "v/b.mp4");
        prefetch.hint("c", "v/c.mp4");
        assert_eq!(prefetch.hints(), vec!["v/b.mp4", "v/c.mp4"]);
        let link = &prefetch.links()[0];
        assert_eq!((link.rel, link.as_type), ("prefetch", "video"));
    }

    #[test]
    fn http_prefetcher_joins_urls() {
        let prefetcher = HttpPrefetcher::new(ReqwestClient::new(), "https://example.test/");
        assert_eq!(prefetcher.url_for("assets/videos/a.mp4"), "https://example.test/assets/videos/a.mp4");
        assert_eq!(prefetcher.url_for("/a.mp4"), "https://example.test/a.mp4");
    }

    #[test]
    fn http_prefetch_outside_runtime_is_dropped() {
        let prefetcher = HttpPrefetcher::new(ReqwestClient::new(), "http://127.0.0.1:9");
        assert!(matches!(prefetcher.spawn_fetch("a.mp4"), Err(PrefetchError::NoRuntime)));
        // The trait entry point swallows the same failure.
        prefetcher.hint("a", "a.mp4");
    }

    #[tokio::test]
    async fn failed_fetch_reports_http_error() {
        // Port 9 (discard) is not expected to serve HTTP.
        let prefetcher = HttpPrefetcher::new(ReqwestClient::new(), "http://127.0.0.1:9");
        assert!(matches!(prefetcher.fetch("a.mp4").await, Err(PrefetchError::Http(_))));
    }
}
