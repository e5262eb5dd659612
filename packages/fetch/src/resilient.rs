//! Network retrieval with fallback to a local cached copy.
//!
//! A successful retrieval refreshes the cache; a failed one reads the
//! cache instead. The cache file is only ever replaced by a complete,
//! successful payload (written to a temp file and renamed), so it is
//! either absent or a valid prior response.

use std::path::{Path, PathBuf};

use crate::events::{EventSink, PipelineEvent};
use crate::{FetchError, Transport};

/// Fetches remote payloads, falling back to cached copies on failure.
pub struct ResilientFetcher<'a> {
    transport: &'a dyn Transport,
    events: &'a dyn EventSink,
}

impl<'a> ResilientFetcher<'a> {
    /// Creates a fetcher over the given transport.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, events: &'a dyn EventSink) -> Self {
        Self { transport, events }
    }

    /// Fetches `url` with a plain GET, refreshing `cache_path` on success.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MissingDataSource`] if the request fails and
    /// no cached copy exists, or [`FetchError::Io`] if the cached copy
    /// exists but cannot be read.
    pub fn fetch(&self, label: &str, url: &str, cache_path: &Path) -> Result<Vec<u8>, FetchError> {
        self.fetch_with(label, url, cache_path, || self.transport.get(url, &[]))
    }

    /// Runs `retrieve` and caches its bytes, or falls back to the cache if
    /// it fails.
    ///
    /// `url` is only used for reporting; `retrieve` decides what requests
    /// are actually made (e.g. several paginated queries merged into one
    /// payload).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MissingDataSource`] if `retrieve` fails and no
    /// cached copy exists, or [`FetchError::Io`] if the cached copy exists
    /// but cannot be read.
    pub fn fetch_with<F>(
        &self,
        label: &str,
        url: &str,
        cache_path: &Path,
        retrieve: F,
    ) -> Result<Vec<u8>, FetchError>
    where
        F: FnOnce() -> Result<Vec<u8>, FetchError>,
    {
        match retrieve() {
            Ok(bytes) => {
                if let Err(e) = write_cache(cache_path, &bytes) {
                    log::warn!("{label}: fetched but could not refresh cache: {e}");
                }
                self.events.emit(PipelineEvent::FetchSucceeded {
                    label: label.to_string(),
                    url: url.to_string(),
                    bytes: bytes.len(),
                });
                Ok(bytes)
            }
            Err(error) => {
                if !cache_path.exists() {
                    log::error!("{label}: fetch failed and no cache is available: {error}");
                    return Err(FetchError::MissingDataSource {
                        label: label.to_string(),
                        url: url.to_string(),
                        cache_path: cache_path.display().to_string(),
                    });
                }

                self.events.emit(PipelineEvent::FetchFallback {
                    label: label.to_string(),
                    url: url.to_string(),
                    error: error.to_string(),
                    cache_path: cache_path.display().to_string(),
                });

                std::fs::read(cache_path).map_err(|e| FetchError::Io {
                    path: cache_path.display().to_string(),
                    source: e,
                })
            }
        }
    }
}

/// Atomically replaces `cache_path` with `bytes`.
fn write_cache(cache_path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    if let Some(parent) = cache_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| FetchError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let tmp_path = tmp_sibling(cache_path);
    std::fs::write(&tmp_path, bytes).map_err(|e| FetchError::Io {
        path: tmp_path.display().to_string(),
        source: e,
    })?;

    std::fs::rename(&tmp_path, cache_path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        FetchError::Io {
            path: cache_path.display().to_string(),
            source: e,
        }
    })
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::events::{NullEventSink, RecordingEventSink};
    use crate::testing::ScriptedTransport;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("saltwater_resilient_{name}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn http_500() -> FetchError {
        FetchError::HttpStatus {
            url: "https://example.com/data".to_string(),
            status: 500,
        }
    }

    #[test]
    fn success_refreshes_cache() {
        let dir = scratch("refresh");
        let cache = dir.join("nested").join("data.json");
        let transport = ScriptedTransport::new(vec![Ok(b"fresh".to_vec())]);
        let fetcher = ResilientFetcher::new(&transport, &NullEventSink);

        let bytes = fetcher
            .fetch("data", "https://example.com/data", &cache)
            .unwrap();

        assert_eq!(bytes, b"fresh");
        assert_eq!(fs::read(&cache).unwrap(), b"fresh");
        assert!(!tmp_sibling(&cache).exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failure_falls_back_to_cache_without_touching_it() {
        let dir = scratch("fallback");
        fs::create_dir_all(&dir).unwrap();
        let cache = dir.join("data.json");
        fs::write(&cache, b"cached").unwrap();

        let transport = ScriptedTransport::new(vec![Err(http_500())]);
        let events = RecordingEventSink::new();
        let fetcher = ResilientFetcher::new(&transport, &events);

        let bytes = fetcher
            .fetch("data", "https://example.com/data", &cache)
            .unwrap();

        assert_eq!(bytes, b"cached");
        assert_eq!(fs::read(&cache).unwrap(), b"cached");
        assert!(matches!(
            events.events().as_slice(),
            [PipelineEvent::FetchFallback { .. }]
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failure_without_cache_is_missing_data_source() {
        let dir = scratch("missing");
        let cache = dir.join("data.json");
        let transport = ScriptedTransport::new(vec![Err(http_500())]);
        let fetcher = ResilientFetcher::new(&transport, &NullEventSink);

        let err = fetcher
            .fetch("wetlands", "https://example.com/data", &cache)
            .unwrap_err();

        match err {
            FetchError::MissingDataSource { label, .. } => assert_eq!(label, "wetlands"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!cache.exists());
    }

    #[test]
    fn fetch_with_caches_composite_payload() {
        let dir = scratch("composite");
        let cache = dir.join("merged.json");
        let transport = ScriptedTransport::new(vec![]);
        let fetcher = ResilientFetcher::new(&transport, &NullEventSink);

        let bytes = fetcher
            .fetch_with("merged", "https://example.com/query", &cache, || {
                Ok(b"page1+page2".to_vec())
            })
            .unwrap();

        assert_eq!(bytes, b"page1+page2");
        assert_eq!(fs::read(&cache).unwrap(), b"page1+page2");
        assert_eq!(transport.request_count(), 0);
        let _ = fs::remove_dir_all(&dir);
    }
}
