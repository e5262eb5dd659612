#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote data retrieval for the saltwater classification pipeline.
//!
//! All HTTP goes through the [`Transport`] trait so that fetchers can be
//! exercised against in-memory responses. [`ReqwestTransport`] is the
//! production implementation: a blocking `reqwest` client with a single
//! bounded timeout per request.
//!
//! On top of the transport sit the [`resilient`] cache-fallback fetcher,
//! the [`ckan`] paginated datastore fetcher, and the [`arcgis`] feature
//! query client.

pub mod arcgis;
pub mod ckan;
pub mod events;
pub mod progress;
pub mod resilient;

use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while retrieving remote data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response parsed but did not have the expected shape.
    #[error("Unexpected response from {url}: {message}")]
    Response {
        /// Request URL.
        url: String,
        /// Description of what was wrong.
        message: String,
    },

    /// I/O error reading or writing a cache file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Neither the network nor the local cache could supply the source.
    #[error(
        "Missing data source '{label}': could not fetch {url} and no cached copy exists at {cache_path}"
    )]
    MissingDataSource {
        /// Source label used in logs.
        label: String,
        /// URL that was attempted.
        url: String,
        /// Cache path that was checked.
        cache_path: String,
    },
}

/// Minimal blocking HTTP GET seam.
///
/// Implementations return the raw response body for a successful (2xx)
/// response and an error for anything else.
pub trait Transport: Send + Sync {
    /// Performs a GET request with the given query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on connection failure, timeout, or a
    /// non-success status.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, FetchError>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the TLS backend fails to initialize.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("saltwater-classifier/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, FetchError> {
        log::debug!("GET {url} {query:?}");
        let response = self.client.get(url).query(query).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}
