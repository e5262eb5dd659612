//! CKAN Datastore API fetcher.
//!
//! `datastore_search` caps every response at `limit` rows, so complete
//! results need successive offset-based requests. The total row count is
//! taken from the first response and pagination stops in the same request
//! that makes `offset >= total`.

use serde::Deserialize;

use crate::events::{EventSink, PipelineEvent};
use crate::progress::ProgressCallback;
use crate::{FetchError, Transport};

/// California open data portal `datastore_search` endpoint.
pub const DEFAULT_CKAN_URL: &str = "https://data.ca.gov/api/3/action/datastore_search";

/// Rows requested per page.
pub const DEFAULT_PAGE_SIZE: u64 = 50_000;

#[derive(Debug, Deserialize)]
struct DatastoreResponse {
    #[serde(default = "default_success")]
    success: bool,
    result: Option<DatastoreResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DatastoreResult {
    records: Vec<serde_json::Value>,
    total: u64,
}

const fn default_success() -> bool {
    true
}

/// Paginated reader for one CKAN instance.
pub struct CkanClient<'a> {
    transport: &'a dyn Transport,
    events: &'a dyn EventSink,
    api_url: String,
    page_size: u64,
}

impl<'a> CkanClient<'a> {
    /// Creates a client for `api_url` requesting `page_size` rows per page.
    ///
    /// A page size of zero is treated as one.
    #[must_use]
    pub fn new(
        transport: &'a dyn Transport,
        events: &'a dyn EventSink,
        api_url: impl Into<String>,
        page_size: u64,
    ) -> Self {
        Self {
            transport,
            events,
            api_url: api_url.into(),
            page_size: page_size.max(1),
        }
    }

    /// Fetches every record of `resource_id`.
    ///
    /// `fields` restricts the returned columns when given.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if any page request fails or returns a body
    /// that is not a successful datastore response. No partial result is
    /// returned.
    pub fn fetch_all(
        &self,
        resource_id: &str,
        fields: Option<&[&str]>,
        progress: &dyn ProgressCallback,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        let mut rows: Vec<serde_json::Value> = Vec::new();
        let mut offset: u64 = 0;
        let mut total: Option<u64> = None;

        loop {
            let mut query = vec![
                ("resource_id", resource_id.to_string()),
                ("limit", self.page_size.to_string()),
                ("offset", offset.to_string()),
            ];
            if let Some(fields) = fields {
                query.push(("fields", fields.join(",")));
            }

            let body = self.transport.get(&self.api_url, &query)?;
            let page = self.parse_page(&body)?;

            let total = *total.get_or_insert_with(|| {
                progress.set_total(page.total);
                page.total
            });

            let count = page.records.len();
            rows.extend(page.records);
            progress.inc(count as u64);

            self.events.emit(PipelineEvent::PageFetched {
                resource_id: resource_id.to_string(),
                offset,
                rows: count,
                total,
            });

            offset += self.page_size;
            if offset >= total {
                break;
            }
        }

        log::info!("{resource_id}: downloaded {} records", rows.len());

        Ok(rows)
    }

    fn parse_page(&self, body: &[u8]) -> Result<DatastoreResult, FetchError> {
        let response: DatastoreResponse = serde_json::from_slice(body)?;

        if !response.success {
            return Err(FetchError::Response {
                url: self.api_url.clone(),
                message: format!(
                    "datastore_search failed: {}",
                    response
                        .error
                        .map_or_else(|| "unknown error".to_string(), |e| e.to_string())
                ),
            });
        }

        response.result.ok_or_else(|| FetchError::Response {
            url: self.api_url.clone(),
            message: "No result object in datastore_search response".to_string(),
        })
    }
}
