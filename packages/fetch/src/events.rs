//! Structured pipeline events.
//!
//! Every stage reports what it did through an injected [`EventSink`]
//! rather than printing. The binary wires in [`LogEventSink`], which
//! forwards to the `log` facade; tests use [`NullEventSink`] or
//! [`RecordingEventSink`] to assert on what was reported.

use std::sync::Mutex;

use saltwater_source_models::Category;
use serde::Serialize;

/// Something observable that happened during a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A remote resource was retrieved and the cache refreshed.
    FetchSucceeded {
        /// Source label.
        label: String,
        /// Retrieved URL.
        url: String,
        /// Payload size in bytes.
        bytes: usize,
    },
    /// A remote retrieval failed and the cached copy was used instead.
    FetchFallback {
        /// Source label.
        label: String,
        /// URL that failed.
        url: String,
        /// Why the retrieval failed.
        error: String,
        /// Cache file that was read.
        cache_path: String,
    },
    /// One page of a paginated tabular resource arrived.
    PageFetched {
        /// CKAN resource ID.
        resource_id: String,
        /// Offset the page was requested at.
        offset: u64,
        /// Rows in the page.
        rows: usize,
        /// Server-reported total.
        total: u64,
    },
    /// A polygon layer was loaded, reprojected, and buffered.
    LayerLoaded {
        /// Category the layer belongs to.
        category: Category,
        /// Layer identifier.
        layer: String,
        /// Raw features that survived attribute filtering.
        features: usize,
        /// Buffered polygons produced.
        polygons: usize,
        /// Buffer distance applied.
        buffer_meters: f64,
    },
    /// A polygon layer returned zero features.
    SourceEmpty {
        /// Category the layer belongs to.
        category: Category,
        /// Layer identifier.
        layer: String,
    },
    /// The saltwater extent was unioned.
    ExtentBuilt {
        /// Polygons fed into the union.
        input_polygons: usize,
        /// Invalid polygons that were repaired.
        repaired: usize,
        /// Invalid polygons that could not be repaired and were dropped.
        dropped: usize,
        /// Disjoint polygons in the resulting extent.
        parts: usize,
    },
    /// Monitoring stations were loaded and validated.
    StationsLoaded {
        /// Rows fetched across all resources.
        rows: usize,
        /// Rows left after exact-duplicate removal.
        unique_rows: usize,
        /// Stations with a constructible point.
        valid: usize,
        /// Rows excluded for invalid coordinates.
        invalid: usize,
        /// Rows dropped because their station code was already taken by a
        /// row with different coordinates.
        conflicting: usize,
    },
    /// Stations were classified.
    Classified {
        /// Stations inside the extent.
        saltwater: usize,
        /// Stations outside or on the boundary of the extent.
        freshwater: usize,
    },
    /// The result file was written.
    ResultsWritten {
        /// Output path.
        path: String,
        /// Data rows written.
        rows: usize,
    },
}

/// Receives [`PipelineEvent`]s from pipeline stages.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events to the `log` facade.
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::FetchSucceeded { label, url, bytes } => {
                log::info!("{label}: fetched {bytes} bytes from {url}");
            }
            PipelineEvent::FetchFallback {
                label,
                url,
                error,
                cache_path,
            } => {
                log::warn!(
                    "{label}: could not fetch {url}, using cached copy at {cache_path} ({error})"
                );
            }
            PipelineEvent::PageFetched {
                resource_id,
                offset,
                rows,
                total,
            } => {
                log::debug!("{resource_id}: offset={offset} rows={rows} total={total}");
            }
            PipelineEvent::LayerLoaded {
                category,
                layer,
                features,
                polygons,
                buffer_meters,
            } => {
                log::info!(
                    "{category}/{layer}: {features} features -> {polygons} polygons \
                     buffered by {buffer_meters} m"
                );
            }
            PipelineEvent::SourceEmpty { category, layer } => {
                log::warn!(
                    "{category}/{layer}: source returned zero features, \
                     saltwater coverage for this category is degraded"
                );
            }
            PipelineEvent::ExtentBuilt {
                input_polygons,
                repaired,
                dropped,
                parts,
            } => {
                if dropped > 0 {
                    log::warn!("Dropped {dropped} unrepairable saltwater polygons");
                }
                log::info!(
                    "Saltwater extent: {input_polygons} polygons ({repaired} repaired) \
                     unioned into {parts} parts"
                );
            }
            PipelineEvent::StationsLoaded {
                rows,
                unique_rows,
                valid,
                invalid,
                conflicting,
            } => {
                if conflicting > 0 {
                    log::warn!(
                        "{conflicting} rows reused a station code with different coordinates \
                         and were dropped"
                    );
                }
                log::info!(
                    "Stations: {rows} rows, {unique_rows} unique, {valid} with valid \
                     coordinates, {invalid} excluded"
                );
            }
            PipelineEvent::Classified {
                saltwater,
                freshwater,
            } => {
                log::info!("Classification complete:");
                log::info!("  Saltwater sites: {saltwater}");
                log::info!("  Freshwater sites: {freshwater}");
                log::info!("  Total sites: {}", saltwater + freshwater);
            }
            PipelineEvent::ResultsWritten { path, rows } => {
                log::info!("Wrote {rows} classification rows to {path}");
            }
        }
    }
}

/// Discards every event.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingEventSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_emission_order() {
        let sink = RecordingEventSink::new();
        sink.emit(PipelineEvent::Classified {
            saltwater: 1,
            freshwater: 2,
        });
        sink.emit(PipelineEvent::ResultsWritten {
            path: "out.csv".to_string(),
            rows: 3,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PipelineEvent::Classified { .. }));
        assert!(matches!(events[1], PipelineEvent::ResultsWritten { rows: 3, .. }));
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(PipelineEvent::SourceEmpty {
            category: Category::Estuaries,
            layer: "estuaries".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "source_empty");
        assert_eq!(json["category"], "estuaries");
    }
}
