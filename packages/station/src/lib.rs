#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monitoring station loading.
//!
//! Station rows are pulled from one or more CKAN datastore resources,
//! concatenated, deduplicated, validated, and projected into the working
//! projection in a single batch.

pub mod parse;

use saltwater_fetch::FetchError;
use saltwater_fetch::ckan::CkanClient;
use saltwater_fetch::events::{EventSink, PipelineEvent};
use saltwater_fetch::progress::ProgressCallback;
use saltwater_spatial::WorkingProjection;
use saltwater_station_models::{MonitoringStation, RawStationRow, STATION_FIELDS};

use crate::parse::prepare_rows;

/// The California surface water monitoring station resources.
pub const DEFAULT_RESOURCE_IDS: &[&str] = &[
    "1d333989-559a-433f-b93f-bb43d21da2b9",
    "04d98c22-5523-4cc1-86e7-3a6abf40bb60",
    "15a63495-8d9f-4a49-b43a-3092ef3106b9",
];

/// Errors that can occur while loading stations.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// A station resource could not be fetched completely.
    #[error("Failed to fetch station resource {resource_id}: {source}")]
    Fetch {
        /// CKAN resource ID.
        resource_id: String,
        /// Underlying fetch error.
        source: FetchError,
    },
}

/// Fetches every station row from `resource_ids` and builds validated,
/// projected stations.
///
/// # Errors
///
/// Returns [`StationError::Fetch`] if any resource fails to paginate to
/// completion.
pub fn load(
    client: &CkanClient<'_>,
    resource_ids: &[String],
    projection: WorkingProjection,
    events: &dyn EventSink,
    progress: &dyn ProgressCallback,
) -> Result<Vec<MonitoringStation>, StationError> {
    let mut rows: Vec<RawStationRow> = Vec::new();

    for resource_id in resource_ids {
        progress.set_message(format!("Fetching {resource_id}"));
        let records = client
            .fetch_all(resource_id, Some(STATION_FIELDS), progress)
            .map_err(|e| StationError::Fetch {
                resource_id: resource_id.clone(),
                source: e,
            })?;
        rows.extend(records.iter().map(RawStationRow::from_record));
    }

    Ok(build_stations(rows, projection, events))
}

/// Turns raw rows into projected stations, reporting counts through
/// `events`.
#[must_use]
pub fn build_stations(
    rows: Vec<RawStationRow>,
    projection: WorkingProjection,
    events: &dyn EventSink,
) -> Vec<MonitoringStation> {
    let row_count = rows.len();
    let prepared = prepare_rows(rows);

    let lon_lat: Vec<(f64, f64)> = prepared
        .stations
        .iter()
        .map(|s| (s.longitude, s.latitude))
        .collect();
    let points = projection.project_lon_lat(&lon_lat);

    let stations: Vec<MonitoringStation> = prepared
        .stations
        .into_iter()
        .zip(points)
        .map(|(row, location)| MonitoringStation {
            code: row.code,
            latitude: row.latitude,
            longitude: row.longitude,
            location,
            projection,
        })
        .collect();

    events.emit(PipelineEvent::StationsLoaded {
        rows: row_count,
        unique_rows: prepared.unique_rows,
        valid: stations.len(),
        invalid: prepared.invalid,
        conflicting: prepared.conflicting,
    });

    stations
}
