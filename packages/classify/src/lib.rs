#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Saltwater classification of monitoring stations.
//!
//! A station is saltwater when its point lies strictly inside the
//! [`SaltwaterExtent`]. Points on the extent boundary are freshwater.

pub mod output;

use saltwater_fetch::events::{EventSink, PipelineEvent};
use saltwater_spatial::{ProjectionError, SaltwaterExtent};
use saltwater_station_models::{Classification, MonitoringStation};

/// Labels every station.
///
/// The result has one entry per station, in input order. Classifying the
/// same inputs again yields the same labels.
///
/// # Errors
///
/// Returns [`ProjectionError::Mismatch`] if any station is not in the
/// extent's projection.
pub fn classify(
    stations: &[MonitoringStation],
    extent: &SaltwaterExtent,
    events: &dyn EventSink,
) -> Result<Vec<Classification>, ProjectionError> {
    let projection = extent.projection();
    for station in stations {
        projection.ensure_same(station.projection)?;
    }

    let results: Vec<Classification> = stations
        .iter()
        .map(|station| Classification {
            station_code: station.code.clone(),
            saltwater: extent.contains(&station.location),
        })
        .collect();

    let saltwater = results.iter().filter(|c| c.saltwater).count();
    events.emit(PipelineEvent::Classified {
        saltwater,
        freshwater: results.len() - saltwater,
    });

    Ok(results)
}
