#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monitoring station types.
//!
//! CKAN rows arrive as untyped JSON. They are first captured verbatim as
//! [`RawStationRow`]s (the unit of exact-duplicate removal), then parsed
//! into validated [`MonitoringStation`]s carrying a point in the working
//! projection, and finally labeled as [`Classification`]s.

use geo::Point;
use saltwater_spatial::WorkingProjection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column holding the station identifier.
pub const STATION_CODE_FIELD: &str = "StationCode";
/// Column holding the WGS84 latitude.
pub const LATITUDE_FIELD: &str = "TargetLatitude";
/// Column holding the WGS84 longitude.
pub const LONGITUDE_FIELD: &str = "TargetLongitude";

/// The three columns requested from every station resource.
pub const STATION_FIELDS: &[&str] = &[STATION_CODE_FIELD, LATITUDE_FIELD, LONGITUDE_FIELD];

/// A station row exactly as delivered, with every value in string form.
///
/// Two rows are exact duplicates when all three fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawStationRow {
    /// `StationCode`, if present and non-null.
    pub station_code: Option<String>,
    /// `TargetLatitude` as text.
    pub latitude: Option<String>,
    /// `TargetLongitude` as text.
    pub longitude: Option<String>,
}

impl RawStationRow {
    /// Captures the station columns of a CKAN record.
    ///
    /// Numbers are kept in their JSON text form; nulls and missing fields
    /// become `None`.
    #[must_use]
    pub fn from_record(record: &Value) -> Self {
        Self {
            station_code: field_text(record, STATION_CODE_FIELD),
            latitude: field_text(record, LATITUDE_FIELD),
            longitude: field_text(record, LONGITUDE_FIELD),
        }
    }
}

fn field_text(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A validated monitoring station.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringStation {
    /// Station code, unique among loaded stations.
    pub code: String,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// Location in [`Self::projection`].
    pub location: Point<f64>,
    /// Frame `location` is in.
    pub projection: WorkingProjection,
}

/// Saltwater label for one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Station code.
    pub station_code: String,
    /// `true` if the station lies strictly inside the saltwater extent.
    pub saltwater: bool,
}
