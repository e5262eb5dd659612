//! Row validation, deduplication, and station-code conflict resolution.

use std::collections::{BTreeMap, HashSet};

use saltwater_station_models::RawStationRow;

/// Why a row could not become a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRow {
    /// `StationCode` is missing or blank.
    MissingCode,
    /// A coordinate is missing or blank.
    MissingCoordinate,
    /// A coordinate is not a number.
    NonNumeric,
    /// A coordinate is NaN or infinite.
    NonFinite,
    /// Latitude outside [-90, 90] or longitude outside [-180, 180].
    OutOfRange,
}

/// A row with a usable code and WGS84 coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRow {
    /// Station code, trimmed.
    pub code: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Outcome of [`prepare_rows`].
#[derive(Debug, Default)]
pub struct PreparedRows {
    /// One row per station code, in first-seen order.
    pub stations: Vec<ValidRow>,
    /// Rows left after exact-duplicate removal.
    pub unique_rows: usize,
    /// Rows dropped for invalid coordinates or a missing code.
    pub invalid: usize,
    /// Rows dropped because an earlier valid row claimed the same code
    /// with different coordinates.
    pub conflicting: usize,
}

/// Removes exact-duplicate rows, keeping the first of each in order.
#[must_use]
pub fn dedupe_exact(rows: Vec<RawStationRow>) -> Vec<RawStationRow> {
    let mut seen: HashSet<RawStationRow> = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

/// Parses one coordinate value.
///
/// # Errors
///
/// Returns the reason the value is not a finite number.
pub fn parse_coordinate(value: Option<&str>) -> Result<f64, InvalidRow> {
    let text = value.map(str::trim).filter(|s| !s.is_empty());
    let Some(text) = text else {
        return Err(InvalidRow::MissingCoordinate);
    };
    let parsed: f64 = text.parse().map_err(|_| InvalidRow::NonNumeric)?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(InvalidRow::NonFinite)
    }
}

/// Validates a raw row.
///
/// # Errors
///
/// Returns why the row cannot form a point.
pub fn validate(row: &RawStationRow) -> Result<ValidRow, InvalidRow> {
    let code = row
        .station_code
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(InvalidRow::MissingCode)?;

    let latitude = parse_coordinate(row.latitude.as_deref())?;
    let longitude = parse_coordinate(row.longitude.as_deref())?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(InvalidRow::OutOfRange);
    }

    Ok(ValidRow {
        code: code.to_string(),
        latitude,
        longitude,
    })
}

/// Deduplicates, validates, and resolves station-code conflicts.
///
/// The first valid row for a code wins. A later row for the same code at
/// the same coordinates (e.g. a number in one resource and a string in
/// another) is dropped silently; one with different coordinates is
/// dropped with a warning and counted as conflicting.
#[must_use]
pub fn prepare_rows(rows: Vec<RawStationRow>) -> PreparedRows {
    let unique = dedupe_exact(rows);
    let mut prepared = PreparedRows {
        unique_rows: unique.len(),
        ..PreparedRows::default()
    };
    let mut by_code: BTreeMap<String, usize> = BTreeMap::new();
    let mut invalid_reasons: BTreeMap<String, usize> = BTreeMap::new();

    for row in &unique {
        let valid = match validate(row) {
            Ok(valid) => valid,
            Err(reason) => {
                prepared.invalid += 1;
                *invalid_reasons.entry(format!("{reason:?}")).or_default() += 1;
                continue;
            }
        };

        if let Some(&idx) = by_code.get(&valid.code) {
            let kept = &prepared.stations[idx];
            if same_location(kept, &valid) {
                continue;
            }
            log::warn!(
                "Station {} appears with conflicting coordinates ({}, {}) vs ({}, {}); keeping the first",
                valid.code,
                kept.latitude,
                kept.longitude,
                valid.latitude,
                valid.longitude
            );
            prepared.conflicting += 1;
            continue;
        }

        by_code.insert(valid.code.clone(), prepared.stations.len());
        prepared.stations.push(valid);
    }

    if prepared.invalid > 0 {
        log::debug!("Invalid station rows by reason: {invalid_reasons:?}");
    }

    prepared
}

#[allow(clippy::float_cmp)]
fn same_location(a: &ValidRow, b: &ValidRow) -> bool {
    a.latitude == b.latitude && a.longitude == b.longitude
}
