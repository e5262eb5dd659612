#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry for saltwater classification.
//!
//! Every polygon source and station point is reprojected into a single
//! [`WorkingProjection`] before any buffering or containment test. Buffered
//! polygons are carried in [`PolygonSet`]s tagged with the projection they
//! are in, merged by the [`extent`] builder into one [`SaltwaterExtent`],
//! and indexed with an R-tree for point lookups.

pub mod crs;
pub mod extent;
pub mod shape;

use geo::{Coord, Point, Polygon};
use saltwater_source_models::Category;

pub use crs::{Crs, Transform};
pub use extent::{ExtentBuild, SaltwaterExtent};

/// Errors from projection and frame checks.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The EPSG/WKID code is not one the pipeline knows how to transform.
    #[error("Unsupported coordinate reference system EPSG:{0}")]
    UnsupportedEpsg(u32),

    /// Buffering needs a projected system in meters.
    #[error("{0} is not a projected CRS and cannot be used as the working projection")]
    NotProjected(Crs),

    /// Two operands are in different reference frames.
    #[error("Reference frame mismatch: expected {expected}, found {found}")]
    Mismatch {
        /// Frame the operation runs in.
        expected: Crs,
        /// Frame the offending operand is in.
        found: Crs,
    },
}

/// The single projected CRS every geometric operation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkingProjection(Crs);

impl WorkingProjection {
    /// EPSG:3310, NAD83 / California Albers (equal-area, meters).
    pub const CALIFORNIA_ALBERS: Self = Self(Crs::CaliforniaAlbers);

    /// Uses `crs` as the working projection.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::NotProjected`] for geographic systems,
    /// whose degree units would make meter buffers meaningless.
    pub const fn new(crs: Crs) -> Result<Self, ProjectionError> {
        if crs.is_projected() {
            Ok(Self(crs))
        } else {
            Err(ProjectionError::NotProjected(crs))
        }
    }

    /// The underlying CRS.
    #[must_use]
    pub const fn crs(self) -> Crs {
        self.0
    }

    /// Transformation from `source` into this projection.
    #[must_use]
    pub fn transform_from(self, source: Crs) -> Transform {
        Transform::new(source, self.0)
    }

    /// Projects WGS84 longitude/latitude pairs in one batch.
    #[must_use]
    pub fn project_lon_lat(self, coords: &[(f64, f64)]) -> Vec<Point<f64>> {
        let transform = self.transform_from(Crs::Wgs84);
        coords
            .iter()
            .map(|&(lon, lat)| Point(transform.coord(Coord { x: lon, y: lat })))
            .collect()
    }

    /// Fails unless `other` is this projection.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Mismatch`] when the frames differ.
    pub fn ensure_same(self, other: Self) -> Result<(), ProjectionError> {
        if self == other {
            Ok(())
        } else {
            Err(ProjectionError::Mismatch {
                expected: self.0,
                found: other.0,
            })
        }
    }
}

impl Default for WorkingProjection {
    fn default() -> Self {
        Self::CALIFORNIA_ALBERS
    }
}

/// Buffered polygons of one saltwater category, in a known projection.
#[derive(Debug, Clone)]
pub struct PolygonSet {
    /// Category the polygons represent.
    pub category: Category,
    /// Frame the polygons are in.
    pub projection: WorkingProjection,
    /// Single-part polygons.
    pub polygons: Vec<Polygon<f64>>,
}

impl PolygonSet {
    /// Creates an empty set for `category`.
    #[must_use]
    pub const fn empty(category: Category, projection: WorkingProjection) -> Self {
        Self {
            category,
            projection,
            polygons: Vec::new(),
        }
    }

    /// Returns `true` if the set holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Number of polygons in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.polygons.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geographic_working_projection_is_rejected() {
        assert!(matches!(
            WorkingProjection::new(Crs::Wgs84),
            Err(ProjectionError::NotProjected(Crs::Wgs84))
        ));
        assert_eq!(
            WorkingProjection::new(Crs::CaliforniaAlbers).unwrap(),
            WorkingProjection::default()
        );
    }

    #[test]
    fn mismatched_frames_are_reported() {
        let conus = WorkingProjection::new(Crs::ConusAlbers).unwrap();
        let err = WorkingProjection::CALIFORNIA_ALBERS
            .ensure_same(conus)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Reference frame mismatch: expected EPSG:3310, found EPSG:5070"
        );
    }

    #[test]
    fn batch_projection_preserves_order() {
        let points = WorkingProjection::CALIFORNIA_ALBERS
            .project_lon_lat(&[(-120.0, 0.0), (-121.0, 37.0)]);
        assert_eq!(points.len(), 2);
        assert!(points[0].x().abs() < 1e-6);
        assert!((points[0].y() - -4_000_000.0).abs() < 1e-6);
        assert!(points[1].x() < 0.0);
    }
}
