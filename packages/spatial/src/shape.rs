//! Shaping and buffering of projected source polygons.
//!
//! All distances are in the units of the working projection (meters).

use geo::{Buffer as _, MultiPolygon, Polygon, unary_union};
use saltwater_source_models::GeometryHandling;

/// Splits multi-part polygons into their single-part members.
#[must_use]
pub fn explode(geometries: Vec<MultiPolygon<f64>>) -> Vec<Polygon<f64>> {
    geometries.into_iter().flat_map(|mp| mp.0).collect()
}

/// Buffers `geometry` outward by `distance`.
///
/// A distance of zero returns the geometry unchanged.
#[must_use]
pub fn buffer(geometry: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    if distance.abs() <= f64::EPSILON {
        return geometry.clone();
    }
    geometry.buffer(distance)
}

/// Shapes and buffers one layer's projected geometries, returning
/// single-part polygons.
///
/// * [`GeometryHandling::AsIs`] buffers each feature's geometry whole.
/// * [`GeometryHandling::Explode`] splits every multi-part feature and
///   buffers each part on its own.
/// * [`GeometryHandling::Dissolve`] unions everything first and buffers
///   the union once.
#[must_use]
pub fn shape_and_buffer(
    geometries: Vec<MultiPolygon<f64>>,
    handling: GeometryHandling,
    distance: f64,
) -> Vec<Polygon<f64>> {
    match handling {
        GeometryHandling::AsIs => geometries
            .iter()
            .flat_map(|mp| buffer(mp, distance).0)
            .collect(),
        GeometryHandling::Explode => explode(geometries)
            .into_iter()
            .flat_map(|p| buffer(&MultiPolygon(vec![p]), distance).0)
            .collect(),
        GeometryHandling::Dissolve => {
            let parts = explode(geometries);
            if parts.is_empty() {
                return Vec::new();
            }
            let dissolved = unary_union(parts.iter());
            buffer(&dissolved, distance).0
        }
    }
}
