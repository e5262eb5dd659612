//! The unioned saltwater extent and its point-containment index.
//!
//! Buffered polygons from every category are validated (and repaired when
//! possible), unioned into one multipolygon, and its disjoint parts are
//! loaded into an R-tree. Containment is strict: a point on the boundary
//! is outside.

use geo::{BoundingRect as _, Contains as _, CoordsIter as _, MultiPolygon, Point, Polygon};
use geo::{Validation as _, unary_union};
use rstar::{AABB, RTree, RTreeObject};

use crate::{PolygonSet, ProjectionError, WorkingProjection};

/// One disjoint part of the extent, stored in the R-tree.
struct ExtentPart {
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl RTreeObject for ExtentPart {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The union of every buffered saltwater polygon.
///
/// Built once per run and never modified afterwards.
pub struct SaltwaterExtent {
    projection: WorkingProjection,
    geometry: MultiPolygon<f64>,
    parts: RTree<ExtentPart>,
}

impl SaltwaterExtent {
    fn new(projection: WorkingProjection, geometry: MultiPolygon<f64>) -> Self {
        let entries = geometry
            .0
            .iter()
            .map(|polygon| ExtentPart {
                envelope: compute_envelope(polygon),
                polygon: polygon.clone(),
            })
            .collect();

        Self {
            projection,
            geometry,
            parts: RTree::bulk_load(entries),
        }
    }

    /// Frame the extent is in.
    #[must_use]
    pub const fn projection(&self) -> WorkingProjection {
        self.projection
    }

    /// The unioned geometry.
    #[must_use]
    pub const fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Number of disjoint parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.geometry.0.len()
    }

    /// Returns `true` if no saltwater area is covered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    /// Returns `true` if `point` lies strictly inside the extent.
    ///
    /// `point` must already be in [`Self::projection`].
    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        let query_env = AABB::from_point([point.x(), point.y()]);

        self.parts
            .locate_in_envelope_intersecting(&query_env)
            .any(|part| part.polygon.contains(point))
    }
}

/// Result of [`build`].
pub struct ExtentBuild {
    /// The unioned extent.
    pub extent: SaltwaterExtent,
    /// Polygons fed into the union.
    pub input_polygons: usize,
    /// Invalid polygons that were repaired.
    pub repaired: usize,
    /// Invalid polygons that could not be repaired and were dropped.
    pub dropped: usize,
}

enum Repair {
    Valid(Polygon<f64>),
    Repaired(Vec<Polygon<f64>>),
    Dropped(&'static str),
}

/// Unions every polygon of every set into a [`SaltwaterExtent`].
///
/// Invalid polygons are repaired by re-noding them through the overlay
/// engine (the buffer-by-zero fix). Polygons that cannot be repaired are
/// dropped with a warning rather than failing the union.
///
/// # Errors
///
/// Returns [`ProjectionError::Mismatch`] if any set is not in
/// `projection`.
pub fn build(
    projection: WorkingProjection,
    sets: &[PolygonSet],
) -> Result<ExtentBuild, ProjectionError> {
    for set in sets {
        projection.ensure_same(set.projection)?;
    }

    let mut input_polygons = 0;
    let mut repaired = 0;
    let mut dropped = 0;
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for set in sets {
        for (idx, polygon) in set.polygons.iter().enumerate() {
            input_polygons += 1;
            match repair(polygon) {
                Repair::Valid(p) => polygons.push(p),
                Repair::Repaired(parts) => {
                    repaired += 1;
                    polygons.extend(parts);
                }
                Repair::Dropped(reason) => {
                    dropped += 1;
                    log::warn!(
                        "Dropping {} polygon #{idx}: {reason}",
                        set.category
                    );
                }
            }
        }
    }

    let geometry = if polygons.is_empty() {
        MultiPolygon(Vec::new())
    } else {
        unary_union(polygons.iter())
    };

    if geometry.0.is_empty() {
        log::warn!("Saltwater extent is empty; every station will classify as freshwater");
    }

    Ok(ExtentBuild {
        extent: SaltwaterExtent::new(projection, geometry),
        input_polygons,
        repaired,
        dropped,
    })
}

fn repair(polygon: &Polygon<f64>) -> Repair {
    if polygon.exterior().0.is_empty() {
        return Repair::Dropped("empty exterior ring");
    }
    if !polygon
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
    {
        return Repair::Dropped("non-finite coordinates");
    }
    if polygon.is_valid() {
        return Repair::Valid(polygon.clone());
    }

    let fixed = unary_union(std::iter::once(polygon));
    if fixed.0.is_empty() {
        Repair::Dropped("empty after repair")
    } else if !fixed.is_valid() {
        Repair::Dropped("still invalid after repair")
    } else {
        Repair::Repaired(fixed.0)
    }
}

/// Compute the bounding box envelope for a [`Polygon`].
fn compute_envelope(polygon: &Polygon<f64>) -> AABB<[f64; 2]> {
    polygon.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
