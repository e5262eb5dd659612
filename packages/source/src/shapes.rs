//! ESRI shapefile polygon reading.

use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{PolygonRing, Shape};

use crate::SourceError;
use crate::esri::attach_hole;

/// Reads every polygon shape in the `.shp` file at `path`.
///
/// `Polygon`, `PolygonM`, and `PolygonZ` shapes are kept (M and Z are
/// discarded). Null shapes are skipped; any other shape type is skipped
/// with a warning.
///
/// # Errors
///
/// Returns [`SourceError::Shapefile`] if the file cannot be read.
pub fn read_polygons(path: &Path) -> Result<Vec<MultiPolygon<f64>>, SourceError> {
    let shapes = shapefile::read_shapes(path).map_err(|e| SourceError::Shapefile {
        path: path.display().to_string(),
        source: e,
    })?;

    let total = shapes.len();
    let mut other = 0usize;
    let polygons: Vec<MultiPolygon<f64>> = shapes
        .iter()
        .filter_map(|shape| {
            let converted = shape_to_multipolygon(shape);
            if converted.is_none() && !matches!(shape, Shape::NullShape) {
                other += 1;
            }
            converted
        })
        .collect();

    if other > 0 {
        log::warn!(
            "{}: skipped {other} non-polygon shapes",
            path.display()
        );
    }
    log::debug!("{}: {} of {total} shapes are polygons", path.display(), polygons.len());

    Ok(polygons)
}

/// Converts a polygon shape into a [`MultiPolygon`].
///
/// Returns `None` for null and non-polygon shapes.
#[must_use]
pub fn shape_to_multipolygon(shape: &Shape) -> Option<MultiPolygon<f64>> {
    let mp = match shape {
        Shape::Polygon(p) => assemble(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        Shape::PolygonM(p) => assemble(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        Shape::PolygonZ(p) => assemble(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        _ => return None,
    };
    (!mp.0.is_empty()).then_some(mp)
}

/// Outer rings start a polygon; inner rings go to the shell around them.
fn assemble<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => {
                polygons.push(Polygon::new(to_line(points, &xy), Vec::new()));
            }
            PolygonRing::Inner(points) => holes.push(to_line(points, &xy)),
        }
    }

    for hole in holes {
        attach_hole(&mut polygons, hole);
    }

    MultiPolygon(polygons)
}

fn to_line<P>(points: &[P], xy: &impl Fn(&P) -> Coord<f64>) -> LineString<f64> {
    let mut line: LineString<f64> = points.iter().map(xy).collect();
    line.close();
    line
}
