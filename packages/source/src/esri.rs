//! Esri JSON `FeatureSet` decoding.
//!
//! Esri polygons are a flat list of rings. Orientation carries the
//! structure: clockwise rings are exterior shells and counter-clockwise
//! rings are holes. A hole belongs to the smallest shell that contains it,
//! wherever that shell appears in the ring list.

use geo::{Area as _, Contains as _, Coord, LineString, MultiPolygon, Polygon, Winding as _};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One decoded feature.
#[derive(Debug, Clone)]
pub struct RawFeature {
    /// Feature attributes as delivered.
    pub attributes: Map<String, Value>,
    /// Polygon geometry in the payload's CRS.
    pub geometry: MultiPolygon<f64>,
}

impl RawFeature {
    /// Returns the string form of attribute `field`, or `None` if it is
    /// missing or null.
    #[must_use]
    pub fn attribute(&self, field: &str) -> Option<String> {
        match self.attributes.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A decoded feature set.
#[derive(Debug, Clone, Default)]
pub struct RawLayer {
    /// WKID from the payload's `spatialReference`, preferring
    /// `latestWkid`.
    pub wkid: Option<u32>,
    /// Features with a usable polygon geometry.
    pub features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct FeatureSetDocument {
    #[serde(rename = "spatialReference", default)]
    spatial_reference: Option<SpatialReference>,
    #[serde(default)]
    features: Option<Vec<FeatureDocument>>,
}

#[derive(Debug, Deserialize)]
struct SpatialReference {
    #[serde(rename = "latestWkid", default)]
    latest_wkid: Option<u32>,
    #[serde(default)]
    wkid: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FeatureDocument {
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<PolygonDocument>,
}

#[derive(Debug, Deserialize)]
struct PolygonDocument {
    #[serde(default)]
    rings: Vec<Vec<Vec<f64>>>,
}

/// Decodes an Esri JSON `FeatureSet`.
///
/// Features without geometry, or whose rings do not form a polygon, are
/// skipped.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if `bytes` is not a `FeatureSet`
/// document.
pub fn parse_feature_set(bytes: &[u8]) -> Result<RawLayer, serde_json::Error> {
    let document: FeatureSetDocument = serde_json::from_slice(bytes)?;

    let wkid = document
        .spatial_reference
        .and_then(|sr| sr.latest_wkid.or(sr.wkid));

    let mut skipped = 0usize;
    let features: Vec<RawFeature> = document
        .features
        .unwrap_or_default()
        .into_iter()
        .filter_map(|feature| {
            let geometry = feature
                .geometry
                .map(|g| rings_to_multipolygon(&g.rings))
                .filter(|mp| !mp.0.is_empty());
            if geometry.is_none() {
                skipped += 1;
            }
            Some(RawFeature {
                attributes: feature.attributes.unwrap_or_default(),
                geometry: geometry?,
            })
        })
        .collect();

    if skipped > 0 {
        log::debug!("Skipped {skipped} features without polygon geometry");
    }

    Ok(RawLayer { wkid, features })
}

/// Assembles Esri rings into polygons by orientation.
#[must_use]
pub fn rings_to_multipolygon(rings: &[Vec<Vec<f64>>]) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        let coords: Vec<Coord<f64>> = ring
            .iter()
            .filter(|p| p.len() >= 2)
            .map(|p| Coord { x: p[0], y: p[1] })
            .collect();
        let mut line = LineString::new(coords);
        line.close();
        if line.0.len() < 4 {
            continue;
        }

        if line.is_cw() {
            polygons.push(Polygon::new(line, Vec::new()));
        } else if line.is_ccw() {
            holes.push(line);
        }
    }

    for hole in holes {
        attach_hole(&mut polygons, hole);
    }

    MultiPolygon(polygons)
}

/// Adds `hole` to the smallest shell in `polygons` whose exterior contains
/// it.
///
/// A hole no shell contains goes to the last shell; with no shells at all
/// the ring is kept as a shell of its own.
pub(crate) fn attach_hole(polygons: &mut Vec<Polygon<f64>>, hole: LineString<f64>) {
    let owner = polygons
        .iter()
        .enumerate()
        .filter_map(|(i, polygon)| {
            let shell = Polygon::new(polygon.exterior().clone(), Vec::new());
            shell
                .contains(&hole)
                .then(|| (i, shell.unsigned_area()))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .or_else(|| polygons.len().checked_sub(1));

    match owner {
        Some(i) => polygons[i].interiors_push(hole),
        None => polygons.push(Polygon::new(hole, Vec::new())),
    }
}
