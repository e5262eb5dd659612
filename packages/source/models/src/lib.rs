#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Saltwater category taxonomy and polygon source definition types.
//!
//! Each saltwater category (tidal wetlands, saline lakes, marine coastal
//! areas, estuaries) is described by a [`SourceDefinition`] deserialized
//! from TOML. A definition holds one or more [`LayerDefinition`]s, each of
//! which knows where its polygons come from, which coordinate reference
//! system they are in, and how far to buffer them.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The kind of saline water body a polygon source represents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// Coastal tidal wetlands.
    TidalWetlands,
    /// Closed-basin saline lakes.
    SalineLakes,
    /// Marine coastal polygons.
    MarineCoastal,
    /// Bays and estuaries.
    Estuaries,
}

impl Category {
    /// Every category, in the order the pipeline loads them.
    pub const ALL: &[Self] = &[
        Self::TidalWetlands,
        Self::SalineLakes,
        Self::MarineCoastal,
        Self::Estuaries,
    ];
}

/// A saltwater polygon source, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Unique source identifier (e.g., `"tidal_wetlands"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Saltwater category this source contributes to.
    pub category: Category,
    /// Layers whose polygons are combined into this category.
    pub layers: Vec<LayerDefinition>,
}

impl SourceDefinition {
    /// Returns the source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One polygon layer within a category.
///
/// Layers in the same category are loaded independently and each gets
/// its own buffer, so a gazetteer lookup can be buffered differently
/// from the primary dataset it supplements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// Unique layer identifier (e.g., `"salton_sea"`).
    pub id: String,
    /// Human-readable layer name.
    pub name: String,
    /// Buffer distance in meters, applied in the working projection.
    pub buffer_meters: f64,
    /// EPSG code to assign to the raw geometries, overriding whatever the
    /// payload claims. Required when the upstream source omits or
    /// mislabels its spatial reference.
    #[serde(default)]
    pub assign_epsg: Option<u32>,
    /// How multi-part geometries are shaped before buffering.
    #[serde(default)]
    pub geometry: GeometryHandling,
    /// Where the raw polygons come from.
    pub fetcher: LayerFetcherConfig,
    /// Keep only records whose field value is in the listed values.
    #[serde(default)]
    pub include: Vec<AttributeFilter>,
    /// Drop records whose field value is in the listed values.
    #[serde(default)]
    pub exclude: Vec<AttributeFilter>,
}

/// How to retrieve a layer's raw polygons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerFetcherConfig {
    /// `ArcGIS` `FeatureServer` or `MapServer` layer query endpoint.
    ///
    /// Queried with `f=json`; the merged response is cached so the run
    /// can fall back to it when the service is unavailable.
    Arcgis {
        /// Layer query URL (up to `.../query`).
        url: String,
        /// Server-side `where` clause. Defaults to `1=1`.
        #[serde(default)]
        where_clause: Option<String>,
        /// Output spatial reference to request from the server.
        #[serde(default)]
        out_sr: Option<u32>,
        /// Maximum records per page (default: 1000).
        #[serde(default)]
        page_size: Option<u32>,
        /// Cache file name, relative to the cache directory.
        cache_file: String,
    },
    /// A manually downloaded zip archive containing an ESRI shapefile.
    ShapefileArchive {
        /// Archive file name, relative to the cache directory.
        archive: String,
        /// Directory the archive creates when extracted into the cache
        /// directory. Its presence means extraction already happened.
        directory: String,
        /// Shapefile path relative to `directory`.
        shapefile: String,
    },
}

/// Geometry shaping applied after reprojection and before buffering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryHandling {
    /// Buffer each feature's geometry as delivered.
    #[default]
    AsIs,
    /// Split multi-part polygons into single polygons and buffer each one.
    Explode,
    /// Union every feature first, then buffer the union once.
    Dissolve,
}

/// Attribute filter rule matched against a feature's string field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Attribute field name.
    pub field: String,
    /// Values that match this rule.
    pub values: Vec<String>,
}

impl AttributeFilter {
    /// Returns `true` if `value` is one of this rule's values.
    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        value.is_some_and(|v| self.values.iter().any(|candidate| candidate == v))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn category_round_trips_through_strum() {
        for category in Category::ALL {
            let name = category.to_string();
            assert_eq!(Category::from_str(&name).unwrap(), *category);
        }
        assert_eq!(Category::MarineCoastal.as_ref(), "marine_coastal");
    }

    #[test]
    fn parses_layer_with_defaults() {
        let layer: LayerDefinition = toml::de::from_str(
            r#"
            id = "wetlands"
            name = "Wetlands"
            buffer_meters = 10.0

            [fetcher]
            type = "arcgis"
            url = "https://example.com/MapServer/0/query"
            cache_file = "wetlands.json"
            "#,
        )
        .unwrap();
        assert_eq!(layer.geometry, GeometryHandling::AsIs);
        assert!(layer.assign_epsg.is_none());
        assert!(layer.include.is_empty());
        assert!(matches!(
            layer.fetcher,
            LayerFetcherConfig::Arcgis { where_clause: None, .. }
        ));
    }

    #[test]
    fn attribute_filter_matches_exact_values_only() {
        let filter = AttributeFilter {
            field: "CMECS_Class".to_string(),
            values: vec!["Major River Delta".to_string()],
        };
        assert!(filter.matches(Some("Major River Delta")));
        assert!(!filter.matches(Some("Estuary")));
        assert!(!filter.matches(None));
    }
}
