//! Category loaders.
//!
//! Every category is loaded by the same code: each layer of its
//! [`SourceDefinition`] is acquired, assigned a CRS, filtered, reprojected
//! into the working projection, shaped, and buffered. The layers' polygons
//! are concatenated into one [`PolygonSet`].

use std::collections::BTreeMap;
use std::path::Path;

use geo::{MultiPolygon, Polygon};
use saltwater_fetch::Transport;
use saltwater_fetch::arcgis::{self, LayerQuery};
use saltwater_fetch::events::{EventSink, PipelineEvent};
use saltwater_fetch::resilient::ResilientFetcher;
use saltwater_source_models::{Category, LayerDefinition, LayerFetcherConfig, SourceDefinition};
use saltwater_spatial::{Crs, PolygonSet, WorkingProjection, shape};

use crate::esri::{self, RawFeature, RawLayer};
use crate::{SourceError, archive, shapes};

static NO_OVERRIDES: BTreeMap<String, f64> = BTreeMap::new();

/// Shared, read-only inputs for loading sources.
pub struct LoadContext<'a> {
    /// HTTP transport for remote layers.
    pub transport: &'a dyn Transport,
    /// Receives load and fetch events.
    pub events: &'a dyn EventSink,
    /// Directory holding fetch caches and manual archives.
    pub cache_dir: &'a Path,
    /// Frame every polygon is reprojected into.
    pub projection: WorkingProjection,
    /// Buffer distances (meters) by layer id, replacing the defined ones.
    pub buffer_overrides: &'a BTreeMap<String, f64>,
}

impl<'a> LoadContext<'a> {
    /// Creates a context using the default working projection and the
    /// defined buffers.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, events: &'a dyn EventSink, cache_dir: &'a Path) -> Self {
        Self {
            transport,
            events,
            cache_dir,
            projection: WorkingProjection::default(),
            buffer_overrides: &NO_OVERRIDES,
        }
    }

    /// Buffer distance for `layer`, honoring overrides.
    #[must_use]
    pub fn buffer_for(&self, layer: &LayerDefinition) -> f64 {
        self.buffer_overrides
            .get(&layer.id)
            .copied()
            .unwrap_or(layer.buffer_meters)
    }
}

/// Loads one category's buffered polygons.
///
/// A layer with zero features contributes nothing and reports
/// [`PipelineEvent::SourceEmpty`]; it is not an error.
///
/// # Errors
///
/// Returns [`SourceError`] if a layer cannot be acquired (no network and
/// no cache, missing archive), its payload is malformed, or its CRS is
/// unknown or unsupported.
pub fn load_category(
    source: &SourceDefinition,
    ctx: &LoadContext<'_>,
) -> Result<PolygonSet, SourceError> {
    log::info!("Loading {} ({})", source.name, source.category);

    let mut set = PolygonSet::empty(source.category, ctx.projection);
    for layer in &source.layers {
        set.polygons
            .extend(load_layer(source.category, layer, ctx)?);
    }

    Ok(set)
}

/// Loads one layer and returns its buffered polygons in the working
/// projection.
///
/// # Errors
///
/// See [`load_category`].
pub fn load_layer(
    category: Category,
    layer: &LayerDefinition,
    ctx: &LoadContext<'_>,
) -> Result<Vec<Polygon<f64>>, SourceError> {
    let raw = acquire(layer, ctx)?;
    let features = filter_features(layer, raw.features);

    if features.is_empty() {
        ctx.events.emit(PipelineEvent::SourceEmpty {
            category,
            layer: layer.id.clone(),
        });
        return Ok(Vec::new());
    }

    let source_crs = resolve_crs(layer, raw.wkid)?;
    let transform = ctx.projection.transform_from(source_crs);
    let projected: Vec<MultiPolygon<f64>> = features
        .iter()
        .map(|feature| transform.apply(&feature.geometry))
        .collect();

    let distance = ctx.buffer_for(layer);
    let feature_count = projected.len();
    let polygons = shape::shape_and_buffer(projected, layer.geometry, distance);

    ctx.events.emit(PipelineEvent::LayerLoaded {
        category,
        layer: layer.id.clone(),
        features: feature_count,
        polygons: polygons.len(),
        buffer_meters: distance,
    });

    Ok(polygons)
}

fn acquire(layer: &LayerDefinition, ctx: &LoadContext<'_>) -> Result<RawLayer, SourceError> {
    match &layer.fetcher {
        LayerFetcherConfig::Arcgis {
            url,
            where_clause,
            out_sr,
            page_size,
            cache_file,
        } => {
            let mut query = LayerQuery::new(url);
            if let Some(where_clause) = where_clause {
                query.where_clause = where_clause.as_str();
            }
            query.out_sr = *out_sr;
            if let Some(page_size) = page_size {
                query.page_size = *page_size;
            }

            let fetcher = ResilientFetcher::new(ctx.transport, ctx.events);
            let cache_path = ctx.cache_dir.join(cache_file);
            let bytes = fetcher.fetch_with(&layer.id, url, &cache_path, || {
                let set = arcgis::query_feature_set(ctx.transport, &query)?;
                Ok(serde_json::to_vec(&set)?)
            })?;

            esri::parse_feature_set(&bytes).map_err(|e| SourceError::Json {
                layer: layer.id.clone(),
                source: e,
            })
        }
        LayerFetcherConfig::ShapefileArchive {
            archive: archive_file,
            directory,
            shapefile,
        } => {
            let directory = ctx.cache_dir.join(directory);
            archive::ensure_extracted(&ctx.cache_dir.join(archive_file), &directory, ctx.cache_dir)?;

            let features = shapes::read_polygons(&directory.join(shapefile))?
                .into_iter()
                .map(|geometry| RawFeature {
                    attributes: serde_json::Map::new(),
                    geometry,
                })
                .collect();

            Ok(RawLayer {
                wkid: None,
                features,
            })
        }
    }
}

/// The layer's assigned CRS wins over whatever the payload claims.
fn resolve_crs(layer: &LayerDefinition, payload_wkid: Option<u32>) -> Result<Crs, SourceError> {
    let epsg = match (layer.assign_epsg, payload_wkid) {
        (Some(assigned), Some(payload)) => {
            if Crs::from_epsg(payload).ok() != Crs::from_epsg(assigned).ok() {
                log::warn!(
                    "{}: payload reports WKID {payload}, using assigned EPSG:{assigned}",
                    layer.id
                );
            }
            assigned
        }
        (Some(assigned), None) => assigned,
        (None, Some(payload)) => payload,
        (None, None) => {
            return Err(SourceError::UnknownCrs {
                layer: layer.id.clone(),
            });
        }
    };

    Ok(Crs::from_epsg(epsg)?)
}

fn filter_features(layer: &LayerDefinition, features: Vec<RawFeature>) -> Vec<RawFeature> {
    if layer.include.is_empty() && layer.exclude.is_empty() {
        return features;
    }

    let before = features.len();
    let kept: Vec<RawFeature> = features
        .into_iter()
        .filter(|feature| {
            layer
                .include
                .iter()
                .all(|rule| rule.matches(feature.attribute(&rule.field).as_deref()))
                && !layer
                    .exclude
                    .iter()
                    .any(|rule| rule.matches(feature.attribute(&rule.field).as_deref()))
        })
        .collect();

    if kept.len() < before {
        log::info!(
            "{}: attribute filters removed {} of {before} features",
            layer.id,
            before - kept.len()
        );
    }

    kept
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use geo::{Contains as _, Point};
    use saltwater_fetch::FetchError;
    use saltwater_fetch::events::RecordingEventSink;
    use saltwater_source_models::{AttributeFilter, GeometryHandling};
    use serde_json::{Value, json};

    use super::*;

    /// Replays JSON bodies; `None` simulates a network failure.
    struct FakeTransport {
        responses: Mutex<VecDeque<Option<Value>>>,
    }

    impl FakeTransport {
        fn new(responses: Vec<Option<Value>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str, _query: &[(&str, String)]) -> Result<Vec<u8>, FetchError> {
            let next = self.responses.lock().unwrap().pop_front().flatten();
            next.map_or_else(
                || {
                    Err(FetchError::HttpStatus {
                        url: url.to_string(),
                        status: 503,
                    })
                },
                |body| Ok(serde_json::to_vec(&body).unwrap()),
            )
        }
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clockwise Esri ring for a square.
    fn ring(x0: f64, y0: f64, size: f64) -> Value {
        json!([
            [x0, y0],
            [x0, y0 + size],
            [x0 + size, y0 + size],
            [x0 + size, y0],
            [x0, y0]
        ])
    }

    fn feature_set(wkid: Option<u32>, features: Vec<Value>) -> Value {
        json!({
            "geometryType": "esriGeometryPolygon",
            "spatialReference": wkid.map(|w| json!({ "wkid": w })),
            "features": features,
        })
    }

    fn feature(class: &str, rings: Vec<Value>) -> Value {
        json!({ "attributes": { "CMECS_Class": class }, "geometry": { "rings": rings } })
    }

    fn arcgis_layer(id: &str, assign_epsg: Option<u32>, buffer_meters: f64) -> LayerDefinition {
        LayerDefinition {
            id: id.to_string(),
            name: id.to_string(),
            buffer_meters,
            assign_epsg,
            geometry: GeometryHandling::Explode,
            fetcher: LayerFetcherConfig::Arcgis {
                url: "https://example.com/FeatureServer/0/query".to_string(),
                where_clause: None,
                out_sr: None,
                page_size: None,
                cache_file: format!("{id}.json"),
            },
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    fn source(category: Category, layers: Vec<LayerDefinition>) -> SourceDefinition {
        SourceDefinition {
            id: category.to_string(),
            name: category.to_string(),
            category,
            layers,
        }
    }

    #[test]
    fn loads_projected_layer_and_buffers_in_meters() {
        let dir = scratch_dir("saltwater_loader_buffer_test");
        let transport = FakeTransport::new(vec![Some(feature_set(
            Some(3310),
            vec![feature("Estuary", vec![ring(0.0, 0.0, 1000.0)])],
        ))]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let set = load_category(
            &source(Category::Estuaries, vec![arcgis_layer("estuary", None, 50.0)]),
            &ctx,
        )
        .unwrap();

        assert_eq!(set.category, Category::Estuaries);
        assert_eq!(set.projection, WorkingProjection::CALIFORNIA_ALBERS);
        assert_eq!(set.len(), 1);
        assert!(set.polygons[0].contains(&Point::new(-40.0, 500.0)));
        assert!(!set.polygons[0].contains(&Point::new(-60.0, 500.0)));
        assert!(dir.join("estuary.json").exists());
        assert!(events.events().iter().any(|e| matches!(
            e,
            PipelineEvent::LayerLoaded { features: 1, polygons: 1, .. }
        )));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn geographic_payload_is_reprojected_before_buffering() {
        let dir = scratch_dir("saltwater_loader_reproject_test");
        // Roughly 1 km square at the California Albers central meridian.
        let transport = FakeTransport::new(vec![Some(feature_set(
            Some(4326),
            vec![feature("Marine", vec![ring(-120.005, 37.0, 0.01)])],
        ))]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let polygons = load_layer(
            Category::MarineCoastal,
            &arcgis_layer("coastal", None, 10.0),
            &ctx,
        )
        .unwrap();

        let center = WorkingProjection::default().project_lon_lat(&[(-120.0, 37.005)])[0];
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].contains(&center));
        // 10 m west of the western edge is inside the buffer, 1 km is not.
        let west = WorkingProjection::default().project_lon_lat(&[(-120.005, 37.005)])[0];
        assert!(polygons[0].contains(&Point::new(west.x() - 5.0, west.y())));
        assert!(!polygons[0].contains(&Point::new(west.x() - 1000.0, west.y())));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn assigned_crs_overrides_payload() {
        let dir = scratch_dir("saltwater_loader_assign_test");
        // Payload claims degrees but the values are California Albers meters.
        let transport = FakeTransport::new(vec![Some(feature_set(
            Some(4326),
            vec![feature("Lake", vec![ring(0.0, 0.0, 1000.0)])],
        ))]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let polygons = load_layer(
            Category::SalineLakes,
            &arcgis_layer("lake", Some(3310), 50.0),
            &ctx,
        )
        .unwrap();

        assert!(polygons[0].contains(&Point::new(500.0, 500.0)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_crs_is_fatal() {
        let dir = scratch_dir("saltwater_loader_unknown_crs_test");
        let transport = FakeTransport::new(vec![Some(feature_set(
            None,
            vec![feature("Lake", vec![ring(0.0, 0.0, 10.0)])],
        ))]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let err = load_layer(Category::SalineLakes, &arcgis_layer("lake", None, 50.0), &ctx)
            .unwrap_err();

        assert!(matches!(err, SourceError::UnknownCrs { layer } if layer == "lake"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_crs_is_fatal() {
        let dir = scratch_dir("saltwater_loader_unsupported_crs_test");
        let transport = FakeTransport::new(vec![Some(feature_set(
            Some(2227),
            vec![feature("Lake", vec![ring(0.0, 0.0, 10.0)])],
        ))]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let err = load_layer(Category::SalineLakes, &arcgis_layer("lake", None, 50.0), &ctx)
            .unwrap_err();

        assert!(matches!(err, SourceError::Projection(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_layer_reports_and_returns_nothing() {
        let dir = scratch_dir("saltwater_loader_empty_test");
        let transport = FakeTransport::new(vec![Some(feature_set(None, Vec::new()))]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let set = load_category(
            &source(Category::Estuaries, vec![arcgis_layer("estuary", None, 50.0)]),
            &ctx,
        )
        .unwrap();

        assert!(set.is_empty());
        assert!(events.events().contains(&PipelineEvent::SourceEmpty {
            category: Category::Estuaries,
            layer: "estuary".to_string(),
        }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn exclude_filter_drops_matching_features() {
        let dir = scratch_dir("saltwater_loader_filter_test");
        let transport = FakeTransport::new(vec![Some(feature_set(
            Some(3310),
            vec![
                feature("Estuary", vec![ring(0.0, 0.0, 100.0)]),
                feature("Major River Delta", vec![ring(10_000.0, 0.0, 100.0)]),
            ],
        ))]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);
        let mut layer = arcgis_layer("estuary", None, 50.0);
        layer.exclude.push(AttributeFilter {
            field: "CMECS_Class".to_string(),
            values: vec!["Major River Delta".to_string()],
        });

        let polygons = load_layer(Category::Estuaries, &layer, &ctx).unwrap();

        assert_eq!(polygons.len(), 1);
        assert!(!polygons[0].contains(&Point::new(10_050.0, 50.0)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn layers_of_a_category_are_concatenated() {
        let dir = scratch_dir("saltwater_loader_concat_test");
        let transport = FakeTransport::new(vec![
            Some(feature_set(Some(3310), vec![feature("A", vec![ring(0.0, 0.0, 10.0)])])),
            Some(feature_set(Some(3310), vec![feature("B", vec![ring(500.0, 0.0, 10.0)])])),
        ]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let set = load_category(
            &source(
                Category::SalineLakes,
                vec![arcgis_layer("lakes", None, 50.0), arcgis_layer("salton", None, 50.0)],
            ),
            &ctx,
        )
        .unwrap();

        assert_eq!(set.len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn buffer_override_replaces_defined_distance() {
        let dir = scratch_dir("saltwater_loader_override_test");
        let transport = FakeTransport::new(vec![Some(feature_set(
            Some(3310),
            vec![feature("A", vec![ring(0.0, 0.0, 100.0)])],
        ))]);
        let events = RecordingEventSink::new();
        let overrides = BTreeMap::from([("wetlands".to_string(), 200.0)]);
        let ctx = LoadContext {
            buffer_overrides: &overrides,
            ..LoadContext::new(&transport, &events, &dir)
        };

        let polygons = load_layer(
            Category::TidalWetlands,
            &arcgis_layer("wetlands", None, 10.0),
            &ctx,
        )
        .unwrap();

        assert!(polygons[0].contains(&Point::new(-150.0, 50.0)));
        assert!(events.events().iter().any(|e| matches!(
            e,
            PipelineEvent::LayerLoaded { buffer_meters, .. } if (*buffer_meters - 200.0).abs() < f64::EPSILON
        )));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn network_failure_falls_back_to_cache() {
        let dir = scratch_dir("saltwater_loader_fallback_test");
        let cached = feature_set(Some(3310), vec![feature("A", vec![ring(0.0, 0.0, 100.0)])]);
        std::fs::write(dir.join("wetlands.json"), serde_json::to_vec(&cached).unwrap()).unwrap();
        let transport = FakeTransport::new(vec![None]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let polygons = load_layer(
            Category::TidalWetlands,
            &arcgis_layer("wetlands", None, 10.0),
            &ctx,
        )
        .unwrap();

        assert_eq!(polygons.len(), 1);
        assert!(matches!(
            events.events().first(),
            Some(PipelineEvent::FetchFallback { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn network_failure_without_cache_names_the_source() {
        let dir = scratch_dir("saltwater_loader_missing_test");
        let transport = FakeTransport::new(vec![None]);
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);

        let err = load_layer(
            Category::TidalWetlands,
            &arcgis_layer("wetlands", None, 10.0),
            &ctx,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            SourceError::Fetch(FetchError::MissingDataSource { .. })
        ));
        assert!(err.to_string().contains("wetlands"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_lake_archive_is_fatal() {
        let dir = scratch_dir("saltwater_loader_archive_test");
        let transport = FakeTransport::new(Vec::new());
        let events = RecordingEventSink::new();
        let ctx = LoadContext::new(&transport, &events, &dir);
        let layer = LayerDefinition {
            fetcher: LayerFetcherConfig::ShapefileArchive {
                archive: "SalineLakeBnd.zip".to_string(),
                directory: "SalineLakeBnd".to_string(),
                shapefile: "SalineLakeBnd.shp".to_string(),
            },
            ..arcgis_layer("lakes", Some(5070), 50.0)
        };

        let err = load_layer(Category::SalineLakes, &layer, &ctx).unwrap_err();

        assert!(matches!(err, SourceError::MissingArchive { .. }));
        assert!(err.to_string().contains("SalineLakeBnd.zip"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
