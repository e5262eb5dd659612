//! Runtime configuration assembled from command-line arguments.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use saltwater_source_models::SourceDefinition;

/// Output file name written inside the cache directory by default.
pub const DEFAULT_OUTPUT_NAME: &str = "site_saltwater_flags.csv";

/// Errors in user-supplied configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `--buffer` value is not `layer_id=meters`.
    #[error("Invalid buffer override '{0}': expected layer_id=meters")]
    BufferSyntax(String),

    /// `--buffer` distance is not a non-negative finite number.
    #[error("Invalid buffer distance '{value}' for layer '{layer}': expected non-negative meters")]
    BufferDistance {
        /// Layer the override targets.
        layer: String,
        /// Offending value.
        value: String,
    },

    /// `--buffer` names a layer that is not registered.
    #[error("Unknown layer '{layer}' in buffer override (known layers: {known})")]
    UnknownLayer {
        /// Layer the override targets.
        layer: String,
        /// Comma-separated registered layer ids.
        known: String,
    },
}

/// A `layer_id=meters` buffer override.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferOverride {
    /// Layer id from the registry.
    pub layer: String,
    /// Buffer distance in meters.
    pub meters: f64,
}

impl FromStr for BufferOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (layer, value) = s
            .split_once('=')
            .map(|(l, v)| (l.trim(), v.trim()))
            .filter(|(l, _)| !l.is_empty())
            .ok_or_else(|| ConfigError::BufferSyntax(s.to_string()))?;

        let meters = value
            .parse::<f64>()
            .ok()
            .filter(|m| m.is_finite() && *m >= 0.0)
            .ok_or_else(|| ConfigError::BufferDistance {
                layer: layer.to_string(),
                value: value.to_string(),
            })?;

        Ok(Self {
            layer: layer.to_string(),
            meters,
        })
    }
}

/// Checks every override against the registered layers and returns them
/// keyed by layer id. A later override for the same layer wins.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownLayer`] for an unregistered layer id.
pub fn resolve_buffer_overrides(
    overrides: &[BufferOverride],
    sources: &[SourceDefinition],
) -> Result<BTreeMap<String, f64>, ConfigError> {
    let known: Vec<&str> = sources
        .iter()
        .flat_map(|s| s.layers.iter().map(|l| l.id.as_str()))
        .collect();

    let mut resolved = BTreeMap::new();
    for o in overrides {
        if !known.contains(&o.layer.as_str()) {
            return Err(ConfigError::UnknownLayer {
                layer: o.layer.clone(),
                known: known.join(", "),
            });
        }
        resolved.insert(o.layer.clone(), o.meters);
    }

    Ok(resolved)
}

/// Everything a classification run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Fetch caches, manual archives, and the default output location.
    pub cache_dir: PathBuf,
    /// Result CSV path.
    pub output: PathBuf,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// CKAN `datastore_search` endpoint.
    pub ckan_url: String,
    /// CKAN rows per page.
    pub page_size: u64,
    /// CKAN resources holding station rows.
    pub resource_ids: Vec<String>,
    /// Validated buffer overrides keyed by layer id.
    pub buffer_overrides: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use saltwater_source_models::{Category, LayerDefinition, LayerFetcherConfig};

    use super::*;

    fn sources() -> Vec<SourceDefinition> {
        vec![SourceDefinition {
            id: "estuaries".to_string(),
            name: "Estuaries".to_string(),
            category: Category::Estuaries,
            layers: vec![LayerDefinition {
                id: "cmecs_estuaries".to_string(),
                name: "CMECS".to_string(),
                buffer_meters: 50.0,
                assign_epsg: Some(3857),
                geometry: saltwater_source_models::GeometryHandling::Explode,
                fetcher: LayerFetcherConfig::Arcgis {
                    url: "https://example.com/query".to_string(),
                    where_clause: None,
                    out_sr: None,
                    page_size: None,
                    cache_file: "estuaries.json".to_string(),
                },
                include: Vec::new(),
                exclude: Vec::new(),
            }],
        }]
    }

    #[test]
    fn parses_layer_and_meters() {
        let parsed: BufferOverride = " cmecs_estuaries = 75.5 ".parse().unwrap();
        assert_eq!(parsed.layer, "cmecs_estuaries");
        assert!((parsed.meters - 75.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_malformed_overrides() {
        assert!(matches!(
            "cmecs_estuaries".parse::<BufferOverride>(),
            Err(ConfigError::BufferSyntax(_))
        ));
        assert!(matches!(
            "=10".parse::<BufferOverride>(),
            Err(ConfigError::BufferSyntax(_))
        ));
        assert!(matches!(
            "cmecs_estuaries=-5".parse::<BufferOverride>(),
            Err(ConfigError::BufferDistance { .. })
        ));
        assert!(matches!(
            "cmecs_estuaries=wide".parse::<BufferOverride>(),
            Err(ConfigError::BufferDistance { .. })
        ));
    }

    #[test]
    fn overrides_must_name_registered_layers() {
        let ok = resolve_buffer_overrides(
            &["cmecs_estuaries=10".parse().unwrap(), "cmecs_estuaries=20".parse().unwrap()],
            &sources(),
        )
        .unwrap();
        assert!((ok["cmecs_estuaries"] - 20.0).abs() < f64::EPSILON);

        let err = resolve_buffer_overrides(&["wetlands=10".parse().unwrap()], &sources())
            .unwrap_err();
        assert!(err.to_string().contains("cmecs_estuaries"));
    }
}
