//! Compile-time registry of saltwater polygon sources.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a layer to a category means editing its TOML file in `sources/`;
//! adding a category also needs a
//! [`Category`](saltwater_source_models::Category) variant and an entry here.

use saltwater_source_models::SourceDefinition;

use crate::SourceError;

/// Number of registered sources. One per category; enforced by a test.
#[cfg(test)]
const EXPECTED_SOURCE_COUNT: usize = 4;

/// Embedded TOML source definitions, in pipeline load order.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    ("tidal_wetlands", include_str!("../sources/tidal_wetlands.toml")),
    ("saline_lakes", include_str!("../sources/saline_lakes.toml")),
    ("marine_coastal", include_str!("../sources/marine_coastal.toml")),
    ("estuaries", include_str!("../sources/estuaries.toml")),
];

/// Returns all registered sources.
///
/// # Errors
///
/// Returns [`SourceError::Registry`] if an embedded TOML file fails to
/// parse.
pub fn all_sources() -> Result<Vec<SourceDefinition>, SourceError> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str).map_err(|e| SourceError::Registry {
                name: (*name).to_string(),
                source: e,
            })
        })
        .collect()
}
