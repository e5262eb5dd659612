#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Saltwater polygon sources.
//!
//! The [`registry`] embeds one TOML definition per saltwater category. The
//! [`loader`] turns each definition into a buffered [`PolygonSet`] in the
//! working projection, fetching Esri JSON feature sets through the
//! resilient fetcher ([`esri`]) or reading the manually provided saline
//! lakes shapefile archive ([`archive`], [`shapes`]).
//!
//! [`PolygonSet`]: saltwater_spatial::PolygonSet

pub mod archive;
pub mod esri;
pub mod loader;
pub mod registry;
pub mod shapes;

use saltwater_fetch::FetchError;
use saltwater_spatial::ProjectionError;

pub use loader::{LoadContext, load_category};

/// Errors that can occur while loading a polygon source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Remote retrieval failed and no cached copy was available.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The layer's CRS is unsupported or a frame check failed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// A cached or fetched payload is not valid Esri JSON.
    #[error("Invalid Esri JSON for layer '{layer}': {source}")]
    Json {
        /// Layer identifier.
        layer: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// I/O error while reading or extracting local files.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Neither the extracted directory nor its archive exists.
    #[error(
        "Missing data source: expected {archive} (or its extracted directory {directory}); download it manually into the cache directory"
    )]
    MissingArchive {
        /// Expected archive path.
        archive: String,
        /// Expected extraction directory.
        directory: String,
    },

    /// Zip archive could not be read or extracted.
    #[error("Failed to extract {path}: {source}")]
    Zip {
        /// Archive path.
        path: String,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },

    /// Shapefile could not be read.
    #[error("Failed to read shapefile {path}: {source}")]
    Shapefile {
        /// Shapefile path.
        path: String,
        /// Underlying shapefile error.
        source: shapefile::Error,
    },

    /// Neither the layer definition nor the payload names a CRS.
    #[error(
        "Unknown coordinate reference system for layer '{layer}': set assign_epsg or request a payload with a spatialReference"
    )]
    UnknownCrs {
        /// Layer identifier.
        layer: String,
    },

    /// An embedded source definition failed to parse.
    #[error("Failed to parse source definition '{name}': {source}")]
    Registry {
        /// Registry entry name.
        name: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
