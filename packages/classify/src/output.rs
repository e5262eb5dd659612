//! CSV result output.
//!
//! The file has exactly two columns, `StationCode,saltwater`, with the
//! label written as `True`/`False`. It is written to a temporary sibling
//! and renamed into place, so readers never see a partial file.

use std::path::{Path, PathBuf};

use saltwater_fetch::events::{EventSink, PipelineEvent};
use saltwater_station_models::Classification;
use serde::Serialize;

/// Errors that can occur while writing results.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// I/O error creating, writing, or renaming the output.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("Failed to write CSV {path}: {source}")]
    Csv {
        /// Path being written.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },
}

const HEADER: [&str; 2] = ["StationCode", "saltwater"];

#[derive(Serialize)]
struct OutputRow<'a> {
    station_code: &'a str,
    saltwater: &'static str,
}

const fn label(saltwater: bool) -> &'static str {
    if saltwater { "True" } else { "False" }
}

/// Writes `results` to `path` in classifier order.
///
/// # Errors
///
/// Returns [`OutputError`] if the file cannot be written. The previous
/// contents of `path`, if any, are left untouched on failure.
pub fn write_results(
    path: &Path,
    results: &[Classification],
    events: &dyn EventSink,
) -> Result<(), OutputError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| OutputError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let tmp_path = tmp_sibling(path);
    let written = write_csv(&tmp_path, results);
    if let Err(e) = written {
        if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
            log::warn!("Could not remove {}: {cleanup}", tmp_path.display());
        }
        return Err(e);
    }

    std::fs::rename(&tmp_path, path).map_err(|e| OutputError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    events.emit(PipelineEvent::ResultsWritten {
        path: path.display().to_string(),
        rows: results.len(),
    });

    Ok(())
}

fn write_csv(path: &Path, results: &[Classification]) -> Result<(), OutputError> {
    let csv_err = |e| OutputError::Csv {
        path: path.display().to_string(),
        source: e,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(HEADER).map_err(csv_err)?;
    for result in results {
        writer
            .serialize(OutputRow {
                station_code: &result.station_code,
                saltwater: label(result.saltwater),
            })
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|e| OutputError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
