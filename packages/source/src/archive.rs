//! Manually downloaded zip archives in the cache directory.

use std::path::Path;

use crate::SourceError;

/// Makes sure `directory` exists, extracting `archive` into `dest` if it
/// does not.
///
/// An existing `directory` satisfies the dependency without touching the
/// archive. Returns `true` if an extraction happened.
///
/// # Errors
///
/// Returns [`SourceError::MissingArchive`] if neither `directory` nor
/// `archive` exists, or [`SourceError::Zip`] / [`SourceError::Io`] if
/// extraction fails.
pub fn ensure_extracted(archive: &Path, directory: &Path, dest: &Path) -> Result<bool, SourceError> {
    if directory.is_dir() {
        log::info!("Using existing extracted directory {}", directory.display());
        return Ok(false);
    }

    if !archive.exists() {
        return Err(SourceError::MissingArchive {
            archive: archive.display().to_string(),
            directory: directory.display().to_string(),
        });
    }

    log::info!("Extracting {} -> {}", archive.display(), dest.display());

    let file = std::fs::File::open(archive).map_err(|e| SourceError::Io {
        path: archive.display().to_string(),
        source: e,
    })?;

    let mut zip = zip::ZipArchive::new(file).map_err(|e| SourceError::Zip {
        path: archive.display().to_string(),
        source: e,
    })?;

    zip.extract(dest).map_err(|e| SourceError::Zip {
        path: archive.display().to_string(),
        source: e,
    })?;

    log::info!("  extracted {} entries", zip.len());

    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write as _;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip_writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            zip_writer.start_file(*name, options).unwrap();
            zip_writer.write_all(data).unwrap();
        }
        zip_writer.finish().unwrap();
    }

    #[test]
    fn extracts_when_directory_is_missing() {
        let tmp = std::env::temp_dir().join("saltwater_archive_extract_test");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let archive = tmp.join("Lakes.zip");
        write_zip(&archive, &[("Lakes/Lakes.shp", b"shp"), ("Lakes/Lakes.dbf", b"dbf")]);

        let extracted = ensure_extracted(&archive, &tmp.join("Lakes"), &tmp).unwrap();

        assert!(extracted);
        assert_eq!(fs::read(tmp.join("Lakes/Lakes.shp")).unwrap(), b"shp");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn existing_directory_skips_extraction() {
        let tmp = std::env::temp_dir().join("saltwater_archive_skip_test");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("Lakes")).unwrap();

        // No archive on disk at all: the directory alone is enough.
        let extracted = ensure_extracted(&tmp.join("Lakes.zip"), &tmp.join("Lakes"), &tmp).unwrap();
        assert!(!extracted);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_archive_and_directory_is_fatal() {
        let tmp = std::env::temp_dir().join("saltwater_archive_missing_test");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_extracted(&tmp.join("Lakes.zip"), &tmp.join("Lakes"), &tmp).unwrap_err();

        assert!(matches!(err, SourceError::MissingArchive { .. }));
        assert!(err.to_string().contains("Lakes.zip"));

        let _ = fs::remove_dir_all(&tmp);
    }
}
