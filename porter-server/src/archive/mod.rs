//! Package codec
//!
//! A package is a zip holding `products.json` (a JSON array of product
//! records) and an `images/` directory. Unpacking writes every entry under
//! a working directory; packing streams the manifest and images into any
//! `Write + Seek` target.
//!
//! Everything here is blocking I/O; async callers go through
//! `tokio::task::spawn_blocking`.

use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use std::fs::{self, File};
use std::io::{self, Cursor, Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::{FileOptions, SimpleFileOptions};
use zip::{ZipArchive, ZipWriter};

/// Manifest file name inside the package
pub const MANIFEST: &str = "products.json";
/// Image directory inside the package
pub const IMAGES_DIR: &str = "images";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid zip archive: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),

    #[error("Archive entry escapes the working directory: {0}")]
    UnsafeEntry(String),

    #[error("Failed to unpack archive: {0}")]
    Unpack(#[source] io::Error),

    #[error("products.json is missing from the package")]
    ManifestMissing,

    #[error("Unable to read products.json: {0}")]
    ManifestUnreadable(#[source] io::Error),

    #[error("products.json is not a JSON array: {0}")]
    ManifestInvalid(String),

    #[error("Failed to write archive: {0}")]
    Write(#[source] zip::result::ZipError),

    #[error("I/O error while writing archive: {0}")]
    Io(#[from] io::Error),
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        let code = match &err {
            ArchiveError::InvalidArchive(_) => ErrorCode::InvalidArchive,
            ArchiveError::UnsafeEntry(_) | ArchiveError::Unpack(_) => ErrorCode::UnpackFailed,
            ArchiveError::ManifestMissing => ErrorCode::ManifestMissing,
            ArchiveError::ManifestUnreadable(_) | ArchiveError::ManifestInvalid(_) => {
                ErrorCode::ManifestInvalid
            }
            ArchiveError::Write(_) | ArchiveError::Io(_) => ErrorCode::ArchiveOpenFailed,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Extract every entry of `bytes` under `dest`.
///
/// Entries whose path would land outside `dest` (absolute paths, `..`
/// components) abort the unpack with [`ArchiveError::UnsafeEntry`].
pub fn unpack(bytes: &[u8], dest: &Path) -> Result<usize, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::InvalidArchive)?;
    fs::create_dir_all(dest).map_err(ArchiveError::Unpack)?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(ArchiveError::InvalidArchive)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveError::UnsafeEntry(entry.name().to_string()));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(ArchiveError::Unpack)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(ArchiveError::Unpack)?;
        }
        let mut out = File::create(&target).map_err(ArchiveError::Unpack)?;
        io::copy(&mut entry, &mut out).map_err(ArchiveError::Unpack)?;
        files += 1;
    }
    Ok(files)
}

/// Read the manifest of an unpacked package as raw JSON entries.
///
/// The top-level value must be an array; its entries are returned as-is
/// and decoded one at a time by the importer.
pub fn read_manifest(dir: &Path) -> Result<Vec<Value>, ArchiveError> {
    let path = dir.join(MANIFEST);
    if !path.is_file() {
        return Err(ArchiveError::ManifestMissing);
    }
    let raw = fs::read(&path).map_err(ArchiveError::ManifestUnreadable)?;
    match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(other) => Err(ArchiveError::ManifestInvalid(format!(
            "expected an array, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(ArchiveError::ManifestInvalid(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Streaming package writer
pub struct PackageWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
}

impl<W: Write + Seek> PackageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            options: SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated),
        }
    }

    pub fn write_manifest(&mut self, json: &[u8]) -> Result<(), ArchiveError> {
        self.zip
            .start_file(MANIFEST, self.options)
            .map_err(ArchiveError::Write)?;
        self.zip.write_all(json)?;
        Ok(())
    }

    /// Copy `source` into the package as `images/<name>`
    pub fn write_image(&mut self, name: &str, source: &Path) -> Result<(), ArchiveError> {
        let mut file = File::open(source)?;
        self.zip
            .start_file(format!("{IMAGES_DIR}/{name}"), self.options)
            .map_err(ArchiveError::Write)?;
        io::copy(&mut file, &mut self.zip)?;
        Ok(())
    }

    pub fn finish(self) -> Result<W, ArchiveError> {
        self.zip.finish().map_err(ArchiveError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_unpack_and_read_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("products.json", r#"[{"sku":"A"},{"sku":"B"}]"#),
            ("images/a.jpg", "img"),
        ]);

        assert_eq!(unpack(&bytes, dir.path()).unwrap(), 2);
        assert_eq!(fs::read(dir.path().join("images/a.jpg")).unwrap(), b"img");

        let records = read_manifest(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["sku"], "B");
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let err = unpack(b"definitely not a zip", dir.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidArchive(_)));
    }

    #[test]
    fn test_unpack_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let bytes = build_zip(&[("../escape.txt", "x")]);

        let err = unpack(&bytes, &work).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsafeEntry(_)));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_manifest_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_manifest(dir.path()).unwrap_err(),
            ArchiveError::ManifestMissing
        ));

        fs::write(dir.path().join(MANIFEST), b"null").unwrap();
        assert!(matches!(
            read_manifest(dir.path()).unwrap_err(),
            ArchiveError::ManifestInvalid(_)
        ));

        fs::write(dir.path().join(MANIFEST), b"{broken").unwrap();
        assert!(matches!(
            read_manifest(dir.path()).unwrap_err(),
            ArchiveError::ManifestInvalid(_)
        ));

        fs::write(dir.path().join(MANIFEST), b"[]").unwrap();
        assert!(read_manifest(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_package_writer() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("source.png");
        fs::write(&image, b"png").unwrap();

        let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
        writer.write_manifest(b"[]").unwrap();
        writer.write_image("shirt.png", &image).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let out = dir.path().join("out");
        unpack(&bytes, &out).unwrap();
        assert_eq!(fs::read(out.join("images/shirt.png")).unwrap(), b"png");
        assert_eq!(read_manifest(&out).unwrap().len(), 0);
    }
}
