//! Whole-file JSON records with crash-safe replacement.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::StorageError;

/// A JSON document stored in a single file.
///
/// Writes go to `<file>.tmp`, are fsynced, then renamed over the target,
/// so readers only ever see the previous or the new document.
#[derive(Debug, Clone)]
pub struct JsonRecord {
    path: PathBuf,
}

impl JsonRecord {
    /// Creates a record backed by `path`. Nothing is touched on disk yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, returning `T::default()` if the file does not exist
    /// or is zero-length.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if an existing file cannot be read and
    /// [`StorageError::Corrupt`] if it does not parse. Existing data is never
    /// silently discarded.
    pub fn load<T: DeserializeOwned + Default>(&self) -> Result<T, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Record not found, starting empty");
                return Ok(T::default());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomically replaces the document with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if any step fails; the previous
    /// document is left in place.
    pub fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StorageError> {
        let temp_path = self.temp_path();

        self.write_temp(&temp_path, value).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            StorageError::Write {
                path: self.path.clone(),
                source,
            }
        })?;

        fs::rename(&temp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            StorageError::Write {
                path: self.path.clone(),
                source,
            }
        })?;

        // The new document is already in place at this point.
        if let Err(e) = self.sync_parent() {
            warn!(path = %self.path.display(), "Failed to sync record directory: {}", e);
        }

        Ok(())
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> std::io::Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()
    }

    #[cfg(not(unix))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn sync_parent(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn write_temp<T: Serialize + ?Sized>(&self, temp_path: &Path, value: &T) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;

        let file = writer.into_inner().map_err(std::io::IntoInnerError::into_error)?;
        file.sync_all()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
