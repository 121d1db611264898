// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-blob storage backends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageError;

/// Storage holding a single configuration blob.
///
/// Writes replace the whole blob; a reader never observes a partially
/// written one.
pub trait BlobStorage {
    /// Prepares the backend for a blob of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Init` if the backend is unusable.
    fn begin(&mut self, size: usize) -> Result<(), StorageError>;

    /// Reads the stored blob, or `None` if nothing was ever written.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the blob exists but cannot be read.
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the stored blob.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the blob cannot be written.
    fn write(&mut self, blob: &[u8]) -> Result<(), StorageError>;
}

/// Blob stored in a file.
///
/// A write goes to `<path>.tmp` first and is then renamed over `<path>`, so
/// a crash mid-write leaves the previous blob in place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    ready: bool,
}

impl FileStorage {
    /// Creates a backend for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ready: false,
        }
    }

    /// Returns the blob path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn shadow_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl BlobStorage for FileStorage {
    fn begin(&mut self, _size: usize) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Init(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        if self.path.is_dir() {
            return Err(StorageError::Init(format!(
                "{} is a directory",
                self.path.display()
            )));
        }
        self.ready = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        if !self.ready {
            return Err(StorageError::NotInitialised);
        }
        match fs::read(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, blob: &[u8]) -> Result<(), StorageError> {
        if !self.ready {
            return Err(StorageError::NotInitialised);
        }
        let shadow = self.shadow_path();
        fs::write(&shadow, blob)?;
        fs::rename(&shadow, &self.path)?;
        tracing::debug!(path = %self.path.display(), bytes = blob.len(), "Wrote configuration blob");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    blob: Option<Vec<u8>>,
    fail_init: bool,
    ready: bool,
    writes: usize,
}

/// In-memory blob storage.
///
/// Clones share the same blob, so a test can keep a handle and inspect what
/// a [`ConfigStore`](super::ConfigStore) wrote.
///
/// # Examples
///
/// ```
/// use classic_mqtt::config::{BlobStorage, MemoryStorage};
///
/// let handle = MemoryStorage::new();
/// let mut storage = handle.clone();
/// storage.begin(4).unwrap();
/// storage.write(&[1, 2, 3, 4]).unwrap();
/// assert_eq!(handle.blob(), Some(vec![1, 2, 3, 4]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage already holding `blob`.
    #[must_use]
    pub fn with_blob(blob: Vec<u8>) -> Self {
        let storage = Self::new();
        storage.inner.lock().blob = Some(blob);
        storage
    }

    /// Creates storage whose initialisation always fails.
    #[must_use]
    pub fn failing() -> Self {
        let storage = Self::new();
        storage.inner.lock().fail_init = true;
        storage
    }

    /// Returns a copy of the stored blob.
    #[must_use]
    pub fn blob(&self) -> Option<Vec<u8>> {
        self.inner.lock().blob.clone()
    }

    /// Returns how many writes have been made.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }
}

impl BlobStorage for MemoryStorage {
    fn begin(&mut self, _size: usize) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.fail_init {
            return Err(StorageError::Init("simulated failure".to_string()));
        }
        inner.ready = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.lock();
        if !inner.ready {
            return Err(StorageError::NotInitialised);
        }
        Ok(inner.blob.clone())
    }

    fn write(&mut self, blob: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if !inner.ready {
            return Err(StorageError::NotInitialised);
        }
        inner.blob = Some(blob.to_vec());
        inner.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("nested").join("classic.cfg"));
        storage.begin(8).unwrap();
        assert_eq!(storage.read().unwrap(), None);

        storage.write(b"blob").unwrap();
        assert_eq!(storage.read().unwrap(), Some(b"blob".to_vec()));
        assert!(!dir.path().join("nested").join("classic.cfg.tmp").exists());
    }

    #[test]
    fn file_storage_requires_begin() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("classic.cfg"));
        assert!(matches!(storage.read(), Err(StorageError::NotInitialised)));
    }

    #[test]
    fn file_storage_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path());
        assert!(matches!(storage.begin(8), Err(StorageError::Init(_))));
    }

    #[test]
    fn memory_storage_failing_init() {
        let mut storage = MemoryStorage::failing();
        assert!(storage.begin(8).is_err());
        assert!(storage.write(&[0]).is_err());
        assert_eq!(storage.write_count(), 0);
    }
}
