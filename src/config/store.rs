// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Versioned configuration store.

use super::{BlobStorage, HardwareAddress, Marker, PersistedConfig, VERSION_MAJOR};
use crate::error::{Error, StorageError};

/// Loads, defaults and saves the [`PersistedConfig`].
///
/// Nothing here is fatal. A missing, corrupt or version-mismatched blob is
/// replaced by defaults, and a storage backend that fails to initialise
/// leaves the store running on in-memory defaults.
///
/// # Examples
///
/// ```
/// use classic_mqtt::config::{ConfigStore, HardwareAddress, MemoryStorage};
///
/// let mut store = ConfigStore::new(MemoryStorage::new(), HardwareAddress::default());
/// store.init();
/// store.load();
/// assert!(store.is_default());
///
/// store.settings_mut().bus_host = "broker.local".to_string();
/// store.save().unwrap();
/// assert!(!store.is_default());
/// ```
#[derive(Debug)]
pub struct ConfigStore<S> {
    storage: S,
    available: bool,
    hardware_address: HardwareAddress,
    settings: PersistedConfig,
}

impl<S: BlobStorage> ConfigStore<S> {
    /// Creates a store. Settings start empty until [`load`](Self::load).
    pub fn new(storage: S, hardware_address: HardwareAddress) -> Self {
        let mut settings = PersistedConfig::defaults(hardware_address);
        settings.marker = Marker::Empty;
        Self {
            storage,
            available: false,
            hardware_address,
            settings,
        }
    }

    /// Initialises the storage backend.
    ///
    /// On failure the error is logged and the store falls back to in-memory
    /// defaults. Returns `true` if the backend is usable.
    pub fn init(&mut self) -> bool {
        match self.storage.begin(PersistedConfig::ENCODED_LEN) {
            Ok(()) => {
                self.available = true;
            }
            Err(e) => {
                tracing::error!("Failed to initialise configuration storage: {e}");
                self.available = false;
                self.generate_defaults();
            }
        }
        self.available
    }

    /// Loads the stored blob.
    ///
    /// The blob is used only if its marker is valid and its major version
    /// matches. Otherwise defaults are generated and written back as valid,
    /// while [`is_default`](Self::is_default) keeps reporting `true` for
    /// this session.
    pub fn load(&mut self) {
        if !self.available {
            tracing::warn!("Configuration storage unavailable, using defaults");
            self.generate_defaults();
            return;
        }

        let blob = match self.storage.read() {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::info!("No stored configuration, writing defaults");
                self.reset_to_defaults();
                return;
            }
            Err(e) => {
                tracing::error!("Failed to read configuration: {e}");
                self.reset_to_defaults();
                return;
            }
        };

        match blob.first().copied() {
            Some(byte) if byte == Marker::Valid.byte() => {}
            marker => {
                tracing::warn!(marker = ?marker, "Stored configuration is not valid, resetting");
                self.reset_to_defaults();
                return;
            }
        }
        match blob.get(1).copied() {
            Some(VERSION_MAJOR) => {}
            found => {
                tracing::warn!(
                    found = ?found,
                    expected = VERSION_MAJOR,
                    "Configuration major version mismatch, resetting"
                );
                self.reset_to_defaults();
                return;
            }
        }

        match PersistedConfig::decode(&blob) {
            Ok(settings) => {
                tracing::info!(
                    version_major = settings.version_major,
                    version_minor = settings.version_minor,
                    "Loaded configuration"
                );
                self.settings = settings;
            }
            Err(e) => {
                tracing::warn!("Stored configuration is corrupt, resetting: {e}");
                self.reset_to_defaults();
            }
        }
    }

    /// Replaces the in-memory settings with compile-time defaults. The
    /// marker becomes [`Marker::Default`]; nothing is written.
    pub fn generate_defaults(&mut self) {
        self.settings = PersistedConfig::defaults(self.hardware_address);
    }

    /// Marks the settings valid and writes the whole blob.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unavailable, a field does not fit its
    /// slot or the storage write fails. The marker is left unchanged then.
    pub fn save(&mut self) -> Result<(), Error> {
        let previous = self.settings.marker;
        self.settings.marker = Marker::Valid;
        let written = self.write_settings();
        if written.is_err() {
            self.settings.marker = previous;
        }
        written
    }

    /// Returns true while the settings are compile-time defaults.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.settings.marker == Marker::Default
    }

    /// Returns true if the storage backend initialised.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Returns the current settings.
    #[must_use]
    pub fn settings(&self) -> &PersistedConfig {
        &self.settings
    }

    /// Returns the settings for editing before a [`save`](Self::save).
    pub fn settings_mut(&mut self) -> &mut PersistedConfig {
        &mut self.settings
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn write_settings(&mut self) -> Result<(), Error> {
        if !self.available {
            return Err(StorageError::NotInitialised.into());
        }
        let blob = self.settings.encode()?;
        self.storage.write(&blob)?;
        tracing::info!("Saved configuration");
        Ok(())
    }

    fn reset_to_defaults(&mut self) {
        self.generate_defaults();
        let mut persisted = self.settings.clone();
        persisted.marker = Marker::Valid;
        let written = persisted
            .encode()
            .map_err(Error::from)
            .and_then(|blob| self.storage.write(&blob).map_err(Error::from));
        if let Err(e) = written {
            tracing::error!("Failed to persist default configuration: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryStorage, VERSION_MINOR};

    const MAC: HardwareAddress = HardwareAddress([0x24, 0x0A, 0xC4, 0x12, 0x34, 0x56]);

    fn loaded(storage: MemoryStorage) -> ConfigStore<MemoryStorage> {
        let mut store = ConfigStore::new(storage, MAC);
        assert!(store.init());
        store.load();
        store
    }

    #[test]
    fn empty_storage_gets_defaults_written_valid() {
        let handle = MemoryStorage::new();
        let store = loaded(handle.clone());
        assert!(store.is_default());
        assert_eq!(store.settings().bus_client_id, "classic-240AC4123456");

        let blob = handle.blob().unwrap();
        assert_eq!(blob[0], Marker::Valid.byte());
        assert_eq!(handle.write_count(), 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let handle = MemoryStorage::new();
        let mut store = loaded(handle.clone());
        store.settings_mut().transport_host = "192.168.1.50".to_string();
        store.settings_mut().bus_port = 8883;
        store.settings_mut().bus_user = "solar".to_string();
        store.save().unwrap();

        let reloaded = loaded(handle);
        assert_eq!(reloaded.settings(), store.settings());
        assert_eq!(reloaded.settings().marker, Marker::Valid);
        assert!(!reloaded.is_default());
    }

    #[test]
    fn major_mismatch_resets() {
        let mut stale = PersistedConfig::defaults(MAC);
        stale.marker = Marker::Valid;
        stale.version_major = VERSION_MAJOR + 1;
        stale.bus_host = "old.broker".to_string();
        let handle = MemoryStorage::with_blob(stale.encode().unwrap());

        let store = loaded(handle.clone());
        assert_eq!(store.settings(), &PersistedConfig::defaults(MAC));

        let persisted = PersistedConfig::decode(&handle.blob().unwrap()).unwrap();
        assert_eq!(persisted.marker, Marker::Valid);
        assert_eq!(persisted.version_major, VERSION_MAJOR);
        assert_eq!(persisted.bus_host, "127.0.0.1");
    }

    #[test]
    fn minor_mismatch_keeps_blob() {
        let mut config = PersistedConfig::defaults(MAC);
        config.marker = Marker::Valid;
        config.version_minor = VERSION_MINOR + 3;
        config.bus_host = "kept.broker".to_string();
        let store = loaded(MemoryStorage::with_blob(config.encode().unwrap()));
        assert_eq!(store.settings().bus_host, "kept.broker");
        assert!(!store.is_default());
    }

    #[test]
    fn default_marker_resets() {
        let mut config = PersistedConfig::defaults(MAC);
        config.bus_host = "not.trusted".to_string();
        let store = loaded(MemoryStorage::with_blob(config.encode().unwrap()));
        assert_eq!(store.settings().bus_host, "127.0.0.1");
    }

    #[test]
    fn corrupt_blob_resets() {
        let handle = MemoryStorage::with_blob(vec![Marker::Valid.byte(), VERSION_MAJOR, 0, 1, 2]);
        let store = loaded(handle.clone());
        assert!(store.is_default());
        assert_eq!(
            handle.blob().map(|b| b.len()),
            Some(PersistedConfig::ENCODED_LEN)
        );
    }

    #[test]
    fn init_failure_uses_in_memory_defaults() {
        let handle = MemoryStorage::failing();
        let mut store = ConfigStore::new(handle.clone(), MAC);
        assert!(!store.init());
        store.load();
        assert!(store.is_default());
        assert!(store.save().is_err());
        assert!(store.is_default());
        assert_eq!(handle.write_count(), 0);
    }

    #[test]
    fn failed_save_keeps_marker() {
        let handle = MemoryStorage::new();
        let mut store = loaded(handle.clone());
        let writes = handle.write_count();
        assert!(store.is_default());

        store.settings_mut().bus_host = "b".repeat(40);
        let err = store.save().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(store.is_default());
        assert_eq!(handle.write_count(), writes);

        store.settings_mut().bus_host = "broker.local".to_string();
        store.save().unwrap();
        assert!(!store.is_default());
    }
}
