// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the file-backed configuration store.

use classic_mqtt::config::{
    ConfigStore, FileStorage, HardwareAddress, Marker, PersistedConfig, VERSION_MAJOR,
};

fn mac() -> HardwareAddress {
    "DE:AD:BE:EF:00:01".parse().unwrap()
}

fn open(path: &std::path::Path) -> ConfigStore<FileStorage> {
    let mut store = ConfigStore::new(FileStorage::new(path), mac());
    assert!(store.init());
    store.load();
    store
}

#[test]
fn missing_file_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classic.cfg");

    let store = open(&path);
    assert!(store.is_default());
    assert_eq!(store.settings().bus_client_id, "classic-DEADBEEF0001");
    assert_eq!(store.settings().bus_root_topic, "ClassicMQTT");

    let blob = std::fs::read(&path).unwrap();
    assert_eq!(blob.len(), PersistedConfig::ENCODED_LEN);
    assert_eq!(blob[0], Marker::Valid.byte());

    // The regenerated blob is accepted on the next start.
    let reopened = open(&path);
    assert!(!reopened.is_default());
    assert_eq!(reopened.settings().bus_client_id, "classic-DEADBEEF0001");
}

#[test]
fn saved_settings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("classic.cfg");

    let mut store = open(&path);
    {
        let settings = store.settings_mut();
        settings.transport_host = "192.168.1.40".to_string();
        settings.bus_host = "broker.local".to_string();
        settings.bus_port = 8883;
        settings.bus_user = "solar".to_string();
        settings.bus_password = "hunter2".to_string();
        settings.bus_root_topic = "Home/Solar".to_string();
    }
    store.save().unwrap();

    let reopened = open(&path);
    let settings = reopened.settings();
    assert_eq!(settings.marker, Marker::Valid);
    assert_eq!(settings.transport_host, "192.168.1.40");
    assert_eq!(settings.bus_host, "broker.local");
    assert_eq!(settings.bus_port, 8883);
    assert_eq!(settings.bus_user, "solar");
    assert_eq!(settings.bus_password, "hunter2");
    assert_eq!(settings.bus_root_topic, "Home/Solar");
}

#[test]
fn truncated_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classic.cfg");
    std::fs::write(&path, [Marker::Valid.byte(), VERSION_MAJOR, 0, 1, 2]).unwrap();

    let store = open(&path);
    assert!(store.is_default());
    assert_eq!(
        std::fs::read(&path).unwrap().len(),
        PersistedConfig::ENCODED_LEN
    );
}

#[test]
fn major_version_mismatch_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classic.cfg");

    let mut store = open(&path);
    store.settings_mut().bus_host = "broker.local".to_string();
    store.save().unwrap();

    let mut blob = std::fs::read(&path).unwrap();
    blob[1] = VERSION_MAJOR + 1;
    std::fs::write(&path, &blob).unwrap();

    let reopened = open(&path);
    assert!(reopened.is_default());
    assert_eq!(reopened.settings().bus_host, "127.0.0.1");
}

#[test]
fn erased_marker_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classic.cfg");
    std::fs::write(&path, vec![0xFF; PersistedConfig::ENCODED_LEN]).unwrap();

    let store = open(&path);
    assert!(store.is_default());
    assert_eq!(std::fs::read(&path).unwrap()[0], Marker::Valid.byte());
}

#[test]
fn directory_path_falls_back_to_memory() {
    let dir = tempfile::tempdir().unwrap();

    let mut store = ConfigStore::new(FileStorage::new(dir.path()), mac());
    assert!(!store.init());
    store.load();
    assert!(store.is_default());
    assert!(!store.is_available());
    assert!(store.save().is_err());
    assert!(store.is_default());
}
