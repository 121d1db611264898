// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted connection settings.
//!
//! The settings live in a fixed-layout blob so that a blob written by one
//! build can be read by another. The layout is, in order:
//!
//! | Offset | Width | Field |
//! |--------|-------|-------|
//! | 0 | 1 | validity marker ([`Marker`]) |
//! | 1 | 1 | major version |
//! | 2 | 1 | minor version |
//! | 3 | 34 | transport host |
//! | 37 | 7 | transport port (decimal text) |
//! | 44 | 34 | bus host |
//! | 78 | 7 | bus port (decimal text) |
//! | 85 | 34 | bus client id |
//! | 119 | 34 | bus user |
//! | 153 | 34 | bus password |
//! | 187 | 101 | bus root topic |
//! | 288 | 34 | extra token |
//!
//! Every text slot holds a NUL-terminated string padded with NULs. A blob is
//! trusted only when its marker is [`Marker::Valid`] and its major version
//! equals [`VERSION_MAJOR`]; minor version changes keep existing blobs.
//!
//! # Examples
//!
//! ```
//! use classic_mqtt::config::{HardwareAddress, Marker, PersistedConfig};
//!
//! let mac: HardwareAddress = "24:0a:c4:12:34:56".parse().unwrap();
//! let config = PersistedConfig::defaults(mac);
//! assert_eq!(config.marker, Marker::Default);
//! assert_eq!(config.bus_client_id, "classic-240AC4123456");
//!
//! let blob = config.encode().unwrap();
//! assert_eq!(blob.len(), PersistedConfig::ENCODED_LEN);
//! assert_eq!(PersistedConfig::decode(&blob).unwrap(), config);
//! ```

mod storage;
mod store;

pub use storage::{BlobStorage, FileStorage, MemoryStorage};
pub use store::ConfigStore;

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ValueError};

/// Major layout version. A stored blob with a different major is discarded.
pub const VERSION_MAJOR: u8 = 0x01;
/// Minor layout version. Changes do not invalidate stored blobs.
pub const VERSION_MINOR: u8 = 0x00;

/// Default Modbus TCP host of the controller.
pub const DEFAULT_TRANSPORT_HOST: &str = "ClassicHost";
/// Default Modbus TCP port.
pub const DEFAULT_TRANSPORT_PORT: u16 = 502;
/// Default MQTT broker host.
pub const DEFAULT_BUS_HOST: &str = "127.0.0.1";
/// Default MQTT broker port.
pub const DEFAULT_BUS_PORT: u16 = 1883;
/// Default root topic.
pub const DEFAULT_ROOT_TOPIC: &str = "ClassicMQTT";

const HOST_WIDTH: usize = 34;
const PORT_WIDTH: usize = 7;
const CREDENTIAL_WIDTH: usize = 34;
const ROOT_TOPIC_WIDTH: usize = 101;
const TOKEN_WIDTH: usize = 34;

/// Validity marker stored in the first byte of the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Never written.
    Empty,
    /// Filled from compile-time defaults and not yet confirmed.
    Default,
    /// Written by an explicit save.
    Valid,
}

impl Marker {
    /// Returns the stored byte.
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Self::Empty => 0x00,
            Self::Default => 0xFF,
            Self::Valid => 0x55,
        }
    }
}

impl TryFrom<u8> for Marker {
    type Error = ConfigError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Self::Empty),
            0xFF => Ok(Self::Default),
            0x55 => Ok(Self::Valid),
            other => Err(ConfigError::UnknownMarker(other)),
        }
    }
}

/// A six-byte hardware (MAC) address used to derive the client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HardwareAddress(pub [u8; 6]);

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for HardwareAddress {
    type Err = ValueError;

    /// Parses `aa:bb:cc:dd:ee:ff` (`-` also accepted as separator).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidHardwareAddress(s.to_string());
        let mut bytes = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for byte in &mut bytes {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

/// Connection and device settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedConfig {
    /// Validity marker.
    pub marker: Marker,
    /// Layout major version.
    pub version_major: u8,
    /// Layout minor version.
    pub version_minor: u8,
    /// Modbus TCP host of the controller.
    pub transport_host: String,
    /// Modbus TCP port of the controller.
    pub transport_port: u16,
    /// MQTT broker host.
    pub bus_host: String,
    /// MQTT broker port.
    pub bus_port: u16,
    /// MQTT client id.
    pub bus_client_id: String,
    /// MQTT user name, empty for anonymous.
    pub bus_user: String,
    /// MQTT password.
    pub bus_password: String,
    /// Root topic prefix.
    pub bus_root_topic: String,
    /// Spare token slot kept for layout compatibility.
    pub extra_token: String,
}

impl PersistedConfig {
    /// Size of the encoded blob in bytes.
    pub const ENCODED_LEN: usize = 3
        + HOST_WIDTH
        + PORT_WIDTH
        + HOST_WIDTH
        + PORT_WIDTH
        + CREDENTIAL_WIDTH * 3
        + ROOT_TOPIC_WIDTH
        + TOKEN_WIDTH;

    /// Builds the compile-time defaults, with the client id derived from
    /// `hardware_address`. The marker is [`Marker::Default`].
    #[must_use]
    pub fn defaults(hardware_address: HardwareAddress) -> Self {
        let client_id: String = hardware_address
            .0
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect();
        Self {
            marker: Marker::Default,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            transport_host: DEFAULT_TRANSPORT_HOST.to_string(),
            transport_port: DEFAULT_TRANSPORT_PORT,
            bus_host: DEFAULT_BUS_HOST.to_string(),
            bus_port: DEFAULT_BUS_PORT,
            bus_client_id: format!("classic-{client_id}"),
            bus_user: String::new(),
            bus_password: String::new(),
            bus_root_topic: DEFAULT_ROOT_TOPIC.to_string(),
            extra_token: String::new(),
        }
    }

    /// Encodes the settings into the fixed layout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FieldTooLong` if a string does not fit its slot
    /// with a terminator.
    pub fn encode(&self) -> Result<Vec<u8>, ConfigError> {
        let mut blob = Vec::with_capacity(Self::ENCODED_LEN);
        blob.push(self.marker.byte());
        blob.push(self.version_major);
        blob.push(self.version_minor);
        put_str(&mut blob, "transport_host", &self.transport_host, HOST_WIDTH)?;
        put_str(&mut blob, "transport_port", &self.transport_port.to_string(), PORT_WIDTH)?;
        put_str(&mut blob, "bus_host", &self.bus_host, HOST_WIDTH)?;
        put_str(&mut blob, "bus_port", &self.bus_port.to_string(), PORT_WIDTH)?;
        put_str(&mut blob, "bus_client_id", &self.bus_client_id, CREDENTIAL_WIDTH)?;
        put_str(&mut blob, "bus_user", &self.bus_user, CREDENTIAL_WIDTH)?;
        put_str(&mut blob, "bus_password", &self.bus_password, CREDENTIAL_WIDTH)?;
        put_str(&mut blob, "bus_root_topic", &self.bus_root_topic, ROOT_TOPIC_WIDTH)?;
        put_str(&mut blob, "extra_token", &self.extra_token, TOKEN_WIDTH)?;
        Ok(blob)
    }

    /// Decodes a blob. Bytes past [`Self::ENCODED_LEN`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the blob is short, the marker is unknown,
    /// a text slot is unterminated or not UTF-8, or a port is not a number.
    pub fn decode(blob: &[u8]) -> Result<Self, ConfigError> {
        if blob.len() < Self::ENCODED_LEN {
            return Err(ConfigError::Truncated {
                expected: Self::ENCODED_LEN,
                actual: blob.len(),
            });
        }
        let marker = Marker::try_from(blob[0])?;
        let mut reader = SlotReader { blob, offset: 3 };
        Ok(Self {
            marker,
            version_major: blob[1],
            version_minor: blob[2],
            transport_host: reader.string("transport_host", HOST_WIDTH)?,
            transport_port: reader.port("transport_port")?,
            bus_host: reader.string("bus_host", HOST_WIDTH)?,
            bus_port: reader.port("bus_port")?,
            bus_client_id: reader.string("bus_client_id", CREDENTIAL_WIDTH)?,
            bus_user: reader.string("bus_user", CREDENTIAL_WIDTH)?,
            bus_password: reader.string("bus_password", CREDENTIAL_WIDTH)?,
            bus_root_topic: reader.string("bus_root_topic", ROOT_TOPIC_WIDTH)?,
            extra_token: reader.string("extra_token", TOKEN_WIDTH)?,
        })
    }
}

fn put_str(
    blob: &mut Vec<u8>,
    field: &'static str,
    value: &str,
    width: usize,
) -> Result<(), ConfigError> {
    let bytes = value.as_bytes();
    if bytes.contains(&0) {
        return Err(ConfigError::BadString(field));
    }
    if bytes.len() >= width {
        return Err(ConfigError::FieldTooLong {
            field,
            len: bytes.len(),
            max: width - 1,
        });
    }
    blob.extend_from_slice(bytes);
    blob.resize(blob.len() + width - bytes.len(), 0);
    Ok(())
}

struct SlotReader<'a> {
    blob: &'a [u8],
    offset: usize,
}

impl SlotReader<'_> {
    fn string(&mut self, field: &'static str, width: usize) -> Result<String, ConfigError> {
        let slot = &self.blob[self.offset..self.offset + width];
        self.offset += width;
        let end = slot
            .iter()
            .position(|&b| b == 0)
            .ok_or(ConfigError::BadString(field))?;
        String::from_utf8(slot[..end].to_vec()).map_err(|_| ConfigError::BadString(field))
    }

    fn port(&mut self, field: &'static str) -> Result<u16, ConfigError> {
        let text = self.string(field, PORT_WIDTH)?;
        text.trim().parse().map_err(|_| ConfigError::BadPort { field, value: text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: HardwareAddress = HardwareAddress([0x24, 0x0A, 0xC4, 0x12, 0x34, 0x56]);

    #[test]
    fn encoded_len_matches_layout() {
        assert_eq!(PersistedConfig::ENCODED_LEN, 322);
    }

    #[test]
    fn field_offsets() {
        let blob = PersistedConfig::defaults(MAC).encode().unwrap();
        assert_eq!(blob[0], 0xFF);
        assert_eq!(blob[1], VERSION_MAJOR);
        assert_eq!(&blob[3..3 + 11], b"ClassicHost");
        assert_eq!(&blob[37..40], b"502");
        assert_eq!(&blob[78..82], b"1883");
        assert_eq!(&blob[187..198], b"ClassicMQTT");
    }

    #[test]
    fn too_long_field_rejected() {
        let mut config = PersistedConfig::defaults(MAC);
        config.bus_host = "h".repeat(34);
        assert_eq!(
            config.encode().unwrap_err(),
            ConfigError::FieldTooLong {
                field: "bus_host",
                len: 34,
                max: 33,
            }
        );
        config.bus_host = "h".repeat(33);
        assert!(config.encode().is_ok());
    }

    #[test]
    fn decode_errors() {
        let blob = PersistedConfig::defaults(MAC).encode().unwrap();
        assert!(matches!(
            PersistedConfig::decode(&blob[..100]),
            Err(ConfigError::Truncated { expected: 322, actual: 100 })
        ));

        let mut bad_marker = blob.clone();
        bad_marker[0] = 0x12;
        assert_eq!(
            PersistedConfig::decode(&bad_marker).unwrap_err(),
            ConfigError::UnknownMarker(0x12)
        );

        let mut unterminated = blob.clone();
        unterminated[3..37].fill(b'x');
        assert_eq!(
            PersistedConfig::decode(&unterminated).unwrap_err(),
            ConfigError::BadString("transport_host")
        );

        let mut bad_port = blob;
        bad_port[37..40].copy_from_slice(b"abc");
        assert!(matches!(
            PersistedConfig::decode(&bad_port),
            Err(ConfigError::BadPort { field: "transport_port", .. })
        ));
    }

    #[test]
    fn hardware_address_parsing() {
        assert_eq!("24-0a-c4-12-34-56".parse::<HardwareAddress>().unwrap(), MAC);
        assert_eq!(MAC.to_string(), "24:0A:C4:12:34:56");
        assert!("24:0a:c4:12:34".parse::<HardwareAddress>().is_err());
        assert!("24:0a:c4:12:34:56:78".parse::<HardwareAddress>().is_err());
        assert!("zz:0a:c4:12:34:56".parse::<HardwareAddress>().is_err());
    }

    #[test]
    fn marker_bytes() {
        for marker in [Marker::Empty, Marker::Default, Marker::Valid] {
            assert_eq!(Marker::try_from(marker.byte()).unwrap(), marker);
        }
    }
}
