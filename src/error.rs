// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `classic_mqtt` library.
//!
//! Nothing in the telemetry core aborts the process: every variant here is
//! either logged and retried on the next cycle, or recovered by falling back
//! to defaults. The enums exist so that the collaborators (storage, bus,
//! transport) can report what went wrong with enough detail for the log.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a remote command.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The persisted configuration could not be encoded or decoded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The configuration storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The register bank table is misconfigured.
    #[error("bank table error: {0}")]
    Table(#[from] TableError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
        /// The actual value that was provided.
        actual: u64,
    },

    /// A hardware address string could not be parsed.
    #[error("invalid hardware address: {0}")]
    InvalidHardwareAddress(String),
}

/// Errors related to protocol communication (Modbus/MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The bus is not connected.
    #[error("not connected")]
    NotConnected,
}

/// Errors related to parsing remote commands.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors related to the fixed-layout configuration blob.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A string does not fit in its fixed-width slot (including the terminator).
    #[error("field {field} is {len} bytes, at most {max} allowed")]
    FieldTooLong {
        /// Name of the field.
        field: &'static str,
        /// Length of the supplied value in bytes.
        len: usize,
        /// Maximum number of bytes allowed.
        max: usize,
    },

    /// The blob is shorter than the declared layout.
    #[error("blob is {actual} bytes, expected {expected}")]
    Truncated {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The first byte is not a known validity marker.
    #[error("unknown validity marker 0x{0:02X}")]
    UnknownMarker(u8),

    /// A string slot has no terminator or is not UTF-8.
    #[error("field {0} is not a terminated UTF-8 string")]
    BadString(&'static str),

    /// A port slot does not hold a decimal port number.
    #[error("field {field} holds invalid port {value:?}")]
    BadPort {
        /// Name of the field.
        field: &'static str,
        /// The stored text.
        value: String,
    },
}

/// Errors raised by a configuration storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be initialised.
    #[error("storage initialisation failed: {0}")]
    Init(String),

    /// The backend was used before a successful initialisation.
    #[error("storage is not initialised")]
    NotInitialised,

    /// Underlying I/O failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors detected while building the register bank table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The table has no banks.
    #[error("bank table is empty")]
    Empty,

    /// Two banks share a register count, so responses cannot be routed.
    #[error("banks at {first} and {second} both have register count {register_count}")]
    DuplicateRegisterCount {
        /// Start address of the first bank.
        first: u16,
        /// Start address of the second bank.
        second: u16,
        /// The shared register count.
        register_count: u16,
    },

    /// A rearm index points past the end of the table.
    #[error("rearm index {index} is out of range for {len} banks")]
    RearmOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of banks in the table.
        len: usize,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
