// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote commands received on `<root>/<device>/cmnd/#`.
//!
//! Two payload shapes are accepted:
//!
//! | Payload | Command |
//! |---------|---------|
//! | `{"stayAwake": true, "wakePublishRate": 2000}` | [`RemoteCommand::Settings`], both keys optional |
//! | `{"wake"}` | [`RemoteCommand::Wake`] |
//! | `{"info"}` | [`RemoteCommand::Info`] |
//!
//! The last two are not valid JSON; they are matched literally, ignoring
//! ASCII case and surrounding whitespace.
//!
//! # Examples
//!
//! ```
//! use classic_mqtt::command::{CommandSettings, RemoteCommand};
//!
//! let cmd = RemoteCommand::parse(br#"{"wakePublishRate": 2000}"#).unwrap();
//! assert_eq!(
//!     cmd,
//!     RemoteCommand::Settings(CommandSettings {
//!         stay_awake: None,
//!         wake_publish_rate: Some(2000),
//!     })
//! );
//!
//! assert_eq!(RemoteCommand::parse(b"{\"Wake\"}").unwrap(), RemoteCommand::Wake);
//! assert!(RemoteCommand::parse(b"not json").is_err());
//! ```

use serde::Deserialize;

use crate::error::ParseError;

/// Scheduler settings carried by a JSON command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSettings {
    /// Suppress the automatic drop to snooze.
    pub stay_awake: Option<bool>,
    /// New wake publish rate in milliseconds.
    pub wake_publish_rate: Option<u64>,
}

impl CommandSettings {
    /// Returns true if at least one known key was present.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        self.stay_awake.is_some() || self.wake_publish_rate.is_some()
    }
}

/// A decoded remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Switch to the wake rate.
    Wake,
    /// Republish the device info block.
    Info,
    /// Change scheduler settings.
    Settings(CommandSettings),
}

impl RemoteCommand {
    /// Parses a command payload.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidUtf8` if the payload is not UTF-8 and
    /// `ParseError::Json` if it is neither a legacy keyword nor a JSON object.
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(payload).map_err(|_| ParseError::InvalidUtf8)?;
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case(r#"{"wake"}"#) {
            return Ok(Self::Wake);
        }
        if trimmed.eq_ignore_ascii_case(r#"{"info"}"#) {
            return Ok(Self::Info);
        }
        let settings: CommandSettings = serde_json::from_str(trimmed)?;
        Ok(Self::Settings(settings))
    }
}
