// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Default device segment of every topic.
pub const DEFAULT_DEVICE_NAME: &str = "classic";

/// Payload published on the LWT topic once connected.
pub const LWT_ONLINE: &str = "Online";

/// Last-will payload the broker publishes on disconnect.
pub const LWT_OFFLINE: &str = "Offline";

/// Topic set for one controller.
///
/// # Examples
///
/// ```
/// use classic_mqtt::telemetry::Topics;
///
/// let topics = Topics::new("ClassicMQTT", "classic");
/// assert_eq!(topics.readings(), "ClassicMQTT/classic/stat/readings");
/// assert_eq!(topics.command_filter(), "ClassicMQTT/classic/cmnd/#");
/// assert!(topics.is_command("ClassicMQTT/classic/cmnd/wake"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    info: String,
    readings: String,
    lwt: String,
    command_prefix: String,
    command_filter: String,
}

impl Topics {
    /// Builds the topics under `<root>/<device>/`.
    #[must_use]
    pub fn new(root: &str, device: &str) -> Self {
        let base = format!("{}/{}", root.trim_end_matches('/'), device);
        Self {
            info: format!("{base}/stat/info"),
            readings: format!("{base}/stat/readings"),
            lwt: format!("{base}/tele/LWT"),
            command_prefix: format!("{base}/cmnd/"),
            command_filter: format!("{base}/cmnd/#"),
        }
    }

    /// Returns the one-time info topic.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Returns the readings topic.
    #[must_use]
    pub fn readings(&self) -> &str {
        &self.readings
    }

    /// Returns the retained last-will topic.
    #[must_use]
    pub fn lwt(&self) -> &str {
        &self.lwt
    }

    /// Returns the subscription filter for commands.
    #[must_use]
    pub fn command_filter(&self) -> &str {
        &self.command_filter
    }

    /// Returns true if `topic` is below the command prefix.
    #[must_use]
    pub fn is_command(&self, topic: &str) -> bool {
        topic.starts_with(&self.command_prefix)
    }
}
