// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound telemetry messages.
//!
//! The bridge publishes under `<root>/<device>/`:
//!
//! - `stat/info` - [`InfoPayload`], once per session when all one-time banks are in
//! - `stat/readings` - [`ReadingsPayload`], on every scheduler publish
//! - `tele/LWT` - `Online` / `Offline`, retained
//!
//! and listens on `cmnd/#`.
//!
//! # Examples
//!
//! ```
//! use classic_mqtt::state::TelemetrySnapshot;
//! use classic_mqtt::telemetry::ReadingsPayload;
//!
//! let mut snapshot = TelemetrySnapshot::new();
//! snapshot.readings.soc = 80;
//!
//! let json = serde_json::to_string(&ReadingsPayload::from_snapshot(&snapshot)).unwrap();
//! assert!(json.contains(r#""SOC":80"#));
//! ```

mod payload;
mod topics;

pub use payload::{InfoPayload, ReadingsPayload};
pub use topics::{DEFAULT_DEVICE_NAME, LWT_OFFLINE, LWT_ONLINE, Topics};
