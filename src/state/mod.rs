// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded controller state.
//!
//! [`TelemetrySnapshot`] holds every field decoded from the register banks,
//! and [`MetadataLatch`] remembers which one-time banks have been captured in
//! the current session.
//!
//! # Examples
//!
//! ```
//! use classic_mqtt::state::{MetadataBits, MetadataLatch, TelemetrySnapshot};
//!
//! let mut snapshot = TelemetrySnapshot::new();
//! let mut latch = MetadataLatch::new(MetadataBits::NAME);
//!
//! if latch.mark(MetadataBits::NAME) {
//!     snapshot.info.device_name = "CLASSIC".to_string();
//! }
//! assert!(latch.is_complete());
//! ```

mod latch;
mod snapshot;

pub use latch::{MetadataBits, MetadataLatch};
pub use snapshot::{DeviceInfo, Readings, TelemetrySnapshot};
