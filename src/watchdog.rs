// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stall detection.
//!
//! The engine feeds the watchdog after every decoded response. If no response
//! is decoded within the armed timeout the process is expected to restart;
//! there is no in-process recovery from a stall.

use std::time::Duration;

use tokio::time::Instant;

/// Watchdog consumed by the engine.
pub trait Watchdog {
    /// Starts supervision with the given timeout.
    fn arm(&mut self, timeout: Duration);

    /// Signals progress.
    fn feed(&mut self);
}

/// Software watchdog polled by the main loop.
///
/// Uses Tokio's clock so tests can drive it with a paused runtime.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use classic_mqtt::watchdog::{HeartbeatWatchdog, Watchdog};
///
/// let mut watchdog = HeartbeatWatchdog::new();
/// assert!(!watchdog.is_expired());
///
/// watchdog.arm(Duration::from_secs(60));
/// watchdog.feed();
/// assert!(!watchdog.is_expired());
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeartbeatWatchdog {
    timeout: Option<Duration>,
    last_feed: Option<Instant>,
}

impl HeartbeatWatchdog {
    /// Creates an unarmed watchdog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if armed and not fed within the timeout.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match (self.timeout, self.last_feed) {
            (Some(timeout), Some(last_feed)) => last_feed.elapsed() > timeout,
            _ => false,
        }
    }

    /// Returns the time since the last feed, if armed.
    #[must_use]
    pub fn since_last_feed(&self) -> Option<Duration> {
        self.last_feed.map(|t| t.elapsed())
    }
}

impl Watchdog for HeartbeatWatchdog {
    fn arm(&mut self, timeout: Duration) {
        tracing::debug!(timeout_secs = timeout.as_secs(), "Watchdog armed");
        self.timeout = Some(timeout);
        self.last_feed = Some(Instant::now());
    }

    fn feed(&mut self) {
        if self.timeout.is_some() {
            self.last_feed = Some(Instant::now());
        }
    }
}
