// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publish interval type for the wake-rate setting.
//!
//! The wake rate can be changed remotely, so it is the one interval that has
//! to be range-checked at runtime. The snooze rate is a compile-time constant
//! and stays a plain [`Duration`].

use std::fmt;
use std::time::Duration;

use crate::error::ValueError;

/// Interval between readings publishes while awake, in milliseconds
/// (1000-60000).
///
/// # Examples
///
/// ```
/// use classic_mqtt::types::PublishRate;
///
/// let rate = PublishRate::new(2_000).unwrap();
/// assert_eq!(rate.millis(), 2_000);
///
/// // Out-of-range requests are rejected, not clamped
/// assert!(PublishRate::new(500).is_err());
/// assert!(PublishRate::new(120_000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublishRate(u64);

impl PublishRate {
    /// Fastest accepted wake rate (1 second).
    pub const MIN: u64 = 1_000;

    /// Slowest accepted wake rate (60 seconds).
    pub const MAX: u64 = 60_000;

    /// Wake rate used until a remote command changes it (5 seconds).
    pub const DEFAULT: u64 = 5_000;

    /// Creates a new publish rate.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `millis` is outside
    /// [`MIN`](Self::MIN)..=[`MAX`](Self::MAX).
    pub fn new(millis: u64) -> Result<Self, ValueError> {
        if !(Self::MIN..=Self::MAX).contains(&millis) {
            return Err(ValueError::OutOfRange {
                min: Self::MIN,
                max: Self::MAX,
                actual: millis,
            });
        }
        Ok(Self(millis))
    }

    /// Returns the rate in milliseconds.
    #[must_use]
    pub const fn millis(&self) -> u64 {
        self.0
    }

    /// Returns the rate as a [`Duration`].
    #[must_use]
    pub const fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl Default for PublishRate {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for PublishRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl TryFrom<u64> for PublishRate {
    type Error = ValueError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
