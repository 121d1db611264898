// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-time metadata capture tracking.

use std::fmt;
use std::ops::BitOr;

/// Set of one-time metadata banks.
///
/// # Examples
///
/// ```
/// use classic_mqtt::state::MetadataBits;
///
/// let bits = MetadataBits::IDENTITY | MetadataBits::MODE;
/// assert!(bits.contains(MetadataBits::MODE));
/// assert!(!bits.contains(MetadataBits::FIRMWARE));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MetadataBits(u8);

impl MetadataBits {
    /// No banks.
    pub const NONE: Self = Self(0);
    /// Model, build date, unit id, MAC and last VOC (bank 4100).
    pub const IDENTITY: Self = Self(0x01);
    /// MPPT mode and aux functions (bank 4163).
    pub const MODE: Self = Self(0x02);
    /// Device name (bank 4209).
    pub const NAME: Self = Self(0x04);
    /// Nominal battery voltage and ending amps (bank 4243).
    pub const NOMINAL: Self = Self(0x08);
    /// Application and network firmware versions (bank 16386).
    pub const FIRMWARE: Self = Self(0x10);

    /// Returns the raw bit pattern.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Returns true if every bit in `other` is also set in `self`.
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MetadataBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for MetadataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Tracks which one-time banks have been decoded this session.
///
/// Each bit is set the first time its bank is decoded and is never cleared
/// for the rest of the power-on session, so expensive string fields are only
/// derived once. [`info_due`](Self::info_due) is edge-triggered: it reports
/// `true` once when the last required bit lands and then stays `false` until
/// [`rearm_info`](Self::rearm_info) is called.
///
/// # Examples
///
/// ```
/// use classic_mqtt::state::{MetadataBits, MetadataLatch};
///
/// let mut latch = MetadataLatch::new(MetadataBits::IDENTITY | MetadataBits::MODE);
/// assert!(latch.mark(MetadataBits::IDENTITY));
/// assert!(!latch.info_due());
///
/// latch.mark(MetadataBits::MODE);
/// assert!(latch.info_due());
/// assert!(!latch.info_due());
///
/// latch.rearm_info();
/// assert!(latch.info_due());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLatch {
    captured: MetadataBits,
    required: MetadataBits,
    info_published: bool,
}

impl MetadataLatch {
    /// Creates a latch that is complete once every bit in `required` is set.
    #[must_use]
    pub fn new(required: MetadataBits) -> Self {
        Self {
            captured: MetadataBits::NONE,
            required,
            info_published: false,
        }
    }

    /// Records that `bank` has been decoded.
    ///
    /// Returns `true` only the first time, which is the caller's cue to
    /// derive the bank's one-time fields.
    pub fn mark(&mut self, bank: MetadataBits) -> bool {
        if self.captured.contains(bank) {
            return false;
        }
        self.captured = self.captured | bank;
        tracing::debug!(bank = %bank, captured = %self.captured, "Captured one-time metadata");
        true
    }

    /// Returns true if `bank` has already been decoded.
    #[must_use]
    pub fn is_marked(&self, bank: MetadataBits) -> bool {
        self.captured.contains(bank)
    }

    /// Returns true once every required bank has been decoded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.captured.contains(self.required)
    }

    /// Returns the banks captured so far.
    #[must_use]
    pub fn captured(&self) -> MetadataBits {
        self.captured
    }

    /// Returns the banks required for completion.
    #[must_use]
    pub fn required(&self) -> MetadataBits {
        self.required
    }

    /// Returns true exactly once after the latch becomes complete, and
    /// records that the info payload has been handed out.
    pub fn info_due(&mut self) -> bool {
        if self.is_complete() && !self.info_published {
            self.info_published = true;
            return true;
        }
        false
    }

    /// Returns true if [`info_due`](Self::info_due) would fire, without
    /// consuming it.
    #[must_use]
    pub fn is_info_pending(&self) -> bool {
        self.is_complete() && !self.info_published
    }

    /// Allows the info payload to be published again. Captured bits are kept.
    pub fn rearm_info(&mut self) {
        self.info_published = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_bits() -> MetadataBits {
        MetadataBits::IDENTITY
            | MetadataBits::MODE
            | MetadataBits::NAME
            | MetadataBits::NOMINAL
            | MetadataBits::FIRMWARE
    }

    #[test]
    fn mark_is_idempotent() {
        let mut latch = MetadataLatch::new(all_bits());
        assert!(latch.mark(MetadataBits::NAME));
        assert!(!latch.mark(MetadataBits::NAME));
        assert!(latch.is_marked(MetadataBits::NAME));
        assert_eq!(latch.captured(), MetadataBits::NAME);
    }

    #[test]
    fn complete_only_when_all_required_bits_set() {
        let mut latch = MetadataLatch::new(all_bits());
        latch.mark(MetadataBits::IDENTITY);
        latch.mark(MetadataBits::MODE);
        latch.mark(MetadataBits::NAME);
        latch.mark(MetadataBits::NOMINAL);
        assert!(!latch.is_complete());
        latch.mark(MetadataBits::FIRMWARE);
        assert!(latch.is_complete());
    }

    #[test]
    fn info_due_fires_once_across_repeated_decodes() {
        let mut latch = MetadataLatch::new(MetadataBits::IDENTITY | MetadataBits::MODE);
        let mut fired = Vec::new();
        for bank in [
            MetadataBits::IDENTITY,
            MetadataBits::IDENTITY,
            MetadataBits::MODE,
            MetadataBits::IDENTITY,
            MetadataBits::MODE,
        ] {
            latch.mark(bank);
            fired.push(latch.info_due());
        }
        assert_eq!(fired, vec![false, false, true, false, false]);
    }

    #[test]
    fn rearm_republishes_without_clearing_bits() {
        let mut latch = MetadataLatch::new(MetadataBits::MODE);
        latch.mark(MetadataBits::MODE);
        assert!(latch.info_due());
        latch.rearm_info();
        assert!(latch.is_marked(MetadataBits::MODE));
        assert!(latch.is_info_pending());
        assert!(latch.info_due());
        assert!(!latch.info_due());
    }

    #[test]
    fn rearm_before_complete_does_not_fire() {
        let mut latch = MetadataLatch::new(all_bits());
        latch.rearm_info();
        assert!(!latch.info_due());
    }

    #[test]
    fn bits_display() {
        assert_eq!(all_bits().to_string(), "0x1F");
        assert!(MetadataBits::NONE.is_empty());
    }
}
