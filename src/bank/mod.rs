// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register bank table.
//!
//! A bank is a contiguous run of holding registers read with one request and
//! decoded by one routine. The transport does not echo the requested start
//! address, so a response is matched to its bank by register count alone.
//! [`BankTable::new`] therefore rejects tables where two banks share a count.
//!
//! # Default layout
//!
//! | # | Address | Count | Contents | One-time |
//! |---|---------|-------|----------|----------|
//! | 0 | 4100 | 44 | charger readings, identity | identity part |
//! | 1 | 4360 | 22 | Whizbang Jr. shunt | no |
//! | 2 | 4163 | 2 | MPPT mode, aux functions | yes |
//! | 3 | 4209 | 4 | device name | yes |
//! | 4 | 4243 | 32 | battery set points | yes |
//! | 5 | 16386 | 8 | firmware revisions | yes |
//!
//! # Examples
//!
//! ```
//! use classic_mqtt::bank::BankTable;
//!
//! let table = BankTable::classic();
//! assert_eq!(table.len(), 6);
//! assert_eq!(table.find_by_count(22), Some(1));
//! assert_eq!(table.find_by_count(7), None);
//! ```

mod decode;

use std::fmt;

use crate::error::TableError;
use crate::register::RegisterBuffer;
use crate::state::{MetadataBits, MetadataLatch, TelemetrySnapshot};

/// Signature of a bank decode routine.
pub type DecodeFn = fn(&RegisterBuffer<'_>, &mut TelemetrySnapshot, &mut MetadataLatch);

/// One entry of the bank table.
#[derive(Clone)]
pub struct RegisterBank {
    name: &'static str,
    start_address: u16,
    register_count: u16,
    received: bool,
    metadata: MetadataBits,
    decode: DecodeFn,
}

impl RegisterBank {
    /// Creates a bank entry.
    ///
    /// `metadata` names the one-time latch bits the decode routine sets; use
    /// [`MetadataBits::NONE`] for banks that only carry live readings.
    #[must_use]
    pub fn new(
        name: &'static str,
        start_address: u16,
        register_count: u16,
        metadata: MetadataBits,
        decode: DecodeFn,
    ) -> Self {
        Self {
            name,
            start_address,
            register_count,
            received: false,
            metadata,
            decode,
        }
    }

    /// Returns the bank name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the first register address.
    #[must_use]
    pub fn start_address(&self) -> u16 {
        self.start_address
    }

    /// Returns the number of registers read.
    #[must_use]
    pub fn register_count(&self) -> u16 {
        self.register_count
    }

    /// Returns true once a response for this bank has been decoded.
    #[must_use]
    pub fn is_received(&self) -> bool {
        self.received
    }

    /// Returns the one-time latch bits this bank contributes.
    #[must_use]
    pub fn metadata(&self) -> MetadataBits {
        self.metadata
    }

    /// Runs the decode routine.
    pub fn decode(
        &self,
        regs: &RegisterBuffer<'_>,
        snapshot: &mut TelemetrySnapshot,
        latch: &mut MetadataLatch,
    ) {
        (self.decode)(regs, snapshot, latch);
    }
}

impl fmt::Debug for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterBank")
            .field("name", &self.name)
            .field("start_address", &self.start_address)
            .field("register_count", &self.register_count)
            .field("received", &self.received)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Ordered, validated list of register banks.
#[derive(Debug, Clone)]
pub struct BankTable {
    banks: Vec<RegisterBank>,
}

impl BankTable {
    /// Builds a table from banks in polling order.
    ///
    /// # Errors
    ///
    /// Returns `TableError::Empty` for an empty list and
    /// `TableError::DuplicateRegisterCount` if two banks share a register
    /// count.
    pub fn new(banks: Vec<RegisterBank>) -> Result<Self, TableError> {
        if banks.is_empty() {
            return Err(TableError::Empty);
        }
        for (i, bank) in banks.iter().enumerate() {
            if let Some(other) = banks[i + 1..]
                .iter()
                .find(|other| other.register_count == bank.register_count)
            {
                return Err(TableError::DuplicateRegisterCount {
                    first: bank.start_address,
                    second: other.start_address,
                    register_count: bank.register_count,
                });
            }
        }
        Ok(Self { banks })
    }

    /// Returns the register layout of the Midnite Classic.
    #[must_use]
    pub fn classic() -> Self {
        Self {
            banks: vec![
                RegisterBank::new(
                    "charger",
                    4100,
                    44,
                    MetadataBits::IDENTITY,
                    decode::decode_charger,
                ),
                RegisterBank::new(
                    "whizbang",
                    4360,
                    22,
                    MetadataBits::NONE,
                    decode::decode_whizbang,
                ),
                RegisterBank::new("mode", 4163, 2, MetadataBits::MODE, decode::decode_mode),
                RegisterBank::new("name", 4209, 4, MetadataBits::NAME, decode::decode_name),
                RegisterBank::new(
                    "nominal",
                    4243,
                    32,
                    MetadataBits::NOMINAL,
                    decode::decode_nominal,
                ),
                RegisterBank::new(
                    "firmware",
                    16386,
                    8,
                    MetadataBits::FIRMWARE,
                    decode::decode_firmware,
                ),
            ],
        }
    }

    /// Returns the number of banks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    /// Returns true if the table has no banks. Never true for a validated table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Returns the bank at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&RegisterBank> {
        self.banks.get(index)
    }

    /// Iterates over the banks in polling order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisterBank> {
        self.banks.iter()
    }

    /// Returns the index of the bank whose register count matches.
    #[must_use]
    pub fn find_by_count(&self, register_count: u16) -> Option<usize> {
        self.banks
            .iter()
            .position(|bank| bank.register_count == register_count)
    }

    /// Sets the received flag of the bank at `index`.
    pub fn mark_received(&mut self, index: usize) {
        if let Some(bank) = self.banks.get_mut(index) {
            bank.received = true;
        }
    }

    /// Clears the received flag of the bank at `index` so it is read again.
    pub fn clear_received(&mut self, index: usize) {
        if let Some(bank) = self.banks.get_mut(index) {
            bank.received = false;
        }
    }

    /// Returns the union of one-time latch bits across all banks.
    #[must_use]
    pub fn metadata(&self) -> MetadataBits {
        self.banks
            .iter()
            .fold(MetadataBits::NONE, |acc, bank| acc | bank.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &RegisterBuffer<'_>, _: &mut TelemetrySnapshot, _: &mut MetadataLatch) {}

    #[test]
    fn classic_table_counts_are_distinct() {
        let classic = BankTable::classic();
        let rebuilt = BankTable::new(classic.iter().cloned().collect());
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn duplicate_register_count_rejected() {
        let result = BankTable::new(vec![
            RegisterBank::new("mode", 4163, 2, MetadataBits::MODE, noop),
            RegisterBank::new("name", 4209, 4, MetadataBits::NAME, noop),
            RegisterBank::new("firmware", 16386, 4, MetadataBits::FIRMWARE, noop),
        ]);
        assert_eq!(
            result.unwrap_err(),
            TableError::DuplicateRegisterCount {
                first: 4209,
                second: 16386,
                register_count: 4,
            }
        );
    }

    #[test]
    fn empty_table_rejected() {
        assert_eq!(BankTable::new(Vec::new()).unwrap_err(), TableError::Empty);
    }

    #[test]
    fn received_flags() {
        let mut table = BankTable::classic();
        assert!(table.iter().all(|bank| !bank.is_received()));
        table.mark_received(3);
        assert!(table.get(3).unwrap().is_received());
        table.clear_received(3);
        assert!(!table.get(3).unwrap().is_received());
        // Out of range is ignored
        table.mark_received(42);
    }

    #[test]
    fn classic_metadata_union() {
        let bits = BankTable::classic().metadata();
        assert_eq!(bits.bits(), 0x1F);
    }

    #[test]
    fn classic_layout() {
        let table = BankTable::classic();
        let layout: Vec<(u16, u16)> = table
            .iter()
            .map(|bank| (bank.start_address(), bank.register_count()))
            .collect();
        assert_eq!(
            layout,
            vec![(4100, 44), (4360, 22), (4163, 2), (4209, 4), (4243, 32), (16386, 8)]
        );
    }
}
