// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sequential register-bank polling.
//!
//! [`RegisterPoller`] visits one bank of the [`BankTable`] per tick and asks
//! the [`FieldTransport`] to read it, skipping banks already received. After
//! the last bank it wraps to the first one and clears the received flag of
//! every bank in its rearm set, so those banks are read again each cycle.
//! Banks outside the rearm set are read until they answer once and then left
//! alone for the rest of the session.
//!
//! Responses arrive separately, tagged only by register count, and are routed
//! with [`RegisterPoller::on_response`].

use crate::bank::BankTable;
use crate::error::TableError;
use crate::register::RegisterBuffer;
use crate::state::{MetadataLatch, TelemetrySnapshot};

/// Banks re-read on every cycle by default: the charger and whizbang banks.
pub const DEFAULT_REARM: [usize; 2] = [0, 1];

/// Field-protocol transport consumed by the poller.
pub trait FieldTransport {
    /// Submits a read of `register_count` holding registers at `address`.
    ///
    /// Returns `false` if the request could not be queued. The outcome of a
    /// queued request is reported later as a [`TransportEvent`].
    fn request_read(&mut self, address: u16, register_count: u16) -> bool;
}

/// Completion of a read request, delivered to the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A response carrying `register_count` registers.
    Data {
        /// Number of registers in `buffer`.
        register_count: u16,
        /// Raw big-endian register bytes.
        buffer: Vec<u8>,
    },
    /// The request failed.
    Error {
        /// Modbus exception code or transport error code.
        code: u8,
        /// Free-form detail for the log.
        context: String,
    },
}

/// Returns the name of a Modbus exception or transport error code.
///
/// # Examples
///
/// ```
/// use classic_mqtt::poller::error_reason;
///
/// assert_eq!(error_reason(0x02), "ILLEGAL_DATA_ADDRESS");
/// assert_eq!(error_reason(0xE0), "TIMEOUT");
/// assert_eq!(error_reason(0x42), "UNKNOWN");
/// ```
#[must_use]
pub const fn error_reason(code: u8) -> &'static str {
    match code {
        0x00 => "SUCCESS",
        0x01 => "ILLEGAL_FUNCTION",
        0x02 => "ILLEGAL_DATA_ADDRESS",
        0x03 => "ILLEGAL_DATA_VALUE",
        0x04 => "SERVER_DEVICE_FAILURE",
        0x05 => "ACKNOWLEDGE",
        0x06 => "SERVER_DEVICE_BUSY",
        0x07 => "NEGATIVE_ACKNOWLEDGE",
        0x08 => "MEMORY_PARITY_ERROR",
        0x0A => "GATEWAY_PATH_UNAVAILABLE",
        0x0B => "GATEWAY_TARGET_FAILED_TO_RESPOND",
        0xE0 => "TIMEOUT",
        0xE1 => "INVALID_SLAVE",
        0xE2 => "INVALID_FUNCTION",
        0xE3 => "CRC_ERROR",
        0xE4 => "COMM_ERROR",
        _ => "UNKNOWN",
    }
}

/// Observable poller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Nothing outstanding; the next tick visits this bank.
    Idle(usize),
    /// A request for this bank was submitted and has not been answered.
    AwaitingResponse(usize),
}

/// Drives one read request per tick across the bank table.
#[derive(Debug, Clone)]
pub struct RegisterPoller {
    table: BankTable,
    rearm: Vec<usize>,
    next: usize,
    awaiting: Option<usize>,
}

impl RegisterPoller {
    /// Creates a poller over `table` that re-reads the banks at `rearm`
    /// indices after every full cycle.
    ///
    /// # Errors
    ///
    /// Returns `TableError::RearmOutOfRange` if a rearm index is not a
    /// valid bank index.
    pub fn new(table: BankTable, rearm: Vec<usize>) -> Result<Self, TableError> {
        if let Some(&index) = rearm.iter().find(|&&index| index >= table.len()) {
            return Err(TableError::RearmOutOfRange {
                index,
                len: table.len(),
            });
        }
        Ok(Self {
            table,
            rearm,
            next: 0,
            awaiting: None,
        })
    }

    /// Creates a poller over the Classic table with the default rearm set.
    #[must_use]
    pub fn classic() -> Self {
        Self {
            table: BankTable::classic(),
            rearm: DEFAULT_REARM.to_vec(),
            next: 0,
            awaiting: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PollerState {
        match self.awaiting {
            Some(index) => PollerState::AwaitingResponse(index),
            None => PollerState::Idle(self.next),
        }
    }

    /// Returns the index of the bank the next tick visits.
    #[must_use]
    pub fn next_bank(&self) -> usize {
        self.next
    }

    /// Returns the bank table.
    #[must_use]
    pub fn table(&self) -> &BankTable {
        &self.table
    }

    /// Returns the rearm set.
    #[must_use]
    pub fn rearm(&self) -> &[usize] {
        &self.rearm
    }

    /// Visits the next bank.
    ///
    /// A bank not yet received gets one read request. A failed submission is
    /// logged and not retried until the cycle comes back around. The cursor
    /// advances either way.
    pub fn tick<T: FieldTransport + ?Sized>(&mut self, transport: &mut T) {
        let index = self.next;
        if let Some(bank) = self.table.get(index) {
            if bank.is_received() {
                self.awaiting = None;
            } else if transport.request_read(bank.start_address(), bank.register_count()) {
                tracing::info!(
                    bank = bank.name(),
                    address = bank.start_address(),
                    register_count = bank.register_count(),
                    "Requesting registers"
                );
                self.awaiting = Some(index);
            } else {
                tracing::error!(
                    bank = bank.name(),
                    address = bank.start_address(),
                    "Read request failed"
                );
                self.awaiting = None;
            }
        }

        self.next = index + 1;
        if self.next >= self.table.len() {
            self.next = 0;
            for &rearm in &self.rearm {
                self.table.clear_received(rearm);
            }
            tracing::debug!(rearm = ?self.rearm, "Poll cycle complete");
        }
    }

    /// Routes a response to the bank with a matching register count.
    ///
    /// The bank is marked received and its decode routine runs against
    /// `snapshot`. Returns `true` if a bank matched. A response that matches
    /// no bank is logged and leaves everything untouched.
    pub fn on_response(
        &mut self,
        register_count: u16,
        buffer: &[u8],
        snapshot: &mut TelemetrySnapshot,
        latch: &mut MetadataLatch,
    ) -> bool {
        let Some(index) = self.table.find_by_count(register_count) else {
            tracing::warn!(
                register_count,
                bytes = buffer.len(),
                "Response matches no register bank, discarding"
            );
            return false;
        };

        self.table.mark_received(index);
        if self.awaiting == Some(index) {
            self.awaiting = None;
        }
        if let Some(bank) = self.table.get(index) {
            tracing::debug!(bank = bank.name(), register_count, "Decoding response");
            bank.decode(&RegisterBuffer::new(buffer), snapshot, latch);
        }
        true
    }

    /// Logs a transport error. The bank stays unreceived and is requested
    /// again when the cycle comes back around.
    pub fn on_error(&mut self, code: u8, context: &str) {
        tracing::error!(
            code = format_args!("0x{code:02X}"),
            reason = error_reason(code),
            context,
            "Transport error"
        );
        self.awaiting = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::RegisterBank;
    use crate::state::MetadataBits;

    #[derive(Default)]
    struct RecordingTransport {
        requests: Vec<(u16, u16)>,
        fail: bool,
    }

    impl FieldTransport for RecordingTransport {
        fn request_read(&mut self, address: u16, register_count: u16) -> bool {
            self.requests.push((address, register_count));
            !self.fail
        }
    }

    fn write_soc(regs: &RegisterBuffer<'_>, snapshot: &mut TelemetrySnapshot, _: &mut MetadataLatch) {
        snapshot.readings.soc = regs.u16(0);
    }

    fn small_table() -> BankTable {
        BankTable::new(vec![
            RegisterBank::new("a", 100, 1, MetadataBits::NONE, write_soc),
            RegisterBank::new("b", 200, 2, MetadataBits::NONE, write_soc),
            RegisterBank::new("c", 300, 3, MetadataBits::NONE, write_soc),
        ])
        .unwrap()
    }

    #[test]
    fn ticks_visit_banks_in_order_and_wrap() {
        let mut poller = RegisterPoller::new(small_table(), vec![0]).unwrap();
        let mut transport = RecordingTransport::default();
        for _ in 0..4 {
            poller.tick(&mut transport);
        }
        assert_eq!(
            transport.requests,
            vec![(100, 1), (200, 2), (300, 3), (100, 1)]
        );
        assert_eq!(poller.next_bank(), 1);
    }

    #[test]
    fn received_banks_are_skipped_until_rearmed() {
        let mut poller = RegisterPoller::new(small_table(), vec![0]).unwrap();
        let mut transport = RecordingTransport::default();
        let mut snapshot = TelemetrySnapshot::new();
        let mut latch = MetadataLatch::new(MetadataBits::NONE);

        assert!(poller.on_response(1, &[0, 1], &mut snapshot, &mut latch));
        assert!(poller.on_response(2, &[0, 2, 0, 0], &mut snapshot, &mut latch));
        assert!(poller.on_response(3, &[0, 3, 0, 0, 0, 0], &mut snapshot, &mut latch));

        // Full cycle: everything received, nothing requested, bank 0 rearmed on wrap.
        for _ in 0..3 {
            poller.tick(&mut transport);
        }
        assert!(transport.requests.is_empty());

        for _ in 0..3 {
            poller.tick(&mut transport);
        }
        assert_eq!(transport.requests, vec![(100, 1)]);
    }

    #[test]
    fn failed_submission_still_advances() {
        let mut poller = RegisterPoller::new(small_table(), vec![0]).unwrap();
        let mut transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        poller.tick(&mut transport);
        assert_eq!(poller.state(), PollerState::Idle(1));
        assert!(!poller.table().get(0).unwrap().is_received());
    }

    #[test]
    fn response_clears_awaiting_state() {
        let mut poller = RegisterPoller::new(small_table(), vec![0]).unwrap();
        let mut transport = RecordingTransport::default();
        let mut snapshot = TelemetrySnapshot::new();
        let mut latch = MetadataLatch::new(MetadataBits::NONE);

        poller.tick(&mut transport);
        assert_eq!(poller.state(), PollerState::AwaitingResponse(0));
        poller.on_response(1, &[0x00, 0x2A], &mut snapshot, &mut latch);
        assert_eq!(poller.state(), PollerState::Idle(1));
        assert_eq!(snapshot.readings.soc, 42);
    }

    #[test]
    fn unmatched_response_mutates_nothing() {
        let mut poller = RegisterPoller::new(small_table(), vec![0]).unwrap();
        let mut snapshot = TelemetrySnapshot::new();
        let mut latch = MetadataLatch::new(MetadataBits::NONE);
        let before = snapshot.clone();

        assert!(!poller.on_response(9, &[0xFF; 18], &mut snapshot, &mut latch));
        assert_eq!(snapshot, before);
        assert!(poller.table().iter().all(|bank| !bank.is_received()));
    }

    #[test]
    fn error_keeps_bank_unreceived() {
        let mut poller = RegisterPoller::new(small_table(), vec![0]).unwrap();
        let mut transport = RecordingTransport::default();
        poller.tick(&mut transport);
        poller.on_error(0xE0, "read 100");
        assert_eq!(poller.state(), PollerState::Idle(1));
        assert!(!poller.table().get(0).unwrap().is_received());
    }

    #[test]
    fn rearm_index_validated() {
        let err = RegisterPoller::new(small_table(), vec![0, 3]).unwrap_err();
        assert_eq!(err, TableError::RearmOutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn classic_rearms_first_two_banks() {
        let poller = RegisterPoller::classic();
        assert_eq!(poller.rearm(), &[0, 1]);
        assert_eq!(poller.table().len(), 6);
    }
}
