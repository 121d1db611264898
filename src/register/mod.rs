// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed field reads over a raw holding-register response.
//!
//! The charge controller answers a read with `2 * register_count` bytes, each
//! register big-endian. Every accessor here takes a *register* index, not a
//! byte offset.
//!
//! 32-bit values span two registers with the low-order word first:
//!
//! ```text
//! buffer: [lo_hi, lo_lo, hi_hi, hi_lo]
//!          \_ word(idx) _/ \_ word(idx + 1) _/
//! value  = word(idx + 1) << 16 | word(idx)
//! ```
//!
//! Reading past the end of the buffer means the bank table routed a response
//! to the wrong decode routine, so every accessor panics instead of
//! truncating.
//!
//! # Examples
//!
//! ```
//! use classic_mqtt::register::RegisterBuffer;
//!
//! let bytes = [0x00, 0x02, 0x00, 0x01, 0xFF, 0x6A];
//! let regs = RegisterBuffer::new(&bytes);
//!
//! assert_eq!(regs.len(), 3);
//! assert_eq!(regs.u32(0), 0x0001_0002);
//! assert!((regs.scaled_float(2, 10.0) + 15.0).abs() < f32::EPSILON);
//! ```

/// Borrowed view of a register response.
#[derive(Debug, Clone, Copy)]
pub struct RegisterBuffer<'a> {
    bytes: &'a [u8],
}

impl<'a> RegisterBuffer<'a> {
    /// Wraps a raw response buffer.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Returns the number of whole registers in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / 2
    }

    /// Returns true if the buffer holds no registers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn bytes_at(&self, idx: usize, width: usize) -> &'a [u8] {
        let start = idx * 2;
        let end = start + width;
        assert!(
            end <= self.bytes.len(),
            "register read [{start}..{end}) past end of {}-byte buffer; bank table routed a response to the wrong decoder",
            self.bytes.len()
        );
        &self.bytes[start..end]
    }

    /// Reads an unsigned 16-bit register.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is past the end of the buffer.
    #[must_use]
    pub fn u16(&self, idx: usize) -> u16 {
        let b = self.bytes_at(idx, 2);
        u16::from_be_bytes([b[0], b[1]])
    }

    /// Reads a signed 16-bit register.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is past the end of the buffer.
    #[must_use]
    pub fn i16(&self, idx: usize) -> i16 {
        let b = self.bytes_at(idx, 2);
        i16::from_be_bytes([b[0], b[1]])
    }

    /// Reads an unsigned 32-bit value from registers `idx` (low) and
    /// `idx + 1` (high).
    ///
    /// # Panics
    ///
    /// Panics if `idx + 1` is past the end of the buffer.
    #[must_use]
    pub fn u32(&self, idx: usize) -> u32 {
        let b = self.bytes_at(idx, 4);
        u32::from_be_bytes([b[2], b[3], b[0], b[1]])
    }

    /// Reads a signed 32-bit value with the same word order as [`u32`](Self::u32).
    ///
    /// # Panics
    ///
    /// Panics if `idx + 1` is past the end of the buffer.
    #[must_use]
    pub fn i32(&self, idx: usize) -> i32 {
        let b = self.bytes_at(idx, 4);
        i32::from_be_bytes([b[2], b[3], b[0], b[1]])
    }

    /// Reads a signed register and divides it by `divisor`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is past the end of the buffer.
    #[must_use]
    pub fn scaled_float(&self, idx: usize, divisor: f32) -> f32 {
        f32::from(self.i16(idx)) / divisor
    }

    /// Returns the high byte of a register.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is past the end of the buffer.
    #[must_use]
    pub fn msb_byte(&self, idx: usize) -> u8 {
        self.bytes_at(idx, 2)[0]
    }

    /// Returns the low byte of a register.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is past the end of the buffer.
    #[must_use]
    pub fn lsb_byte(&self, idx: usize) -> u8 {
        self.bytes_at(idx, 2)[1]
    }

    /// Returns true if any bit of `mask` is set in the register.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is past the end of the buffer.
    #[must_use]
    pub fn flag(&self, idx: usize, mask: u16) -> bool {
        self.u16(idx) & mask != 0
    }

    /// Decodes four registers as an 8-character name.
    ///
    /// The controller stores each pair of characters little-endian inside a
    /// big-endian register, so bytes are taken in the order
    /// `1, 0, 3, 2, 5, 4, 7, 6`. Trailing NULs are dropped and any other
    /// non-ASCII byte is replaced.
    ///
    /// # Panics
    ///
    /// Panics if `idx + 3` is past the end of the buffer.
    #[must_use]
    pub fn packed_pair_string(&self, idx: usize) -> String {
        let b = self.bytes_at(idx, 8);
        let swapped = [b[1], b[0], b[3], b[2], b[5], b[4], b[7], b[6]];
        let end = swapped
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |pos| pos + 1);
        swapped[..end]
            .iter()
            .map(|&c| if c.is_ascii() { char::from(c) } else { '?' })
            .collect()
    }
}
