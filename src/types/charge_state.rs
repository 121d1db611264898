// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Charge stage and MPPT mode codes reported by the controller.

use std::fmt;

/// Charge stage, taken from the high byte of register 4120.
///
/// # Examples
///
/// ```
/// use classic_mqtt::types::ChargeState;
///
/// assert_eq!(ChargeState::from(4), ChargeState::BulkMppt);
/// assert_eq!(ChargeState::from(4).as_str(), "Bulk MPPT");
/// assert_eq!(ChargeState::from(42).code(), 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChargeState {
    /// Not charging.
    #[default]
    Resting,
    /// Absorb stage.
    Absorb,
    /// Bulk stage with MPPT tracking.
    BulkMppt,
    /// Float stage.
    Float,
    /// Float stage with MPPT tracking.
    FloatMppt,
    /// Equalize stage.
    Equalize,
    /// Input voltage above the operating range.
    HyperVoc,
    /// Equalize stage with MPPT tracking.
    EqualizeMppt,
    /// A code with no known meaning.
    Other(u8),
}

impl ChargeState {
    /// Returns the raw stage code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Resting => 0,
            Self::Absorb => 3,
            Self::BulkMppt => 4,
            Self::Float => 5,
            Self::FloatMppt => 6,
            Self::Equalize => 7,
            Self::HyperVoc => 10,
            Self::EqualizeMppt => 18,
            Self::Other(code) => *code,
        }
    }

    /// Returns a human-readable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resting => "Resting",
            Self::Absorb => "Absorb",
            Self::BulkMppt => "Bulk MPPT",
            Self::Float => "Float",
            Self::FloatMppt => "Float MPPT",
            Self::Equalize => "Equalize",
            Self::HyperVoc => "HyperVOC",
            Self::EqualizeMppt => "Equalize MPPT",
            Self::Other(_) => "Unknown",
        }
    }
}

impl From<u8> for ChargeState {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Resting,
            3 => Self::Absorb,
            4 => Self::BulkMppt,
            5 => Self::Float,
            6 => Self::FloatMppt,
            7 => Self::Equalize,
            10 => Self::HyperVoc,
            18 => Self::EqualizeMppt,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum power point tracking mode, register 4164.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MpptMode {
    /// Fixed PV input voltage.
    PvUset,
    /// Dynamic tracking.
    Dynamic,
    /// Wind power curve tracking.
    WindTrack,
    /// Legacy perturb-and-observe tracking.
    LegacyPAndO,
    /// Solar tracking.
    #[default]
    Solar,
    /// Hydro tracking.
    Hydro,
    /// A code with no known meaning (also covers the reserved ones).
    Other(u16),
}

impl MpptMode {
    /// Returns the raw mode code.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::PvUset => 1,
            Self::Dynamic => 3,
            Self::WindTrack => 5,
            Self::LegacyPAndO => 9,
            Self::Solar => 11,
            Self::Hydro => 13,
            Self::Other(code) => *code,
        }
    }

    /// Returns a human-readable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PvUset => "PV_Uset",
            Self::Dynamic => "DYNAMIC",
            Self::WindTrack => "WIND TRACK",
            Self::LegacyPAndO => "Legacy P&O",
            Self::Solar => "SOLAR",
            Self::Hydro => "HYDRO",
            Self::Other(_) => "RESERVED",
        }
    }
}

impl From<u16> for MpptMode {
    fn from(code: u16) -> Self {
        match code {
            1 => Self::PvUset,
            3 => Self::Dynamic,
            5 => Self::WindTrack,
            9 => Self::LegacyPAndO,
            11 => Self::Solar,
            13 => Self::Hydro,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for MpptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_state_codes_round_trip() {
        for code in [0u8, 3, 4, 5, 6, 7, 10, 18, 2, 99] {
            assert_eq!(ChargeState::from(code).code(), code);
        }
    }

    #[test]
    fn charge_state_unknown_code() {
        let state = ChargeState::from(2);
        assert_eq!(state, ChargeState::Other(2));
        assert_eq!(state.to_string(), "Unknown");
    }

    #[test]
    fn mppt_mode_labels() {
        assert_eq!(MpptMode::from(11).as_str(), "SOLAR");
        assert_eq!(MpptMode::from(9).to_string(), "Legacy P&O");
        assert_eq!(MpptMode::from(7), MpptMode::Other(7));
        assert_eq!(MpptMode::from(7).as_str(), "RESERVED");
    }
}
