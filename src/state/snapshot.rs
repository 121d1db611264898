// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded charge-controller state.

use crate::types::{ChargeState, MpptMode};

/// Everything decoded from the controller so far.
///
/// The snapshot is split into the one-time [`DeviceInfo`] and the
/// continuously refreshed [`Readings`]. Decode routines are the only writers;
/// each one owns a disjoint set of fields, so a snapshot never holds half of
/// a bank.
///
/// # Examples
///
/// ```
/// use classic_mqtt::state::TelemetrySnapshot;
///
/// let snapshot = TelemetrySnapshot::new();
/// assert_eq!(snapshot.info.device_name, "");
/// assert_eq!(snapshot.readings.soc, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Identity and configuration fields, captured once per session.
    pub info: DeviceInfo,
    /// Live telemetry, refreshed every poll cycle.
    pub readings: Readings,
}

impl TelemetrySnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Identity and configuration of the controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    /// Unit identifier (registers 4111-4112).
    pub unit_id: i32,
    /// Eight-character device name.
    pub device_name: String,
    /// Model string, e.g. `Classic 150 (rev 4)`.
    pub model: String,
    /// Build date as `YYYYMMDD`.
    pub build_date: String,
    /// Application firmware revision.
    pub app_version: String,
    /// Network firmware revision.
    pub net_version: String,
    /// Controller MAC address as `AA:BB:CC:DD:EE:FF`.
    pub mac_address: String,
    /// Open-circuit voltage measured at the last sweep (V).
    pub last_voc: f32,
    /// Nominal battery voltage (V).
    pub nominal_battery_voltage: u16,
    /// MPPT mode.
    pub mppt_mode: MpptMode,
    /// Aux 1 function code.
    pub aux1_function: u8,
    /// Aux 2 function code.
    pub aux2_function: u8,
    /// True if a Whizbang Jr. shunt is configured on Aux 1.
    pub has_whizbang: bool,
    /// Current at which absorb ends (A).
    pub ending_amps: f32,
    /// Temperature-compensated battery regulation set point (V).
    pub vbatt_reg_set_p_tmp_comp: f32,
    /// Code explaining why the controller is resting.
    pub reason_for_resting: u16,
}

/// Live telemetry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    /// Battery voltage (V).
    pub bat_voltage: f32,
    /// PV input voltage (V).
    pub pv_voltage: f32,
    /// Battery current (A).
    pub bat_current: f32,
    /// Energy harvested today (kWh).
    pub energy_today: f32,
    /// Output power (W).
    pub power: f32,
    /// Charge stage.
    pub charge_state: ChargeState,
    /// PV input current (A).
    pub pv_current: f32,
    /// Lifetime energy (kWh).
    pub total_energy: f32,
    /// Raw status flags (registers 4130-4131).
    pub info_flags_bits: i32,
    /// Battery temperature (°C).
    pub bat_temperature: f32,
    /// Power FET temperature (°C).
    pub fet_temperature: f32,
    /// PCB temperature (°C).
    pub pcb_temperature: f32,
    /// Seconds spent in float today.
    pub float_time_today_seconds: u16,
    /// Remaining absorb time (s).
    pub absorb_time: u16,
    /// Remaining equalize time (s).
    pub equalize_time: u16,
    /// Aux 1 output state.
    pub aux1: bool,
    /// Aux 2 output state.
    pub aux2: bool,
    /// Whizbang positive amp-hour counter.
    pub positive_amp_hours: u32,
    /// Whizbang negative amp-hour counter, as a magnitude.
    pub negative_amp_hours: i32,
    /// Whizbang net amp-hours.
    pub net_amp_hours: i32,
    /// Shunt temperature (°C).
    pub shunt_temperature: f32,
    /// Battery current measured by the shunt (A).
    pub whizbang_bat_current: f32,
    /// Battery state of charge (%).
    pub soc: u16,
    /// Remaining battery capacity (Ah).
    pub remaining_amp_hours: u16,
    /// Total battery capacity (Ah).
    pub total_amp_hours: u16,
}
