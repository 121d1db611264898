// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decode routines, one per register bank.
//!
//! Register indices are offsets from the bank's start address. The comments
//! give the controller's 1-based register number for cross-checking against
//! the Modbus map.

use chrono::NaiveDate;

use crate::register::RegisterBuffer;
use crate::state::{MetadataBits, MetadataLatch, TelemetrySnapshot};
use crate::types::{ChargeState, MpptMode};

/// Aux function code of a Whizbang Jr. shunt.
const AUX_FUNCTION_WHIZBANG: u8 = 18;

/// Controller type byte that is sold as the 250 KS.
const TYPE_250_KS: u8 = 251;

/// Bank 4100, 44 registers: live charger readings plus identity.
pub(crate) fn decode_charger(
    regs: &RegisterBuffer<'_>,
    snapshot: &mut TelemetrySnapshot,
    latch: &mut MetadataLatch,
) {
    let r = &mut snapshot.readings;
    r.bat_voltage = regs.scaled_float(14, 10.0); // 4115
    r.pv_voltage = regs.scaled_float(15, 10.0); // 4116
    r.bat_current = regs.scaled_float(16, 10.0); // 4117
    r.energy_today = regs.scaled_float(17, 10.0); // 4118
    r.power = regs.scaled_float(18, 1.0); // 4119
    r.charge_state = ChargeState::from(regs.msb_byte(19)); // 4120 MSB
    r.pv_current = regs.scaled_float(20, 10.0); // 4121
    // 4126-4127, tenths of kWh
    #[allow(clippy::cast_precision_loss)]
    let total_energy = regs.u32(25) as f32 / 10.0;
    r.total_energy = total_energy;
    r.info_flags_bits = regs.i32(29); // 4130-4131
    r.bat_temperature = regs.scaled_float(31, 10.0); // 4132
    r.fet_temperature = regs.scaled_float(32, 10.0); // 4133
    r.pcb_temperature = regs.scaled_float(33, 10.0); // 4134
    r.float_time_today_seconds = regs.u16(37); // 4138
    r.absorb_time = regs.u16(38); // 4139
    r.equalize_time = regs.u16(42); // 4143
    r.aux1 = regs.flag(29, 0x4000);
    r.aux2 = regs.flag(29, 0x8000);

    if latch.mark(MetadataBits::IDENTITY) {
        let info = &mut snapshot.info;
        info.model = model_name(regs.lsb_byte(0), regs.msb_byte(0)); // 4101
        info.build_date = build_date(regs.u16(1), regs.msb_byte(2), regs.lsb_byte(2)); // 4102-4103
        info.mac_address = format!(
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            regs.msb_byte(7),
            regs.lsb_byte(7),
            regs.msb_byte(6),
            regs.lsb_byte(6),
            regs.msb_byte(5),
            regs.lsb_byte(5),
        ); // 4106-4108
        info.unit_id = regs.i32(10); // 4111-4112
        info.last_voc = regs.scaled_float(21, 10.0); // 4122
    }
}

/// Bank 4360, 22 registers: Whizbang Jr. shunt readings.
pub(crate) fn decode_whizbang(
    regs: &RegisterBuffer<'_>,
    snapshot: &mut TelemetrySnapshot,
    _latch: &mut MetadataLatch,
) {
    let r = &mut snapshot.readings;
    r.positive_amp_hours = regs.u32(4); // 4365-4366
    r.negative_amp_hours = regs.i32(6).saturating_abs(); // 4367-4368
    r.net_amp_hours = regs.i32(8); // 4369-4370
    r.whizbang_bat_current = regs.scaled_float(10, 10.0); // 4371
    r.shunt_temperature = f32::from(regs.lsb_byte(11)) - 50.0; // 4372 LSB
    r.soc = regs.u16(12); // 4373
    r.remaining_amp_hours = regs.u16(16); // 4377
    r.total_amp_hours = regs.u16(20); // 4381
}

/// Bank 4163, 2 registers: MPPT mode and aux functions.
pub(crate) fn decode_mode(
    regs: &RegisterBuffer<'_>,
    snapshot: &mut TelemetrySnapshot,
    latch: &mut MetadataLatch,
) {
    if !latch.mark(MetadataBits::MODE) {
        return;
    }
    let info = &mut snapshot.info;
    info.mppt_mode = MpptMode::from(regs.u16(0)); // 4164
    info.aux1_function = regs.msb_byte(1) & 0x3F; // 4165 MSB
    info.aux2_function = regs.lsb_byte(1) & 0x3F; // 4165 LSB
    info.has_whizbang = info.aux1_function == AUX_FUNCTION_WHIZBANG;
}

/// Bank 4209, 4 registers: device name.
pub(crate) fn decode_name(
    regs: &RegisterBuffer<'_>,
    snapshot: &mut TelemetrySnapshot,
    latch: &mut MetadataLatch,
) {
    if latch.mark(MetadataBits::NAME) {
        snapshot.info.device_name = regs.packed_pair_string(0); // 4210-4213
    }
}

/// Bank 4243, 32 registers: battery set points.
pub(crate) fn decode_nominal(
    regs: &RegisterBuffer<'_>,
    snapshot: &mut TelemetrySnapshot,
    latch: &mut MetadataLatch,
) {
    if !latch.mark(MetadataBits::NOMINAL) {
        return;
    }
    let info = &mut snapshot.info;
    info.vbatt_reg_set_p_tmp_comp = regs.scaled_float(0, 10.0); // 4244
    info.nominal_battery_voltage = regs.u16(1); // 4245
    info.ending_amps = regs.scaled_float(2, 10.0); // 4246
    info.reason_for_resting = regs.u16(31); // 4275
}

/// Bank 16386, 8 registers: firmware revisions.
pub(crate) fn decode_firmware(
    regs: &RegisterBuffer<'_>,
    snapshot: &mut TelemetrySnapshot,
    latch: &mut MetadataLatch,
) {
    if !latch.mark(MetadataBits::FIRMWARE) {
        return;
    }
    snapshot.info.app_version = regs.u32(0).to_string(); // 16387-16388
    snapshot.info.net_version = regs.u32(2).to_string(); // 16389-16390
}

fn model_name(controller_type: u8, pcb_revision: u8) -> String {
    if controller_type == TYPE_250_KS {
        format!("Classic 250 KS (rev {pcb_revision})")
    } else {
        format!("Classic {controller_type} (rev {pcb_revision})")
    }
}

fn build_date(year: u16, month: u8, day: u8) -> String {
    match NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day)) {
        Some(date) => date.format("%Y%m%d").to_string(),
        None => {
            tracing::warn!(year, month, day, "Controller reported an invalid build date");
            format!("{year}{month:02}{day:02}")
        }
    }
}
