// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON payloads published on `stat/info` and `stat/readings`.
//!
//! Most float fields carry a `+0.01` bias added at serialization time. Some
//! existing consumers mis-parse floats with no fractional digits, and they
//! expect the bias; `VbattRegSetPTmpComp` has never carried it.

use serde::Serialize;

use crate::state::TelemetrySnapshot;

const FLOAT_BIAS: f64 = 0.01;

fn biased(value: f32) -> f64 {
    f64::from(value) + FLOAT_BIAS
}

/// One-time device information.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPayload {
    /// Application firmware revision.
    pub app_version: String,
    /// Build date, `YYYYMMDD`.
    pub build_date: String,
    /// Device name.
    pub device_name: String,
    /// Always `Classic`.
    pub device_type: &'static str,
    /// End-of-absorb current, biased.
    pub ending_amps: f64,
    /// Whizbang Jr. present.
    pub has_whizbang: bool,
    /// Last sweep open-circuit voltage, biased.
    #[serde(rename = "lastVOC")]
    pub last_voc: f64,
    /// Model string.
    pub model: String,
    /// MPPT mode code.
    pub mppt_mode: u16,
    /// MPPT mode label.
    pub mppt_mode_text: &'static str,
    /// Network firmware revision.
    pub net_version: String,
    /// Nominal battery voltage.
    pub nominal_battery_voltage: u16,
    /// Unit id.
    #[serde(rename = "unitID")]
    pub unit_id: i32,
    /// MAC address.
    pub mac_address: String,
}

impl InfoPayload {
    /// Builds the payload from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        let info = &snapshot.info;
        Self {
            app_version: info.app_version.clone(),
            build_date: info.build_date.clone(),
            device_name: info.device_name.clone(),
            device_type: "Classic",
            ending_amps: biased(info.ending_amps),
            has_whizbang: info.has_whizbang,
            last_voc: biased(info.last_voc),
            model: info.model.clone(),
            mppt_mode: info.mppt_mode.code(),
            mppt_mode_text: info.mppt_mode.as_str(),
            net_version: info.net_version.clone(),
            nominal_battery_voltage: info.nominal_battery_voltage,
            unit_id: info.unit_id,
            mac_address: info.mac_address.clone(),
        }
    }
}

/// Live readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadingsPayload {
    pub bat_temperature: f64,
    pub net_amp_hours: i32,
    pub charge_state: u8,
    pub charge_state_text: &'static str,
    pub info_flags_bits: i32,
    pub reason_for_resting: u16,
    pub negative_amp_hours: i32,
    pub bat_voltage: f64,
    #[serde(rename = "PVVoltage")]
    pub pv_voltage: f64,
    pub vbatt_reg_set_p_tmp_comp: f64,
    pub total_amp_hours: u16,
    pub whizbang_bat_current: f64,
    pub bat_current: f64,
    #[serde(rename = "PVCurrent")]
    pub pv_current: f64,
    pub connection_state: u8,
    pub energy_today: f64,
    pub equalize_time: u16,
    #[serde(rename = "SOC")]
    pub soc: u16,
    pub aux1: bool,
    pub aux2: bool,
    pub power: f64,
    #[serde(rename = "FETTemperature")]
    pub fet_temperature: f64,
    pub positive_amp_hours: u32,
    pub total_energy: f64,
    pub float_time_today_seconds: u16,
    pub remaining_amp_hours: u16,
    pub absorb_time: u16,
    pub shunt_temperature: f64,
    #[serde(rename = "PCBTemperature")]
    pub pcb_temperature: f64,
}

impl ReadingsPayload {
    /// Builds the payload from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        let r = &snapshot.readings;
        let info = &snapshot.info;
        Self {
            bat_temperature: biased(r.bat_temperature),
            net_amp_hours: r.net_amp_hours,
            charge_state: r.charge_state.code(),
            charge_state_text: r.charge_state.as_str(),
            info_flags_bits: r.info_flags_bits,
            reason_for_resting: info.reason_for_resting,
            negative_amp_hours: r.negative_amp_hours,
            bat_voltage: biased(r.bat_voltage),
            pv_voltage: biased(r.pv_voltage),
            vbatt_reg_set_p_tmp_comp: f64::from(info.vbatt_reg_set_p_tmp_comp),
            total_amp_hours: r.total_amp_hours,
            whizbang_bat_current: biased(r.whizbang_bat_current),
            bat_current: biased(r.bat_current),
            pv_current: biased(r.pv_current),
            connection_state: 0,
            energy_today: biased(r.energy_today),
            equalize_time: r.equalize_time,
            soc: r.soc,
            aux1: r.aux1,
            aux2: r.aux2,
            power: biased(r.power),
            fet_temperature: biased(r.fet_temperature),
            positive_amp_hours: r.positive_amp_hours,
            total_energy: biased(r.total_energy),
            float_time_today_seconds: r.float_time_today_seconds,
            remaining_amp_hours: r.remaining_amp_hours,
            absorb_time: r.absorb_time,
            shunt_temperature: biased(r.shunt_temperature),
            pcb_temperature: biased(r.pcb_temperature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChargeState, MpptMode};

    fn snapshot() -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.info.device_name = "CLASSIC1".to_string();
        snapshot.info.model = "Classic 150 (rev 4)".to_string();
        snapshot.info.unit_id = 1234;
        snapshot.info.mppt_mode = MpptMode::Hydro;
        snapshot.info.ending_amps = 4.0;
        snapshot.info.vbatt_reg_set_p_tmp_comp = 28.5;
        snapshot.readings.bat_voltage = 26.5;
        snapshot.readings.charge_state = ChargeState::Float;
        snapshot.readings.soc = 97;
        snapshot
    }

    #[test]
    fn info_keys_and_bias() {
        let json = serde_json::to_value(InfoPayload::from_snapshot(&snapshot())).unwrap();
        assert_eq!(json["deviceName"], "CLASSIC1");
        assert_eq!(json["deviceType"], "Classic");
        assert_eq!(json["unitID"], 1234);
        assert_eq!(json["mpptMode"], 13);
        assert_eq!(json["mpptModeText"], "HYDRO");
        let ending = json["endingAmps"].as_f64().unwrap();
        assert!((ending - 4.01).abs() < 1e-4);
        assert!(json.get("lastVOC").is_some());
    }

    #[test]
    fn readings_keys_and_bias() {
        let payload = ReadingsPayload::from_snapshot(&snapshot());
        assert_eq!(payload.bat_voltage, 26.5 + 0.01);
        assert_eq!(payload.vbatt_reg_set_p_tmp_comp, 28.5);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["ChargeState"], 5);
        assert_eq!(json["ChargeStateText"], "Float");
        assert_eq!(json["SOC"], 97);
        assert_eq!(json["ConnectionState"], 0);
        assert!(json.get("PVVoltage").is_some());
        assert!(json.get("FETTemperature").is_some());
        assert!(json.get("PCBTemperature").is_some());
        assert!(json.get("VbattRegSetPTmpComp").is_some());
    }

    #[test]
    fn bias_is_added_in_double_precision() {
        let mut snapshot = snapshot();
        snapshot.readings.bat_voltage = 13.7;
        snapshot.readings.total_energy = 12_345.6;
        let payload = ReadingsPayload::from_snapshot(&snapshot);
        assert_eq!(payload.bat_voltage, f64::from(13.7_f32) + 0.01);
        assert_eq!(payload.total_energy, f64::from(12_345.6_f32) + 0.01);
        assert_ne!(payload.total_energy, f64::from(12_345.6_f32 + 0.01_f32));
    }

    #[test]
    fn readings_zero_values_carry_fraction() {
        let text = serde_json::to_string(&ReadingsPayload::from_snapshot(
            &TelemetrySnapshot::new(),
        ))
        .unwrap();
        assert!(text.contains(r#""BatVoltage":0.01"#));
        assert!(text.starts_with(r#"{"BatTemperature":"#));
    }
}
