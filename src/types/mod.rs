// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by the decoder, scheduler and payloads.
//!
//! # Types
//!
//! - [`PublishRate`] - Wake publish interval (1000-60000 ms)
//! - [`ChargeState`] - Charge stage code with label
//! - [`MpptMode`] - MPPT mode code with label

mod charge_state;
mod publish_rate;

pub use charge_state::{ChargeState, MpptMode};
pub use publish_rate::PublishRate;
