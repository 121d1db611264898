// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collaborators on both sides of the bridge.
//!
//! - [`MessageBus`]: where telemetry goes. [`MqttBus`] implements it with
//!   rumqttc.
//! - [`FieldTransport`](crate::poller::FieldTransport): where registers come
//!   from. [`ModbusTransport`] implements it with tokio-modbus.
//!
//! Both adapters run their I/O on background tasks and hand results back to
//! the main loop over channels, so the engine only ever sees non-blocking
//! calls and owned events.

#[cfg(feature = "modbus")]
mod modbus;
#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "modbus")]
pub use modbus::ModbusTransport;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBus, MqttBusBuilder};

use crate::error::ProtocolError;

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload.
    pub payload: Vec<u8>,
}

/// Message bus consumed by the engine.
pub trait MessageBus {
    /// Returns true while connected to the broker.
    fn is_connected(&self) -> bool;

    /// Queues a message for publishing without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message could not be queued.
    fn publish(&mut self, topic: &str, payload: &str, retained: bool) -> Result<(), ProtocolError>;
}
