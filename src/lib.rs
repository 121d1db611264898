// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `classic_mqtt` - Telemetry bridge for Midnite Classic charge controllers.
//!
//! The bridge polls the controller's holding registers over Modbus TCP,
//! decodes them into typed readings and publishes JSON to an MQTT broker at
//! an adaptive rate.
//!
//! # Features
//!
//! - **Register decoding**: big-endian words, low-word-first 32-bit values,
//!   byte-swapped name strings
//! - **Bank polling**: one bank per tick, responses routed by register count
//! - **One-time metadata**: identity, mode, name, set points and firmware are
//!   decoded once per session and published once on `stat/info`
//! - **Adaptive publishing**: bursts at the wake rate after a wake request,
//!   then snoozes; `stayAwake` and `wakePublishRate` commands adjust it
//! - **Persistent settings**: fixed-layout, versioned blob with automatic
//!   reset to defaults
//!
//! # Cargo features
//!
//! - `mqtt` (default): [`protocol::MqttBus`] over rumqttc
//! - `modbus` (default): [`protocol::ModbusTransport`] over tokio-modbus
//!
//! # Quick Start
//!
//! ```no_run
//! use classic_mqtt::bank::BankTable;
//! use classic_mqtt::engine::{Engine, EngineConfig};
//! use classic_mqtt::protocol::{ModbusTransport, MqttBus};
//! use classic_mqtt::watchdog::HeartbeatWatchdog;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> classic_mqtt::Result<()> {
//!     let config = EngineConfig::default();
//!     let mut engine = Engine::new(config, BankTable::classic(), HeartbeatWatchdog::new(), 0)?;
//!
//!     let (mut bus, mut commands) = MqttBus::builder()
//!         .broker("mqtt://127.0.0.1:1883")
//!         .client_id("classic-example")
//!         .topics(engine.topics().clone())
//!         .build()?;
//!
//!     let (events_tx, mut events) = mpsc::channel(16);
//!     let mut transport = ModbusTransport::connect("192.168.1.40", 502, 10, events_tx).await?;
//!
//!     let start = tokio::time::Instant::now();
//!     let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));
//!     loop {
//!         tokio::select! {
//!             _ = interval.tick() => {
//!                 let now = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
//!                 engine.tick(now, &mut transport, &mut bus);
//!             }
//!             Some(event) = events.recv() => engine.on_transport_event(event),
//!             Some(message) = commands.recv() => engine.on_message(&message.topic, &message.payload),
//!         }
//!     }
//! }
//! ```

pub mod bank;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod register;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod watchdog;

pub use bank::{BankTable, RegisterBank};
pub use command::{CommandSettings, RemoteCommand};
pub use config::{ConfigStore, HardwareAddress, PersistedConfig};
pub use engine::{Engine, EngineConfig};
pub use error::{
    ConfigError, Error, ParseError, ProtocolError, Result, StorageError, TableError, ValueError,
};
pub use poller::{FieldTransport, RegisterPoller, TransportEvent};
pub use protocol::{InboundMessage, MessageBus};
pub use register::RegisterBuffer;
pub use scheduler::{PublishMode, PublishScheduler, SchedulerConfig};
pub use state::{MetadataBits, MetadataLatch, TelemetrySnapshot};
pub use telemetry::{InfoPayload, ReadingsPayload, Topics};
pub use types::{ChargeState, MpptMode, PublishRate};
pub use watchdog::{HeartbeatWatchdog, Watchdog};
