// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The telemetry engine.
//!
//! [`Engine`] owns all mutable state of the bridge: the poller and its bank
//! table, the decoded snapshot, the metadata latch and the publish scheduler.
//! It is driven from a single loop:
//!
//! 1. [`Engine::tick`] at a steady cadence, which polls and publishes when due;
//! 2. [`Engine::on_transport_event`] for every response or error from the transport;
//! 3. [`Engine::on_message`] for every command from the bus.
//!
//! Nothing happens while the bus is disconnected.

use std::time::Duration;

use crate::bank::BankTable;
use crate::command::RemoteCommand;
use crate::config::DEFAULT_ROOT_TOPIC;
use crate::error::TableError;
use crate::poller::{DEFAULT_REARM, FieldTransport, RegisterPoller, TransportEvent};
use crate::protocol::MessageBus;
use crate::scheduler::{PublishScheduler, SchedulerConfig};
use crate::state::{MetadataLatch, TelemetrySnapshot};
use crate::telemetry::{DEFAULT_DEVICE_NAME, InfoPayload, ReadingsPayload, Topics};
use crate::watchdog::Watchdog;

/// Default stall timeout.
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(300);

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Scheduler tunables.
    pub scheduler: SchedulerConfig,
    /// Bank indices re-read after every poll cycle.
    pub rearm: Vec<usize>,
    /// Topic root.
    pub root_topic: String,
    /// Device segment of the topics.
    pub device_name: String,
    /// Time without a decoded response before the watchdog expires.
    pub watchdog_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            rearm: DEFAULT_REARM.to_vec(),
            root_topic: DEFAULT_ROOT_TOPIC.to_string(),
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
        }
    }
}

/// Owned context of the bridge.
///
/// # Examples
///
/// ```
/// use classic_mqtt::bank::BankTable;
/// use classic_mqtt::engine::{Engine, EngineConfig};
/// use classic_mqtt::watchdog::HeartbeatWatchdog;
///
/// let engine = Engine::new(
///     EngineConfig::default(),
///     BankTable::classic(),
///     HeartbeatWatchdog::new(),
///     0,
/// )
/// .unwrap();
/// assert_eq!(engine.topics().readings(), "ClassicMQTT/classic/stat/readings");
/// ```
#[derive(Debug)]
pub struct Engine<W> {
    poller: RegisterPoller,
    snapshot: TelemetrySnapshot,
    latch: MetadataLatch,
    scheduler: PublishScheduler,
    topics: Topics,
    watchdog: W,
}

impl<W: Watchdog> Engine<W> {
    /// Builds an engine at time `now_ms` and arms the watchdog.
    ///
    /// The latch requires every one-time bank present in `table`.
    ///
    /// # Errors
    ///
    /// Returns `TableError::RearmOutOfRange` if the rearm set does not fit
    /// the table.
    pub fn new(
        config: EngineConfig,
        table: BankTable,
        mut watchdog: W,
        now_ms: u64,
    ) -> Result<Self, TableError> {
        let latch = MetadataLatch::new(table.metadata());
        let poller = RegisterPoller::new(table, config.rearm)?;
        watchdog.arm(config.watchdog_timeout);
        Ok(Self {
            poller,
            snapshot: TelemetrySnapshot::new(),
            latch,
            scheduler: PublishScheduler::new(config.scheduler, now_ms),
            topics: Topics::new(&config.root_topic, &config.device_name),
            watchdog,
        })
    }

    /// Runs one iteration: polls the next bank and publishes if either is
    /// due. Does nothing while the bus is disconnected.
    pub fn tick<T, B>(&mut self, now_ms: u64, transport: &mut T, bus: &mut B)
    where
        T: FieldTransport + ?Sized,
        B: MessageBus + ?Sized,
    {
        if !bus.is_connected() {
            return;
        }
        if self.scheduler.poll_due(now_ms) {
            self.poller.tick(transport);
        }
        if self.scheduler.on_tick(now_ms) {
            self.publish(bus);
        }
    }

    /// Handles a transport completion.
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Data {
                register_count,
                buffer,
            } => self.on_data(register_count, &buffer),
            TransportEvent::Error { code, context } => self.on_error(code, &context),
        }
    }

    /// Decodes a response and feeds the watchdog if it matched a bank.
    pub fn on_data(&mut self, register_count: u16, buffer: &[u8]) {
        if self
            .poller
            .on_response(register_count, buffer, &mut self.snapshot, &mut self.latch)
        {
            self.watchdog.feed();
        }
    }

    /// Logs a transport error.
    pub fn on_error(&mut self, code: u8, context: &str) {
        self.poller.on_error(code, context);
    }

    /// Handles a message from the bus.
    ///
    /// Messages outside the command topic and malformed payloads are logged
    /// and ignored.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) {
        if !self.topics.is_command(topic) {
            tracing::debug!(topic = %topic, "Ignoring message outside command topic");
            return;
        }
        match RemoteCommand::parse(payload) {
            Ok(RemoteCommand::Wake) => {
                tracing::info!("Wake requested");
                self.wake();
            }
            Ok(RemoteCommand::Info) => {
                tracing::info!("Info requested");
                self.wake();
            }
            Ok(RemoteCommand::Settings(settings)) => {
                if let Some(stay_awake) = settings.stay_awake {
                    tracing::info!(stay_awake, "Stay awake changed");
                    self.scheduler.set_stay_awake(stay_awake);
                }
                if let Some(rate) = settings.wake_publish_rate
                    && self.scheduler.set_wake_rate(rate).is_ok()
                {
                    tracing::info!(wake_publish_rate_ms = rate, "Wake publish rate changed");
                }
                if settings.is_recognized() {
                    self.wake();
                } else {
                    tracing::debug!(topic = %topic, "Command has no recognised keys");
                }
            }
            Err(e) => {
                tracing::warn!(topic = %topic, "Ignoring malformed command: {e}");
            }
        }
    }

    /// Switches to the wake rate and lets the info block publish again.
    pub fn wake(&mut self) {
        self.scheduler.wake();
        self.latch.rearm_info();
    }

    /// Returns the decoded snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// Returns the metadata latch.
    #[must_use]
    pub fn latch(&self) -> &MetadataLatch {
        &self.latch
    }

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &PublishScheduler {
        &self.scheduler
    }

    /// Returns the poller.
    #[must_use]
    pub fn poller(&self) -> &RegisterPoller {
        &self.poller
    }

    /// Returns the topics.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Returns the watchdog.
    #[must_use]
    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }

    fn publish<B: MessageBus + ?Sized>(&mut self, bus: &mut B) {
        if self.latch.is_info_pending() {
            match serde_json::to_string(&InfoPayload::from_snapshot(&self.snapshot)) {
                Ok(json) => match bus.publish(self.topics.info(), &json, false) {
                    Ok(()) => {
                        self.latch.info_due();
                        tracing::info!("Published device info");
                    }
                    Err(e) => tracing::error!("Failed to publish info: {e}"),
                },
                Err(e) => tracing::error!("Failed to serialize info: {e}"),
            }
        }

        match serde_json::to_string(&ReadingsPayload::from_snapshot(&self.snapshot)) {
            Ok(json) => {
                if let Err(e) = bus.publish(self.topics.readings(), &json, false) {
                    tracing::error!("Failed to publish readings: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to serialize readings: {e}"),
        }
    }
}
