// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `classic-mqtt` - bridge a Midnite Classic to an MQTT broker.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use classic_mqtt::bank::BankTable;
use classic_mqtt::config::{ConfigStore, FileStorage, HardwareAddress};
use classic_mqtt::engine::{DEFAULT_WATCHDOG_TIMEOUT, Engine, EngineConfig};
use classic_mqtt::protocol::{MessageBus, ModbusTransport, MqttBus};
use classic_mqtt::telemetry::{DEFAULT_DEVICE_NAME, LWT_OFFLINE};
use classic_mqtt::watchdog::HeartbeatWatchdog;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main loop cadence. Poll and publish deadlines are checked this often.
const LOOP_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "classic-mqtt")]
#[command(about = "Publish Midnite Classic telemetry to MQTT", version)]
struct Args {
    /// Path of the persisted configuration blob
    #[arg(long, default_value = "classic_mqtt.cfg")]
    config: PathBuf,

    /// Hardware address used to derive the default client id
    #[arg(long, default_value = "00:00:00:00:00:00")]
    hardware_address: HardwareAddress,

    /// Device segment of the MQTT topics
    #[arg(long, default_value = DEFAULT_DEVICE_NAME)]
    device_name: String,

    /// Modbus unit id of the controller
    #[arg(long, default_value = "10")]
    unit_id: u8,

    /// Seconds without a decoded response before exiting
    #[arg(long, default_value_t = DEFAULT_WATCHDOG_TIMEOUT.as_secs())]
    watchdog_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log: String,

    /// Controller host (saved to the configuration)
    #[arg(long)]
    classic_host: Option<String>,

    /// Controller Modbus port (saved to the configuration)
    #[arg(long)]
    classic_port: Option<u16>,

    /// MQTT broker host (saved to the configuration)
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port (saved to the configuration)
    #[arg(long)]
    mqtt_port: Option<u16>,

    /// MQTT user (saved to the configuration)
    #[arg(long)]
    mqtt_user: Option<String>,

    /// MQTT password (saved to the configuration)
    #[arg(long)]
    mqtt_password: Option<String>,

    /// MQTT root topic (saved to the configuration)
    #[arg(long)]
    mqtt_root_topic: Option<String>,
}

impl Args {
    fn has_overrides(&self) -> bool {
        self.classic_host.is_some()
            || self.classic_port.is_some()
            || self.mqtt_host.is_some()
            || self.mqtt_port.is_some()
            || self.mqtt_user.is_some()
            || self.mqtt_password.is_some()
            || self.mqtt_root_topic.is_some()
    }
}

fn setup_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(args: &Args) -> ConfigStore<FileStorage> {
    let mut store = ConfigStore::new(FileStorage::new(&args.config), args.hardware_address);
    store.init();
    store.load();

    if args.has_overrides() {
        let settings = store.settings_mut();
        if let Some(host) = &args.classic_host {
            settings.transport_host.clone_from(host);
        }
        if let Some(port) = args.classic_port {
            settings.transport_port = port;
        }
        if let Some(host) = &args.mqtt_host {
            settings.bus_host.clone_from(host);
        }
        if let Some(port) = args.mqtt_port {
            settings.bus_port = port;
        }
        if let Some(user) = &args.mqtt_user {
            settings.bus_user.clone_from(user);
        }
        if let Some(password) = &args.mqtt_password {
            settings.bus_password.clone_from(password);
        }
        if let Some(root) = &args.mqtt_root_topic {
            settings.bus_root_topic.clone_from(root);
        }
        if let Err(e) = store.save() {
            error!("Failed to save configuration: {e}");
        }
    }

    if store.is_default() {
        warn!(path = %args.config.display(), "Running with default configuration");
    }
    store
}

#[tokio::main]
async fn main() -> classic_mqtt::Result<ExitCode> {
    let args = Args::parse();
    setup_tracing(&args.log);

    info!("classic-mqtt starting");
    let store = load_config(&args);
    let settings = store.settings().clone();

    let config = EngineConfig {
        root_topic: settings.bus_root_topic.clone(),
        device_name: args.device_name.clone(),
        watchdog_timeout: Duration::from_secs(args.watchdog_secs),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, BankTable::classic(), HeartbeatWatchdog::new(), 0)?;

    let (mut bus, mut commands) = MqttBus::builder()
        .broker(format!("{}:{}", settings.bus_host, settings.bus_port))
        .client_id(settings.bus_client_id.clone())
        .credentials(settings.bus_user.clone(), settings.bus_password.clone())
        .topics(engine.topics().clone())
        .build()?;
    info!(
        broker = %settings.bus_host,
        port = settings.bus_port,
        client_id = %settings.bus_client_id,
        "MQTT client started"
    );

    let (events_tx, mut events) = mpsc::channel(16);
    let mut transport = ModbusTransport::connect(
        &settings.transport_host,
        settings.transport_port,
        args.unit_id,
        events_tx,
    )
    .await?;

    let start = tokio::time::Instant::now();
    let mut interval = tokio::time::interval(LOOP_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let exit = loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                engine.tick(now, &mut transport, &mut bus);
                if engine.watchdog().is_expired() {
                    error!(
                        timeout_secs = args.watchdog_secs,
                        "No register data decoded within the watchdog timeout, exiting"
                    );
                    break ExitCode::FAILURE;
                }
            }
            Some(event) = events.recv() => engine.on_transport_event(event),
            Some(message) = commands.recv() => {
                engine.on_message(&message.topic, &message.payload);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break ExitCode::SUCCESS;
            }
        }
    };

    if bus.is_connected() {
        if let Err(e) = bus.publish(engine.topics().lwt(), LWT_OFFLINE, true) {
            warn!("Failed to publish LWT: {e}");
        }
        if let Err(e) = bus.disconnect().await {
            warn!("Failed to disconnect: {e}");
        }
    }
    Ok(exit)
}
