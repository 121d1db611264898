// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT message bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::protocol::{InboundMessage, MessageBus};
use crate::telemetry::{LWT_OFFLINE, LWT_ONLINE, Topics};

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// MQTT bus backed by a rumqttc client.
///
/// The event loop runs on a background task. On every (re)connect it
/// subscribes to the command topic and publishes `Online` to the retained
/// LWT topic; the broker publishes `Offline` there when the connection drops.
/// Command messages are forwarded to the receiver returned by
/// [`MqttBusBuilder::build`].
///
/// # Examples
///
/// ```ignore
/// use classic_mqtt::protocol::{MessageBus, MqttBus};
/// use classic_mqtt::telemetry::Topics;
///
/// let (mut bus, mut commands) = MqttBus::builder()
///     .broker("mqtt://192.168.1.50:1883")
///     .client_id("classic-240AC4123456")
///     .topics(Topics::new("ClassicMQTT", "classic"))
///     .build()?;
///
/// if bus.is_connected() {
///     bus.publish("ClassicMQTT/classic/stat/readings", "{}", false)?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MqttBus {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttBus {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> MqttBusBuilder {
        MqttBusBuilder::new()
    }

    /// Asks the broker to close the connection. The last will is not sent.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.connected.store(false, Ordering::SeqCst);
        self.client.disconnect().await.map_err(ProtocolError::Mqtt)
    }
}

impl MessageBus for MqttBus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&mut self, topic: &str, payload: &str, retained: bool) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        tracing::debug!(topic = %topic, retained, "Publishing MQTT message");
        self.client
            .try_publish(topic, QoS::AtMostOnce, retained, payload.as_bytes().to_vec())
            .map_err(ProtocolError::Mqtt)
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress("empty host".to_string()));
    }

    Ok((host, port))
}

/// Subscribes to the command topic and publishes `Online` to the LWT topic.
///
/// Runs on the event loop task, so requests are queued without waiting: an
/// awaited request on a full queue would never be drained. Returns `true` if
/// both requests were queued.
fn announce_online(client: &AsyncClient, topics: &Topics) -> bool {
    let subscribed = client
        .try_subscribe(topics.command_filter(), QoS::AtMostOnce)
        .inspect_err(|e| tracing::error!(error = %e, "Failed to subscribe to command topic"))
        .is_ok();
    let announced = client
        .try_publish(topics.lwt(), QoS::AtMostOnce, true, LWT_ONLINE)
        .inspect_err(|e| tracing::error!(error = %e, "Failed to publish LWT"))
        .is_ok();
    subscribed && announced
}

/// Drives the rumqttc event loop until the command receiver is dropped.
async fn handle_mqtt_events(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: Topics,
    connected: Arc<AtomicBool>,
    inbound_tx: mpsc::Sender<InboundMessage>,
) {
    loop {
        if inbound_tx.is_closed() {
            tracing::debug!("Command receiver dropped, stopping MQTT event loop");
            break;
        }
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::info!(?connack, "MQTT connected");
                connected.store(true, Ordering::SeqCst);
                announce_online(&client, &topics);
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if !topics.is_command(&publish.topic) {
                    continue;
                }
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "Received MQTT command"
                );
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if inbound_tx.send(message).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::SeqCst) {
                    tracing::warn!(error = %e, "MQTT connection lost");
                } else {
                    tracing::debug!(error = %e, "MQTT connection attempt failed");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Builder for an [`MqttBus`].
#[derive(Debug, Default)]
pub struct MqttBusBuilder {
    broker: Option<String>,
    topics: Option<Topics>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    keep_alive: Option<Duration>,
}

impl MqttBusBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the MQTT broker URL, e.g. `mqtt://192.168.1.50:1883`.
    #[must_use]
    pub fn broker(mut self, broker: impl Into<String>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    /// Sets the topics used for the last will and command subscription.
    #[must_use]
    pub fn topics(mut self, topics: Topics) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Sets authentication credentials. An empty user name means anonymous.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the client ID.
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = Some(duration);
        self
    }

    /// Creates the client and spawns its event loop.
    ///
    /// Must be called from within a Tokio runtime. The connection is made in
    /// the background; [`MessageBus::is_connected`] turns true once the
    /// broker acknowledges it.
    ///
    /// # Errors
    ///
    /// Returns error if the broker, client id or topics are missing, or the
    /// broker URL is invalid.
    pub fn build(self) -> Result<(MqttBus, mpsc::Receiver<InboundMessage>), ProtocolError> {
        let broker = self
            .broker
            .ok_or_else(|| ProtocolError::InvalidAddress("broker is required".to_string()))?;
        let client_id = self
            .client_id
            .ok_or_else(|| ProtocolError::InvalidAddress("client_id is required".to_string()))?;
        let topics = self
            .topics
            .ok_or_else(|| ProtocolError::InvalidAddress("topics are required".to_string()))?;

        let (host, port) = parse_mqtt_url(&broker)?;

        let mut mqtt_options = MqttOptions::new(client_id, host, port);
        mqtt_options.set_keep_alive(self.keep_alive.unwrap_or(Duration::from_secs(30)));
        mqtt_options.set_clean_session(true);
        mqtt_options.set_last_will(LastWill::new(
            topics.lwt(),
            LWT_OFFLINE,
            QoS::AtMostOnce,
            true,
        ));

        if let (Some(username), Some(password)) = (self.username, self.password)
            && !username.is_empty()
        {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let connected = Arc::new(AtomicBool::new(false));
        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(10);

        tokio::spawn(handle_mqtt_events(
            event_loop,
            client.clone(),
            topics,
            Arc::clone(&connected),
            inbound_tx,
        ));

        Ok((MqttBus { client, connected }, inbound_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mqtt_url_with_port() {
        let (host, port) = parse_mqtt_url("mqtt://192.168.1.50:1883").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_default_port() {
        let (host, port) = parse_mqtt_url("192.168.1.50").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_tcp_scheme() {
        let (host, port) = parse_mqtt_url("tcp://broker.local:8883").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 8883);
    }

    #[test]
    fn parse_mqtt_url_rejects_bad_input() {
        assert!(parse_mqtt_url("broker:notaport").is_err());
        assert!(parse_mqtt_url("mqtt://:1883").is_err());
    }

    #[test]
    fn build_requires_fields() {
        let err = MqttBusBuilder::new().build().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));

        let err = MqttBus::builder()
            .broker("localhost")
            .client_id("classic-test")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("topics"));
    }

    #[tokio::test]
    async fn announce_queues_subscribe_and_online() {
        let options = MqttOptions::new("classic-test", "127.0.0.1", 1);
        let (client, _event_loop) = AsyncClient::new(options, 10);
        assert!(announce_online(&client, &Topics::new("ClassicMQTT", "classic")));
    }

    #[tokio::test]
    async fn announce_returns_when_request_queue_is_full() {
        let options = MqttOptions::new("classic-test", "127.0.0.1", 1);
        let (client, _event_loop) = AsyncClient::new(options, 1);
        client
            .try_publish("ClassicMQTT/classic/stat/readings", QoS::AtMostOnce, false, "{}")
            .unwrap();

        // Nothing drains the queue here, so waiting on it would hang.
        assert!(!announce_online(&client, &Topics::new("ClassicMQTT", "classic")));
    }

    #[tokio::test]
    async fn not_connected_until_connack() {
        let (mut bus, _commands) = MqttBus::builder()
            .broker("127.0.0.1:1")
            .client_id("classic-test")
            .topics(Topics::new("ClassicMQTT", "classic"))
            .build()
            .unwrap();
        assert!(!bus.is_connected());
        assert!(matches!(
            bus.publish("ClassicMQTT/classic/stat/readings", "{}", false),
            Err(ProtocolError::NotConnected)
        ));
    }
}
