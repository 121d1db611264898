// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Modbus TCP field transport.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use crate::error::ProtocolError;
use crate::poller::{FieldTransport, TransportEvent};

/// Transport error code reported when a request times out.
const CODE_TIMEOUT: u8 = 0xE0;
/// Transport error code reported for connection and framing failures.
const CODE_COMM_ERROR: u8 = 0xE4;

/// Requests that may wait for the connection task.
const QUEUE_DEPTH: usize = 4;

/// Timeout applied to a single read.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Reads holding registers from the controller over Modbus TCP.
///
/// [`request_read`](FieldTransport::request_read) only queues the request;
/// a background task performs it and reports a [`TransportEvent`] on the
/// channel given to [`connect`](Self::connect). A failed connection is
/// re-established on the next request.
#[derive(Debug, Clone)]
pub struct ModbusTransport {
    requests: mpsc::Sender<(u16, u16)>,
}

impl ModbusTransport {
    /// Resolves `host:port`, connects to unit `unit_id` and spawns the
    /// request task.
    ///
    /// # Errors
    ///
    /// Returns error if the host cannot be resolved. A failed TCP connect is
    /// not an error here; it is retried on the first request.
    pub async fn connect(
        host: &str,
        port: u16,
        unit_id: u8,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, ProtocolError> {
        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ProtocolError::InvalidAddress(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| ProtocolError::InvalidAddress(format!("{host}:{port}: no address")))?;

        let ctx = match tcp::connect_slave(addr, Slave(unit_id)).await {
            Ok(ctx) => {
                tracing::info!(%addr, unit_id, "Modbus connected");
                Some(ctx)
            }
            Err(e) => {
                tracing::warn!(%addr, error = %e, "Modbus connect failed, will retry");
                None
            }
        };

        let (requests, request_rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run_requests(addr, Slave(unit_id), ctx, request_rx, events));
        Ok(Self { requests })
    }
}

impl FieldTransport for ModbusTransport {
    fn request_read(&mut self, address: u16, register_count: u16) -> bool {
        self.requests.try_send((address, register_count)).is_ok()
    }
}

async fn run_requests(
    addr: SocketAddr,
    slave: Slave,
    mut ctx: Option<Context>,
    mut request_rx: mpsc::Receiver<(u16, u16)>,
    events: mpsc::Sender<TransportEvent>,
) {
    while let Some((address, register_count)) = request_rx.recv().await {
        if ctx.is_none() {
            match tcp::connect_slave(addr, slave).await {
                Ok(connected) => {
                    tracing::info!(%addr, "Modbus reconnected");
                    ctx = Some(connected);
                }
                Err(e) => {
                    let event = TransportEvent::Error {
                        code: CODE_COMM_ERROR,
                        context: format!("connect {addr}: {e}"),
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }
        let Some(client) = ctx.as_mut() else {
            continue;
        };

        let result = tokio::time::timeout(
            REQUEST_TIMEOUT,
            client.read_holding_registers(address, register_count),
        )
        .await;

        let event = match result {
            Ok(Ok(Ok(words))) => TransportEvent::Data {
                register_count: u16::try_from(words.len()).unwrap_or(u16::MAX),
                buffer: words.iter().flat_map(|w| w.to_be_bytes()).collect(),
            },
            Ok(Ok(Err(exception))) => TransportEvent::Error {
                code: u8::from(exception),
                context: format!("read {address}x{register_count}"),
            },
            Ok(Err(e)) => {
                ctx = None;
                TransportEvent::Error {
                    code: CODE_COMM_ERROR,
                    context: format!("read {address}x{register_count}: {e}"),
                }
            }
            Err(_) => {
                ctx = None;
                TransportEvent::Error {
                    code: CODE_TIMEOUT,
                    context: format!("read {address}x{register_count}"),
                }
            }
        };

        if events.send(event).await.is_err() {
            break;
        }
    }
    tracing::debug!("Modbus request task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_rejects_requests() {
        let (requests, _request_rx) = mpsc::channel(1);
        let mut transport = ModbusTransport { requests };
        assert!(transport.request_read(4100, 44));
        assert!(!transport.request_read(4360, 22));
    }

    #[tokio::test]
    async fn closed_task_rejects_requests() {
        let (requests, request_rx) = mpsc::channel(1);
        drop(request_rx);
        let mut transport = ModbusTransport { requests };
        assert!(!transport.request_read(4100, 44));
    }

    #[tokio::test]
    async fn unreachable_controller_reports_comm_error() {
        let (events_tx, mut events_rx) = mpsc::channel(4);
        // Port 1 on localhost refuses connections.
        let mut transport = ModbusTransport::connect("127.0.0.1", 1, 10, events_tx)
            .await
            .unwrap();
        assert!(transport.request_read(4100, 44));
        let event = events_rx.recv().await.unwrap();
        assert!(matches!(
            event,
            TransportEvent::Error {
                code: CODE_COMM_ERROR,
                ..
            }
        ));
    }
}
