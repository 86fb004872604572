//! Response Router
//!
//! The only reader of the session socket. Replies carry no correlation id,
//! so classification rests on outstanding-request bookkeeping: while a
//! battery query is outstanding, the next decodable reply is taken as its
//! answer. Everything else is a generic log line.
//!
//! Routed replies fan out as [`TelemetryEvent`]s on a broadcast channel; the
//! latest battery reading is also kept in a watch channel for readers that
//! only want the current value.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{error, info, warn};

use crate::transport::{ReceiveError, Transport};

/// Telemetry broadcast capacity
pub const TELEMETRY_CHANNEL_CAPACITY: usize = 256;

/// Routed reply events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// Generic acknowledgement or log line (`ok`, `error`, ...)
    Reply { text: String, timestamp: i64 },
    /// Answer to an outstanding battery query
    Battery { percent: String, timestamp: i64 },
    /// Payload that was not valid UTF-8
    Discarded { bytes: usize, timestamp: i64 },
}

/// Battery query answer, as received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub raw: String,
    pub received_at: DateTime<Utc>,
}

impl BatteryReading {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            received_at: Utc::now(),
        }
    }

    /// Numeric percentage, when the reply is a bare integer
    pub fn percent(&self) -> Option<u8> {
        self.raw.parse().ok()
    }
}

impl std::fmt::Display for BatteryReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Battery: {}%", self.raw)
    }
}

/// Single-slot marker for an outstanding battery query.
///
/// There is no timeout: a query that is never answered stays outstanding
/// and absorbs the next unrelated reply.
#[derive(Debug)]
pub struct BatteryQuery {
    waiter: Mutex<Option<oneshot::Sender<BatteryReading>>>,
    latest: watch::Sender<Option<BatteryReading>>,
}

impl BatteryQuery {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            waiter: Mutex::new(None),
            latest,
        }
    }

    /// Mark a query outstanding.
    ///
    /// A newer registration replaces an older one; the older waiter then
    /// sees its channel closed.
    pub fn register(&self) -> oneshot::Receiver<BatteryReading> {
        let (tx, rx) = oneshot::channel();
        let previous = self
            .waiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);
        if previous.is_some() {
            warn!("Battery query already outstanding, replacing waiter");
        }
        rx
    }

    /// Drop the outstanding marker without an answer
    pub fn cancel(&self) -> bool {
        self.waiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_outstanding(&self) -> bool {
        self.waiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Consume the outstanding marker, if any, with this reply
    fn fulfill(&self, text: &str) -> Option<BatteryReading> {
        let waiter = self
            .waiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        let reading = BatteryReading::new(text);
        self.latest.send_replace(Some(reading.clone()));
        // Waiter may have gone away; the reading is still published
        let _ = waiter.send(reading.clone());
        Some(reading)
    }

    pub fn latest(&self) -> Option<BatteryReading> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<BatteryReading>> {
        self.latest.subscribe()
    }
}

impl Default for BatteryQuery {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ResponseRouter {
    transport: Arc<Transport>,
    battery: Arc<BatteryQuery>,
    telemetry: broadcast::Sender<TelemetryEvent>,
    max_bytes: usize,
}

impl ResponseRouter {
    pub fn new(
        transport: Arc<Transport>,
        battery: Arc<BatteryQuery>,
        telemetry: broadcast::Sender<TelemetryEvent>,
        max_bytes: usize,
    ) -> Self {
        Self {
            transport,
            battery,
            telemetry,
            max_bytes,
        }
    }

    /// Classify and publish one reply payload
    pub fn route(&self, payload: &[u8]) -> TelemetryEvent {
        let timestamp = Utc::now().timestamp_millis();

        let event = match std::str::from_utf8(payload) {
            Ok(text) => {
                let text = text.trim_end();
                match self.battery.fulfill(text) {
                    Some(reading) => {
                        info!("{}", reading);
                        TelemetryEvent::Battery {
                            percent: reading.raw,
                            timestamp,
                        }
                    }
                    None => {
                        info!("Received message: {}", text);
                        TelemetryEvent::Reply {
                            text: text.to_string(),
                            timestamp,
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Discarding {} byte reply: {}", payload.len(), e);
                TelemetryEvent::Discarded {
                    bytes: payload.len(),
                    timestamp,
                }
            }
        };

        // No subscribers is fine
        let _ = self.telemetry.send(event.clone());
        event
    }

    /// Drain the socket until it closes or fails.
    ///
    /// Returns the error that stopped the loop. A socket failure closes the
    /// transport before returning. Either way an outstanding battery query
    /// is dropped so its waiter resolves empty.
    pub async fn run(self) -> ReceiveError {
        info!("Response router started on {}", self.transport.local_addr());
        let exit = loop {
            match self.transport.receive_one(self.max_bytes).await {
                Ok(datagram) => {
                    self.route(&datagram.payload);
                }
                Err(ReceiveError::Closed) => {
                    info!("Response router stopped: transport closed");
                    break ReceiveError::Closed;
                }
                Err(e) => {
                    error!("Error receiving: {}", e);
                    self.transport.close();
                    break e;
                }
            }
        };

        if self.battery.cancel() {
            warn!("Battery query unanswered at shutdown");
        }
        exit
    }
}
