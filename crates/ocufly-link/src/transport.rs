//! UDP Transport
//!
//! Owns the single socket of a session. Commands go out as ASCII datagrams
//! to the drone address; replies are read one datagram at a time by the
//! response router. Best effort only: nothing here retries.
//!
//! Closing takes the socket out of the transport and wakes any pending
//! receive, which then reports [`ReceiveError::Closed`]. A closed transport
//! stays closed.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::command::Command;
use crate::config::LinkConfig;
use crate::LinkError;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("transport closed")]
    Closed,
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Both variants are terminal for the reader
#[derive(Error, Debug)]
pub enum ReceiveError {
    #[error("transport closed")]
    Closed,
    #[error("receive failed: {0}")]
    Failed(#[from] std::io::Error),
}

/// One inbound datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub from: SocketAddr,
}

pub struct Transport {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    drone_addr: SocketAddr,
    local_addr: SocketAddr,
    closed: watch::Sender<bool>,
}

impl Transport {
    /// Bind the local socket
    pub async fn bind(config: &LinkConfig) -> Result<Self, LinkError> {
        let socket = UdpSocket::bind(config.local_addr)
            .await
            .map_err(|source| LinkError::Bind {
                addr: config.local_addr,
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| LinkError::Bind {
            addr: config.local_addr,
            source,
        })?;

        info!("📡 Bound {} -> drone {}", local_addr, config.drone_addr);

        let (closed, _) = watch::channel(false);
        Ok(Self {
            socket: Mutex::new(Some(Arc::new(socket))),
            drone_addr: config.drone_addr,
            local_addr,
            closed,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn drone_addr(&self) -> SocketAddr {
        self.drone_addr
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Encode and transmit one command
    pub async fn send(&self, command: &Command) -> Result<(), SendError> {
        let socket = self.socket().ok_or(SendError::Closed)?;
        let wire = command.encode();
        socket.send_to(&wire, self.drone_addr).await?;
        info!("Sending message: {}", command);
        Ok(())
    }

    /// Non-blocking send for contexts that cannot await (`Drop`).
    ///
    /// Fails with `WouldBlock` rather than waiting for socket capacity.
    pub fn try_send(&self, command: &Command) -> Result<(), SendError> {
        let socket = self.socket().ok_or(SendError::Closed)?;
        socket.try_send_to(&command.encode(), self.drone_addr)?;
        info!("Sending message: {}", command);
        Ok(())
    }

    /// Wait for one datagram of at most `max_bytes`.
    ///
    /// Resolves with [`ReceiveError::Closed`] as soon as the transport is
    /// closed, including while already waiting.
    pub async fn receive_one(&self, max_bytes: usize) -> Result<Datagram, ReceiveError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ReceiveError::Closed);
        }
        let socket = self.socket().ok_or(ReceiveError::Closed)?;

        let mut buf = vec![0u8; max_bytes];
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, from) = received?;
                buf.truncate(len);
                Ok(Datagram { payload: buf, from })
            }
            _ = closed.changed() => Err(ReceiveError::Closed),
        }
    }

    /// Close the socket.
    ///
    /// Returns `true` for the call that actually closed it; later calls are
    /// no-ops returning `false`.
    pub fn close(&self) -> bool {
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed.send_replace(true);

        match socket {
            Some(_) => {
                info!("Socket {} closed", self.local_addr);
                true
            }
            None => {
                debug!("Socket {} already closed", self.local_addr);
                false
            }
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("local_addr", &self.local_addr)
            .field("drone_addr", &self.drone_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn fake_drone() -> (UdpSocket, LinkConfig) {
        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = LinkConfig::default()
            .with_drone_addr(drone.local_addr().unwrap())
            .with_local_addr("127.0.0.1:0".parse().unwrap());
        (drone, config)
    }

    #[tokio::test]
    async fn test_send_encodes_ascii_datagram() {
        let (drone, config) = fake_drone().await;
        let transport = Transport::bind(&config).await.unwrap();

        transport.send(&Command::rc(0, -30, 0, 0)).await.unwrap();

        let mut buf = [0u8; 128];
        let (len, from) = timeout(Duration::from_secs(2), drone.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"rc 0 -30 0 0");
        assert_eq!(from, transport.local_addr());
    }

    #[tokio::test]
    async fn test_try_send_without_await() {
        let (drone, config) = fake_drone().await;
        let transport = Transport::bind(&config).await.unwrap();

        transport.try_send(&Command::Land).unwrap();

        let mut buf = [0u8; 128];
        let (len, _) = timeout(Duration::from_secs(2), drone.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"land");

        transport.close();
        assert!(matches!(transport.try_send(&Command::Land), Err(SendError::Closed)));
    }

    #[tokio::test]
    async fn test_receive_one_truncates_to_buffer() {
        let (drone, config) = fake_drone().await;
        let transport = Transport::bind(&config).await.unwrap();

        drone.send_to(b"ok", transport.local_addr()).await.unwrap();
        let datagram = timeout(Duration::from_secs(2), transport.receive_one(128))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(datagram.payload, b"ok".to_vec());
        assert_eq!(datagram.from, drone.local_addr().unwrap());

        drone.send_to(&[b'x'; 200], transport.local_addr()).await.unwrap();
        let datagram = timeout(Duration::from_secs(2), transport.receive_one(128))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(datagram.payload.len(), 128);
    }

    #[tokio::test]
    async fn test_close_wakes_pending_receive() {
        let (_drone, config) = fake_drone().await;
        let transport = Arc::new(Transport::bind(&config).await.unwrap());

        let reader = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.receive_one(128).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(transport.close());
        let result = timeout(Duration::from_secs(2), reader).await.unwrap().unwrap();
        assert!(matches!(result, Err(ReceiveError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_drone, config) = fake_drone().await;
        let transport = Transport::bind(&config).await.unwrap();

        assert!(!transport.is_closed());
        assert!(transport.close());
        assert!(!transport.close());
        assert!(transport.is_closed());

        assert!(matches!(transport.send(&Command::Land).await, Err(SendError::Closed)));
        assert!(matches!(transport.receive_one(128).await, Err(ReceiveError::Closed)));
    }
}
