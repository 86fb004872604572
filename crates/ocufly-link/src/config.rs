//! Link configuration
//!
//! All parameters are fixed constants. Only the two socket addresses may be
//! overridden through the environment, which is how the console is pointed
//! at a simulator and how the tests reach a loopback fake drone.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Drone's link-local address on its own access point
pub const DRONE_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1)), 8889);

/// Local bind address, any interface
pub const LOCAL_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 9000);

/// Receive buffer size in bytes
pub const RECEIVE_BUFFER_BYTES: usize = 128;

/// Speed slider starting value
pub const DEFAULT_SPEED: u8 = 30;

/// Rotation slider starting value, also the reset target above 180 degrees
pub const DEFAULT_YAW: u16 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub drone_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub receive_buffer_bytes: usize,
    pub default_speed: u8,
    pub default_yaw: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drone_addr: DRONE_ADDR,
            local_addr: LOCAL_ADDR,
            receive_buffer_bytes: RECEIVE_BUFFER_BYTES,
            default_speed: DEFAULT_SPEED,
            default_yaw: DEFAULT_YAW,
        }
    }
}

impl LinkConfig {
    /// Constants, with `OCUFLY_DRONE_ADDR` / `OCUFLY_LOCAL_ADDR` overrides
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            drone_addr: addr_from_env("OCUFLY_DRONE_ADDR", defaults.drone_addr),
            local_addr: addr_from_env("OCUFLY_LOCAL_ADDR", defaults.local_addr),
            ..defaults
        }
    }

    /// Point the link at another drone address (simulator, loopback)
    pub fn with_drone_addr(mut self, addr: SocketAddr) -> Self {
        self.drone_addr = addr;
        self
    }

    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = addr;
        self
    }
}

fn addr_from_env(key: &str, fallback: SocketAddr) -> SocketAddr {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Ignoring {}={:?}: {} (using {})", key, raw, e, fallback);
            fallback
        }),
        Err(_) => fallback,
    }
}
