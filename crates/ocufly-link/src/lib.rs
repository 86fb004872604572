//! Ocufly Link Library
//!
//! Command and control link for Tello-class consumer drones over a single
//! UDP socket:
//! - `transport` - the one socket, ASCII command framing, datagram receive
//! - `router` - the sole background reader, battery reply demultiplexing
//! - `translator` - operator input events to `rc`/`up`/`cw`/... commands
//! - `session` - lifecycle state machine and clean shutdown
//!
//! Presentation concerns stay outside this crate. An operator surface needs
//! three things from it: [`Session::submit`] to send a command line,
//! [`SessionHandle::battery`] for the latest battery reading, and
//! [`SessionHandle::terminated`] to learn that the session is over.

pub mod command;
pub mod config;
pub mod router;
pub mod session;
pub mod transport;
pub mod translator;

use thiserror::Error;

pub use crate::command::Command;
pub use crate::config::LinkConfig;
pub use crate::router::{BatteryReading, TelemetryEvent};
pub use crate::session::{
    BatteryReply, Session, SessionHandle, SessionState, Submission, TerminationReason,
};
pub use crate::transport::{ReceiveError, SendError, Transport};
pub use crate::translator::{ControlTranslator, InputEvent, RotationMagnitude, SpeedSetting};

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Failed to bind local socket {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Send failed: {0}")]
    Send(#[from] SendError),
    #[error("Session terminated")]
    Terminated,
}

pub type Result<T> = std::result::Result<T, LinkError>;
