//! Session Lifecycle
//!
//! A [`Session`] owns the transport, runs the response router in a
//! background task, and keeps the lifecycle state machine:
//!
//! ```text
//! Disconnected --connect--> Connected --takeoff--> Flying
//!                           Connected <--land----- Flying
//! {Disconnected, Connected, Flying} --quit / end / transport failure--> Terminated
//! ```
//!
//! `Flying` is advisory; takeoff and land are always transmitted and the
//! firmware decides what is legal. `Terminated` is final. Exactly one caller
//! wins the transition into it and performs the shutdown:
//! - `end` always sends `land` before closing
//! - `quit` sends `land` only while flying
//! - a transport failure sends nothing, the channel is presumed unusable
//!
//! Collaborators outside the input context use a cloneable
//! [`SessionHandle`].

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::command::Command;
use crate::config::LinkConfig;
use crate::router::{BatteryQuery, BatteryReading, ResponseRouter, TelemetryEvent, TELEMETRY_CHANNEL_CAPACITY};
use crate::translator::{ControlTranslator, InputEvent};
use crate::transport::Transport;
use crate::{LinkError, Result};

/// Free text containing this substring ends the session instead of being sent
pub const QUIT_KEYWORD: &str = "quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connected,
    /// Advisory, not enforced
    Flying,
    Terminated,
}

impl SessionState {
    pub fn is_terminated(self) -> bool {
        self == SessionState::Terminated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Operator typed `quit` (or interrupted the console)
    Quit,
    /// The end action: land, then exit
    End,
    /// The socket failed or was closed underneath the router
    TransportFailure,
}

/// Outcome of [`Session::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Sent(Command),
    Terminated,
}

/// Pending answer to [`Session::request_battery`]
#[derive(Debug)]
pub struct BatteryReply(oneshot::Receiver<BatteryReading>);

impl BatteryReply {
    /// Wait for the reading. `None` if the query was superseded or the
    /// session ended first.
    pub async fn recv(self) -> Option<BatteryReading> {
        self.0.await.ok()
    }
}

/// State shared between the input context and the router task
#[derive(Debug)]
struct Lifecycle {
    id: Uuid,
    state: watch::Sender<SessionState>,
    termination: OnceLock<TerminationReason>,
    transport: Arc<Transport>,
}

impl Lifecycle {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state().is_terminated() {
            Err(LinkError::Terminated)
        } else {
            Ok(())
        }
    }

    /// Advisory transitions driven by successfully sent commands
    fn observe_sent(&self, command: &Command) {
        self.state.send_if_modified(|state| {
            let next = match (*state, command) {
                (SessionState::Disconnected, Command::Connect) => SessionState::Connected,
                (SessionState::Connected, Command::Takeoff) => SessionState::Flying,
                (SessionState::Flying, Command::Land) => SessionState::Connected,
                _ => return false,
            };
            debug!("Session state {:?} -> {:?}", *state, next);
            *state = next;
            true
        });
    }

    /// Claim the transition into `Terminated`.
    ///
    /// Returns the state it left, or `None` if another path already won.
    fn enter_terminated(&self, reason: TerminationReason) -> Option<SessionState> {
        self.termination.set(reason).ok()?;
        let previous = self.state.send_replace(SessionState::Terminated);
        info!("Session {} terminated ({:?}) from {:?}", self.id, reason, previous);
        Some(previous)
    }

    async fn terminate(&self, reason: TerminationReason) -> bool {
        let Some(previous) = self.enter_terminated(reason) else {
            return false;
        };

        let land = match reason {
            TerminationReason::End => true,
            TerminationReason::Quit => previous == SessionState::Flying,
            TerminationReason::TransportFailure => false,
        };
        if land {
            if let Err(e) = self.transport.send(&Command::Land).await {
                warn!("Error sending: land before shutdown: {}", e);
            }
        }

        self.transport.close();
        true
    }
}

/// Cloneable view of a session for presentation code
#[derive(Debug, Clone)]
pub struct SessionHandle {
    lifecycle: Arc<Lifecycle>,
    battery: Arc<BatteryQuery>,
    telemetry: broadcast::Sender<TelemetryEvent>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.lifecycle.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.lifecycle.state.subscribe()
    }

    /// Latest battery reading
    pub fn battery(&self) -> Option<BatteryReading> {
        self.battery.latest()
    }

    pub fn subscribe_battery(&self) -> watch::Receiver<Option<BatteryReading>> {
        self.battery.subscribe()
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.lifecycle.termination.get().copied()
    }

    /// Resolve once the session reaches `Terminated`
    pub async fn terminated(&self) -> TerminationReason {
        let mut state = self.lifecycle.state.subscribe();
        // The sender lives in `self.lifecycle`, so the channel cannot close here
        let _ = state.wait_for(|s| s.is_terminated()).await;
        self.termination_reason()
            .unwrap_or(TerminationReason::TransportFailure)
    }

    /// Terminate from outside the input context (signal handlers)
    pub async fn terminate(&self, reason: TerminationReason) -> bool {
        self.lifecycle.terminate(reason).await
    }
}

pub struct Session {
    handle: SessionHandle,
    transport: Arc<Transport>,
    translator: ControlTranslator,
    router_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Bind the socket and start the response router
    pub async fn open(config: LinkConfig) -> Result<Self> {
        let id = Uuid::new_v4();
        let transport = Arc::new(Transport::bind(&config).await?);
        let (state, _) = watch::channel(SessionState::Disconnected);
        let lifecycle = Arc::new(Lifecycle {
            id,
            state,
            termination: OnceLock::new(),
            transport: transport.clone(),
        });
        let battery = Arc::new(BatteryQuery::new());
        let (telemetry, _) = broadcast::channel(TELEMETRY_CHANNEL_CAPACITY);

        let router = ResponseRouter::new(
            transport.clone(),
            battery.clone(),
            telemetry.clone(),
            config.receive_buffer_bytes,
        );
        let router_task = {
            let lifecycle = lifecycle.clone();
            let span = tracing::info_span!("router", session = %id);
            tokio::spawn(
                async move {
                    let exit = router.run().await;
                    if lifecycle.terminate(TerminationReason::TransportFailure).await {
                        error!("Session lost its transport: {}", exit);
                    }
                }
                .instrument(span),
            )
        };

        info!("🛸 Session {} opened", id);

        Ok(Self {
            handle: SessionHandle {
                lifecycle,
                battery,
                telemetry,
            },
            transport,
            translator: ControlTranslator::with_defaults(config.default_speed, config.default_yaw),
            router_task: Some(router_task),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn translator(&self) -> &ControlTranslator {
        &self.translator
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.transport.local_addr()
    }

    /// Transmit one command while the session is live.
    ///
    /// Send failures are logged and returned, never retried.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.handle.lifecycle.ensure_active()?;
        match self.transport.send(&command).await {
            Ok(()) => {
                self.handle.lifecycle.observe_sent(&command);
                Ok(())
            }
            Err(e) => {
                warn!("Error sending: {}: {}", command, e);
                Err(e.into())
            }
        }
    }

    pub async fn connect(&self) -> Result<()> {
        self.send(Command::Connect).await
    }

    pub async fn takeoff(&self) -> Result<()> {
        self.send(Command::Takeoff).await
    }

    pub async fn land(&self) -> Result<()> {
        self.send(Command::Land).await
    }

    /// Send `battery?` with the reply routed to the returned waiter.
    ///
    /// The reading is also published to [`SessionHandle::battery`], so the
    /// waiter may be dropped.
    pub async fn request_battery(&self) -> Result<BatteryReply> {
        self.handle.lifecycle.ensure_active()?;
        // Registered before sending so a fast reply cannot slip past
        let waiter = self.handle.battery.register();
        if let Err(e) = self.send(Command::BatteryQuery).await {
            self.handle.battery.cancel();
            return Err(e);
        }
        Ok(BatteryReply(waiter))
    }

    /// Translate an operator input event and send the resulting command.
    ///
    /// Returns the command sent, or `None` for local magnitude changes.
    pub async fn handle_input(&mut self, event: InputEvent) -> Result<Option<Command>> {
        self.handle.lifecycle.ensure_active()?;
        match self.translator.translate(event) {
            Some(command) => {
                self.send(command.clone()).await?;
                Ok(Some(command))
            }
            None => Ok(None),
        }
    }

    /// Submit a free-form command line.
    ///
    /// A line containing `quit` terminates the session and is not sent;
    /// anything else is transmitted verbatim. Typed `end` goes out as the
    /// literal `end`; only [`Session::end`] maps it to `land`.
    pub async fn submit(&self, line: &str) -> Result<Submission> {
        if line.contains(QUIT_KEYWORD) {
            self.quit().await;
            return Ok(Submission::Terminated);
        }
        let command = Command::from_text(line);
        self.send(command.clone()).await?;
        Ok(Submission::Sent(command))
    }

    /// The end action: `land`, then terminate
    pub async fn end(&self) -> bool {
        self.handle.lifecycle.terminate(TerminationReason::End).await
    }

    pub async fn quit(&self) -> bool {
        self.handle.lifecycle.terminate(TerminationReason::Quit).await
    }

    /// Terminate if still live and wait for the router task to finish
    pub async fn shutdown(mut self) -> TerminationReason {
        self.quit().await;
        if let Some(task) = self.router_task.take() {
            if let Err(e) = task.await {
                warn!("Response router task failed: {}", e);
            }
        }
        self.handle
            .termination_reason()
            .unwrap_or(TerminationReason::Quit)
    }
}

/// Dropping a live session terminates it like `quit`, landing first when
/// flying. The land is a single non-blocking send.
impl Drop for Session {
    fn drop(&mut self) {
        let Some(previous) = self
            .handle
            .lifecycle
            .enter_terminated(TerminationReason::Quit)
        else {
            return;
        };

        if previous == SessionState::Flying {
            if let Err(e) = self.transport.try_send(&Command::Land) {
                warn!("Error sending: land on drop: {}", e);
            }
        }
        self.transport.close();
    }
}
