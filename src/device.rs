//! The connection manager owns the device connection lifecycle:
//! discovery, open, teardown and the retry timer.
//!
//! Everything the device does reaches the rest of the system as either a
//! data broadcast (one validated line) or a status broadcast
//! (connected/disconnected) through the hub.

use std::ops::ControlFlow;

use futures::StreamExt;
use tokio::{
    io::AsyncWriteExt,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_serial::SerialStream;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    config::Config,
    discovery,
    error::Error,
    hub::HubHandle,
    messages::ClientMessage,
    serial::{self, codecs::lines::LinesCodec, error::SerialPortError},
    validate,
};

/// Where the device connection is in its lifecycle.
///
/// Only the edges listed in [`can_transition`](Self::can_transition)
/// exist; `Closing` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No device attached. The retry timer drives us out of here.
    Disconnected,

    /// A connect attempt is in flight.
    Connecting,

    /// A device session is live and producing lines.
    Connected,

    /// Shutting down. Terminal.
    Closing,
}

impl ConnectionState {
    /// Whether the edge from `self` to `to` exists.
    pub fn can_transition(self, to: Self) -> bool {
        use ConnectionState::*;

        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Disconnected, Closing)
                | (Connecting, Closing)
                | (Connected, Closing)
        )
    }
}

/// Requests to the manager from the outside.
#[derive(Debug)]
enum ManagerRequest {
    /// Close the device (if open) and stop. Replies with the close result.
    Shutdown {
        reply: oneshot::Sender<Result<(), Error>>,
    },
}

/// Everything the manager reacts to, funneled through one place
/// so the state machine's edges stay auditable.
enum DeviceEvent {
    /// The retry timer fired.
    Tick,

    /// The framer produced a line.
    Line(String),

    /// The device session failed or ended.
    SessionError(SerialPortError),

    /// We were asked to shut down.
    Shutdown(oneshot::Sender<Result<(), Error>>),
}

struct DeviceSession {
    path: String,
    framed: FramedRead<SerialStream, LinesCodec>,
}

struct ConnectionManager {
    config: Config,
    hub: HubHandle,
    state: ConnectionState,

    /// At most one open device at any time.
    session: Option<DeviceSession>,

    requests: mpsc::UnboundedReceiver<ManagerRequest>,

    /// Produces the port to connect to.
    /// A seam: the real implementation enumerates serial ports.
    discover: fn(&Config) -> Option<discovery::PortDescriptor>,
}

impl ConnectionManager {
    async fn run(&mut self) {
        let mut retry = tokio::time::interval(self.config.retry_interval());
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick fires immediately: the initial connection attempt.
            let event = tokio::select! {
                _ = retry.tick() => DeviceEvent::Tick,
                read = Self::read_line(&mut self.session) => match read {
                    Some(Ok(line)) => DeviceEvent::Line(line),
                    Some(Err(e)) => DeviceEvent::SessionError(e),
                    None => DeviceEvent::SessionError(SerialPortError::Disconnected),
                },
                request = self.requests.recv() => match request {
                    Some(ManagerRequest::Shutdown { reply }) => DeviceEvent::Shutdown(reply),
                    None => {
                        debug!("Manager handle dropped, stopping");
                        break;
                    }
                },
            };

            if self.handle_event(event).await.is_break() {
                break;
            }
        }
    }

    /// Resolves once the open session yields a line or an error.
    /// Pends forever while no session is open.
    async fn read_line(
        session: &mut Option<DeviceSession>,
    ) -> Option<Result<String, SerialPortError>> {
        match session.as_mut() {
            Some(session) => session.framed.next().await,
            None => futures::future::pending().await,
        }
    }

    /// The single transition function all events go through.
    async fn handle_event(&mut self, event: DeviceEvent) -> ControlFlow<()> {
        match event {
            DeviceEvent::Tick => {
                // Never start a connect while one is in flight or a
                // device is already open.
                if self.state == ConnectionState::Disconnected {
                    self.connect().await;
                }

                ControlFlow::Continue(())
            }
            DeviceEvent::Line(line) => {
                self.on_line(&line);
                ControlFlow::Continue(())
            }
            DeviceEvent::SessionError(e) => {
                self.on_session_error(e);
                ControlFlow::Continue(())
            }
            DeviceEvent::Shutdown(reply) => {
                let result = self.close().await;

                if reply.send(result).is_err() {
                    warn!("No one is listening to the shutdown result");
                }

                ControlFlow::Break(())
            }
        }
    }

    async fn connect(&mut self) {
        self.transition(ConnectionState::Connecting);

        // A stale handle from a failed teardown must be released
        // before a new open, else two live handles could exist.
        if let Some(stale) = self.session.take() {
            warn!(path = %stale.path, "Dropping stale device session");
        }

        let Some(descriptor) = (self.discover)(&self.config) else {
            debug!("No device found, will retry");
            self.transition(ConnectionState::Disconnected);
            return;
        };

        match serial::open(&descriptor.path, self.config.baud_rate) {
            Ok(stream) => {
                self.session = Some(DeviceSession {
                    path: descriptor.path,
                    framed: FramedRead::new(stream, LinesCodec::default()),
                });
                self.transition(ConnectionState::Connected);
                self.hub.broadcast(ClientMessage::status(true));
            }
            Err(e) => {
                warn!(%e, "Open failed, will retry");
                self.transition(ConnectionState::Disconnected);
            }
        }
    }

    fn on_line(&mut self, line: &str) {
        match validate::validate(line) {
            Ok(payload) => self.hub.broadcast(ClientMessage::data(payload)),
            Err(reason) => {
                // Recoverable at line granularity; the stream continues.
                warn!(%reason, %line, "Dropping malformed line");
            }
        }
    }

    fn on_session_error(&mut self, error: SerialPortError) {
        warn!(%error, "Device session ended");

        self.session = None;
        self.transition(ConnectionState::Disconnected);
        self.hub.broadcast(ClientMessage::status(false));

        // No immediate reconnect: the next retry tick drives that,
        // which keeps a flapping device from causing a tight loop.
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.transition(ConnectionState::Closing);

        let Some(session) = self.session.take() else {
            return Ok(());
        };

        let path = session.path;
        info!(%path, "Closing device");

        // Flushing is our close confirmation.
        // Dropping the stream afterwards releases the handle.
        let mut stream = session.framed.into_inner();
        stream.flush().await.map_err(|e| Error::DeviceClose {
            path,
            problem: e.to_string(),
        })
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state.can_transition(to) {
            debug!(from = ?self.state, ?to, "State transition");
            self.state = to;
        } else {
            error!(from = ?self.state, ?to, "Refusing invalid state transition");
        }
    }
}

/// Handle to the spawned connection manager.
#[derive(Debug)]
pub struct ConnectionManagerHandle {
    requests: mpsc::UnboundedSender<ManagerRequest>,
    join_handle: JoinHandle<()>,
}

impl ConnectionManagerHandle {
    /// Spawn a connection manager.
    /// It attempts a connect immediately and then retries at the
    /// configured fixed interval for as long as it is disconnected.
    pub fn new(config: Config, hub: HubHandle) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        let mut manager = ConnectionManager {
            config,
            hub,
            state: ConnectionState::Disconnected,
            session: None,
            requests: requests_rx,
            discover: discovery::discover,
        };

        let join_handle =
            tokio::spawn(async move { manager.run().await }.instrument(info_span!("Device")));

        Self {
            requests: requests_tx,
            join_handle,
        }
    }

    /// Disarm the retry timer, close any open device and wait for the
    /// close confirmation. Consumes the handle; the manager stops.
    pub async fn shutdown(self) -> Result<(), Error> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.requests
            .send(ManagerRequest::Shutdown { reply: reply_tx })
            .map_err(|_| Error::InternalIssue("Connection manager is already gone".into()))?;

        let result = reply_rx.await.map_err(|_| {
            Error::InternalIssue("Connection manager dropped the shutdown reply".into())
        })?;

        if let Err(e) = self.join_handle.await {
            warn!(?e, "Manager task join error");
        }

        result
    }
}
