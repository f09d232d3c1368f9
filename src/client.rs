//! Connection lifecycle orchestration (C9) wiring the read loop (C12),
//! send side (C13), handshake FSM, handler table, and async-request
//! registry together.
//!
//! Socket and TLS construction are an injected concern, not something
//! this module does itself: [`Client::new`] takes an already-connected
//! [`TcpStream`]; a `STARTTLS`/STS-triggered upgrade hands the raw
//! socket back to the caller via [`Client::take_socket_for_tls_upgrade`]
//! so it can drive its own `TlsConnector` (certificate validation is the
//! caller's policy to own), then resumes via
//! [`Client::complete_tls_upgrade`].

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::client::TlsStream;

use crate::async_request::{
    AsyncRequestRegistry, ParamConstraint, ReplyOutcome, RequestId, RequestKind, DEFAULT_TIMEOUT,
};
use crate::event::Event;
use crate::handler::HandlerTable;
use crate::message::{Message, MessageRef};
use crate::state::{
    ClientState, DisconnectReason, HandshakeAction, HandshakeConfig, HandshakeMachine,
};
use crate::transport::Transport;

/// Idle time before a keepalive `PING` is sent, and the grace period
/// after that before the connection is declared dead (§4.9 "Ping
/// timer").
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(180);
const PING_GRACE: Duration = Duration::from_secs(30);

/// What to do after one [`Client::tick`] call.
#[derive(Debug)]
pub enum Tick {
    /// One line was read and processed; events in arrival order.
    Line {
        events: Vec<Event>,
        async_replies: Vec<(RequestId, ReplyOutcome)>,
    },
    /// The handshake or an `STS`/`STARTTLS` handler wants a TLS upgrade:
    /// call [`Client::take_socket_for_tls_upgrade`].
    TlsUpgradeRequested,
    /// The handshake or an STS policy requires reconnecting to a
    /// different port (§4.11); the caller owns the actual reconnect.
    ReconnectRequested { port: u16 },
    /// Registration completed; the connection is `Online`.
    HandshakeComplete,
    /// A keepalive `PING` was sent after an idle period.
    PingSent,
    /// No activity followed a keepalive `PING` within the grace period;
    /// the caller should close the socket.
    PingTimeout,
    /// The peer closed the connection, or a read error occurred.
    Disconnected(DisconnectReason),
}

/// Orchestrates one IRC connection end to end.
pub struct Client {
    transport: Arc<Mutex<Option<Transport>>>,
    machine: HandshakeMachine,
    handler: HandlerTable,
    requests: AsyncRequestRegistry,
    last_activity: std::time::Instant,
    awaiting_pong: bool,
    ping_timeout: Duration,
    request_timeout: Duration,
}

impl Client {
    pub fn new(stream: TcpStream, config: HandshakeConfig) -> Self {
        let nickname = config.nickname.clone();
        Client {
            transport: Arc::new(Mutex::new(Some(Transport::tcp(stream)))),
            machine: HandshakeMachine::new(config),
            handler: HandlerTable::new(nickname),
            requests: AsyncRequestRegistry::new(),
            last_activity: std::time::Instant::now(),
            awaiting_pong: false,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn state(&self) -> &ClientState {
        self.machine.state()
    }

    pub fn handler(&self) -> &HandlerTable {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut HandlerTable {
        &mut self.handler
    }

    pub fn set_ping_timeout(&mut self, timeout: Duration) {
        self.ping_timeout = timeout;
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Begin registration: sends `CAP LS`, `NICK`, `USER` (§4.9).
    pub async fn start(&mut self) -> std::io::Result<()> {
        let actions = self.machine.start();
        self.run_actions(actions).await
    }

    /// Register a new async request (§4.7); pass `reply_set`/`terminal`
    /// keywords and positional constraints exactly as described there.
    pub fn register_request(
        &mut self,
        reply_set: impl IntoIterator<Item = &'static str>,
        terminal: impl IntoIterator<Item = &'static str>,
        positional: Vec<ParamConstraint>,
        kind: RequestKind,
    ) -> RequestId {
        self.requests.register(reply_set, terminal, positional, kind)
    }

    /// Send a message, serialized through the shared write path (§4.13,
    /// §5). Records `LastSpoke`/`DisconnectReason::Quit` bookkeeping.
    pub async fn send(&mut self, message: &Message) -> std::io::Result<()> {
        self.run_actions(vec![HandshakeAction::Send(Box::new(message.clone()))])
            .await
    }

    async fn run_actions(&mut self, actions: Vec<HandshakeAction>) -> std::io::Result<()> {
        for action in actions {
            if let HandshakeAction::Send(message) = action {
                self.write_line(&message.to_string()).await?;
            }
            // UpgradeTls/StsUpgrade/Complete/Disconnect/Error surface
            // through `tick()`'s return value instead, since they affect
            // control flow the caller must react to.
        }
        Ok(())
    }

    async fn write_line(&mut self, raw: &str) -> std::io::Result<()> {
        let mut guard = self.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "transport unavailable during TLS upgrade",
            ));
        };
        transport
            .write_message(raw)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    /// Drive one step of the connection: read a line (racing the ping
    /// timer), process it, and report what happened.
    pub async fn tick(&mut self) -> Tick {
        let deadline = self.next_ping_deadline();
        tokio::select! {
            line = self.read_one_line() => self.process_read(line).await,
            _ = tokio::time::sleep_until(deadline.into()) => self.process_timer().await,
        }
    }

    fn next_ping_deadline(&self) -> std::time::Instant {
        let budget = if self.awaiting_pong {
            self.ping_timeout + PING_GRACE
        } else {
            self.ping_timeout
        };
        self.last_activity + budget
    }

    async fn read_one_line(&mut self) -> std::io::Result<Option<String>> {
        let mut guard = self.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "transport unavailable during TLS upgrade",
            ));
        };
        transport
            .read_message()
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{e:?}")))
    }

    async fn process_timer(&mut self) -> Tick {
        if self.awaiting_pong {
            return Tick::PingTimeout;
        }
        self.awaiting_pong = true;
        let _ = self.write_line("PING :keep-alive\r\n").await;
        Tick::PingSent
    }

    async fn process_read(&mut self, result: std::io::Result<Option<String>>) -> Tick {
        let line = match result {
            Ok(Some(line)) => line,
            Ok(None) => return Tick::Disconnected(DisconnectReason::ServerDisconnected),
            Err(_) => return Tick::Disconnected(DisconnectReason::Exception),
        };

        self.last_activity = std::time::Instant::now();
        self.awaiting_pong = false;

        if line.is_empty() {
            return Tick::Line {
                events: Vec::new(),
                async_replies: Vec::new(),
            };
        }

        let msg = match MessageRef::parse(&line) {
            Ok(msg) => msg,
            Err(_) => {
                return Tick::Line {
                    events: Vec::new(),
                    async_replies: Vec::new(),
                }
            }
        };

        if !matches!(self.machine.state(), ClientState::Online) {
            let async_replies = self.requests.dispatch(&msg);
            let actions = self.machine.feed(&msg);
            return self.process_handshake_actions(actions, async_replies).await;
        }

        // §5 ordering: (1) handler state mutations and (2) its events
        // happen first, then (3) matching async requests are completed,
        // then (4) any additional sends the handler issued go out.
        let out = self.handler.handle(&msg, self.is_tls().await);
        let async_replies = self.requests.dispatch(&msg);
        for send in &out.sends {
            let _ = self.write_line(&send.to_string()).await;
        }
        Tick::Line {
            events: out.events,
            async_replies,
        }
    }

    async fn process_handshake_actions(
        &mut self,
        actions: Vec<HandshakeAction>,
        async_replies: Vec<(RequestId, ReplyOutcome)>,
    ) -> Tick {
        let mut events = Vec::new();
        for action in actions {
            match action {
                HandshakeAction::Send(message) => {
                    let _ = self.write_line(&message.to_string()).await;
                }
                HandshakeAction::UpgradeTls => return Tick::TlsUpgradeRequested,
                HandshakeAction::StsUpgrade(port) => return Tick::ReconnectRequested { port },
                HandshakeAction::Complete => return Tick::HandshakeComplete,
                HandshakeAction::Disconnect(reason) => return Tick::Disconnected(reason),
                HandshakeAction::Error(err) => {
                    events.push(Event::Handshake(err));
                }
            }
        }
        Tick::Line {
            events,
            async_replies,
        }
    }

    async fn is_tls(&self) -> bool {
        self.transport
            .lock()
            .await
            .as_ref()
            .map(Transport::is_tls)
            .unwrap_or(false)
    }

    /// Fail every pending async request (§4.7, §5), e.g. after
    /// `Tick::Disconnected`.
    pub fn fail_pending_requests(&mut self) -> Vec<RequestId> {
        self.requests.fail_all()
    }

    /// Expire any timeout-eligible request that has been pending longer
    /// than the configured request timeout (§4.7, default 30s).
    pub fn expire_request_timeouts(&mut self) -> Vec<RequestId> {
        self.requests.expire_timeouts(self.request_timeout)
    }

    /// Reclaim the raw socket for a `STARTTLS`/STS TLS handshake
    /// (§4.9/§4.11). Returns `None` if the transport is already TLS or
    /// mid-upgrade.
    pub async fn take_socket_for_tls_upgrade(&mut self) -> Option<TcpStream> {
        let mut guard = self.transport.lock().await;
        match guard.take() {
            Some(Transport::Tcp { reader, writer }) => {
                let read_half = reader.into_inner();
                read_half.reunite(writer).ok()
            }
            other => {
                *guard = other;
                None
            }
        }
    }

    /// Resume the connection over the now-established TLS stream and
    /// tell the handshake machine to restart pre-registration on it
    /// (§4.9).
    pub async fn complete_tls_upgrade(&mut self, stream: TlsStream<TcpStream>) -> std::io::Result<()> {
        {
            let mut guard = self.transport.lock().await;
            *guard = Some(Transport::tls(stream));
        }
        let actions = self.machine.tls_ready();
        self.run_actions(actions).await
    }

    /// Report a TLS handshake failure (§4.9: `Required` ⇒ fatal,
    /// `Optional` ⇒ proceed in plaintext).
    pub async fn tls_upgrade_failed(&mut self, reason: impl Into<String>) -> std::io::Result<()> {
        let actions = self.machine.tls_failed(reason);
        self.run_actions(actions).await
    }
}
