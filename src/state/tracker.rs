//! Connection lifecycle state machine (§4.9), sans-IO.
//!
//! `HandshakeMachine` drives the `CAP` → (`STARTTLS`/`STS`) → `AUTHENTICATE`
//! → `NICK`/`USER` → `001`/`376` flow. It never touches a socket: callers
//! feed it parsed messages and timer expirations and get back
//! [`HandshakeAction`]s to execute (send a message, perform a TLS
//! handshake, reconnect, or tear the connection down).

use std::collections::HashSet;

use crate::command::{CapSubCommand, Command};
use crate::message::MessageRef;
use crate::sasl::{self, SaslCapabilities, SaslMechanism};
use crate::Message;

use super::sync::CapLsAccumulator;

/// How long to wait for any CAP reply before probing for STARTTLS support
/// with a bare `PING` (§4.9).
pub const STARTTLS_PROBE_SECS: u64 = 3;

/// How the connection should establish and maintain transport security.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsMode {
    #[default]
    Plaintext,
    StartTlsOptional,
    StartTlsRequired,
    Tls,
}

/// How strongly SASL authentication is required.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaslMode {
    #[default]
    Disabled,
    UseIfAvailable,
    Required,
}

/// Externally-visible connection lifecycle state (§6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    TlsHandshaking,
    Registering,
    CapabilityNegotiating,
    SaslAuthenticating,
    ReceivingServerInfo,
    Online,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Why the connection ended (§6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    Unknown,
    ClientDisconnected,
    Quit,
    PingTimeout,
    ServerDisconnected,
    Exception,
    TlsAuthenticationFailed,
    SaslAuthenticationFailed,
    CaseMappingCollision,
}

/// SASL account/password credentials.
#[derive(Clone, Debug)]
pub struct SaslCredentials {
    pub account: String,
    pub password: String,
}

/// Configuration the handshake needs to drive registration.
#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    pub password: Option<String>,
    pub tls_mode: TlsMode,
    pub sasl_mode: SaslMode,
    pub sasl_mechanisms: Vec<SaslMechanism>,
    pub sasl_credentials: Option<SaslCredentials>,
}

/// An action the caller must perform on behalf of the state machine.
#[derive(Clone, Debug)]
pub enum HandshakeAction {
    /// Send this message to the server.
    Send(Box<Message>),
    /// Perform a TLS handshake on the current socket (STARTTLS accepted),
    /// then call [`HandshakeMachine::tls_ready`].
    UpgradeTls,
    /// Drop the TCP connection, reconnect to this port with TLS, and call
    /// [`HandshakeMachine::start`] again (STS upgrade, §4.11).
    StsUpgrade(u16),
    /// Registration finished; proceed to normal operation.
    Complete,
    /// Tear the connection down with this reason.
    Disconnect(DisconnectReason),
    /// A non-fatal problem occurred; registration continues.
    Error(HandshakeError),
}

/// Non-fatal or pre-fatal problems surfaced during handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeError {
    CapabilityRejected(Vec<String>),
    SaslFailed(String),
    NicknameInUse(String),
    ServerError(String),
    ProtocolError(String),
    TlsFailed(String),
    StsUpgradeFailed(String),
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapabilityRejected(caps) => {
                write!(f, "capability rejected: {}", caps.join(", "))
            }
            Self::SaslFailed(reason) => write!(f, "SASL authentication failed: {reason}"),
            Self::NicknameInUse(nick) => write!(f, "nickname in use: {nick}"),
            Self::ServerError(msg) => write!(f, "server error: {msg}"),
            Self::ProtocolError(msg) => write!(f, "protocol error: {msg}"),
            Self::TlsFailed(msg) => write!(f, "TLS handshake failed: {msg}"),
            Self::StsUpgradeFailed(msg) => write!(f, "STS upgrade failed: {msg}"),
        }
    }
}

impl std::error::Error for HandshakeError {}

fn send(cmd: Command) -> HandshakeAction {
    HandshakeAction::Send(Box::new(cmd.into()))
}

/// Parse an STS or SASL capability value into its `key=value`/bare-key
/// tokens (§4.11).
fn parse_cap_value_tokens(value: &str) -> Vec<(&str, Option<&str>)> {
    value
        .split(',')
        .filter(|t| !t.is_empty())
        .map(|t| match t.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (t, None),
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct HandshakeMachine {
    config: HandshakeConfig,
    state: ClientState,
    is_tls: bool,
    cap_ls: CapLsAccumulator,
    enabled_caps: HashSet<String>,
    sasl_advertised: Option<Vec<SaslMechanism>>,
    tried_mechanisms: HashSet<SaslMechanism>,
    current_mechanism: Option<SaslMechanism>,
    sasl_challenge_buf: Vec<u8>,
    sasl_succeeded: bool,
    registration_sent: bool,
    got_any_cap_reply: bool,
    starttls_probe_sent: bool,
    #[cfg(feature = "scram")]
    scram_client: Option<crate::sasl::ScramClient>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        HandshakeConfig {
            nickname: String::new(),
            username: String::new(),
            realname: String::new(),
            password: None,
            tls_mode: TlsMode::default(),
            sasl_mode: SaslMode::default(),
            sasl_mechanisms: Vec::new(),
            sasl_credentials: None,
        }
    }
}

impl HandshakeMachine {
    #[must_use]
    pub fn new(config: HandshakeConfig) -> Self {
        HandshakeMachine {
            config,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    #[must_use]
    pub fn enabled_caps(&self) -> &HashSet<String> {
        &self.enabled_caps
    }

    /// Begin the handshake once the TCP socket is connected.
    #[must_use]
    pub fn start(&mut self) -> Vec<HandshakeAction> {
        self.state = ClientState::Connecting;
        match self.config.tls_mode {
            TlsMode::Tls => {
                self.state = ClientState::TlsHandshaking;
                vec![HandshakeAction::UpgradeTls]
            }
            _ => {
                self.is_tls = false;
                self.begin_preregistration()
            }
        }
    }

    /// Called once the initial (or STARTTLS/STS-triggered) TLS handshake
    /// completes successfully.
    #[must_use]
    pub fn tls_ready(&mut self) -> Vec<HandshakeAction> {
        self.is_tls = true;
        self.enabled_caps.clear();
        self.begin_preregistration()
    }

    /// Called when a TLS handshake fails.
    #[must_use]
    pub fn tls_failed(&mut self, reason: impl Into<String>) -> Vec<HandshakeAction> {
        self.state = ClientState::Disconnected;
        vec![
            HandshakeAction::Error(HandshakeError::TlsFailed(reason.into())),
            HandshakeAction::Disconnect(DisconnectReason::TlsAuthenticationFailed),
        ]
    }

    fn begin_preregistration(&mut self) -> Vec<HandshakeAction> {
        self.cap_ls = CapLsAccumulator::new();
        self.got_any_cap_reply = false;
        self.starttls_probe_sent = false;
        self.state = ClientState::Registering;

        let mut actions = Vec::new();
        if let Some(pass) = self.config.password.clone() {
            actions.push(send(Command::PASS(pass)));
        }
        actions.push(send(Command::CAP(
            None,
            CapSubCommand::LS,
            Some("302".to_string()),
            None,
        )));
        self.state = ClientState::CapabilityNegotiating;
        actions
    }

    /// Call when a "STARTTLS probe" timer (§4.9, [`STARTTLS_PROBE_SECS`])
    /// fires with still no CAP reply received.
    #[must_use]
    pub fn starttls_probe_elapsed(&mut self) -> Vec<HandshakeAction> {
        if self.got_any_cap_reply
            || self.starttls_probe_sent
            || self.is_tls
            || !matches!(
                self.config.tls_mode,
                TlsMode::StartTlsOptional | TlsMode::StartTlsRequired
            )
        {
            return vec![];
        }
        self.starttls_probe_sent = true;
        vec![send(Command::PING(
            "starttls-probe".to_string(),
            None,
        ))]
    }

    /// Declare "no STARTTLS" after the probe got a PONG-only/421/451 reply
    /// instead of further CAP traffic.
    fn no_starttls_detected(&mut self) -> Vec<HandshakeAction> {
        match self.config.tls_mode {
            TlsMode::StartTlsRequired => {
                self.state = ClientState::Disconnected;
                vec![
                    send(Command::QUIT(Some("STARTTLS required but unavailable".into()))),
                    HandshakeAction::Disconnect(DisconnectReason::TlsAuthenticationFailed),
                ]
            }
            _ => vec![],
        }
    }

    /// Feed a parsed message to the state machine.
    #[must_use]
    pub fn feed(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        match self.state {
            ClientState::Disconnected | ClientState::Connecting | ClientState::TlsHandshaking => {
                vec![]
            }
            ClientState::CapabilityNegotiating => self.handle_cap(msg),
            ClientState::SaslAuthenticating => self.handle_sasl(msg),
            ClientState::Registering => self.handle_registering(msg),
            ClientState::ReceivingServerInfo => self.handle_server_info(msg),
            ClientState::Online => vec![],
        }
    }

    fn handle_cap(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        if msg.command.name.eq_ignore_ascii_case("CAP") {
            self.got_any_cap_reply = true;
            let subcmd = msg.arg(1).unwrap_or("");
            return match subcmd.to_ascii_uppercase().as_str() {
                "LS" => self.handle_cap_ls(msg),
                "ACK" => self.handle_cap_ack(msg),
                "NAK" => self.handle_cap_nak(msg),
                "NEW" | "DEL" => vec![],
                _ => vec![],
            };
        }

        // Not a CAP reply: maybe it's the probe's PONG, or a sign the
        // server doesn't understand CAP at all.
        if !self.got_any_cap_reply {
            let is_probe_signal = msg.command.name.eq_ignore_ascii_case("PONG")
                || msg.command.name == "421"
                || msg.command.name == "451";
            if is_probe_signal {
                return self.no_starttls_detected();
            }
        }
        vec![]
    }

    fn handle_cap_ls(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        let (is_multiline, caps_str) = if msg.arg(2) == Some("*") {
            (true, msg.arg(3).unwrap_or(""))
        } else {
            (false, msg.arg(2).unwrap_or(""))
        };
        self.cap_ls.feed(caps_str, is_multiline);
        if !self.cap_ls.is_complete() {
            return vec![];
        }

        // STARTTLS capability: request it before doing anything else.
        if !self.is_tls && self.cap_ls.caps().contains_key("tls") {
            return vec![send(Command::Raw("STARTTLS".to_string(), vec![]))];
        }

        // STS: fire an upgrade if we're plaintext and a port was given.
        if !self.is_tls {
            if let Some(Some(value)) = self.cap_ls.caps().get("sts") {
                for (key, val) in parse_cap_value_tokens(value) {
                    if key.eq_ignore_ascii_case("port") {
                        if let Some(port) = val.and_then(|v| v.parse::<u16>().ok()) {
                            self.state = ClientState::Disconnected;
                            return vec![HandshakeAction::StsUpgrade(port)];
                        }
                    }
                }
            }
        }

        let available: std::collections::HashSet<String> =
            self.cap_ls.caps().keys().cloned().collect();
        self.sasl_advertised = self.cap_ls.caps().get("sasl").and_then(|v| {
            v.as_ref()
                .map(|list| list.split(',').map(SaslMechanism::parse).collect())
        });

        let to_request = crate::caps::negotiate_request(&available);
        if to_request.is_empty() {
            self.finish_cap_negotiation()
        } else {
            vec![send(Command::CAP(
                None,
                CapSubCommand::REQ,
                None,
                Some(to_request.join(" ")),
            ))]
        }
    }

    fn handle_cap_ack(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        let caps_str = msg.arg(2).unwrap_or("");
        for cap in caps_str.split_whitespace() {
            let cap_name = cap.trim_start_matches(['-', '~', '=']);
            if !cap.starts_with('-') {
                self.enabled_caps.insert(cap_name.to_string());
            }
        }

        if self.enabled_caps.contains("sasl") && !matches!(self.config.sasl_mode, SaslMode::Disabled)
        {
            self.state = ClientState::SaslAuthenticating;
            self.begin_sasl()
        } else {
            self.finish_cap_negotiation()
        }
    }

    fn handle_cap_nak(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        let rejected: Vec<String> = msg
            .arg(2)
            .unwrap_or("")
            .split_whitespace()
            .map(String::from)
            .collect();
        let mut actions = vec![];
        if !rejected.is_empty() {
            actions.push(HandshakeAction::Error(HandshakeError::CapabilityRejected(
                rejected,
            )));
        }
        actions.extend(self.finish_cap_negotiation());
        actions
    }

    fn sasl_caps(&self) -> SaslCapabilities {
        SaslCapabilities {
            tls: self.is_tls,
            has_username_password: self.config.sasl_credentials.is_some(),
        }
    }

    fn begin_sasl(&mut self) -> Vec<HandshakeAction> {
        let mechanism = sasl::select_mechanism(
            &self.config.sasl_mechanisms,
            self.sasl_advertised.as_deref(),
            &self.tried_mechanisms,
            self.sasl_caps(),
        );
        match mechanism {
            Some(mech) => {
                self.tried_mechanisms.insert(mech.clone());
                self.sasl_challenge_buf.clear();
                self.current_mechanism = Some(mech.clone());
                #[cfg(feature = "scram")]
                {
                    self.scram_client = None;
                }
                vec![send(Command::AUTHENTICATE(mech.as_str().to_string()))]
            }
            None => self.fail_sasl("no usable SASL mechanism"),
        }
    }

    fn fail_sasl(&mut self, reason: impl Into<String>) -> Vec<HandshakeAction> {
        let mut actions = vec![HandshakeAction::Error(HandshakeError::SaslFailed(
            reason.into(),
        ))];
        if matches!(self.config.sasl_mode, SaslMode::Required) {
            self.state = ClientState::Disconnected;
            actions.push(send(Command::QUIT(Some(
                "SASL authentication failed".to_string(),
            ))));
            actions.push(HandshakeAction::Disconnect(
                DisconnectReason::SaslAuthenticationFailed,
            ));
        } else {
            actions.extend(self.finish_cap_negotiation());
        }
        actions
    }

    fn handle_sasl(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        if msg.command.name.eq_ignore_ascii_case("AUTHENTICATE") {
            let param = msg.arg(0).unwrap_or("");
            if param == "+" || !self.sasl_challenge_buf_pending(param) {
                return self.respond_to_sasl_challenge();
            }
            return vec![];
        }

        if let Ok(numeric) = msg.command.name.parse::<u16>() {
            return match numeric {
                903 => {
                    self.sasl_succeeded = true;
                    self.finish_cap_negotiation()
                }
                900 | 901 => vec![],
                902 | 904 | 905 | 906 => {
                    let reason = msg.arg(1).unwrap_or("SASL failure").to_string();
                    self.fail_sasl(reason)
                }
                _ => vec![],
            };
        }
        vec![]
    }

    /// Accumulate `AUTHENTICATE <base64>` fragments; a fragment shorter
    /// than 400 bytes (or `+`) ends the challenge (§4.10).
    fn sasl_challenge_buf_pending(&mut self, fragment: &str) -> bool {
        self.sasl_challenge_buf
            .extend_from_slice(fragment.as_bytes());
        fragment.len() >= sasl::SASL_CHUNK_SIZE
    }

    /// Dispatch the accumulated challenge to the mechanism selected in
    /// [`Self::begin_sasl`] and produce its response (§4.10: "Pass the
    /// concatenated bytes to the mechanism's `respond` function").
    fn respond_to_sasl_challenge(&mut self) -> Vec<HandshakeAction> {
        let challenge = std::mem::take(&mut self.sasl_challenge_buf);
        let challenge = String::from_utf8(challenge).unwrap_or_default();
        let challenge = if challenge.is_empty() { "+" } else { &challenge };

        match self.current_mechanism.clone() {
            Some(SaslMechanism::Plain) => {
                let creds = match &self.config.sasl_credentials {
                    Some(c) => c.clone(),
                    None => return self.fail_sasl("no SASL credentials configured"),
                };
                self.send_sasl_payload(sasl::encode_plain(&creds.account, &creds.password))
            }
            Some(SaslMechanism::External) => self.send_sasl_payload(sasl::encode_external(None)),
            #[cfg(feature = "scram")]
            Some(SaslMechanism::ScramSha256) => self.respond_to_scram_challenge(challenge),
            #[cfg(not(feature = "scram"))]
            Some(SaslMechanism::ScramSha256) => {
                self.fail_sasl("SCRAM-SHA-256 requires the `scram` feature")
            }
            Some(SaslMechanism::Unknown(name)) => {
                self.fail_sasl(format!("unsupported SASL mechanism {name}"))
            }
            None => self.fail_sasl("no SASL mechanism in progress"),
        }
    }

    #[cfg(feature = "scram")]
    fn respond_to_scram_challenge(&mut self, challenge: &str) -> Vec<HandshakeAction> {
        use crate::sasl::{ScramClient, ScramState};

        let Some(mut client) = self.scram_client.take() else {
            let creds = match &self.config.sasl_credentials {
                Some(c) => c.clone(),
                None => return self.fail_sasl("no SASL credentials configured"),
            };
            let mut client = ScramClient::new(&creds.account, &creds.password);
            let first = client.client_first_message();
            self.scram_client = Some(client);
            return self.send_sasl_payload(first);
        };

        match client.state().clone() {
            ScramState::ClientFirstSent => match client.process_server_first(challenge) {
                Ok(final_message) => {
                    self.scram_client = Some(client);
                    self.send_sasl_payload(final_message)
                }
                Err(e) => self.fail_sasl(format!("SCRAM exchange failed: {e}")),
            },
            ScramState::ClientFinalSent { .. } => match client.verify_server_final(challenge) {
                Ok(()) => vec![],
                Err(e) => self.fail_sasl(format!("SCRAM server verification failed: {e}")),
            },
            _ => self.fail_sasl("unexpected SCRAM exchange state"),
        }
    }

    fn send_sasl_payload(&mut self, payload: String) -> Vec<HandshakeAction> {
        let mut actions = Vec::new();
        if payload.is_empty() {
            actions.push(send(Command::AUTHENTICATE("+".to_string())));
        } else {
            for chunk in sasl::chunk_response(&payload) {
                actions.push(send(Command::AUTHENTICATE(chunk.to_string())));
            }
            if payload.len() % sasl::SASL_CHUNK_SIZE == 0 {
                actions.push(send(Command::AUTHENTICATE("+".to_string())));
            }
        }
        actions
    }

    fn finish_cap_negotiation(&mut self) -> Vec<HandshakeAction> {
        self.state = ClientState::Registering;
        let mut actions = vec![send(Command::CAP(None, CapSubCommand::END, None, None))];

        if !self.registration_sent {
            self.registration_sent = true;
            actions.push(send(Command::NICK(self.config.nickname.clone())));
            actions.push(send(Command::USER(
                self.config.username.clone(),
                "0".to_string(),
                self.config.realname.clone(),
            )));
        }
        actions
    }

    fn handle_registering(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        match msg.command.name {
            "670" => {
                // RPL_STARTTLS
                self.state = ClientState::TlsHandshaking;
                vec![HandshakeAction::UpgradeTls]
            }
            "691" => {
                // ERR_STARTTLS
                if matches!(self.config.tls_mode, TlsMode::StartTlsRequired) {
                    self.state = ClientState::Disconnected;
                    vec![
                        send(Command::QUIT(Some("STARTTLS failed".to_string()))),
                        HandshakeAction::Disconnect(DisconnectReason::TlsAuthenticationFailed),
                    ]
                } else {
                    self.finish_cap_negotiation()
                }
            }
            "001" => {
                if matches!(self.config.sasl_mode, SaslMode::Required) && !self.sasl_succeeded {
                    // The server never advertised `sasl` at all, so
                    // `begin_sasl`/`fail_sasl` never ran (§4.8).
                    self.state = ClientState::Disconnected;
                    return vec![
                        send(Command::QUIT(Some(
                            "SASL authentication failed".to_string(),
                        ))),
                        HandshakeAction::Disconnect(DisconnectReason::SaslAuthenticationFailed),
                    ];
                }
                self.state = ClientState::ReceivingServerInfo;
                vec![]
            }
            "432" | "433" => {
                let nick = msg.arg(1).unwrap_or(&self.config.nickname).to_string();
                vec![HandshakeAction::Error(HandshakeError::NicknameInUse(nick))]
            }
            "ERROR" => {
                let reason = msg.arg(0).unwrap_or("connection closed").to_string();
                self.state = ClientState::Disconnected;
                vec![
                    HandshakeAction::Error(HandshakeError::ServerError(reason)),
                    HandshakeAction::Disconnect(DisconnectReason::ServerDisconnected),
                ]
            }
            _ => vec![],
        }
    }

    fn handle_server_info(&mut self, msg: &MessageRef<'_>) -> Vec<HandshakeAction> {
        match msg.command.name {
            "376" | "422" => {
                self.state = ClientState::Online;
                vec![HandshakeAction::Complete]
            }
            "ERROR" => {
                let reason = msg.arg(0).unwrap_or("connection closed").to_string();
                self.state = ClientState::Disconnected;
                vec![
                    HandshakeAction::Error(HandshakeError::ServerError(reason)),
                    HandshakeAction::Disconnect(DisconnectReason::ServerDisconnected),
                ]
            }
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> HandshakeConfig {
        HandshakeConfig {
            nickname: "testbot".to_string(),
            username: "bot".to_string(),
            realname: "Test Bot".to_string(),
            password: None,
            tls_mode: TlsMode::Plaintext,
            sasl_mode: SaslMode::Disabled,
            sasl_mechanisms: vec![],
            sasl_credentials: None,
        }
    }

    #[test]
    fn test_start_sends_cap_ls() {
        let mut machine = HandshakeMachine::new(make_config());
        let actions = machine.start();
        assert_eq!(machine.state(), &ClientState::CapabilityNegotiating);
        assert!(actions
            .iter()
            .any(|a| matches!(a, HandshakeAction::Send(m) if matches!(m.command, Command::CAP(_, CapSubCommand::LS, _, _)))));
    }

    #[test]
    fn test_cap_ls_then_req() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let cap_ls = MessageRef::parse(":server CAP * LS :multi-prefix sasl").unwrap();
        let actions = machine.feed(&cap_ls);

        assert!(actions.iter().any(|a| matches!(
            a,
            HandshakeAction::Send(m) if matches!(m.command, Command::CAP(_, CapSubCommand::REQ, _, _))
        )));
    }

    #[test]
    fn test_cap_ack_without_sasl_finishes() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&MessageRef::parse(":server CAP * LS :multi-prefix").unwrap());

        let cap_ack = MessageRef::parse(":server CAP * ACK :multi-prefix").unwrap();
        let actions = machine.feed(&cap_ack);

        assert_eq!(machine.state(), &ClientState::Registering);
        assert!(actions.len() >= 3);
    }

    #[test]
    fn test_cap_ack_with_sasl_authenticates() {
        let mut config = make_config();
        config.sasl_mode = SaslMode::UseIfAvailable;
        config.sasl_mechanisms = vec![SaslMechanism::Plain];
        config.sasl_credentials = Some(SaslCredentials {
            account: "bot".to_string(),
            password: "hunter2".to_string(),
        });

        let mut machine = HandshakeMachine::new(config);
        let _ = machine.start();
        let _ = machine.feed(&MessageRef::parse(":server CAP * LS :sasl=PLAIN").unwrap());

        let cap_ack = MessageRef::parse(":server CAP * ACK :sasl").unwrap();
        let actions = machine.feed(&cap_ack);

        assert_eq!(machine.state(), &ClientState::SaslAuthenticating);
        assert!(actions.iter().any(|a| matches!(
            a,
            HandshakeAction::Send(m) if matches!(&m.command, Command::AUTHENTICATE(s) if s == "PLAIN")
        )));
    }

    #[test]
    fn test_sasl_success_finishes_registration() {
        let mut config = make_config();
        config.sasl_mode = SaslMode::UseIfAvailable;
        config.sasl_mechanisms = vec![SaslMechanism::Plain];
        config.sasl_credentials = Some(SaslCredentials {
            account: "bot".to_string(),
            password: "hunter2".to_string(),
        });

        let mut machine = HandshakeMachine::new(config);
        let _ = machine.start();
        let _ = machine.feed(&MessageRef::parse(":server CAP * LS :sasl=PLAIN").unwrap());
        let _ = machine.feed(&MessageRef::parse(":server CAP * ACK :sasl").unwrap());
        let _ = machine.feed(&MessageRef::parse("AUTHENTICATE +").unwrap());

        let success = MessageRef::parse(":server 903 testbot :SASL successful").unwrap();
        let actions = machine.feed(&success);
        assert_eq!(machine.state(), &ClientState::Registering);
        assert!(actions.iter().any(|a| matches!(
            a,
            HandshakeAction::Send(m) if matches!(m.command, Command::CAP(_, CapSubCommand::END, _, _))
        )));
    }

    #[test]
    fn test_required_sasl_with_no_server_support_fails_at_welcome() {
        // Regression test: if the server never advertises `sasl`,
        // `begin_sasl`/`fail_sasl` never run. A `Required`-configured
        // client must still refuse registration at `001` (§4.8).
        let mut config = make_config();
        config.sasl_mode = SaslMode::Required;
        config.sasl_mechanisms = vec![SaslMechanism::Plain];
        config.sasl_credentials = Some(SaslCredentials {
            account: "bot".to_string(),
            password: "hunter2".to_string(),
        });

        let mut machine = HandshakeMachine::new(config);
        let _ = machine.start();
        // No `sasl` capability advertised in LS, so CAP ACK never begins SASL.
        let _ = machine.feed(&MessageRef::parse(":server CAP * LS :multi-prefix").unwrap());
        let _ = machine.feed(&MessageRef::parse(":server CAP * ACK :multi-prefix").unwrap());
        assert_eq!(machine.state(), &ClientState::Registering);

        let actions = machine.feed(&MessageRef::parse(":server 001 testbot :Welcome").unwrap());
        assert_eq!(machine.state(), &ClientState::Disconnected);
        assert!(actions.iter().any(|a| matches!(
            a,
            HandshakeAction::Send(m) if matches!(&m.command, Command::QUIT(_))
        )));
        assert!(actions.iter().any(|a| matches!(
            a,
            HandshakeAction::Disconnect(DisconnectReason::SaslAuthenticationFailed)
        )));
    }

    #[test]
    fn test_external_challenge_sends_external_payload_not_plain() {
        // Regression test: `respond_to_sasl_challenge` must dispatch on
        // the mechanism actually selected, not always encode PLAIN.
        let mut config = make_config();
        config.tls_mode = TlsMode::Tls;
        config.sasl_mode = SaslMode::UseIfAvailable;
        config.sasl_mechanisms = vec![SaslMechanism::External];
        // EXTERNAL needs no username/password, only TLS.

        let mut machine = HandshakeMachine::new(config);
        machine.is_tls = true;
        let _ = machine.start();
        let _ = machine.feed(&MessageRef::parse(":server CAP * LS :sasl=EXTERNAL").unwrap());
        let ack_actions = machine.feed(&MessageRef::parse(":server CAP * ACK :sasl").unwrap());
        assert!(ack_actions.iter().any(|a| matches!(
            a,
            HandshakeAction::Send(m) if matches!(&m.command, Command::AUTHENTICATE(s) if s == "EXTERNAL")
        )));

        let actions = machine.feed(&MessageRef::parse("AUTHENTICATE +").unwrap());
        let expected = sasl::encode_external(None);
        assert!(actions.iter().any(|a| matches!(
            a,
            HandshakeAction::Send(m) if matches!(&m.command, Command::AUTHENTICATE(s) if *s == expected)
        )));
    }

    #[test]
    fn test_welcome_then_end_of_motd_completes() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&MessageRef::parse(":server CAP * LS :").unwrap());
        let _ = machine.feed(&MessageRef::parse(":server 001 testbot :Welcome").unwrap());
        assert_eq!(machine.state(), &ClientState::ReceivingServerInfo);

        let actions = machine.feed(&MessageRef::parse(":server 376 testbot :End of MOTD").unwrap());
        assert_eq!(machine.state(), &ClientState::Online);
        assert!(actions
            .iter()
            .any(|a| matches!(a, HandshakeAction::Complete)));
    }

    #[test]
    fn test_sts_upgrade_triggers_reconnect() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();

        let cap_ls = MessageRef::parse(":server CAP * LS :sts=port=6697,duration=600").unwrap();
        let actions = machine.feed(&cap_ls);

        assert!(actions
            .iter()
            .any(|a| matches!(a, HandshakeAction::StsUpgrade(6697))));
        assert_eq!(machine.state(), &ClientState::Disconnected);
    }

    #[test]
    fn test_cap_nak_is_not_fatal() {
        let mut machine = HandshakeMachine::new(make_config());
        let _ = machine.start();
        let _ = machine.feed(&MessageRef::parse(":server CAP * LS :multi-prefix").unwrap());

        let nak = MessageRef::parse(":server CAP * NAK :multi-prefix").unwrap();
        let actions = machine.feed(&nak);

        assert_eq!(machine.state(), &ClientState::Registering);
        assert!(actions
            .iter()
            .any(|a| matches!(a, HandshakeAction::Error(HandshakeError::CapabilityRejected(_)))));
    }
}
