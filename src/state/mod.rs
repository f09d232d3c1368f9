//! Sans-IO connection lifecycle state machine (§4.9, C9).
//!
//! This module provides a "sans-IO" state machine for managing IRC connection
//! lifecycle. It does not perform actual I/O—instead, it consumes parsed
//! messages and timer expirations and produces actions (messages to send,
//! TLS handshakes to perform, reconnects to initiate).
//!
//! # Design Philosophy
//!
//! The state machine is designed to be:
//! - **Sans-IO**: No network calls, timers, or blocking. Pure state transitions.
//! - **Runtime-agnostic**: Works with tokio, async-std, or blocking code.
//! - **Testable**: Easy to unit test without mocking network.
//!
//! # Example
//!
//! ```
//! use ircaster::state::{HandshakeMachine, HandshakeConfig};
//! use ircaster::MessageRef;
//!
//! let config = HandshakeConfig {
//!     nickname: "testbot".to_string(),
//!     username: "bot".to_string(),
//!     realname: "Test Bot".to_string(),
//!     ..Default::default()
//! };
//!
//! let mut machine = HandshakeMachine::new(config);
//!
//! // Get initial actions (CAP LS, NICK, USER)
//! let actions = machine.start();
//! for action in actions {
//!     // Send action.message() to server
//! }
//!
//! // Feed server responses
//! let cap_ls = MessageRef::parse(":server CAP * LS :multi-prefix sasl").unwrap();
//! let actions = machine.feed(&cap_ls);
//! // Process actions...
//! ```

mod sync;
mod tracker;

pub use tracker::{
    ClientState, DisconnectReason, HandshakeAction, HandshakeConfig, HandshakeError,
    HandshakeMachine, SaslCredentials, SaslMode, TlsMode, STARTTLS_PROBE_SECS,
};
