//! # ircaster
//!
//! A Rust library for parsing and serializing IRC protocol messages,
//! with full support for IRCv3 extensions.
//!
//! ## Features
//!
//! - IRC message parsing with tags, prefixes, commands, and parameters
//! - IRCv3 capability negotiation and message tags
//! - Zero-copy parsing with borrowed message types
//! - Optional Tokio integration for async networking
//! - User and channel mode parsing
//! - ISUPPORT (RPL_ISUPPORT) parsing
//! - Convenient message construction with builder pattern

#![deny(clippy::all)]
// TODO: Enable once documentation coverage is complete
// #![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Creating IRC Messages
//!
//! ```rust
//! use ircaster::{Message, prefix::Prefix};
//!
//! // Basic message construction
//! let privmsg = Message::privmsg("#rust", "Hello, world!");
//! let notice = Message::notice("nick", "Server notice");
//! let join = Message::join("#channel");
//!
//! // Messages with IRCv3 tags and prefixes
//! let tagged_msg = Message::privmsg("#dev", "Tagged message")
//!     .with_tag("time", Some("2023-01-01T12:00:00Z"))
//!     .with_tag("msgid", Some("abc123"))
//!     .with_prefix(Prefix::new_from_str("bot!bot@example.com"));
//!
//! println!("{}", tagged_msg); // Serializes to IRC protocol format
//! ```
//!
//! ### Parsing IRC Messages
//!
//! ```rust
//! use ircaster::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message: Message = raw.parse().expect("Valid IRC message");
//!
//! if let Some(tags) = &message.tags {
//!     println!("Message has {} tags", tags.len());
//! }
//! ```
//!
//! ## Acknowledgments
//!
//! This project was inspired by the architectural patterns established by
//! [Aaron Weiss (aatxe)](https://github.com/aatxe) in the
//! [irc](https://github.com/aatxe/irc) crate. We are grateful for Aaron's
//! foundational work on IRC protocol handling in Rust.

pub mod caps;
pub mod chan;
pub mod command;
pub mod ctcp;
pub mod error;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod registry;
pub mod response;
pub mod sasl;
pub mod isupport;
pub mod util;
pub mod validation;

pub use self::caps::{Capability, NegotiationVersion};
pub use self::chan::ChannelExt;
pub use self::command::{BatchSubCommand, CapSubCommand, Command};
pub use self::ctcp::{Ctcp, CtcpKind, CtcpOwned};

pub use self::command::{CommandRef, CommandRefEnum};
pub use self::message::{Message, Tag};
pub use self::mode::{ChannelMode, Mode, ModeEngine, ModeKind, UserMode};
pub use self::prefix::Prefix;
pub use self::prefix::PrefixRef;
pub use self::message::MessageRef;
pub use self::registry::Registry;
pub use self::response::Response;
pub use self::sasl::{SaslMechanism, SaslState, encode_plain, encode_external};
pub use self::isupport::{Isupport, IsupportEntry, IsupportState, PrefixSpec, ChanModes, TargMax, MaxList};
pub use self::validation::ValidationError;

pub mod casemap;
pub use self::casemap::{CaseMapping, FoldedKey, irc_to_lower, irc_eq};

pub mod ircv3;
pub use self::ircv3::{generate_msgid, generate_batch_ref, format_server_time, format_timestamp};

#[cfg(feature = "tokio")]
pub mod transport;
#[cfg(feature = "tokio")]
pub use self::transport::{Transport, TransportReadError, MAX_IRC_LINE_LEN};

pub mod state;
pub use self::state::{
    ClientState, DisconnectReason, HandshakeAction, HandshakeConfig, HandshakeError,
    HandshakeMachine, SaslCredentials,
};

pub mod event;
pub use self::event::Event;

pub mod graph;
pub use self::graph::{Channel, ChannelUser, Graph, User};

pub mod sts;
pub use self::sts::{StsPolicy, StsStore};

pub mod monitor;
pub use self::monitor::MonitorList;

pub mod async_request;
pub use self::async_request::{AsyncRequest, AsyncRequestRegistry, RequestId};

pub mod handler;
pub use self::handler::{HandlerOutput, HandlerTable, TargetKind};

#[cfg(feature = "tokio")]
pub mod client;
#[cfg(feature = "tokio")]
pub use self::client::Client;
