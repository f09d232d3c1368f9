//! The application-visible event surface (§4.8, §9 "Property-change
//! notifications").
//!
//! Every state mutation that crosses the public boundary is represented by
//! one [`Event`] variant. [`crate::graph::Graph`] emits the identity/
//! membership events; [`crate::handler`] fans a parsed line out into these
//! plus whatever [`crate::mode::ModeKind`] and [`crate::sasl`] contribute.
//! The ordering rule of §5 applies: state mutations happen before the
//! events describing them are returned.

use crate::mode::ModeKind;
use crate::state::HandshakeError;

/// Everything the connection can report to an application.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A previously-unknown user was observed (§3: "created by handlers in
    /// response to lines").
    UserAppeared { nickname: String },
    /// A user is no longer referenced by any channel or the monitor list
    /// (`is_seen = false`, §3).
    UserDisappeared { nickname: String },
    /// The local user, or a peer, changed nickname.
    NickChanged { old_nick: String, new_nick: String },
    /// `CHGHOST` or a NAMES/WHO update changed a user's ident/host.
    HostChanged {
        nickname: String,
        ident: String,
        host: String,
    },
    /// `ACCOUNT` (or `extended-join`/WHOIS) changed a user's logged-in
    /// account; `None` means logged out (`ACCOUNT *`).
    AccountChanged {
        nickname: String,
        account: Option<String>,
    },
    /// `AWAY`/`RPL_AWAY`/`RPL_UNAWAY` changed a user's away status.
    AwayChanged {
        nickname: String,
        reason: Option<String>,
    },

    /// A channel was created (self-JOIN, §3 Lifecycle).
    ChannelCreated { channel: String },
    /// A channel was destroyed (self-PART/KICK/QUIT, §3 Lifecycle).
    ChannelDestroyed { channel: String },
    /// Someone joined a channel we are tracking.
    Joined { channel: String, nickname: String },
    /// Someone parted a channel we are tracking.
    Parted {
        channel: String,
        nickname: String,
        message: Option<String>,
    },
    /// Someone was kicked from a channel we are tracking.
    Kicked {
        channel: String,
        nickname: String,
        by: String,
        message: Option<String>,
    },
    /// A user quit the network.
    Quit {
        nickname: String,
        message: Option<String>,
    },
    /// The channel topic changed (`TOPIC` or `RPL_TOPIC`/`RPL_TOPICWHOTIME`).
    TopicChanged {
        channel: String,
        topic: Option<String>,
        setter: Option<String>,
    },
    /// Channel creation timestamp learned via `RPL_CREATIONTIME`.
    ChannelTimestamp { channel: String, timestamp: i64 },
    /// The end of a `NAMES` burst; membership for `channel` is now
    /// authoritative (stale members not in the burst are evicted first).
    NamesComplete { channel: String },

    /// One or more mode changes applied to a channel (§4.5); `changes` is
    /// in the order the mode letters appeared on the wire. Always
    /// accompanied by the per-mode fan-out events below, emitted right
    /// after this one in the same order (§4.5: "Batch all derived events
    /// into a single `ChannelModesSet`/`ChannelModesGet`... then fan out
    /// per-mode events in the order they appear").
    ChannelModesChanged {
        channel: String,
        changes: Vec<ModeKind>,
    },
    /// A status (`S`-group) mode transitioned for a member, e.g. `+o`/`-v`
    /// (§4.5, §8: "every `+X`/`-X` on a status mode appears as a
    /// `ChannelStatusChanged` iff the target's status changed").
    ChannelStatusChanged {
        channel: String,
        nickname: String,
        mode: char,
        added: bool,
    },
    /// `+b` added a ban mask.
    ChannelBanAdded { channel: String, mask: String },
    /// `-b` removed a ban mask.
    ChannelBanRemoved { channel: String, mask: String },
    /// An `A`-group list mode other than ban (`e`/`I`/...) gained an entry.
    ChannelListModeAdded {
        channel: String,
        mode: char,
        mask: String,
    },
    /// An `A`-group list mode other than ban lost an entry.
    ChannelListModeRemoved {
        channel: String,
        mode: char,
        mask: String,
    },
    /// `+k` set the channel key.
    ChannelKeySet { channel: String, key: String },
    /// `-k` cleared the channel key.
    ChannelKeyRemoved { channel: String },
    /// `+l` set the channel's user limit.
    ChannelLimitSet { channel: String, limit: usize },
    /// `-l` cleared the channel's user limit.
    ChannelLimitRemoved { channel: String },
    /// A `B`-group mode other than `k` was set with its parameter.
    ChannelModeParamSet {
        channel: String,
        mode: char,
        value: String,
    },
    /// A `B`-group mode other than `k` was unset.
    ChannelModeParamUnset { channel: String, mode: char },
    /// A `D`-group no-argument flag was set.
    ChannelModeFlagSet { channel: String, mode: char },
    /// A `D`-group no-argument flag was unset.
    ChannelModeFlagUnset { channel: String, mode: char },
    /// A mode letter the server never classified via `CHANMODES`/`PREFIX`.
    ChannelModeUnknown {
        channel: String,
        mode: char,
        value: Option<String>,
    },
    /// Changes to the local user's own mode string (`RPL_UMODEIS`/`MODE`
    /// targeting ourselves).
    UserModesChanged { added: Vec<char>, removed: Vec<char> },

    /// `INVITE` received or observed via `invite-notify`.
    Invited {
        channel: String,
        by: String,
        target: String,
    },
    /// A `PRIVMSG`/`NOTICE` that wasn't CTCP-framed.
    Message {
        from: String,
        target: String,
        text: String,
        is_notice: bool,
    },
    /// A CTCP request or reply (`\x01COMMAND args\x01`), `ACTION` excluded
    /// (see [`Event::Action`]).
    Ctcp {
        from: String,
        target: String,
        command: String,
        params: Option<String>,
        is_notice: bool,
    },
    /// A `/me does something` CTCP ACTION.
    Action {
        from: String,
        target: String,
        text: String,
    },
    /// A `TAGMSG` (carries only tags, no text).
    TagMessage { from: String, target: String },

    /// `MONITOR`/`WATCH` reported a tracked nickname coming online.
    MonitorOnline { nickname: String },
    /// `MONITOR`/`WATCH` reported a tracked nickname going offline.
    MonitorOffline { nickname: String },
    /// `RPL_ENDOFMONLIST`/`RPL_ENDOFWATCHLIST`: the monitor list now
    /// reflects exactly what the server just enumerated.
    MonitorListComplete,
    /// `ERR_MONLISTFULL`: the requested addition(s) would exceed
    /// `monitor_limit`.
    MonitorListFull { nicknames: Vec<String> },

    /// `RPL_BANLIST` (`+b`) streaming entry for a channel's ban list.
    BanListEntry {
        channel: String,
        mask: String,
        set_by: Option<String>,
        set_at: Option<i64>,
    },
    /// `RPL_ENDOFBANLIST`.
    BanListComplete { channel: String },
    /// `RPL_EXCEPTLIST` (`+e`) streaming entry.
    ExceptListEntry { channel: String, mask: String },
    /// `RPL_ENDOFEXCEPTLIST`.
    ExceptListComplete { channel: String },
    /// `RPL_INVITELIST` (`+I`, invex) streaming entry.
    InviteExceptListEntry { channel: String, mask: String },
    /// `RPL_ENDOFINVITELIST`.
    InviteExceptListComplete { channel: String },

    /// `STS` fired an upgrade to TLS on the given port (§4.11).
    StsUpgrade { port: u16 },

    /// A non-fatal problem surfaced by a handler or the handshake FSM.
    Exception { message: String, fatal: bool },
    /// A handshake-level problem (capability rejection, SASL failure,
    /// nickname collision, ...).
    Handshake(HandshakeError),
    /// The server sent `ERROR`, or the socket closed.
    ServerError { message: String },
}
