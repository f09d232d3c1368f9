//! Handler table (§4.8, C8).
//!
//! Dispatches one parsed line to the graph/isupport/mode mutations it
//! implies and fans out the resulting [`Event`]s, following the ordering
//! rule of §5: state mutation first, events second, any sends the
//! handler itself issues (auto-`PONG`, nothing else here) last.
//!
//! `CAP`/`AUTHENTICATE`/SASL numerics are owned by
//! [`crate::state::HandshakeMachine`] and are not re-handled here;
//! [`HandlerTable::handle`] is meant to run once the connection is past
//! `SaslAuthenticating`, alongside the handshake machine during the
//! `ReceivingServerInfo` burst.

use chrono::Utc;

use crate::ctcp::Ctcp;
use crate::event::Event;
use crate::graph::Graph;
use crate::isupport::{ChanModesState, Isupport, IsupportState};
use crate::message::{Message, MessageRef};
use crate::monitor::MonitorList;
use crate::sts::{StsOutcome, StsStore};

/// Classification of a `PRIVMSG`/`NOTICE`/`MODE` target string (§4.8
/// "Message dispatch target classification").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// A plain channel name.
    Channel(String),
    /// A channel name prefixed by one or more status-prefix symbols
    /// (e.g. `@#rust` = "ops and above in #rust").
    StatusChannel { prefixes: Vec<char>, channel: String },
    /// A nickname (private message).
    Private(String),
    /// A `$`-prefixed broadcast target.
    Broadcast(String),
}

/// Classify `target` by its leading characters against the current
/// ISUPPORT-derived channel types and status prefixes.
pub fn classify_target(isupport: &IsupportState, target: &str) -> TargetKind {
    if let Some(rest) = target.strip_prefix('$') {
        return TargetKind::Broadcast(rest.to_string());
    }

    let mut prefixes = Vec::new();
    let mut rest = target;
    while let Some(c) = rest.chars().next() {
        if isupport.chan_types.contains(&c) {
            if prefixes.is_empty() {
                return TargetKind::Channel(rest.to_string());
            }
            return TargetKind::StatusChannel {
                prefixes,
                channel: rest.to_string(),
            };
        }
        if let Some((_, symbol)) = isupport.status_prefixes.iter().find(|(_, sym)| *sym == c) {
            prefixes.push(*symbol);
            rest = &rest[c.len_utf8()..];
            continue;
        }
        break;
    }

    TargetKind::Private(target.to_string())
}

/// Output of handling one line: the local user/channel-graph mutations
/// already happened by the time this is returned; `sends` are messages
/// the handler itself needs written back (currently only auto-`PONG`).
#[derive(Clone, Debug, Default)]
pub struct HandlerOutput {
    pub events: Vec<Event>,
    pub sends: Vec<Message>,
}

impl HandlerOutput {
    fn events(events: Vec<Event>) -> Self {
        HandlerOutput {
            events,
            sends: Vec::new(),
        }
    }
}

/// Owns the non-handshake connection state a handler table mutates:
/// the user/channel graph, accumulated ISUPPORT tokens, and the STS
/// policy store.
#[derive(Debug)]
pub struct HandlerTable {
    pub graph: Graph,
    pub isupport: IsupportState,
    pub sts: StsStore,
    pub monitor: MonitorList,
    pub server_name: Option<String>,
    pub user_modes: std::collections::HashSet<char>,
    names_in_progress: std::collections::HashSet<String>,
    monitor_list_pending: bool,
}

impl HandlerTable {
    pub fn new(local_nickname: impl Into<String>) -> Self {
        HandlerTable {
            graph: Graph::new(local_nickname, crate::casemap::CaseMapping::Rfc1459),
            isupport: IsupportState::new(),
            sts: StsStore::new(),
            monitor: MonitorList::new(),
            server_name: None,
            user_modes: std::collections::HashSet::new(),
            names_in_progress: std::collections::HashSet::new(),
            monitor_list_pending: false,
        }
    }

    /// Dispatch one parsed line. `is_tls` is needed for STS (§4.11).
    pub fn handle(&mut self, msg: &MessageRef<'_>, is_tls: bool) -> HandlerOutput {
        match msg.command.name {
            "001" => self.handle_welcome(msg),
            "005" => self.handle_isupport(msg),
            "221" => self.handle_umodeis(msg),
            "301" => self.handle_away(msg, true),
            "305" => self.handle_unaway(msg),
            "306" => self.handle_nowaway(msg),
            "311" => self.handle_whoisuser(msg),
            "324" => self.handle_channelmodeis(msg),
            "329" => self.handle_creationtime(msg),
            "330" => self.handle_whoisaccount(msg),
            "332" => self.handle_topic(msg),
            "333" => self.handle_topicwhotime(msg),
            "352" => self.handle_whoreply(msg),
            "353" => self.handle_namreply(msg),
            "366" => self.handle_endofnames(msg),
            "346" => self.handle_invitelist(msg),
            "347" => self.handle_endofinvitelist(msg),
            "348" => self.handle_exceptlist(msg),
            "349" => self.handle_endofexceptlist(msg),
            "367" => self.handle_banlist(msg),
            "368" => self.handle_endofbanlist(msg),
            "730" => self.handle_mononline(msg),
            "731" => self.handle_monoffline(msg),
            "732" => self.handle_monlist(msg),
            "733" => self.handle_endofmonlist(msg),
            "734" => self.handle_monlistfull(msg),
            "JOIN" => self.handle_join(msg),
            "PART" => self.handle_part(msg),
            "KICK" => self.handle_kick(msg),
            "QUIT" => self.handle_quit(msg),
            "NICK" => self.handle_nick(msg),
            "MODE" => self.handle_mode(msg),
            "CHGHOST" => self.handle_chghost(msg),
            "ACCOUNT" => self.handle_account(msg),
            "AWAY" => self.handle_self_away(msg),
            "TOPIC" => self.handle_topic_set(msg),
            "INVITE" => self.handle_invite(msg),
            "PING" => self.handle_ping(msg),
            "PRIVMSG" => self.handle_privmsg(msg, false),
            "NOTICE" => self.handle_privmsg(msg, true),
            "TAGMSG" => self.handle_tagmsg(msg),
            "ERROR" => self.handle_error(msg),
            _ => HandlerOutput::default(),
        }
    }

    fn handle_welcome(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        if let Some(nick) = msg.arg(0) {
            self.graph.set_local_nickname(nick);
        }
        HandlerOutput::default()
    }

    fn handle_isupport(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        if let Some(isupport) = Isupport::from_message_ref(msg) {
            self.isupport.apply_line(&isupport);
        }
        HandlerOutput::default()
    }

    fn handle_umodeis(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        self.user_modes.clear();
        if let Some(modes) = msg.arg(1) {
            for c in modes.chars().filter(|c| *c != '+' && *c != '-') {
                self.user_modes.insert(c);
            }
        }
        HandlerOutput::default()
    }

    fn target_nick(&self, msg: &MessageRef<'_>) -> Option<String> {
        msg.arg(1).map(str::to_string)
    }

    fn handle_away(&mut self, msg: &MessageRef<'_>, away: bool) -> HandlerOutput {
        let Some(nick) = self.target_nick(msg) else {
            return HandlerOutput::default();
        };
        let reason = if away { msg.arg(2) } else { None };
        let events = self.graph.on_away(&nick, reason, Some(Utc::now().timestamp()));
        HandlerOutput::events(events)
    }

    fn handle_unaway(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let nick = self.graph.local_nickname().to_string();
        let _ = msg;
        let events = self.graph.on_away(&nick, None, None);
        HandlerOutput::events(events)
    }

    fn handle_nowaway(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let nick = self.graph.local_nickname().to_string();
        let events = self.graph.on_away(&nick, Some("away"), Some(Utc::now().timestamp()));
        let _ = msg;
        HandlerOutput::events(events)
    }

    fn handle_whoisuser(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(nick), Some(ident), Some(host)) = (msg.arg(1), msg.arg(2), msg.arg(3)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.observe_whois_user(nick, ident, host))
    }

    fn handle_channelmodeis(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(modes)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        let params: Vec<&str> = msg.command.args.iter().skip(3).copied().collect();
        let events = self
            .graph
            .apply_channel_modes(channel, &self.isupport.chan_modes.clone(), modes, &params, true);
        HandlerOutput::events(events)
    }

    fn handle_creationtime(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(ts)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        let Ok(ts) = ts.parse::<i64>() else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.set_created_at(channel, ts))
    }

    fn handle_whoisaccount(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(nick), Some(account)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.on_account(nick, Some(account)))
    }

    fn handle_topic(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(topic)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.set_topic(channel, Some(topic), None))
    }

    fn handle_topicwhotime(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(setter)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        let existing_topic = self.graph.channel(channel).and_then(|c| c.topic.clone());
        HandlerOutput::events(self.graph.set_topic(channel, existing_topic.as_deref(), Some(setter)))
    }

    fn handle_whoreply(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(ident), Some(host), _server, Some(nick)) =
            (msg.arg(1), msg.arg(2), msg.arg(3), msg.arg(4), msg.arg(5))
        else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.observe_who(nick, ident, host, channel))
    }

    fn handle_namreply(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(names)) = (msg.arg(2), msg.arg(3)) else {
            return HandlerOutput::default();
        };
        if self.names_in_progress.insert(channel.to_string()) {
            self.graph.begin_names(channel);
        }
        let mut events = Vec::new();
        for entry in names.split_whitespace() {
            let (prefixes, rest) = split_status_prefixes(&self.isupport, entry);
            let nick = strip_userhost(rest);
            events.extend(self.graph.on_names_entry(channel, nick, &prefixes, &self.isupport));
        }
        HandlerOutput::events(events)
    }

    fn handle_endofnames(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(channel) = msg.arg(1) else {
            return HandlerOutput::default();
        };
        self.names_in_progress.remove(channel);
        HandlerOutput::events(self.graph.end_names(channel))
    }

    fn handle_mononline(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(list) = msg.arg(1) else {
            return HandlerOutput::default();
        };
        let mut events = Vec::new();
        for nick in list.split(',') {
            let nick = strip_userhost(nick.trim());
            events.extend(self.graph.set_monitored(nick, true));
            events.push(Event::MonitorOnline {
                nickname: nick.to_string(),
            });
        }
        HandlerOutput::events(events)
    }

    fn handle_monoffline(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(list) = msg.arg(1) else {
            return HandlerOutput::default();
        };
        let mut events = Vec::new();
        for nick in list.split(',') {
            events.push(Event::MonitorOffline {
                nickname: nick.trim().to_string(),
            });
        }
        HandlerOutput::events(events)
    }

    fn handle_monlist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(list) = msg.arg(1) else {
            return HandlerOutput::default();
        };
        if !self.monitor_list_pending {
            self.monitor_list_pending = true;
            self.monitor.begin_list();
        }
        for nick in list.split(',') {
            let nick = strip_userhost(nick.trim());
            if !nick.is_empty() {
                self.monitor.observe_list_entry(nick);
            }
        }
        HandlerOutput::default()
    }

    fn handle_endofmonlist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let _ = msg;
        self.monitor_list_pending = false;
        self.monitor.end_list();
        HandlerOutput::events(vec![Event::MonitorListComplete])
    }

    fn handle_monlistfull(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let nicknames = msg
            .arg(2)
            .map(|list| list.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        HandlerOutput::events(vec![Event::MonitorListFull { nicknames }])
    }

    fn handle_banlist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(mask)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::BanListEntry {
            channel: channel.to_string(),
            mask: mask.to_string(),
            set_by: msg.arg(3).map(str::to_string),
            set_at: msg.arg(4).and_then(|s| s.parse::<i64>().ok()),
        }])
    }

    fn handle_endofbanlist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(channel) = msg.arg(1) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::BanListComplete {
            channel: channel.to_string(),
        }])
    }

    fn handle_exceptlist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(mask)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::ExceptListEntry {
            channel: channel.to_string(),
            mask: mask.to_string(),
        }])
    }

    fn handle_endofexceptlist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(channel) = msg.arg(1) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::ExceptListComplete {
            channel: channel.to_string(),
        }])
    }

    fn handle_invitelist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let (Some(channel), Some(mask)) = (msg.arg(1), msg.arg(2)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::InviteExceptListEntry {
            channel: channel.to_string(),
            mask: mask.to_string(),
        }])
    }

    fn handle_endofinvitelist(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(channel) = msg.arg(1) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::InviteExceptListComplete {
            channel: channel.to_string(),
        }])
    }

    fn handle_join(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(nick) = prefix.nick else {
            return HandlerOutput::default();
        };
        let Some(channel) = msg.arg(0) else {
            return HandlerOutput::default();
        };
        let owned = crate::prefix::Prefix::Nickname(
            nick.to_string(),
            prefix.user.unwrap_or("").to_string(),
            prefix.host.unwrap_or("").to_string(),
        );
        HandlerOutput::events(self.graph.on_join(&owned, channel))
    }

    fn handle_part(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(nick) = prefix.nick else {
            return HandlerOutput::default();
        };
        let Some(channel) = msg.arg(0) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.on_part(nick, channel, msg.arg(1)))
    }

    fn handle_kick(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(by) = prefix.nick else {
            return HandlerOutput::default();
        };
        let (Some(channel), Some(target)) = (msg.arg(0), msg.arg(1)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.on_kick(by, target, channel, msg.arg(2)))
    }

    fn handle_quit(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(nick) = prefix.nick else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.on_quit(nick, msg.arg(0)))
    }

    fn handle_nick(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(old) = prefix.nick else {
            return HandlerOutput::default();
        };
        let Some(new) = msg.arg(0) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.on_nick_change(old, new))
    }

    fn handle_mode(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(target) = msg.arg(0) else {
            return HandlerOutput::default();
        };
        match classify_target(&self.isupport, target) {
            TargetKind::Channel(channel) | TargetKind::StatusChannel { channel, .. } => {
                let Some(modes) = msg.arg(1) else {
                    return HandlerOutput::default();
                };
                let params: Vec<&str> = msg.command.args.iter().skip(2).copied().collect();
                let taxonomy = self.isupport.chan_modes.clone();
                HandlerOutput::events(self.graph.apply_channel_modes(&channel, &taxonomy, modes, &params, false))
            }
            TargetKind::Private(nick) if self.graph.local_nickname() == nick => {
                let Some(modes) = msg.arg(1) else {
                    return HandlerOutput::default();
                };
                let (mut added, mut removed) = (Vec::new(), Vec::new());
                let mut adding = true;
                for c in modes.chars() {
                    match c {
                        '+' => adding = true,
                        '-' => adding = false,
                        c if adding => {
                            self.user_modes.insert(c);
                            added.push(c);
                        }
                        c => {
                            self.user_modes.remove(&c);
                            removed.push(c);
                        }
                    }
                }
                HandlerOutput::events(vec![Event::UserModesChanged { added, removed }])
            }
            _ => HandlerOutput::default(),
        }
    }

    fn handle_chghost(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(nick) = prefix.nick else {
            return HandlerOutput::default();
        };
        let (Some(ident), Some(host)) = (msg.arg(0), msg.arg(1)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.on_chghost(nick, ident, host))
    }

    fn handle_account(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(nick) = prefix.nick else {
            return HandlerOutput::default();
        };
        let account = msg.arg(0).filter(|a| *a != "*");
        HandlerOutput::events(self.graph.on_account(nick, account))
    }

    fn handle_self_away(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let Some(nick) = prefix.nick else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.on_away(nick, msg.arg(0), Some(Utc::now().timestamp())))
    }

    fn handle_topic_set(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let setter = prefix.nick.unwrap_or("");
        let (Some(channel), topic) = (msg.arg(0), msg.arg(1)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(self.graph.set_topic(channel, topic, Some(setter)))
    }

    fn handle_invite(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let by = prefix.nick.unwrap_or("").to_string();
        let (Some(target), Some(channel)) = (msg.arg(0), msg.arg(1)) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::Invited {
            channel: channel.to_string(),
            by,
            target: target.to_string(),
        }])
    }

    fn handle_ping(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let token = msg.arg(0).unwrap_or("").to_string();
        HandlerOutput {
            events: Vec::new(),
            sends: vec![Message::pong(token)],
        }
    }

    fn handle_privmsg(&mut self, msg: &MessageRef<'_>, is_notice: bool) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let from = prefix.nick.unwrap_or("").to_string();
        let (Some(target), Some(trailing)) = (msg.arg(0), msg.arg(1)) else {
            return HandlerOutput::default();
        };

        if let Some(ctcp) = Ctcp::parse(trailing) {
            let event = if ctcp.kind == crate::ctcp::CtcpKind::Action {
                Event::Action {
                    from,
                    target: target.to_string(),
                    text: ctcp.params.unwrap_or("").to_string(),
                }
            } else {
                Event::Ctcp {
                    from,
                    target: target.to_string(),
                    command: ctcp.command.to_string(),
                    params: ctcp.params.map(str::to_string),
                    is_notice,
                }
            };
            return HandlerOutput::events(vec![event]);
        }

        HandlerOutput::events(vec![Event::Message {
            from,
            target: target.to_string(),
            text: trailing.to_string(),
            is_notice,
        }])
    }

    fn handle_tagmsg(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        let Some(prefix) = &msg.prefix else {
            return HandlerOutput::default();
        };
        let from = prefix.nick.unwrap_or("").to_string();
        let Some(target) = msg.arg(0) else {
            return HandlerOutput::default();
        };
        HandlerOutput::events(vec![Event::TagMessage {
            from,
            target: target.to_string(),
        }])
    }

    fn handle_error(&mut self, msg: &MessageRef<'_>) -> HandlerOutput {
        HandlerOutput::events(vec![Event::ServerError {
            message: msg.arg(0).unwrap_or(msg.raw).to_string(),
        }])
    }

    /// Feed an `sts` capability value (from CAP LS/NEW) through the
    /// policy store.
    pub fn apply_sts(&mut self, value: &str, is_tls: bool) -> StsOutcome {
        self.sts.apply(value, is_tls)
    }
}

/// Split a `NAMES`-reply entry's leading run of status-prefix symbols
/// from the nickname that follows (§4.8).
fn split_status_prefixes<'a>(isupport: &IsupportState, entry: &'a str) -> (String, &'a str) {
    let mut prefixes = String::new();
    let mut rest = entry;
    while let Some(c) = rest.chars().next() {
        if isupport.status_prefixes.iter().any(|(_, sym)| *sym == c) {
            prefixes.push(c);
            rest = &rest[c.len_utf8()..];
        } else {
            break;
        }
    }
    (prefixes, rest)
}

/// Strip a `userhost-in-names` (`nick!ident@host`) suffix down to the
/// bare nickname.
fn strip_userhost(entry: &str) -> &str {
    entry.split(['!', '@']).next().unwrap_or(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_plain_channel() {
        let isupport = IsupportState::new();
        assert_eq!(
            classify_target(&isupport, "#rust"),
            TargetKind::Channel("#rust".to_string())
        );
    }

    #[test]
    fn classify_status_prefixed_channel() {
        let isupport = IsupportState::new();
        assert_eq!(
            classify_target(&isupport, "@#rust"),
            TargetKind::StatusChannel {
                prefixes: vec!['@'],
                channel: "#rust".to_string(),
            }
        );
    }

    #[test]
    fn classify_broadcast_and_private() {
        let isupport = IsupportState::new();
        assert_eq!(
            classify_target(&isupport, "$*"),
            TargetKind::Broadcast("*".to_string())
        );
        assert_eq!(
            classify_target(&isupport, "alice"),
            TargetKind::Private("alice".to_string())
        );
    }

    #[test]
    fn ping_auto_replies_pong_with_token() {
        let mut table = HandlerTable::new("me");
        let msg = MessageRef::parse("PING :abc123").unwrap();
        let out = table.handle(&msg, false);
        assert_eq!(out.sends.len(), 1);
        assert_eq!(out.sends[0].to_string().trim(), "PONG :abc123");
    }

    #[test]
    fn privmsg_ctcp_action_dispatches_as_action_event() {
        let mut table = HandlerTable::new("me");
        let msg = MessageRef::parse(":bob!u@h PRIVMSG #rust :\x01ACTION waves\x01").unwrap();
        let out = table.handle(&msg, false);
        assert_eq!(
            out.events[0],
            Event::Action {
                from: "bob".to_string(),
                target: "#rust".to_string(),
                text: "waves".to_string(),
            }
        );
    }

    #[test]
    fn join_then_part_round_trips_through_graph() {
        let mut table = HandlerTable::new("me");
        let join = MessageRef::parse(":me!u@h JOIN #rust").unwrap();
        table.handle(&join, false);
        assert!(table.graph.channel("#rust").is_some());

        let part = MessageRef::parse(":me!u@h PART #rust :bye").unwrap();
        table.handle(&part, false);
        assert!(table.graph.channel("#rust").is_none());
    }

    #[test]
    fn isupport_tokens_are_applied() {
        let mut table = HandlerTable::new("me");
        let msg = MessageRef::parse(":irc.example 005 me CASEMAPPING=ascii CHANTYPES=# :are supported").unwrap();
        table.handle(&msg, false);
        assert_eq!(table.isupport.case_mapping, crate::casemap::CaseMapping::Ascii);
    }
}
