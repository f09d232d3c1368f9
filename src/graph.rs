//! User/channel membership graph (§3, §4.6, C6).
//!
//! `Graph` holds every user and channel the connection currently has a
//! reason to track. A user exists only while it is *seen*: referenced by
//! at least one tracked channel's membership, or explicitly monitored
//! (§3 "no entity survives its last reference"). Channels exist from the
//! local user's own `JOIN` until its own `PART`/`KICK`, or until the
//! connection quits.

use std::collections::HashSet;

use crate::casemap::CaseMapping;
use crate::event::Event;
use crate::isupport::IsupportState;
use crate::mode::{ModeEngine, ModeKind};
use crate::prefix::Prefix;
use crate::registry::Registry;

/// A tracked network user.
///
/// Fields beyond `nickname` are filled in opportunistically as lines
/// mention them (a hostmask on a `JOIN`, `RPL_WHOISUSER`, `CHGHOST`, ...);
/// absence just means "not yet observed", never "known to be empty".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    pub nickname: String,
    pub ident: Option<String>,
    pub host: Option<String>,
    pub real_name: Option<String>,
    pub account: Option<String>,
    pub away_reason: Option<String>,
    pub away_since: Option<i64>,
    pub is_oper: bool,
    /// Explicitly tracked via `MONITOR`/`WATCH`, independent of shared
    /// channel membership.
    pub is_monitored: bool,
    /// Names of channels this connection believes the user is a member of.
    pub channels: HashSet<String>,
}

impl User {
    fn new(nickname: impl Into<String>) -> Self {
        User {
            nickname: nickname.into(),
            ..Default::default()
        }
    }

    /// A user is kept only while referenced by channel membership or the
    /// monitor list (§3).
    pub fn is_seen(&self) -> bool {
        self.is_monitored || !self.channels.is_empty()
    }

    fn apply_hostmask(&mut self, ident: &str, host: &str) {
        self.ident = Some(ident.to_string());
        self.host = Some(host.to_string());
    }
}

/// A single member's per-channel state: the status modes they hold there.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelUser {
    pub nickname: String,
    pub statuses: HashSet<char>,
}

/// A tracked channel and its membership.
#[derive(Clone, Debug)]
pub struct Channel {
    pub name: String,
    pub topic: Option<String>,
    pub topic_setter: Option<String>,
    pub created_at: Option<i64>,
    pub users: Registry<ChannelUser>,
    mode_engine: ModeEngine,
    /// Set once a `NAMES` burst is underway, so the end-of-burst handler
    /// can evict members the burst didn't re-mention.
    names_burst: Option<HashSet<String>>,
}

impl Channel {
    fn new(name: impl Into<String>, mapping: CaseMapping) -> Self {
        Channel {
            name: name.into(),
            topic: None,
            topic_setter: None,
            created_at: None,
            users: Registry::new(mapping),
            mode_engine: ModeEngine::new(),
            names_burst: None,
        }
    }

    pub fn modes(&self) -> &crate::mode::ModeSet {
        self.mode_engine.modes()
    }
}

/// The user/channel membership graph for a single connection.
///
/// `local_nickname` identifies which `JOIN`/`PART`/`KICK` targets the
/// connection's own membership (creating or destroying a `Channel`)
/// versus a peer's (just mutating one).
#[derive(Clone, Debug)]
pub struct Graph {
    users: Registry<User>,
    channels: Registry<Channel>,
    local_nickname: String,
}

impl Graph {
    pub fn new(local_nickname: impl Into<String>, mapping: CaseMapping) -> Self {
        Graph {
            users: Registry::new(mapping),
            channels: Registry::new(mapping),
            local_nickname: local_nickname.into(),
        }
    }

    pub fn local_nickname(&self) -> &str {
        &self.local_nickname
    }

    pub fn set_local_nickname(&mut self, nickname: impl Into<String>) {
        self.local_nickname = nickname.into();
    }

    fn is_local(&self, nickname: &str, mapping: CaseMapping) -> bool {
        mapping.eq(&self.local_nickname, nickname)
    }

    pub fn user(&self, nickname: &str) -> Option<&User> {
        self.users.get(nickname)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Re-key both registries after a `CASEMAPPING` change (§4.9
    /// `CaseMappingCollision`).
    pub fn rebuild(&mut self, mapping: CaseMapping) -> Result<(), crate::error::ProtocolError> {
        self.users.rebuild(mapping)?;
        for channel in self.channels.values_mut() {
            channel.users.rebuild(mapping)?;
        }
        self.channels.rebuild(mapping)
    }

    /// Get or create a user entry, updating any hostmask fields present.
    /// A `'*'` component (as WHOX and some hostmasks use for "unknown")
    /// never overwrites a known value.
    fn get_or_create_user(
        &mut self,
        nickname: &str,
        ident: Option<&str>,
        host: Option<&str>,
        events: &mut Vec<Event>,
    ) {
        let is_new = self.users.get(nickname).is_none();
        if is_new {
            self.users.add(nickname, User::new(nickname));
            events.push(Event::UserAppeared {
                nickname: nickname.to_string(),
            });
        }
        let user = self.users.get_mut(nickname).expect("just inserted");
        if let (Some(ident), Some(host)) = (ident, host) {
            if ident != "*" && host != "*" {
                user.apply_hostmask(ident, host);
            }
        }
    }

    fn evict_if_unseen(&mut self, nickname: &str, events: &mut Vec<Event>) {
        if let Some(user) = self.users.get(nickname) {
            if !user.is_seen() {
                self.users.remove(nickname);
                events.push(Event::UserDisappeared {
                    nickname: nickname.to_string(),
                });
            }
        }
    }

    /// Unconditionally remove `nickname` and every channel membership it
    /// holds, regardless of [`User::is_seen`]. Used when a `NICK` rename
    /// collides with an already-tracked user (§4.6: "if `new_nick`
    /// collides with an existing tracked user, evict the colliding one
    /// first"), so the stale entry can't corrupt the channel->user
    /// mapping (invariant I1).
    fn evict_user_forcibly(&mut self, nickname: &str, events: &mut Vec<Event>) {
        if let Some(user) = self.users.remove(nickname) {
            for channel in &user.channels {
                if let Some(chan) = self.channels.get_mut(channel) {
                    chan.users.remove(nickname);
                }
            }
            events.push(Event::UserDisappeared {
                nickname: nickname.to_string(),
            });
        }
    }

    /// `JOIN`: a hostmask joining `channel`. If `nickname` is the local
    /// user, this creates the channel when unseen (§3 Lifecycle).
    pub fn on_join(&mut self, prefix: &Prefix, channel: &str) -> Vec<Event> {
        let mut events = Vec::new();
        let (nickname, ident, host) = match prefix {
            Prefix::Nickname(nick, user, host) => (nick.clone(), Some(user.clone()), Some(host.clone())),
            Prefix::ServerName(name) => (name.clone(), None, None),
        };

        let mapping = self.channels.mapping();
        let local = self.is_local(&nickname, mapping);

        if local && self.channels.get(channel).is_none() {
            self.channels.add(channel, Channel::new(channel, mapping));
            events.push(Event::ChannelCreated {
                channel: channel.to_string(),
            });
        }

        if self.channels.get(channel).is_none() {
            // A peer join for a channel we aren't tracking; nothing to do.
            return events;
        }

        self.get_or_create_user(&nickname, ident.as_deref(), host.as_deref(), &mut events);

        if let Some(user) = self.users.get_mut(&nickname) {
            user.channels.insert(channel.to_string());
        }
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.users.add(
                &nickname,
                ChannelUser {
                    nickname: nickname.clone(),
                    statuses: HashSet::new(),
                },
            );
        }

        events.push(Event::Joined {
            channel: channel.to_string(),
            nickname,
        });
        events
    }

    /// `PART`: remove `nickname` from `channel`'s membership. A local
    /// part destroys the channel (§3 Lifecycle).
    pub fn on_part(&mut self, nickname: &str, channel: &str, message: Option<&str>) -> Vec<Event> {
        let mut events = Vec::new();
        let mapping = self.channels.mapping();
        let local = self.is_local(nickname, mapping);

        if self.channels.get(channel).is_none() {
            return events;
        }

        self.remove_membership(nickname, channel);
        events.push(Event::Parted {
            channel: channel.to_string(),
            nickname: nickname.to_string(),
            message: message.map(str::to_string),
        });
        self.evict_if_unseen(nickname, &mut events);

        if local {
            self.destroy_channel(channel, &mut events);
        }
        events
    }

    /// `KICK`: `by` removed `nickname` from `channel`.
    pub fn on_kick(
        &mut self,
        by: &str,
        nickname: &str,
        channel: &str,
        message: Option<&str>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        let mapping = self.channels.mapping();
        let local = self.is_local(nickname, mapping);

        if self.channels.get(channel).is_none() {
            return events;
        }

        self.remove_membership(nickname, channel);
        events.push(Event::Kicked {
            channel: channel.to_string(),
            nickname: nickname.to_string(),
            by: by.to_string(),
            message: message.map(str::to_string),
        });
        self.evict_if_unseen(nickname, &mut events);

        if local {
            self.destroy_channel(channel, &mut events);
        }
        events
    }

    /// `QUIT`: remove `nickname` from every channel it was a member of.
    pub fn on_quit(&mut self, nickname: &str, message: Option<&str>) -> Vec<Event> {
        let mut events = Vec::new();
        let channels: Vec<String> = self
            .users
            .get(nickname)
            .map(|u| u.channels.iter().cloned().collect())
            .unwrap_or_default();

        for channel in &channels {
            self.remove_membership(nickname, channel);
        }

        events.push(Event::Quit {
            nickname: nickname.to_string(),
            message: message.map(str::to_string),
        });
        self.evict_if_unseen(nickname, &mut events);
        events
    }

    fn remove_membership(&mut self, nickname: &str, channel: &str) {
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.users.remove(nickname);
        }
        if let Some(user) = self.users.get_mut(nickname) {
            user.channels.remove(channel);
        }
    }

    fn destroy_channel(&mut self, channel: &str, events: &mut Vec<Event>) {
        if let Some(chan) = self.channels.remove(channel) {
            let members: Vec<String> = chan.users.keys().map(str::to_string).collect();
            for member in members {
                if let Some(user) = self.users.get_mut(&member) {
                    user.channels.remove(channel);
                }
                self.evict_if_unseen(&member, events);
            }
            events.push(Event::ChannelDestroyed {
                channel: channel.to_string(),
            });
        }
    }

    /// `NICK`: rename a tracked user, updating every channel's member
    /// registry and the local nickname if applicable.
    pub fn on_nick_change(&mut self, old_nick: &str, new_nick: &str) -> Vec<Event> {
        let mapping = self.users.mapping();
        if self.is_local(old_nick, mapping) {
            self.local_nickname = new_nick.to_string();
        }

        let Some(mut user) = self.users.remove(old_nick) else {
            return Vec::new();
        };
        let channels: Vec<String> = user.channels.iter().cloned().collect();
        user.nickname = new_nick.to_string();

        let mut events = Vec::new();
        if self.users.contains(new_nick) {
            self.evict_user_forcibly(new_nick, &mut events);
        }
        self.users.add(new_nick, user);

        for channel in channels {
            if let Some(chan) = self.channels.get_mut(&channel) {
                if let Some(mut member) = chan.users.remove(old_nick) {
                    member.nickname = new_nick.to_string();
                    chan.users.add(new_nick, member);
                }
            }
        }

        events.push(Event::NickChanged {
            old_nick: old_nick.to_string(),
            new_nick: new_nick.to_string(),
        });
        events
    }

    /// `CHGHOST`: update a user's ident/host in place.
    pub fn on_chghost(&mut self, nickname: &str, ident: &str, host: &str) -> Vec<Event> {
        if let Some(user) = self.users.get_mut(nickname) {
            user.apply_hostmask(ident, host);
            return vec![Event::HostChanged {
                nickname: nickname.to_string(),
                ident: ident.to_string(),
                host: host.to_string(),
            }];
        }
        Vec::new()
    }

    /// `ACCOUNT`/`extended-join`/WHOIS: update a user's logged-in account.
    /// `None` (the wire's `*`) means logged out.
    pub fn on_account(&mut self, nickname: &str, account: Option<&str>) -> Vec<Event> {
        if let Some(user) = self.users.get_mut(nickname) {
            user.account = account.map(str::to_string);
            return vec![Event::AccountChanged {
                nickname: nickname.to_string(),
                account: account.map(str::to_string),
            }];
        }
        Vec::new()
    }

    /// `RPL_WHOISUSER`: record a user's ident/host/full-name, creating
    /// the entry if this is the first time we've heard of them.
    pub fn observe_whois_user(
        &mut self,
        nickname: &str,
        ident: &str,
        host: &str,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        self.get_or_create_user(nickname, Some(ident), Some(host), &mut events);
        events
    }

    /// `RPL_WHOREPLY`: record a user's ident/host and ensure they are
    /// tracked as a member of `channel` (the server only sends a WHO
    /// reply for members actually present there).
    pub fn observe_who(
        &mut self,
        nickname: &str,
        ident: &str,
        host: &str,
        channel: &str,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        if self.channels.get(channel).is_none() {
            return events;
        }
        self.get_or_create_user(nickname, Some(ident), Some(host), &mut events);
        if let Some(user) = self.users.get_mut(nickname) {
            user.channels.insert(channel.to_string());
        }
        if let Some(chan) = self.channels.get_mut(channel) {
            if !chan.users.contains(nickname) {
                chan.users.add(
                    nickname,
                    ChannelUser {
                        nickname: nickname.to_string(),
                        statuses: HashSet::new(),
                    },
                );
            }
        }
        events
    }

    /// `AWAY`/`RPL_AWAY`/`RPL_UNAWAY`. `None` clears away status.
    pub fn on_away(&mut self, nickname: &str, reason: Option<&str>, since: Option<i64>) -> Vec<Event> {
        if let Some(user) = self.users.get_mut(nickname) {
            user.away_reason = reason.map(str::to_string);
            user.away_since = if reason.is_some() { since } else { None };
            return vec![Event::AwayChanged {
                nickname: nickname.to_string(),
                reason: reason.map(str::to_string),
            }];
        }
        Vec::new()
    }

    /// Begin a `NAMES` burst: subsequent [`Graph::on_names_entry`] calls
    /// for `channel` accumulate into a fresh membership set.
    pub fn begin_names(&mut self, channel: &str) {
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.names_burst = Some(HashSet::new());
        }
    }

    /// One `RPL_NAMREPLY` entry: `prefixes` is the leading run of status
    /// symbols (e.g. `@+`), already stripped from `nickname`.
    pub fn on_names_entry(
        &mut self,
        channel: &str,
        nickname: &str,
        prefixes: &str,
        isupport: &IsupportState,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        if self.channels.get(channel).is_none() {
            return events;
        }

        self.get_or_create_user(nickname, None, None, &mut events);
        if let Some(user) = self.users.get_mut(nickname) {
            user.channels.insert(channel.to_string());
        }

        let statuses: HashSet<char> = prefixes
            .chars()
            .filter_map(|symbol| {
                isupport
                    .status_prefixes
                    .iter()
                    .find(|(_, sym)| *sym == symbol)
                    .map(|(mode, _)| *mode)
            })
            .collect();

        if let Some(chan) = self.channels.get_mut(channel) {
            chan.users.add(
                nickname,
                ChannelUser {
                    nickname: nickname.to_string(),
                    statuses,
                },
            );
            if let Some(burst) = &mut chan.names_burst {
                burst.insert(nickname.to_string());
            }
        }
        events
    }

    /// `RPL_ENDOFNAMES`: members the burst didn't mention are evicted.
    pub fn end_names(&mut self, channel: &str) -> Vec<Event> {
        let mut events = Vec::new();
        let Some(chan) = self.channels.get_mut(channel) else {
            return events;
        };
        let Some(burst) = chan.names_burst.take() else {
            return events;
        };
        let stale: Vec<String> = chan
            .users
            .keys()
            .filter(|n| !burst.contains(*n))
            .map(str::to_string)
            .collect();
        for nick in stale {
            self.remove_membership(&nick, channel);
            self.evict_if_unseen(&nick, &mut events);
        }
        events.push(Event::NamesComplete {
            channel: channel.to_string(),
        });
        events
    }

    /// `TOPIC` or `RPL_TOPIC`/`RPL_TOPICWHOTIME`.
    pub fn set_topic(&mut self, channel: &str, topic: Option<&str>, setter: Option<&str>) -> Vec<Event> {
        let Some(chan) = self.channels.get_mut(channel) else {
            return Vec::new();
        };
        chan.topic = topic.map(str::to_string);
        if setter.is_some() {
            chan.topic_setter = setter.map(str::to_string);
        }
        vec![Event::TopicChanged {
            channel: channel.to_string(),
            topic: topic.map(str::to_string),
            setter: chan.topic_setter.clone(),
        }]
    }

    /// `RPL_CREATIONTIME`.
    pub fn set_created_at(&mut self, channel: &str, timestamp: i64) -> Vec<Event> {
        let Some(chan) = self.channels.get_mut(channel) else {
            return Vec::new();
        };
        chan.created_at = Some(timestamp);
        vec![Event::ChannelTimestamp {
            channel: channel.to_string(),
            timestamp,
        }]
    }

    /// Apply one `MODE` line (or an `RPL_CHANNELMODEIS` report, when
    /// `is_current`) to `channel`'s running mode state, reflecting any
    /// `StatusChanged` transitions into the member registry.
    pub fn apply_channel_modes(
        &mut self,
        channel: &str,
        taxonomy: &crate::isupport::ChanModesState,
        mode_string: &str,
        params: &[&str],
        is_current: bool,
    ) -> Vec<Event> {
        let Some(chan) = self.channels.get_mut(channel) else {
            return Vec::new();
        };
        let changes = chan.mode_engine.apply(taxonomy, mode_string, params, is_current);

        for change in &changes {
            if let ModeKind::StatusChanged { nick, mode, added } = change {
                if let Some(member) = chan.users.get_mut(nick) {
                    if *added {
                        member.statuses.insert(*mode);
                    } else {
                        member.statuses.remove(mode);
                    }
                }
            }
        }

        if changes.is_empty() {
            return Vec::new();
        }

        let mut events = vec![Event::ChannelModesChanged {
            channel: channel.to_string(),
            changes: changes.clone(),
        }];
        events.extend(changes.into_iter().map(|change| {
            fan_out_mode_event(channel, change)
        }));
        events
    }

    /// Mark a nickname as explicitly monitored (`MONITOR`/`WATCH`), so it
    /// survives having no shared channel membership.
    pub fn set_monitored(&mut self, nickname: &str, monitored: bool) -> Vec<Event> {
        let mut events = Vec::new();
        if monitored {
            self.get_or_create_user(nickname, None, None, &mut events);
            if let Some(user) = self.users.get_mut(nickname) {
                user.is_monitored = true;
            }
        } else if let Some(user) = self.users.get_mut(nickname) {
            user.is_monitored = false;
            self.evict_if_unseen(nickname, &mut events);
        }
        events
    }
}

/// Turn one [`ModeKind`] produced by the mode engine into the standalone,
/// per-mode [`Event`] it corresponds to (§4.5: fan out per-mode events in
/// the order they appear, alongside the batched `ChannelModesChanged`).
fn fan_out_mode_event(channel: &str, change: ModeKind) -> Event {
    let channel = channel.to_string();
    match change {
        ModeKind::StatusChanged { nick, mode, added } => Event::ChannelStatusChanged {
            channel,
            nickname: nick,
            mode,
            added,
        },
        ModeKind::ListAdd(mode, mask) if mode == 'b' => Event::ChannelBanAdded { channel, mask },
        ModeKind::ListRemove(mode, mask) if mode == 'b' => {
            Event::ChannelBanRemoved { channel, mask }
        }
        ModeKind::ListAdd(mode, mask) => Event::ChannelListModeAdded {
            channel,
            mode,
            mask,
        },
        ModeKind::ListRemove(mode, mask) => Event::ChannelListModeRemoved {
            channel,
            mode,
            mask,
        },
        ModeKind::KeySet(key) => Event::ChannelKeySet { channel, key },
        ModeKind::KeyRemoved => Event::ChannelKeyRemoved { channel },
        ModeKind::LimitSet(limit) => Event::ChannelLimitSet { channel, limit },
        ModeKind::LimitRemoved => Event::ChannelLimitRemoved { channel },
        ModeKind::ParamSet(mode, value) => Event::ChannelModeParamSet {
            channel,
            mode,
            value,
        },
        ModeKind::ParamUnset(mode) => Event::ChannelModeParamUnset { channel, mode },
        ModeKind::FlagSet(mode) => Event::ChannelModeFlagSet { channel, mode },
        ModeKind::FlagUnset(mode) => Event::ChannelModeFlagUnset { channel, mode },
        ModeKind::Unknown(mode, value) => Event::ChannelModeUnknown {
            channel,
            mode,
            value,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casemap::CaseMapping;

    fn prefix(nick: &str) -> Prefix {
        Prefix::Nickname(nick.to_string(), "user".to_string(), "host.example".to_string())
    }

    #[test]
    fn local_join_creates_channel() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        let events = graph.on_join(&prefix("me"), "#rust");
        assert!(matches!(events[0], Event::ChannelCreated { .. }));
        assert!(matches!(events[1], Event::UserAppeared { .. }));
        assert!(matches!(events[2], Event::Joined { .. }));
        assert!(graph.channel("#rust").is_some());
    }

    #[test]
    fn peer_join_after_local_join_tracks_member() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#rust");
        graph.on_join(&prefix("alice"), "#rust");
        let chan = graph.channel("#rust").unwrap();
        assert!(chan.users.contains("alice"));
        assert!(graph.user("alice").unwrap().channels.contains("#rust"));
    }

    #[test]
    fn local_part_destroys_channel_and_evicts_members() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#rust");
        graph.on_join(&prefix("alice"), "#rust");
        let events = graph.on_part("me", "#rust", Some("bye"));
        assert!(graph.channel("#rust").is_none());
        assert!(graph.user("alice").is_none());
        assert!(events.iter().any(|e| matches!(e, Event::ChannelDestroyed { .. })));
    }

    #[test]
    fn quit_removes_from_all_channels_and_evicts() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#a");
        graph.on_join(&prefix("me"), "#b");
        graph.on_join(&prefix("alice"), "#a");
        graph.on_join(&prefix("alice"), "#b");
        let events = graph.on_quit("alice", Some("ping timeout"));
        assert!(!graph.channel("#a").unwrap().users.contains("alice"));
        assert!(!graph.channel("#b").unwrap().users.contains("alice"));
        assert!(graph.user("alice").is_none());
        assert!(events.iter().any(|e| matches!(e, Event::Quit { .. })));
    }

    #[test]
    fn nick_change_updates_membership_and_local_nickname() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#rust");
        graph.on_nick_change("me", "me2");
        assert_eq!(graph.local_nickname(), "me2");
        assert!(graph.channel("#rust").unwrap().users.contains("me2"));
        assert!(!graph.channel("#rust").unwrap().users.contains("me"));
    }

    #[test]
    fn nick_change_colliding_with_tracked_user_evicts_it_first() {
        // §4.6 / invariant I1: renaming onto an already-tracked nickname
        // must evict the colliding user (every channel membership, plus
        // `UserDisappeared`) before the rename is installed.
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#rust");
        graph.on_join(&prefix("alice"), "#rust");
        graph.on_join(&prefix("bob"), "#rust");
        graph.on_join(&prefix("alice"), "#other");

        let events = graph.on_nick_change("bob", "alice");

        assert!(events.iter().any(
            |e| matches!(e, Event::UserDisappeared { nickname } if nickname == "alice")
        ));
        assert!(events.iter().any(
            |e| matches!(e, Event::NickChanged { old_nick, new_nick }
                if old_nick == "bob" && new_nick == "alice")
        ));

        // The renamed user now occupies "alice" in #rust, and the stale
        // "alice" is gone from every channel it used to be in.
        assert!(graph.channel("#rust").unwrap().users.contains("alice"));
        assert!(!graph.channel("#rust").unwrap().users.contains("bob"));
        if let Some(other) = graph.channel("#other") {
            assert!(!other.users.contains("alice"));
        }
    }

    #[test]
    fn monitored_user_survives_without_channel_membership() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.set_monitored("bob", true);
        assert!(graph.user("bob").is_some());
        graph.set_monitored("bob", false);
        assert!(graph.user("bob").is_none());
    }

    #[test]
    fn names_burst_evicts_stale_members() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#rust");
        graph.on_join(&prefix("alice"), "#rust");
        let isupport = IsupportState::new();
        graph.begin_names("#rust");
        graph.on_names_entry("#rust", "me", "", &isupport);
        graph.end_names("#rust");
        assert!(!graph.channel("#rust").unwrap().users.contains("alice"));
        assert!(graph.user("alice").is_none());
    }

    #[test]
    fn channel_mode_change_reflects_status_into_member() {
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#rust");
        graph.on_join(&prefix("alice"), "#rust");
        let mut taxonomy = crate::isupport::ChanModesState::default();
        taxonomy.s = vec!['o', 'v'];
        let events = graph.apply_channel_modes("#rust", &taxonomy, "+o", &["alice"], false);
        assert!(!events.is_empty());
        assert!(graph
            .channel("#rust")
            .unwrap()
            .users
            .get("alice")
            .unwrap()
            .statuses
            .contains(&'o'));
    }

    #[test]
    fn channel_mode_change_fans_out_per_mode_events_in_order() {
        // §8 scenario 3: `:op MODE #c +ov-b alice *!*@spam.example` emits
        // StatusChanged(alice,+o), StatusChanged(alice,+v), BanRemoved(...)
        // in that order, in addition to the batched event.
        let mut graph = Graph::new("me", CaseMapping::Rfc1459);
        graph.on_join(&prefix("me"), "#c");
        graph.on_join(&prefix("alice"), "#c");
        let mut taxonomy = crate::isupport::ChanModesState::default();
        taxonomy.s = vec!['o', 'v'];
        taxonomy.a = vec!['b'];

        let events = graph.apply_channel_modes(
            "#c",
            &taxonomy,
            "+ov-b",
            &["alice", "alice", "*!*@spam.example"],
            false,
        );

        assert!(matches!(&events[0], Event::ChannelModesChanged { .. }));
        assert!(matches!(
            &events[1],
            Event::ChannelStatusChanged { nickname, mode: 'o', added: true, .. }
                if nickname == "alice"
        ));
        assert!(matches!(
            &events[2],
            Event::ChannelStatusChanged { nickname, mode: 'v', added: true, .. }
                if nickname == "alice"
        ));
        assert!(matches!(
            &events[3],
            Event::ChannelBanRemoved { mask, .. } if mask == "*!*@spam.example"
        ));

        let statuses = &graph.channel("#c").unwrap().users.get("alice").unwrap().statuses;
        assert!(statuses.contains(&'o'));
        assert!(statuses.contains(&'v'));
    }
}
