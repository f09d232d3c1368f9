//! Async-request registry (§4.7, C7).
//!
//! A pending request is matched against every incoming line by reply
//! keyword plus optional positional constraints; on a terminal match it
//! resolves and is dropped. This module is sans-IO: it has no notion of
//! futures or wakers, only `poll`-style matching the caller drives from
//! its read loop and completes however its runtime prefers (a oneshot
//! channel, a waker list, ...).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::ctcp::Ctcp;
use crate::message::MessageRef;

/// Default timeout for any timeout-eligible request (§4.7, §5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque handle identifying one registered request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

/// A positional constraint on one parameter: `None` matches anything,
/// `Some(expected)` requires case-insensitive equality.
pub type ParamConstraint = Option<String>;

/// One field of a WHOX reply, identified by its `%xyz` query-type letter
/// (§4.7 "interpret each parameter by field type").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhoxField {
    QueryType,
    Channel,
    Ident,
    Host,
    IpAddress,
    ServerName,
    Nickname,
    Flags,
    HopCount,
    IdleTime,
    Account,
    FullName,
}

/// One parsed WHOX reply parameter, with the suppression rules from §4.7
/// already applied (sentinel IP, zero hop count / idle time / account
/// collapse to `None`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WhoxValue {
    QueryType(String),
    Channel(String),
    Ident(String),
    Host(String),
    IpAddress(Option<String>),
    ServerName(String),
    Nickname(String),
    Flags(String),
    HopCount(Option<u32>),
    IdleTime(Option<u64>),
    Account(Option<String>),
    FullName(String),
}

fn interpret_whox_field(field: WhoxField, raw: &str) -> WhoxValue {
    match field {
        WhoxField::QueryType => WhoxValue::QueryType(raw.to_string()),
        WhoxField::Channel => WhoxValue::Channel(raw.to_string()),
        WhoxField::Ident => WhoxValue::Ident(raw.to_string()),
        WhoxField::Host => WhoxValue::Host(raw.to_string()),
        WhoxField::IpAddress => {
            if raw == "255.255.255.255" {
                WhoxValue::IpAddress(None)
            } else {
                WhoxValue::IpAddress(Some(raw.to_string()))
            }
        }
        WhoxField::ServerName => WhoxValue::ServerName(raw.to_string()),
        WhoxField::Nickname => WhoxValue::Nickname(raw.to_string()),
        WhoxField::Flags => WhoxValue::Flags(raw.to_string()),
        WhoxField::HopCount => WhoxValue::HopCount(raw.parse::<u32>().ok().filter(|n| *n != 0)),
        WhoxField::IdleTime => WhoxValue::IdleTime(raw.parse::<u64>().ok().filter(|n| *n != 0)),
        WhoxField::Account => {
            WhoxValue::Account(if raw == "0" { None } else { Some(raw.to_string()) })
        }
        WhoxField::FullName => WhoxValue::FullName(raw.to_string()),
    }
}

/// Interpret a full WHOX reply's parameters against the field list the
/// request advertised, per §4.7. Returns `None` if the arity doesn't
/// match (`parameters.length == fields.length + 1`, the leading param
/// being the requesting nickname and so discarded).
pub fn parse_whox_reply(fields: &[WhoxField], params: &[&str]) -> Option<Vec<WhoxValue>> {
    if params.len() != fields.len() + 1 {
        return None;
    }
    Some(
        fields
            .iter()
            .zip(&params[1..])
            .map(|(field, raw)| interpret_whox_field(*field, raw))
            .collect(),
    )
}

/// The outcome of feeding one message into a pending request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The request is still waiting on more intermediate replies.
    Pending,
    /// The request completed successfully; `final` requests are dropped
    /// by the registry after this.
    Complete,
    /// The request failed (an ERR_* reply, NOSUCHNICK, disconnect, ...).
    Failed(String),
    /// This message wasn't relevant to the request after all (e.g. a
    /// nickname-filtered void request saw a reply from someone else).
    NotApplicable,
}

/// What kind of reply shape a request expects, and how it interprets
/// lines it matches (§4.7, §3.08 "polymorphic async requests").
#[derive(Clone, Debug)]
pub enum RequestKind {
    /// Fire-and-forget: succeeds unless an error-class reply arrives.
    /// `sender_filter`, if set, ignores replies from any other source.
    Void { sender_filter: Option<String> },
    /// Plain `WHO`: accumulate `RPL_WHOREPLY` lines until
    /// `RPL_ENDOFWHO`.
    Who { replies: Vec<String> },
    /// `WHO` with the `WHOX` extension: accumulate parsed
    /// [`WhoxValue`] rows until `RPL_ENDOFWHO`.
    Whox {
        fields: Vec<WhoxField>,
        rows: Vec<Vec<WhoxValue>>,
    },
    /// `WHOIS`: accumulate every `RPL_WHOIS*` line until
    /// `RPL_ENDOFWHOIS`.
    Whois { replies: Vec<String> },
    /// A CTCP request awaiting its reply `NOTICE` (§4.7 "CTCP request
    /// matching is special").
    Ctcp {
        target_nickname: String,
        command: String,
    },
    /// Wait for the next message matching the reply set, with no
    /// accumulation and no timeout (§4.7, §5 "message-await requests
    /// never time out").
    MessageAwait,
}

/// A pending request: the reply keywords it matches, any positional
/// constraints, and its accumulation state.
#[derive(Clone, Debug)]
pub struct AsyncRequest {
    id: RequestId,
    /// Reply keywords (numeric or command name, upper-cased) this
    /// request matches against.
    reply_set: HashSet<String>,
    /// Terminal keywords within `reply_set`; a match against one of
    /// these, after successful accumulation, completes the request.
    terminal: HashSet<String>,
    /// Positional constraints against `message.args`.
    positional: Vec<ParamConstraint>,
    kind: RequestKind,
    created_at: Instant,
    timeout_eligible: bool,
}

impl AsyncRequest {
    pub fn new(
        id: RequestId,
        reply_set: impl IntoIterator<Item = &'static str>,
        terminal: impl IntoIterator<Item = &'static str>,
        positional: Vec<ParamConstraint>,
        kind: RequestKind,
    ) -> Self {
        let timeout_eligible = !matches!(kind, RequestKind::MessageAwait);
        AsyncRequest {
            id,
            reply_set: reply_set.into_iter().map(|s| s.to_ascii_uppercase()).collect(),
            terminal: terminal.into_iter().map(|s| s.to_ascii_uppercase()).collect(),
            positional,
            kind,
            created_at: Instant::now(),
            timeout_eligible,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    fn matches_keyword(&self, keyword: &str) -> bool {
        self.reply_set.contains(&keyword.to_ascii_uppercase())
    }

    fn matches_positional(&self, args: &[&str]) -> bool {
        self.positional.iter().enumerate().all(|(i, constraint)| match constraint {
            None => true,
            Some(expected) => args
                .get(i)
                .map(|got| got.eq_ignore_ascii_case(expected))
                .unwrap_or(false),
        })
    }

    /// Whether this message is relevant to the request at all (§4.7 step 1).
    pub fn matches(&self, msg: &MessageRef<'_>) -> bool {
        self.matches_keyword(msg.command.name) && self.matches_positional(&msg.command.args)
    }

    fn is_error_class(keyword: &str) -> bool {
        keyword.starts_with('4') || keyword.starts_with('5')
    }

    /// Feed a matching message to this request, returning its outcome
    /// and whether it is now finished (§4.7 step 3-4).
    pub fn on_reply(&mut self, msg: &MessageRef<'_>) -> (ReplyOutcome, bool) {
        let keyword = msg.command.name.to_ascii_uppercase();
        let is_terminal = self.terminal.contains(&keyword);

        match &mut self.kind {
            RequestKind::Void { sender_filter } => {
                if let Some(expected) = sender_filter {
                    let from = msg.prefix.as_ref().and_then(|p| p.nick);
                    if from.map(|n| !n.eq_ignore_ascii_case(expected)).unwrap_or(true) {
                        return (ReplyOutcome::NotApplicable, false);
                    }
                }
                if Self::is_error_class(&keyword) {
                    (ReplyOutcome::Failed(msg.to_raw_owned()), true)
                } else {
                    (ReplyOutcome::Complete, true)
                }
            }
            RequestKind::Who { replies } => {
                if keyword == "401" {
                    return (ReplyOutcome::Failed(msg.to_raw_owned()), true);
                }
                if is_terminal {
                    (ReplyOutcome::Complete, true)
                } else {
                    replies.push(msg.to_raw_owned());
                    (ReplyOutcome::Pending, false)
                }
            }
            RequestKind::Whox { fields, rows } => {
                if keyword == "401" {
                    return (ReplyOutcome::Failed(msg.to_raw_owned()), true);
                }
                if is_terminal {
                    (ReplyOutcome::Complete, true)
                } else if let Some(row) = parse_whox_reply(fields, &msg.command.args) {
                    rows.push(row);
                    (ReplyOutcome::Pending, false)
                } else {
                    (ReplyOutcome::Pending, false)
                }
            }
            RequestKind::Whois { replies } => {
                if keyword == "401" {
                    return (ReplyOutcome::Failed(msg.to_raw_owned()), true);
                }
                if is_terminal {
                    (ReplyOutcome::Complete, true)
                } else {
                    replies.push(msg.to_raw_owned());
                    (ReplyOutcome::Pending, false)
                }
            }
            RequestKind::Ctcp {
                target_nickname,
                command,
            } => {
                if msg.command.name.eq_ignore_ascii_case("NOTICE") {
                    let target_ok = msg.arg(0).map(|t| t.eq_ignore_ascii_case(target_nickname)).unwrap_or(false);
                    let trailing = msg.arg(1).unwrap_or("");
                    if target_ok {
                        if let Some(ctcp) = Ctcp::parse(trailing) {
                            if ctcp.command.eq_ignore_ascii_case(command) {
                                return (ReplyOutcome::Complete, true);
                            }
                        }
                    }
                }
                (ReplyOutcome::NotApplicable, false)
            }
            RequestKind::MessageAwait => (ReplyOutcome::Complete, true),
        }
    }

    pub fn is_timeout_eligible(&self) -> bool {
        self.timeout_eligible
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// The final error an async request resolves with.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AsyncRequestError {
    #[error("server replied with an error: {0}")]
    Reply(String),
    #[error("connection disconnected: {0}")]
    Disconnected(String),
    #[error("request timed out")]
    Timeout,
}

/// Registry of pending async requests for one connection.
#[derive(Debug, Default)]
pub struct AsyncRequestRegistry {
    next_id: u64,
    requests: Vec<AsyncRequest>,
}

impl AsyncRequestRegistry {
    pub fn new() -> Self {
        AsyncRequestRegistry::default()
    }

    pub fn register(
        &mut self,
        reply_set: impl IntoIterator<Item = &'static str>,
        terminal: impl IntoIterator<Item = &'static str>,
        positional: Vec<ParamConstraint>,
        kind: RequestKind,
    ) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.requests.push(AsyncRequest::new(id, reply_set, terminal, positional, kind));
        id
    }

    pub fn get(&self, id: RequestId) -> Option<&AsyncRequest> {
        self.requests.iter().find(|r| r.id() == id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Feed one incoming message through every matching request, in
    /// registration order, draining any that complete. Returns
    /// `(id, outcome)` pairs in the order requests were processed
    /// (§4.7 step 2-4, §5 ordering point 3).
    ///
    /// Once a request of a given `kind` discriminant completes on this
    /// line, subsequent requests of the *same* kind are skipped for this
    /// line (§4.7 step 4, "prevents multiple WHO requests from draining
    /// one reply").
    pub fn dispatch(&mut self, msg: &MessageRef<'_>) -> Vec<(RequestId, ReplyOutcome)> {
        let mut results = Vec::new();
        let mut stopped_kinds: HashSet<&'static str> = HashSet::new();
        let mut finished: Vec<RequestId> = Vec::new();

        for request in &mut self.requests {
            if !request.matches(msg) {
                continue;
            }
            let kind_tag = kind_tag(&request.kind);
            if stopped_kinds.contains(kind_tag) {
                continue;
            }
            let (outcome, is_final) = request.on_reply(msg);
            if is_final {
                stopped_kinds.insert(kind_tag);
                finished.push(request.id());
            }
            results.push((request.id(), outcome));
        }

        self.requests.retain(|r| !finished.contains(&r.id()));
        results
    }

    /// Fail every pending request that opted into timeouts and has
    /// exceeded `timeout` (default [`DEFAULT_TIMEOUT`]), removing them.
    pub fn expire_timeouts(&mut self, timeout: Duration) -> Vec<RequestId> {
        let mut expired = Vec::new();
        self.requests.retain(|r| {
            if r.is_timeout_eligible() && r.elapsed() >= timeout {
                expired.push(r.id());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Disconnect: every pending request fails with
    /// `AsyncRequestDisconnected` (§4.7, §5).
    pub fn fail_all(&mut self) -> Vec<RequestId> {
        self.requests.drain(..).map(|r| r.id()).collect()
    }
}

fn kind_tag(kind: &RequestKind) -> &'static str {
    match kind {
        RequestKind::Void { .. } => "void",
        RequestKind::Who { .. } => "who",
        RequestKind::Whox { .. } => "whox",
        RequestKind::Whois { .. } => "whois",
        RequestKind::Ctcp { .. } => "ctcp",
        RequestKind::MessageAwait => "message_await",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_request_completes_on_non_error() {
        let mut reg = AsyncRequestRegistry::new();
        let id = reg.register(["JOIN"], ["JOIN"], vec![], RequestKind::Void { sender_filter: None });
        let msg = MessageRef::parse(":alice!u@h JOIN #rust").unwrap();
        let results = reg.dispatch(&msg);
        assert_eq!(results, vec![(id, ReplyOutcome::Complete)]);
        assert!(reg.is_empty());
    }

    #[test]
    fn void_request_fails_on_error_class() {
        let mut reg = AsyncRequestRegistry::new();
        let id = reg.register(
            ["475"],
            ["475"],
            vec![],
            RequestKind::Void { sender_filter: None },
        );
        let msg = MessageRef::parse(":irc.example 475 me #rust :Cannot join channel (+k)").unwrap();
        let results = reg.dispatch(&msg);
        assert!(matches!(&results[0], (i, ReplyOutcome::Failed(_)) if *i == id));
    }

    #[test]
    fn who_request_accumulates_until_end() {
        let mut reg = AsyncRequestRegistry::new();
        let id = reg.register(
            ["352", "315"],
            ["315"],
            vec![Some("#rust".to_string())],
            RequestKind::Who { replies: Vec::new() },
        );
        let who_reply =
            MessageRef::parse(":irc.example 352 me #rust ident host irc.example nick H :0 Real Name").unwrap();
        let results = reg.dispatch(&who_reply);
        assert_eq!(results, vec![(id, ReplyOutcome::Pending)]);
        assert!(!reg.is_empty());

        let end = MessageRef::parse(":irc.example 315 me #rust :End of WHO list").unwrap();
        let results = reg.dispatch(&end);
        assert_eq!(results, vec![(id, ReplyOutcome::Complete)]);
        assert!(reg.is_empty());
    }

    #[test]
    fn ctcp_request_matches_wrapped_notice_from_target() {
        let mut reg = AsyncRequestRegistry::new();
        let id = reg.register(
            ["NOTICE"],
            ["NOTICE"],
            vec![],
            RequestKind::Ctcp {
                target_nickname: "me".to_string(),
                command: "VERSION".to_string(),
            },
        );
        let msg = MessageRef::parse(":bob!u@h NOTICE me :\x01VERSION bobbot 1.0\x01").unwrap();
        let results = reg.dispatch(&msg);
        assert_eq!(results, vec![(id, ReplyOutcome::Complete)]);
    }

    #[test]
    fn whox_reply_interprets_fields() {
        let fields = vec![WhoxField::Channel, WhoxField::Nickname, WhoxField::Account];
        let params = vec!["me", "#rust", "alice", "0"];
        let row = parse_whox_reply(&fields, &params).unwrap();
        assert_eq!(row[0], WhoxValue::Channel("#rust".to_string()));
        assert_eq!(row[1], WhoxValue::Nickname("alice".to_string()));
        assert_eq!(row[2], WhoxValue::Account(None));
    }

    #[test]
    fn same_kind_requests_do_not_double_drain_one_reply() {
        let mut reg = AsyncRequestRegistry::new();
        let first = reg.register(["315"], ["315"], vec![], RequestKind::Who { replies: Vec::new() });
        let _second = reg.register(["315"], ["315"], vec![], RequestKind::Who { replies: Vec::new() });
        let end = MessageRef::parse(":irc.example 315 me #rust :End of WHO list").unwrap();
        let results = reg.dispatch(&end);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, first);
    }

    #[test]
    fn expire_timeouts_removes_eligible_requests() {
        let mut reg = AsyncRequestRegistry::new();
        reg.register(["315"], ["315"], vec![], RequestKind::Who { replies: Vec::new() });
        reg.register(["PRIVMSG"], [], vec![], RequestKind::MessageAwait);
        let expired = reg.expire_timeouts(Duration::from_secs(0));
        assert_eq!(expired.len(), 1);
        assert_eq!(reg.len(), 1);
    }
}
