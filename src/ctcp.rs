//! CTCP (Client-To-Client Protocol) quoting.
//!
//! A CTCP message is a `PRIVMSG`/`NOTICE` whose trailing parameter is
//! wrapped in `\x01...\x01`; the first whitespace-delimited token inside is
//! the CTCP command, the rest is its argument string. File-transfer (DCC)
//! framing is out of scope; this module only does the `\x01` quoting used
//! by `ACTION`, `VERSION`, `PING`, `TIME`, `CLIENTINFO`, and similar.

pub const CTCP_DELIM: char = '\x01';

/// What kind of CTCP payload this is, distinguishing the common `ACTION`
/// (`/me`) form from everything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CtcpKind {
    /// A `/me does something` action.
    Action,
    /// Any other CTCP command (`VERSION`, `PING`, `TIME`, ...).
    Generic,
}

/// A borrowed, parsed CTCP payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    pub kind: CtcpKind,
    pub command: &'a str,
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a trailing parameter as CTCP, returning `None` if it isn't
    /// wrapped in `\x01`.
    pub fn parse(trailing: &'a str) -> Option<Self> {
        let inner = trailing.strip_prefix(CTCP_DELIM)?;
        let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);

        let (command, params) = match inner.split_once(' ') {
            Some((cmd, rest)) => (cmd, Some(rest)),
            None => (inner, None),
        };

        if command.is_empty() {
            return None;
        }

        let kind = if command.eq_ignore_ascii_case("ACTION") {
            CtcpKind::Action
        } else {
            CtcpKind::Generic
        };

        Some(Ctcp {
            kind,
            command,
            params,
        })
    }

    pub fn to_owned_ctcp(&self) -> CtcpOwned {
        CtcpOwned {
            kind: self.kind,
            command: self.command.to_string(),
            params: self.params.map(str::to_string),
        }
    }
}

/// An owned, parsed CTCP payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtcpOwned {
    pub kind: CtcpKind,
    pub command: String,
    pub params: Option<String>,
}

impl CtcpOwned {
    pub fn parse(trailing: &str) -> Option<Self> {
        Ctcp::parse(trailing).map(|c| c.to_owned_ctcp())
    }
}

/// Wrap a CTCP command (and optional argument string) in `\x01...\x01` for
/// use as a `PRIVMSG`/`NOTICE` trailing parameter.
pub fn wrap(command: &str, params: Option<&str>) -> String {
    match params {
        Some(p) if !p.is_empty() => format!("{CTCP_DELIM}{command} {p}{CTCP_DELIM}"),
        _ => format!("{CTCP_DELIM}{command}{CTCP_DELIM}"),
    }
}

/// Wrap an `ACTION` (`/me`) message.
pub fn wrap_action(text: &str) -> String {
    wrap("ACTION", Some(text))
}

/// Whether a trailing parameter looks like CTCP framing at all (cheap
/// pre-check before the full parse, matching §4.8's dispatch rule: "starts
/// or ends with `\x01`").
pub fn looks_like_ctcp(trailing: &str) -> bool {
    trailing.starts_with(CTCP_DELIM) || trailing.ends_with(CTCP_DELIM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generic() {
        let ctcp = Ctcp::parse("\x01VERSION\x01").unwrap();
        assert_eq!(ctcp.kind, CtcpKind::Generic);
        assert_eq!(ctcp.command, "VERSION");
        assert_eq!(ctcp.params, None);
    }

    #[test]
    fn test_parse_with_params() {
        let ctcp = Ctcp::parse("\x01PING 123456\x01").unwrap();
        assert_eq!(ctcp.command, "PING");
        assert_eq!(ctcp.params, Some("123456"));
    }

    #[test]
    fn test_parse_action() {
        let ctcp = Ctcp::parse("\x01ACTION waves hello\x01").unwrap();
        assert_eq!(ctcp.kind, CtcpKind::Action);
        assert_eq!(ctcp.params, Some("waves hello"));
    }

    #[test]
    fn test_parse_rejects_unwrapped() {
        assert!(Ctcp::parse("plain text").is_none());
    }

    #[test]
    fn test_wrap_round_trips() {
        let wrapped = wrap("VERSION", None);
        assert_eq!(wrapped, "\x01VERSION\x01");
        let parsed = Ctcp::parse(&wrapped).unwrap();
        assert_eq!(parsed.command, "VERSION");
    }

    #[test]
    fn test_wrap_action_round_trips() {
        let wrapped = wrap_action("waves");
        let parsed = Ctcp::parse(&wrapped).unwrap();
        assert_eq!(parsed.kind, CtcpKind::Action);
        assert_eq!(parsed.params, Some("waves"));
    }

    #[test]
    fn test_looks_like_ctcp() {
        assert!(looks_like_ctcp("\x01VERSION\x01"));
        assert!(!looks_like_ctcp("hello world"));
    }
}
