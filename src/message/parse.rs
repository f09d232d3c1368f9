//! Message parsing implementation.
//!
//! This module implements `FromStr` for `Message` using the nom-based parser.

use std::borrow::Cow;
use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};

use super::nom_parser::ParsedMessage;
use super::tags::unescape_tag_value;
use super::types::{Message, Tag};

/// Intern common tag keys to avoid allocations.
#[inline]
fn intern_tag_key(key: &str) -> Cow<'static, str> {
    match key {
        "msgid" => Cow::Borrowed("msgid"),
        "time" => Cow::Borrowed("time"),
        "batch" => Cow::Borrowed("batch"),
        "account" => Cow::Borrowed("account"),
        "label" => Cow::Borrowed("label"),
        "echo-message" => Cow::Borrowed("echo-message"),
        "message-tags" => Cow::Borrowed("message-tags"),
        "+typing" => Cow::Borrowed("+typing"),
        "+draft/typing" => Cow::Borrowed("+draft/typing"),
        "+draft/reply" => Cow::Borrowed("+draft/reply"),
        "+draft/react" => Cow::Borrowed("+draft/react"),
        _ => Cow::Owned(key.to_owned()),
    }
}

/// Parse a raw tags string (without the leading `@`) into a vector of `Tag`s.
///
/// A key repeated in the same tag string has later occurrences overwrite
/// earlier ones (§3/§4.1), so `@foo=1;foo=2` yields a single `foo` tag with
/// value `2`, in the position of its last occurrence.
fn parse_tags_string(tags_str: &str) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();

    for tag in tags_str.split(';').filter(|s| !s.is_empty()) {
        let mut iter = tag.splitn(2, '=');
        let key = iter.next().unwrap_or("");
        let value = iter.next().map(unescape_tag_value);

        let interned_key = if key.is_empty() {
            Cow::Owned(String::new())
        } else {
            intern_tag_key(key)
        };

        if let Some(existing) = tags.iter_mut().find(|Tag(k, _)| *k == interned_key) {
            *existing = Tag(interned_key, value);
        } else {
            tags.push(Tag(interned_key, value));
        }
    }

    tags
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        if s.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let trimmed = s.trim_end_matches(['\r', '\n']);

        let parsed = ParsedMessage::parse(trimmed).map_err(|parse_err| {
            let cause = MessageParseError::ParseContext {
                position: parse_err.position,
                context: format!("parse error: {:?}", parse_err.kind),
                source: None,
                source_message: None,
            };

            ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause,
            }
        })?;

        let tags = parsed.tags.map(parse_tags_string);

        Message::with_tags(tags, parsed.prefix, parsed.command, parsed.params.clone()).map_err(
            |cause| ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn test_parse_simple_ping() {
        let msg: Message = "PING :server\r\n".parse().unwrap();
        assert!(matches!(msg.command, Command::PING(_, _)));
    }

    #[test]
    fn test_parse_privmsg() {
        let msg: Message = ":nick!user@host PRIVMSG #channel :Hello, world!\r\n"
            .parse()
            .unwrap();
        assert!(matches!(msg.command, Command::PRIVMSG(_, _)));
        assert!(msg.prefix.is_some());
    }

    #[test]
    fn test_parse_with_tags() {
        let msg: Message = "@time=2023-01-01T00:00:00Z;msgid=abc123 :nick PRIVMSG #ch :Hi\r\n"
            .parse()
            .unwrap();

        assert_eq!(msg.tag_value("time"), Some("2023-01-01T00:00:00Z"));
        assert_eq!(msg.tag_value("msgid"), Some("abc123"));
    }

    #[test]
    fn test_duplicate_tag_key_last_wins() {
        let msg: Message = "@foo=1;foo=2 PING :x\r\n".parse().unwrap();
        assert_eq!(msg.tag_value("foo"), Some("2"));
        assert_eq!(msg.tags.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_escaped_tags() {
        let msg: Message = "@key=value\\swith\\sspace PING :test\r\n".parse().unwrap();
        assert_eq!(msg.tag_value("key"), Some("value with space"));
    }

    #[test]
    fn test_parse_empty_message() {
        let result: Result<Message, _> = "".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_numeric_response() {
        let msg: Message = ":server 001 nick :Welcome to IRC\r\n".parse().unwrap();
        assert!(matches!(msg.command, Command::Response(_, _)));
    }

    #[test]
    fn test_parse_user_command() {
        let msg: Message = "USER guest 0 * :Real Name\r\n".parse().unwrap();
        assert!(matches!(msg.command, Command::USER(_, _, _)));
    }

    #[test]
    fn test_parse_join() {
        let msg: Message = "JOIN #channel\r\n".parse().unwrap();
        assert!(matches!(msg.command, Command::JOIN(_, _, _)));
    }

    #[test]
    fn test_parse_mode() {
        let msg: Message = "MODE #channel +o nick\r\n".parse().unwrap();
        assert!(matches!(msg.command, Command::ChannelMODE(_, _)));
    }

    #[test]
    fn test_parse_user_mode() {
        let msg: Message = ":nick MODE nick +i\r\n".parse().unwrap();
        assert!(matches!(msg.command, Command::UserMODE(_, _)));
    }

    #[test]
    fn test_intern_common_tags() {
        assert!(matches!(intern_tag_key("msgid"), Cow::Borrowed(_)));
        assert!(matches!(intern_tag_key("time"), Cow::Borrowed(_)));
        assert!(matches!(intern_tag_key("unknown-tag"), Cow::Owned(_)));
    }
}
