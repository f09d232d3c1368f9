use std::fmt::{self, Display, Formatter};

use super::tags::escape_tag_value;
use super::types::Message;

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref tags) = self.tags {
            write!(f, "@")?;

            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    write!(f, ";")?;
                }

                write!(f, "{}", tag.0)?;

                if let Some(ref value) = tag.1 {
                    write!(f, "=")?;
                    escape_tag_value(f, value)?;
                }
            }

            write!(f, " ")?;
        }

        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }

        write!(f, "{}\r\n", self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_simple() {
        let msg = Message::privmsg("#chan", "hi");
        assert_eq!(msg.to_string(), "PRIVMSG #chan :hi\r\n");
    }

    #[test]
    fn test_serialize_with_tags() {
        let msg = Message::privmsg("#chan", "hi").with_tag("time", Some("2023"));
        assert_eq!(msg.to_string(), "@time=2023 PRIVMSG #chan :hi\r\n");
    }
}
