//! IRC wire protocol: the message ADT, the unmarshaller, and the marshaller.
//! See `message`, `unmarshal`, and `marshal` respectively; `extract` holds
//! the shared parsing framework and `tags` the IRCv3 tag-value escaping
//! rules.

pub mod extract;
pub mod marshal;
pub mod message;
pub mod tags;
pub mod unmarshal;

pub use marshal::{marshal, MarshalError};
pub use message::{Cap, CapPair, Command, Ctcp, Join, Message, Numeric, Prefix};
pub use unmarshal::unmarshal;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarshal_marshal_is_identity_on_clean_lines() {
        let lines = [
            "PING :xyz",
            "NICK alice",
            "JOIN #a,#b",
            "JOIN 0",
            "PART #a :bye",
            ":alice!u@h PRIVMSG #chan :hello there",
            ":srv 005 me CASEMAPPING=ascii PREFIX=(ov)@+ :are supported by this server",
        ];
        for line in lines {
            let msg = unmarshal(line);
            assert!(
                !matches!(msg.command, Command::ParseError { .. } | Command::Unsupported { .. }),
                "line should parse cleanly: {line}"
            );
            let rendered = marshal(&msg).unwrap();
            assert_eq!(rendered.trim_end_matches("\r\n"), line);
        }
    }
}
