//! Render a [`Message`] back to a wire line. The inverse of
//! [`crate::unmarshal::unmarshal`] — same field order, same trailing-param
//! rule (last parameter is emitted with a leading `:` when it's empty,
//! contains a space, or itself starts with `:`).
//!
//! `Unsupported`/`ParseError` messages round-trip by replaying their stored
//! raw line verbatim, since the codec never really "understood" them well
//! enough to reconstruct one.

use crate::message::{Cap, CapPair, Command, Join, Message, Numeric};
use crate::tags::render_tags;

#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    #[error("parameter {index} (value {value:?}) of {command} can't be a non-final wire parameter: it is empty, contains a space, or starts with ':'")]
    InvalidMiddleParam {
        command: String,
        index: usize,
        value: String,
    },
}

pub fn marshal(msg: &Message) -> Result<String, MarshalError> {
    if let Command::Unsupported { .. } | Command::ParseError { .. } = &msg.command {
        return Ok(format!("{}\r\n", msg.raw));
    }

    let mut out = String::new();
    if !msg.tags.is_empty() {
        out.push('@');
        out.push_str(&render_tags(&msg.tags));
        out.push(' ');
    }
    if let Some(prefix) = &msg.prefix {
        out.push(':');
        out.push_str(&prefix.to_string());
        out.push(' ');
    }

    let (command_token, params) = render_command(&msg.command);
    out.push_str(&command_token);
    if !params.is_empty() {
        out.push(' ');
        out.push_str(&render_params(&command_token, &params)?);
    }
    out.push_str("\r\n");
    Ok(out)
}

fn render_params(command: &str, params: &[String]) -> Result<String, MarshalError> {
    let mut out = String::new();
    let last_idx = params.len() - 1;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let needs_trailing = p.is_empty() || p.contains(' ') || p.starts_with(':');
        if needs_trailing {
            if i != last_idx {
                return Err(MarshalError::InvalidMiddleParam {
                    command: command.to_owned(),
                    index: i,
                    value: p.clone(),
                });
            }
            out.push(':');
        }
        out.push_str(p);
    }
    Ok(out)
}

fn render_cap_pairs(pairs: &[CapPair]) -> String {
    pairs
        .iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{}={}", k, v),
            None => k.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_cap(cap: &Cap) -> Vec<String> {
    match cap {
        Cap::LsRequest { version } => {
            let mut v = vec!["LS".to_owned()];
            if let Some(version) = version {
                v.push(version.to_string());
            }
            v
        }
        Cap::LsReply { nick, more, caps } => {
            let mut v = vec![nick.clone(), "LS".to_owned()];
            if *more {
                v.push("*".to_owned());
            }
            v.push(render_cap_pairs(caps));
            v
        }
        Cap::ListRequest => vec!["LIST".to_owned()],
        Cap::ListReply { nick, more, caps } => {
            let mut v = vec![nick.clone(), "LIST".to_owned()];
            if *more {
                v.push("*".to_owned());
            }
            v.push(caps.join(" "));
            v
        }
        Cap::Req { caps } => vec!["REQ".to_owned(), caps.join(" ")],
        Cap::Ack { nick, caps } => vec![nick.clone(), "ACK".to_owned(), caps.join(" ")],
        Cap::Nak { nick, caps } => vec![nick.clone(), "NAK".to_owned(), caps.join(" ")],
        Cap::New { nick, caps } => vec![nick.clone(), "NEW".to_owned(), render_cap_pairs(caps)],
        Cap::Del { nick, caps } => vec![nick.clone(), "DEL".to_owned(), caps.join(" ")],
        Cap::End => vec!["END".to_owned()],
    }
}

fn render_numeric(n: &Numeric) -> Vec<String> {
    use Numeric::*;
    match n {
        Welcome { client, message } | YourHost { client, message } | Created { client, message } => {
            vec![client.clone(), message.clone()]
        }
        MyInfo { client, params } | LocalUsers { client, params } | GlobalUsers { client, params } => {
            let mut v = vec![client.clone()];
            v.extend(params.iter().cloned());
            v
        }
        ISupport { client, tokens, message } => {
            let mut v = vec![client.clone()];
            v.extend(tokens.iter().cloned());
            if let Some(message) = message {
                v.push(message.clone());
            }
            v
        }
        Bounce { client, message } => vec![client.clone(), message.clone()],
        LuserClient { client, message } | LuserMe { client, message } => {
            vec![client.clone(), message.clone()]
        }
        LuserOp { client, count, message }
        | LuserUnknown { client, count, message }
        | LuserChannels { client, count, message } => {
            vec![client.clone(), count.clone(), message.clone()]
        }
        Away { client, nick, message } => vec![client.clone(), nick.clone(), message.clone()],
        Unaway { client, message } | NowAway { client, message } => {
            vec![client.clone(), message.clone()]
        }
        WhoisUser { client, nick, user, host, realname } => vec![
            client.clone(),
            nick.clone(),
            user.clone(),
            host.clone(),
            "*".to_owned(),
            realname.clone(),
        ],
        WhoWasUser { client, nick, user, host, realname } => vec![
            client.clone(),
            nick.clone(),
            user.clone(),
            host.clone(),
            "*".to_owned(),
            realname.clone(),
        ],
        WhoisServer { client, nick, server, server_info } => {
            vec![client.clone(), nick.clone(), server.clone(), server_info.clone()]
        }
        WhoisOperator { client, nick, message } => vec![client.clone(), nick.clone(), message.clone()],
        EndOfWho { client, mask, message } => vec![client.clone(), mask.clone(), message.clone()],
        WhoisIdle { client, nick, idle_secs, signon, message } => {
            let mut v = vec![client.clone(), nick.clone(), idle_secs.clone()];
            if let Some(signon) = signon {
                v.push(signon.clone());
            }
            v.push(message.clone());
            v
        }
        EndOfWhois { client, nick, message } => vec![client.clone(), nick.clone(), message.clone()],
        WhoisChannels { client, nick, channels } => vec![client.clone(), nick.clone(), channels.clone()],
        List { client, channel, visible_count, topic } => {
            vec![client.clone(), channel.clone(), visible_count.clone(), topic.clone()]
        }
        ListEnd { client, message } => vec![client.clone(), message.clone()],
        ChannelModeIs { client, channel, modestring, args } => {
            let mut v = vec![client.clone(), channel.clone(), modestring.clone()];
            v.extend(args.iter().cloned());
            v
        }
        ChannelCreated { client, channel, created_at } => {
            vec![client.clone(), channel.clone(), created_at.clone()]
        }
        WhoisAccount { client, nick, account, message } => {
            vec![client.clone(), nick.clone(), account.clone(), message.clone()]
        }
        NoTopic { client, channel, message } => vec![client.clone(), channel.clone(), message.clone()],
        Topic { client, channel, topic } => vec![client.clone(), channel.clone(), topic.clone()],
        TopicWhoTime { client, channel, nick, set_at } => {
            vec![client.clone(), channel.clone(), nick.clone(), set_at.clone()]
        }
        WhoisActually { client, nick, address_form, message } => {
            let mut v = vec![client.clone(), nick.clone(), address_form.clone()];
            if let Some(message) = message {
                v.push(message.clone());
            }
            v
        }
        Inviting { client, channel, nick } => vec![client.clone(), channel.clone(), nick.clone()],
        InviteList { client, channel, mask } | BanList { client, channel, mask } | ExceptList { client, channel, mask } => {
            vec![client.clone(), channel.clone(), mask.clone()]
        }
        EndOfInviteList { client, channel, message }
        | EndOfExceptList { client, channel, message }
        | EndOfBanList { client, channel, message } => {
            vec![client.clone(), channel.clone(), message.clone()]
        }
        WhoReply { client, channel, user, host, server, nick, flags, hopcount, realname } => vec![
            client.clone(),
            channel.clone(),
            user.clone(),
            host.clone(),
            server.clone(),
            nick.clone(),
            flags.clone(),
            format!("{} {}", hopcount, realname),
        ],
        NamReply { client, symbol, channel, nicks } => {
            vec![client.clone(), symbol.clone(), channel.clone(), nicks.join(" ")]
        }
        EndOfNames { client, channel, message } => vec![client.clone(), channel.clone(), message.clone()],
        EndOfWhoWas { client, nick, message } => vec![client.clone(), nick.clone(), message.clone()],
        MotdStart { client, message } | EndOfMotd { client, message } => {
            vec![client.clone(), message.clone()]
        }
        Motd { client, line } => vec![client.clone(), line.clone()],
        Time { client, server, time } => vec![client.clone(), server.clone(), time.clone()],
        NoSuchNick { client, nick, message } => vec![client.clone(), nick.clone(), message.clone()],
        NoSuchChannel { client, channel, message }
        | CannotSendToChan { client, channel, message }
        | ChannelIsFull { client, channel, message }
        | InviteOnlyChan { client, channel, message }
        | BannedFromChan { client, channel, message }
        | BadChannelKey { client, channel, message }
        | NoChanModes { client, channel, message }
        | ChanOpPrivsNeeded { client, channel, message }
        | NotOnChannel { client, channel, message } => {
            vec![client.clone(), channel.clone(), message.clone()]
        }
        NoRecipient { client, message }
        | NoTextToSend { client, message }
        | NoNicknameGiven { client, message }
        | NotRegistered { client, message }
        | AlreadyRegistered { client, message }
        | PasswdMismatch { client, message }
        | YoureBannedCreep { client, message }
        | NoPrivileges { client, message }
        | StartTls { client, message }
        | StartTlsFailed { client, message } => vec![client.clone(), message.clone()],
        UnknownCommand { client, command, message } | NeedMoreParams { client, command, message } => {
            vec![client.clone(), command.clone(), message.clone()]
        }
        ErroneousNickname { client, nick, message } | NicknameInUse { client, nick, message } => {
            vec![client.clone(), nick.clone(), message.clone()]
        }
        UserNotInChannel { client, nick, channel, message } | UserOnChannel { client, nick, channel, message } => {
            vec![client.clone(), nick.clone(), channel.clone(), message.clone()]
        }
        UnknownMode { client, modechar, message } => vec![client.clone(), modechar.clone(), message.clone()],
        WhoisSecure { client, nick, message } => vec![client.clone(), nick.clone(), message.clone()],
        InvalidModeParam { client, target, modechar, param, message } => {
            vec![client.clone(), target.clone(), modechar.clone(), param.clone(), message.clone()]
        }
        HelpStart { client, subject, line } | HelpTxt { client, subject, line } | EndOfHelp { client, subject, line } => {
            vec![client.clone(), subject.clone(), line.clone()]
        }
        NoPrivs { client, priv_name, message } => vec![client.clone(), priv_name.clone(), message.clone()],
        Other { params, .. } => params.clone(),
    }
}

fn render_command(command: &Command) -> (String, Vec<String>) {
    match command {
        Command::Cap(cap) => ("CAP".to_owned(), render_cap(cap)),
        Command::Pass { password } => ("PASS".to_owned(), vec![password.clone()]),
        Command::Nick { nick } => ("NICK".to_owned(), vec![nick.clone()]),
        Command::User { user, mode, realname } => (
            "USER".to_owned(),
            vec![user.clone(), mode.clone(), "*".to_owned(), realname.clone()],
        ),
        Command::Oper { name, password } => ("OPER".to_owned(), vec![name.clone(), password.clone()]),
        Command::Quit { reason } => {
            let mut v = Vec::new();
            if let Some(reason) = reason {
                v.push(reason.clone());
            }
            ("QUIT".to_owned(), v)
        }
        Command::Join(Join::Zero) => ("JOIN".to_owned(), vec!["0".to_owned()]),
        Command::Join(Join::Channels { channels, keys }) => {
            let mut v = vec![channels.join(",")];
            if !keys.is_empty() {
                v.push(keys.join(","));
            }
            ("JOIN".to_owned(), v)
        }
        Command::Part { channels, reason } => {
            let mut v = vec![channels.join(",")];
            if let Some(reason) = reason {
                v.push(reason.clone());
            }
            ("PART".to_owned(), v)
        }
        Command::Kick { channel, nick, comment } => {
            let mut v = vec![channel.clone(), nick.clone()];
            if let Some(comment) = comment {
                v.push(comment.clone());
            }
            ("KICK".to_owned(), v)
        }
        Command::Mode { target, modestring, args } => {
            let mut v = vec![target.clone()];
            if let Some(modestring) = modestring {
                v.push(modestring.clone());
            }
            v.extend(args.iter().cloned());
            ("MODE".to_owned(), v)
        }
        Command::Topic { channel, topic } => {
            let mut v = vec![channel.clone()];
            if let Some(topic) = topic {
                v.push(topic.clone());
            }
            ("TOPIC".to_owned(), v)
        }
        Command::Privmsg { targets, text, ctcp } | Command::Notice { targets, text, ctcp } => {
            let command = if matches!(command, Command::Notice { .. }) { "NOTICE" } else { "PRIVMSG" };
            let body = match ctcp {
                Some(ctcp) if text.is_empty() => format!("\u{1}{}\u{1}", ctcp.tag()),
                Some(ctcp) => format!("\u{1}{} {}\u{1}", ctcp.tag(), text),
                None => text.clone(),
            };
            (command.to_owned(), vec![targets.join(","), body])
        }
        Command::Ping { token } => ("PING".to_owned(), vec![token.clone()]),
        Command::Pong { token } => ("PONG".to_owned(), vec![token.clone()]),
        Command::Error { reason } => ("ERROR".to_owned(), vec![reason.clone()]),
        Command::Numeric(n) => (format!("{:03}", n.code()), render_numeric(n)),
        Command::Unsupported { .. } | Command::ParseError { .. } => {
            unreachable!("handled by raw-line fast path in marshal()")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unmarshal::unmarshal;

    #[test]
    fn ping_pong_round_trip() {
        let msg = unmarshal("PING :xyz");
        assert_eq!(marshal(&msg).unwrap(), "PING :xyz\r\n");
    }

    #[test]
    fn privmsg_with_ctcp_reassembles_envelope() {
        let msg = unmarshal("PRIVMSG #chan :\u{1}ACTION waves\u{1}");
        assert_eq!(marshal(&msg).unwrap(), "PRIVMSG #chan :\u{1}ACTION waves\u{1}\r\n");
    }

    #[test]
    fn unsupported_round_trips_raw_line() {
        let msg = unmarshal("FROB a b c");
        assert_eq!(marshal(&msg).unwrap(), "FROB a b c\r\n");
    }

    #[test]
    fn numeric_renders_zero_padded_code() {
        let msg = unmarshal(":srv 001 nick :hi");
        assert_eq!(marshal(&msg).unwrap(), ":srv 001 nick :hi\r\n");
    }

    #[test]
    fn names_reply_round_trips() {
        let msg = unmarshal(":srv 353 me = #a :@alice +bob carol");
        assert_eq!(marshal(&msg).unwrap(), ":srv 353 me = #a :@alice +bob carol\r\n");
    }
}
