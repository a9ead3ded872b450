//! Tokenize a wire line into tags/prefix/command/params, then dispatch by
//! command to a per-command extractor built from the [`crate::extract`]
//! framework.
//!
//! Unknown commands become [`Command::Unsupported`]; lines that don't even
//! match the grammar (no command token found) become `Unsupported` with a
//! `None` command. Per-parameter conversion failures never abort the parse —
//! see [`ExtractCtx`].

use crate::extract::{
    if_index, if_index_equals, split_hopcount_realname, ExtractCtx, Params,
};
use crate::message::{Cap, CapPair, Command, Ctcp, Join, Message, Numeric, Prefix};
use crate::tags::parse_tags;

struct Lexed {
    tags: Vec<(String, Option<String>)>,
    prefix: Option<Prefix>,
    command: String,
    params: Vec<String>,
}

/// Split a wire line into its four grammar pieces. Returns `None` when the
/// line doesn't even have a command token (an empty line, or a dangling
/// `@tags`/`:prefix` with no terminating space) — that's the "structurally
/// invalid" case the caller turns into `Unsupported { command: None, .. }`.
fn lex(line: &str) -> Option<Lexed> {
    let mut rest = line;

    let mut tags = Vec::new();
    if let Some(stripped) = rest.strip_prefix('@') {
        let idx = stripped.find(' ')?;
        tags = parse_tags(&stripped[..idx]);
        rest = stripped[idx + 1..].trim_start_matches(' ');
    }

    let mut prefix = None;
    if let Some(stripped) = rest.strip_prefix(':') {
        let idx = stripped.find(' ')?;
        prefix = Some(parse_prefix(&stripped[..idx]));
        rest = stripped[idx + 1..].trim_start_matches(' ');
    }

    if rest.is_empty() {
        return None;
    }

    let (command, params_raw) = match rest.find(' ') {
        Some(idx) => (&rest[..idx], rest[idx + 1..].trim_start_matches(' ')),
        None => (rest, ""),
    };
    if command.is_empty() {
        return None;
    }

    Some(Lexed {
        tags,
        prefix,
        command: command.to_owned(),
        params: parse_params(params_raw),
    })
}

/// `name['!'user]['@'host]` (RFC 2812 section 2.3.1).
fn parse_prefix(raw: &str) -> Prefix {
    let (name_user, host) = match raw.find('@') {
        Some(idx) => (&raw[..idx], Some(raw[idx + 1..].to_owned())),
        None => (raw, None),
    };
    let (name, user) = match name_user.find('!') {
        Some(idx) => (
            name_user[..idx].to_owned(),
            Some(name_user[idx + 1..].to_owned()),
        ),
        None => (name_user.to_owned(), None),
    };
    Prefix { name, user, host }
}

/// `middle (SP middle)* [SP ':' trailing]`. A lone `:` yields one empty
/// trailing parameter; extra whitespace between middles is tolerated.
fn parse_params(s: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = s;
    loop {
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing.to_owned());
            break;
        }
        match rest.find(' ') {
            Some(idx) => {
                params.push(rest[..idx].to_owned());
                rest = rest[idx + 1..].trim_start_matches(' ');
            }
            None => {
                params.push(rest.to_owned());
                break;
            }
        }
    }
    params
}

fn split_comma(s: &str) -> Vec<String> {
    s.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn split_ws(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_owned).collect()
}

fn parse_cap_pairs(s: &str) -> Vec<CapPair> {
    split_ws(s)
        .into_iter()
        .map(|tok| match tok.split_once('=') {
            Some((k, v)) => (k.to_owned(), Some(v.to_owned())),
            None => (tok, None),
        })
        .collect()
}

/// Peel a leading `\x01TAG args\x01` CTCP envelope off a PRIVMSG/NOTICE
/// body, if present, mutating `text` to the remaining payload.
fn extract_ctcp(text: &mut String) -> Option<Ctcp> {
    if !text.starts_with('\u{1}') {
        return None;
    }
    let inner = &text[1..];
    let end = inner.find('\u{1}').unwrap_or(inner.len());
    let body = &inner[..end];
    let (tag, body_rest) = match body.split_once(' ') {
        Some((t, r)) => (t, r),
        None => (body, ""),
    };
    let ctcp = Ctcp::parse(tag);
    *text = body_rest.to_owned();
    Some(ctcp)
}

fn build_privmsg_or_notice(is_notice: bool, params: &[String], ctx: &mut ExtractCtx) -> Command {
    let (target_name, text_name) = if is_notice {
        ("notice.target", "notice.text")
    } else {
        ("privmsg.target", "privmsg.text")
    };
    let mut p = Params::new(params);
    let targets_raw = p.required(target_name, "", ctx);
    let mut text = p.required(text_name, "", ctx);
    let ctcp = extract_ctcp(&mut text);
    let targets = split_comma(&targets_raw);
    if is_notice {
        Command::Notice { targets, text, ctcp }
    } else {
        Command::Privmsg { targets, text, ctcp }
    }
}

fn build_join(params: &[String], ctx: &mut ExtractCtx) -> Command {
    if_index_equals(
        params,
        0,
        "0",
        || Command::Join(Join::Zero),
        || {
            let mut p = Params::new(params);
            let channels_raw = p.required("join.channels", "", ctx);
            let keys_raw = p.optional().unwrap_or_default();
            Command::Join(Join::Channels {
                channels: split_comma(&channels_raw),
                keys: split_comma(&keys_raw),
            })
        },
    )
}

fn build_cap(params: &[String], ctx: &mut ExtractCtx) -> Command {
    if_index(
        params,
        0,
        |v| matches!(v, "END" | "LS" | "LIST" | "REQ"),
        |first| build_cap_client(first, params, ctx),
        || build_cap_server(params, ctx),
    )
}

fn build_cap_client(first: &str, params: &[String], ctx: &mut ExtractCtx) -> Command {
    match first {
        "END" => Command::Cap(Cap::End),
        "LIST" => Command::Cap(Cap::ListRequest),
        "LS" => {
            let version = params.get(1).and_then(|v| v.parse().ok());
            Command::Cap(Cap::LsRequest { version })
        }
        "REQ" => {
            let mut p = Params::new(params);
            let _subcommand = p.required("cap.req.subcommand", "REQ", ctx);
            let caps = p.optional().unwrap_or_default();
            Command::Cap(Cap::Req { caps: split_ws(&caps) })
        }
        _ => unreachable!("predicate only matches END | LIST | LS | REQ"),
    }
}

/// `<nick> <subcommand> [*] :<caps>` forms sent by the server.
fn ls_or_list_tail(params: &[String]) -> (bool, String) {
    if_index_equals(
        params,
        2,
        "*",
        || (true, params.get(3).cloned().unwrap_or_default()),
        || (false, params.get(2).cloned().unwrap_or_default()),
    )
}

fn build_cap_server(params: &[String], ctx: &mut ExtractCtx) -> Command {
    let mut p = Params::new(params);
    let nick = p.required("cap.nick", "", ctx);
    let subcommand = p.required("cap.subcommand", "", ctx);
    match subcommand.as_str() {
        "LS" => {
            let (more, caps) = ls_or_list_tail(params);
            Command::Cap(Cap::LsReply {
                nick,
                more,
                caps: parse_cap_pairs(&caps),
            })
        }
        "LIST" => {
            let (more, caps) = ls_or_list_tail(params);
            Command::Cap(Cap::ListReply {
                nick,
                more,
                caps: split_ws(&caps),
            })
        }
        "ACK" => {
            let caps = p.optional().unwrap_or_default();
            Command::Cap(Cap::Ack { nick, caps: split_ws(&caps) })
        }
        "NAK" => {
            let caps = p.optional().unwrap_or_default();
            Command::Cap(Cap::Nak { nick, caps: split_ws(&caps) })
        }
        "NEW" => {
            let caps = p.optional().unwrap_or_default();
            Command::Cap(Cap::New {
                nick,
                caps: parse_cap_pairs(&caps),
            })
        }
        "DEL" => {
            let caps = p.optional().unwrap_or_default();
            Command::Cap(Cap::Del { nick, caps: split_ws(&caps) })
        }
        _ => {
            ctx.record("cap.subcommand");
            Command::Cap(Cap::End)
        }
    }
}

/// ISUPPORT (005)'s trailing "are supported by this server" text is
/// present on some networks and absent on others; accept both by treating a
/// final token containing whitespace as the message and everything before it
/// as tokens.
fn split_isupport_tail(mut rest: Vec<String>) -> (Vec<String>, Option<String>) {
    if rest.last().map(|s| s.contains(' ')).unwrap_or(false) {
        let message = rest.pop();
        (rest, message)
    } else {
        (rest, None)
    }
}

fn build_numeric(code: u16, params: &[String], ctx: &mut ExtractCtx) -> Numeric {
    let mut p = Params::new(params);
    match code {
        1 => Numeric::Welcome {
            client: p.required("001.client", "", ctx),
            message: p.required("001.message", "", ctx),
        },
        2 => Numeric::YourHost {
            client: p.required("002.client", "", ctx),
            message: p.required("002.message", "", ctx),
        },
        3 => Numeric::Created {
            client: p.required("003.client", "", ctx),
            message: p.required("003.message", "", ctx),
        },
        4 => {
            let client = p.required("004.client", "", ctx);
            Numeric::MyInfo { client, params: p.rest() }
        }
        5 => {
            let client = p.required("005.client", "", ctx);
            let (tokens, message) = split_isupport_tail(p.rest());
            Numeric::ISupport { client, tokens, message }
        }
        10 => Numeric::Bounce {
            client: p.required("010.client", "", ctx),
            message: p.required("010.message", "", ctx),
        },
        251 => Numeric::LuserClient {
            client: p.required("251.client", "", ctx),
            message: p.required("251.message", "", ctx),
        },
        252 => Numeric::LuserOp {
            client: p.required("252.client", "", ctx),
            count: p.required("252.count", "0", ctx),
            message: p.required("252.message", "", ctx),
        },
        253 => Numeric::LuserUnknown {
            client: p.required("253.client", "", ctx),
            count: p.required("253.count", "0", ctx),
            message: p.required("253.message", "", ctx),
        },
        254 => Numeric::LuserChannels {
            client: p.required("254.client", "", ctx),
            count: p.required("254.count", "0", ctx),
            message: p.required("254.message", "", ctx),
        },
        255 => Numeric::LuserMe {
            client: p.required("255.client", "", ctx),
            message: p.required("255.message", "", ctx),
        },
        265 => {
            let client = p.required("265.client", "", ctx);
            Numeric::LocalUsers { client, params: p.rest() }
        }
        266 => {
            let client = p.required("266.client", "", ctx);
            Numeric::GlobalUsers { client, params: p.rest() }
        }
        301 => Numeric::Away {
            client: p.required("301.client", "", ctx),
            nick: p.required("301.nick", "", ctx),
            message: p.required("301.message", "", ctx),
        },
        305 => Numeric::Unaway {
            client: p.required("305.client", "", ctx),
            message: p.required("305.message", "", ctx),
        },
        306 => Numeric::NowAway {
            client: p.required("306.client", "", ctx),
            message: p.required("306.message", "", ctx),
        },
        311 => {
            let client = p.required("311.client", "", ctx);
            let nick = p.required("311.nick", "", ctx);
            let user = p.required("311.user", "", ctx);
            let host = p.required("311.host", "", ctx);
            let _sep = p.required("311.sep", "*", ctx);
            let realname = p.required("311.realname", "", ctx);
            Numeric::WhoisUser { client, nick, user, host, realname }
        }
        312 => Numeric::WhoisServer {
            client: p.required("312.client", "", ctx),
            nick: p.required("312.nick", "", ctx),
            server: p.required("312.server", "", ctx),
            server_info: p.required("312.server_info", "", ctx),
        },
        313 => Numeric::WhoisOperator {
            client: p.required("313.client", "", ctx),
            nick: p.required("313.nick", "", ctx),
            message: p.required("313.message", "", ctx),
        },
        314 => {
            let client = p.required("314.client", "", ctx);
            let nick = p.required("314.nick", "", ctx);
            let user = p.required("314.user", "", ctx);
            let host = p.required("314.host", "", ctx);
            let _sep = p.required("314.sep", "*", ctx);
            let realname = p.required("314.realname", "", ctx);
            Numeric::WhoWasUser { client, nick, user, host, realname }
        }
        315 => Numeric::EndOfWho {
            client: p.required("315.client", "", ctx),
            mask: p.required("315.mask", "", ctx),
            message: p.required("315.message", "", ctx),
        },
        317 => {
            let client = p.required("317.client", "", ctx);
            let nick = p.required("317.nick", "", ctx);
            let idle_secs = p.required("317.idle_secs", "0", ctx);
            let signon = if p.remaining() > 1 { p.optional() } else { None };
            let message = p.required("317.message", "", ctx);
            Numeric::WhoisIdle { client, nick, idle_secs, signon, message }
        }
        318 => Numeric::EndOfWhois {
            client: p.required("318.client", "", ctx),
            nick: p.required("318.nick", "", ctx),
            message: p.required("318.message", "", ctx),
        },
        319 => Numeric::WhoisChannels {
            client: p.required("319.client", "", ctx),
            nick: p.required("319.nick", "", ctx),
            channels: p.required("319.channels", "", ctx),
        },
        322 => Numeric::List {
            client: p.required("322.client", "", ctx),
            channel: p.required("322.channel", "", ctx),
            visible_count: p.required("322.visible_count", "0", ctx),
            topic: p.required("322.topic", "", ctx),
        },
        323 => Numeric::ListEnd {
            client: p.required("323.client", "", ctx),
            message: p.required("323.message", "", ctx),
        },
        324 => {
            let client = p.required("324.client", "", ctx);
            let channel = p.required("324.channel", "", ctx);
            let modestring = p.required("324.modestring", "", ctx);
            Numeric::ChannelModeIs { client, channel, modestring, args: p.rest() }
        }
        329 => Numeric::ChannelCreated {
            client: p.required("329.client", "", ctx),
            channel: p.required("329.channel", "", ctx),
            created_at: p.required("329.created_at", "0", ctx),
        },
        330 => Numeric::WhoisAccount {
            client: p.required("330.client", "", ctx),
            nick: p.required("330.nick", "", ctx),
            account: p.required("330.account", "", ctx),
            message: p.required("330.message", "", ctx),
        },
        331 => Numeric::NoTopic {
            client: p.required("331.client", "", ctx),
            channel: p.required("331.channel", "", ctx),
            message: p.required("331.message", "", ctx),
        },
        332 => Numeric::Topic {
            client: p.required("332.client", "", ctx),
            channel: p.required("332.channel", "", ctx),
            topic: p.required("332.topic", "", ctx),
        },
        333 => Numeric::TopicWhoTime {
            client: p.required("333.client", "", ctx),
            channel: p.required("333.channel", "", ctx),
            nick: p.required("333.nick", "", ctx),
            set_at: p.required("333.set_at", "0", ctx),
        },
        338 => {
            let client = p.required("338.client", "", ctx);
            let nick = p.required("338.nick", "", ctx);
            let (address_form, message) = if_index(
                params,
                3,
                |_| true,
                |_| {
                    let address_form = p.required("338.address_form", "", ctx);
                    (address_form, p.optional())
                },
                || (p.required("338.address_form", "", ctx), None),
            );
            Numeric::WhoisActually { client, nick, address_form, message }
        }
        341 => Numeric::Inviting {
            client: p.required("341.client", "", ctx),
            channel: p.required("341.channel", "", ctx),
            nick: p.required("341.nick", "", ctx),
        },
        346 => Numeric::InviteList {
            client: p.required("346.client", "", ctx),
            channel: p.required("346.channel", "", ctx),
            mask: p.required("346.mask", "", ctx),
        },
        347 => Numeric::EndOfInviteList {
            client: p.required("347.client", "", ctx),
            channel: p.required("347.channel", "", ctx),
            message: p.required("347.message", "", ctx),
        },
        348 => Numeric::ExceptList {
            client: p.required("348.client", "", ctx),
            channel: p.required("348.channel", "", ctx),
            mask: p.required("348.mask", "", ctx),
        },
        349 => Numeric::EndOfExceptList {
            client: p.required("349.client", "", ctx),
            channel: p.required("349.channel", "", ctx),
            message: p.required("349.message", "", ctx),
        },
        352 => {
            let client = p.required("352.client", "", ctx);
            let channel = p.required("352.channel", "", ctx);
            let user = p.required("352.user", "", ctx);
            let host = p.required("352.host", "", ctx);
            let server = p.required("352.server", "", ctx);
            let nick = p.required("352.nick", "", ctx);
            let flags = p.required("352.flags", "", ctx);
            let (hopcount, realname) = p.split(
                "352.hopcount_realname",
                split_hopcount_realname,
                ("0".to_owned(), String::new()),
                ctx,
            );
            Numeric::WhoReply {
                client,
                channel,
                user,
                host,
                server,
                nick,
                flags,
                hopcount,
                realname,
            }
        }
        353 => {
            let client = p.required("353.client", "", ctx);
            let symbol = p.required("353.symbol", "=", ctx);
            let channel = p.required("353.channel", "", ctx);
            let nicks_raw = p.required("353.nicks", "", ctx);
            Numeric::NamReply { client, symbol, channel, nicks: split_ws(&nicks_raw) }
        }
        366 => Numeric::EndOfNames {
            client: p.required("366.client", "", ctx),
            channel: p.required("366.channel", "", ctx),
            message: p.required("366.message", "", ctx),
        },
        367 => Numeric::BanList {
            client: p.required("367.client", "", ctx),
            channel: p.required("367.channel", "", ctx),
            mask: p.required("367.mask", "", ctx),
        },
        368 => Numeric::EndOfBanList {
            client: p.required("368.client", "", ctx),
            channel: p.required("368.channel", "", ctx),
            message: p.required("368.message", "", ctx),
        },
        369 => Numeric::EndOfWhoWas {
            client: p.required("369.client", "", ctx),
            nick: p.required("369.nick", "", ctx),
            message: p.required("369.message", "", ctx),
        },
        372 => Numeric::Motd {
            client: p.required("372.client", "", ctx),
            line: p.required("372.line", "", ctx),
        },
        375 => Numeric::MotdStart {
            client: p.required("375.client", "", ctx),
            message: p.required("375.message", "", ctx),
        },
        376 => Numeric::EndOfMotd {
            client: p.required("376.client", "", ctx),
            message: p.required("376.message", "", ctx),
        },
        391 => Numeric::Time {
            client: p.required("391.client", "", ctx),
            server: p.required("391.server", "", ctx),
            time: p.required("391.time", "", ctx),
        },
        401 => Numeric::NoSuchNick {
            client: p.required("401.client", "", ctx),
            nick: p.required("401.nick", "", ctx),
            message: p.required("401.message", "", ctx),
        },
        403 => Numeric::NoSuchChannel {
            client: p.required("403.client", "", ctx),
            channel: p.required("403.channel", "", ctx),
            message: p.required("403.message", "", ctx),
        },
        404 => Numeric::CannotSendToChan {
            client: p.required("404.client", "", ctx),
            channel: p.required("404.channel", "", ctx),
            message: p.required("404.message", "", ctx),
        },
        411 => Numeric::NoRecipient {
            client: p.required("411.client", "", ctx),
            message: p.required("411.message", "", ctx),
        },
        412 => Numeric::NoTextToSend {
            client: p.required("412.client", "", ctx),
            message: p.required("412.message", "", ctx),
        },
        421 => Numeric::UnknownCommand {
            client: p.required("421.client", "", ctx),
            command: p.required("421.command", "", ctx),
            message: p.required("421.message", "", ctx),
        },
        431 => Numeric::NoNicknameGiven {
            client: p.required("431.client", "", ctx),
            message: p.required("431.message", "", ctx),
        },
        432 => Numeric::ErroneousNickname {
            client: p.required("432.client", "", ctx),
            nick: p.required("432.nick", "", ctx),
            message: p.required("432.message", "", ctx),
        },
        433 => Numeric::NicknameInUse {
            client: p.required("433.client", "", ctx),
            nick: p.required("433.nick", "", ctx),
            message: p.required("433.message", "", ctx),
        },
        441 => Numeric::UserNotInChannel {
            client: p.required("441.client", "", ctx),
            nick: p.required("441.nick", "", ctx),
            channel: p.required("441.channel", "", ctx),
            message: p.required("441.message", "", ctx),
        },
        442 => Numeric::NotOnChannel {
            client: p.required("442.client", "", ctx),
            channel: p.required("442.channel", "", ctx),
            message: p.required("442.message", "", ctx),
        },
        443 => Numeric::UserOnChannel {
            client: p.required("443.client", "", ctx),
            nick: p.required("443.nick", "", ctx),
            channel: p.required("443.channel", "", ctx),
            message: p.required("443.message", "", ctx),
        },
        451 => Numeric::NotRegistered {
            client: p.required("451.client", "", ctx),
            message: p.required("451.message", "", ctx),
        },
        461 => Numeric::NeedMoreParams {
            client: p.required("461.client", "", ctx),
            command: p.required("461.command", "", ctx),
            message: p.required("461.message", "", ctx),
        },
        462 => Numeric::AlreadyRegistered {
            client: p.required("462.client", "", ctx),
            message: p.required("462.message", "", ctx),
        },
        464 => Numeric::PasswdMismatch {
            client: p.required("464.client", "", ctx),
            message: p.required("464.message", "", ctx),
        },
        465 => Numeric::YoureBannedCreep {
            client: p.required("465.client", "", ctx),
            message: p.required("465.message", "", ctx),
        },
        471 => Numeric::ChannelIsFull {
            client: p.required("471.client", "", ctx),
            channel: p.required("471.channel", "", ctx),
            message: p.required("471.message", "", ctx),
        },
        472 => Numeric::UnknownMode {
            client: p.required("472.client", "", ctx),
            modechar: p.required("472.modechar", "", ctx),
            message: p.required("472.message", "", ctx),
        },
        473 => Numeric::InviteOnlyChan {
            client: p.required("473.client", "", ctx),
            channel: p.required("473.channel", "", ctx),
            message: p.required("473.message", "", ctx),
        },
        474 => Numeric::BannedFromChan {
            client: p.required("474.client", "", ctx),
            channel: p.required("474.channel", "", ctx),
            message: p.required("474.message", "", ctx),
        },
        475 => Numeric::BadChannelKey {
            client: p.required("475.client", "", ctx),
            channel: p.required("475.channel", "", ctx),
            message: p.required("475.message", "", ctx),
        },
        477 => Numeric::NoChanModes {
            client: p.required("477.client", "", ctx),
            channel: p.required("477.channel", "", ctx),
            message: p.required("477.message", "", ctx),
        },
        481 => Numeric::NoPrivileges {
            client: p.required("481.client", "", ctx),
            message: p.required("481.message", "", ctx),
        },
        482 => Numeric::ChanOpPrivsNeeded {
            client: p.required("482.client", "", ctx),
            channel: p.required("482.channel", "", ctx),
            message: p.required("482.message", "", ctx),
        },
        670 => Numeric::StartTls {
            client: p.required("670.client", "", ctx),
            message: p.required("670.message", "", ctx),
        },
        671 => Numeric::WhoisSecure {
            client: p.required("671.client", "", ctx),
            nick: p.required("671.nick", "", ctx),
            message: p.required("671.message", "", ctx),
        },
        691 => Numeric::StartTlsFailed {
            client: p.required("691.client", "", ctx),
            message: p.required("691.message", "", ctx),
        },
        696 => Numeric::InvalidModeParam {
            client: p.required("696.client", "", ctx),
            target: p.required("696.target", "", ctx),
            modechar: p.required("696.modechar", "", ctx),
            param: p.required("696.param", "", ctx),
            message: p.required("696.message", "", ctx),
        },
        704 => Numeric::HelpStart {
            client: p.required("704.client", "", ctx),
            subject: p.required("704.subject", "", ctx),
            line: p.required("704.line", "", ctx),
        },
        705 => Numeric::HelpTxt {
            client: p.required("705.client", "", ctx),
            subject: p.required("705.subject", "", ctx),
            line: p.required("705.line", "", ctx),
        },
        706 => Numeric::EndOfHelp {
            client: p.required("706.client", "", ctx),
            subject: p.required("706.subject", "", ctx),
            line: p.required("706.line", "", ctx),
        },
        723 => Numeric::NoPrivs {
            client: p.required("723.client", "", ctx),
            priv_name: p.required("723.priv_name", "", ctx),
            message: p.required("723.message", "", ctx),
        },
        other => Numeric::Other { code: other, params: params.to_vec() },
    }
}

fn dispatch(command: &str, params: &[String], ctx: &mut ExtractCtx) -> Command {
    if command.len() == 3 {
        if let Ok(code) = command.parse::<u16>() {
            return Command::Numeric(build_numeric(code, params, ctx));
        }
    }

    match command {
        "CAP" => build_cap(params, ctx),
        "PASS" => {
            let mut p = Params::new(params);
            Command::Pass { password: p.required("pass.password", "", ctx) }
        }
        "NICK" => {
            let mut p = Params::new(params);
            Command::Nick { nick: p.required("nick.nick", "", ctx) }
        }
        "USER" => {
            let mut p = Params::new(params);
            let user = p.required("user.user", "", ctx);
            let mode = p.required("user.mode", "0", ctx);
            let _unused = p.required("user.unused", "*", ctx);
            let realname = p.required("user.realname", "", ctx);
            Command::User { user, mode, realname }
        }
        "OPER" => {
            let mut p = Params::new(params);
            let name = p.required("oper.name", "", ctx);
            let password = p.required("oper.password", "", ctx);
            Command::Oper { name, password }
        }
        "QUIT" => {
            let mut p = Params::new(params);
            Command::Quit { reason: p.optional() }
        }
        "JOIN" => build_join(params, ctx),
        "PART" => {
            let mut p = Params::new(params);
            let channels_raw = p.required("part.channels", "", ctx);
            let reason = p.optional();
            Command::Part { channels: split_comma(&channels_raw), reason }
        }
        "KICK" => {
            let mut p = Params::new(params);
            let channel = p.required("kick.channel", "", ctx);
            let nick = p.required("kick.nick", "", ctx);
            let comment = p.optional();
            Command::Kick { channel, nick, comment }
        }
        "MODE" => {
            let mut p = Params::new(params);
            let target = p.required("mode.target", "", ctx);
            let modestring = p.optional();
            let args = p.rest();
            Command::Mode { target, modestring, args }
        }
        "TOPIC" => {
            let mut p = Params::new(params);
            let channel = p.required("topic.channel", "", ctx);
            let topic = p.optional();
            Command::Topic { channel, topic }
        }
        "PRIVMSG" => build_privmsg_or_notice(false, params, ctx),
        "NOTICE" => build_privmsg_or_notice(true, params, ctx),
        "PING" => {
            let mut p = Params::new(params);
            Command::Ping { token: p.required("ping.token", "", ctx) }
        }
        "PONG" => {
            let mut p = Params::new(params);
            Command::Pong { token: p.required("pong.token", "", ctx) }
        }
        "ERROR" => {
            let mut p = Params::new(params);
            Command::Error { reason: p.required("error.reason", "", ctx) }
        }
        other => Command::Unsupported {
            command: Some(other.to_owned()),
            params: params.to_vec(),
        },
    }
}

/// Parse one CRLF-stripped wire line into a [`Message`]. Never fails: a
/// structurally unrecognizable line becomes `Unsupported { command: None,
/// .. }`, and any parameter-level conversion failure downgrades the result
/// to `ParseError` rather than discarding it.
pub fn unmarshal(line: &str) -> Message {
    let line = line.trim_end_matches(['\r', '\n']);
    match lex(line) {
        None => Message::new(
            line.to_owned(),
            Vec::new(),
            None,
            Command::Unsupported { command: None, params: Vec::new() },
        ),
        Some(lexed) => {
            let command_upper = lexed.command.to_uppercase();
            let mut ctx = ExtractCtx::default();
            let parsed = dispatch(&command_upper, &lexed.params, &mut ctx);
            let command = if ctx.is_clean() || matches!(parsed, Command::Unsupported { .. }) {
                parsed
            } else {
                Command::ParseError {
                    command: command_upper,
                    reason: "one or more parameters failed to convert".to_owned(),
                    error_parameters: ctx.error_parameters,
                }
            };
            Message::new(line.to_owned(), lexed.tags, lexed.prefix, command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_colon_trailing_is_one_empty_param() {
        let msg = unmarshal("PRIVMSG #chan :");
        assert_eq!(
            msg.command,
            Command::Privmsg {
                targets: vec!["#chan".to_owned()],
                text: String::new(),
                ctcp: None,
            }
        );
    }

    #[test]
    fn join_zero_is_distinct_from_channel_join() {
        assert_eq!(unmarshal("JOIN 0").command, Command::Join(Join::Zero));
        match unmarshal("JOIN #a,#b").command {
            Command::Join(Join::Channels { channels, .. }) => {
                assert_eq!(channels, vec!["#a".to_owned(), "#b".to_owned()]);
            }
            other => panic!("expected Join::Channels, got {other:?}"),
        }
    }

    #[test]
    fn welcome_numeric_sets_client_and_message() {
        let msg = unmarshal(":srv 001 nick :Welcome to the network");
        assert_eq!(
            msg.command,
            Command::Numeric(Numeric::Welcome {
                client: "nick".to_owned(),
                message: "Welcome to the network".to_owned(),
            })
        );
        assert_eq!(msg.prefix.unwrap().name, "srv");
    }

    #[test]
    fn names_reply_splits_nick_list() {
        let msg = unmarshal(":srv 353 me = #a :@alice +bob carol");
        assert_eq!(
            msg.command,
            Command::Numeric(Numeric::NamReply {
                client: "me".to_owned(),
                symbol: "=".to_owned(),
                channel: "#a".to_owned(),
                nicks: vec!["@alice".to_owned(), "+bob".to_owned(), "carol".to_owned()],
            })
        );
    }

    #[test]
    fn cap_ls_split_continuation_sets_more_flag() {
        let first = unmarshal("CAP * LS * :server-time echo-message");
        match first.command {
            Command::Cap(Cap::LsReply { more, caps, .. }) => {
                assert!(more);
                assert_eq!(caps.len(), 2);
            }
            other => panic!("expected Cap::LsReply, got {other:?}"),
        }
        let last = unmarshal("CAP * LS :message-tags");
        match last.command {
            Command::Cap(Cap::LsReply { more, caps, .. }) => {
                assert!(!more);
                assert_eq!(caps, vec![("message-tags".to_owned(), None)]);
            }
            other => panic!("expected Cap::LsReply, got {other:?}"),
        }
    }

    #[test]
    fn ping_round_trips_token() {
        let msg = unmarshal("PING :xyz");
        assert_eq!(msg.command, Command::Ping { token: "xyz".to_owned() });
    }

    #[test]
    fn unknown_command_is_unsupported() {
        let msg = unmarshal("FROB a b c");
        assert_eq!(
            msg.command,
            Command::Unsupported {
                command: Some("FROB".to_owned()),
                params: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
            }
        );
    }

    #[test]
    fn structurally_invalid_line_is_unsupported_with_no_command() {
        let msg = unmarshal("@broken-tags-no-terminator");
        assert_eq!(
            msg.command,
            Command::Unsupported { command: None, params: Vec::new() }
        );
    }

    #[test]
    fn missing_required_param_downgrades_to_parse_error() {
        let msg = unmarshal("KICK #chan");
        match msg.command {
            Command::ParseError { command, error_parameters, .. } => {
                assert_eq!(command, "KICK");
                assert!(error_parameters.contains(&"kick.nick".to_owned()));
            }
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn ctcp_action_is_extracted_from_privmsg_body() {
        let msg = unmarshal("PRIVMSG #chan :\u{1}ACTION waves\u{1}");
        assert_eq!(
            msg.command,
            Command::Privmsg {
                targets: vec!["#chan".to_owned()],
                text: "waves".to_owned(),
                ctcp: Some(Ctcp::Action),
            }
        );
    }

    #[test]
    fn isupport_without_trailing_message_is_accepted() {
        let msg = unmarshal(":srv 005 me CASEMAPPING=ascii");
        assert_eq!(
            msg.command,
            Command::Numeric(Numeric::ISupport {
                client: "me".to_owned(),
                tokens: vec!["CASEMAPPING=ascii".to_owned()],
                message: None,
            })
        );
    }

    #[test]
    fn whois_actually_with_separate_address_and_message() {
        let msg = unmarshal(":srv 338 me alice 1.2.3.4 :is actually using host");
        assert_eq!(
            msg.command,
            Command::Numeric(Numeric::WhoisActually {
                client: "me".to_owned(),
                nick: "alice".to_owned(),
                address_form: "1.2.3.4".to_owned(),
                message: Some("is actually using host".to_owned()),
            })
        );
    }

    #[test]
    fn whois_actually_with_folded_message_has_no_separate_address() {
        let msg = unmarshal(":srv 338 me alice :is actually *@hidden");
        assert_eq!(
            msg.command,
            Command::Numeric(Numeric::WhoisActually {
                client: "me".to_owned(),
                nick: "alice".to_owned(),
                address_form: "is actually *@hidden".to_owned(),
                message: None,
            })
        );
    }

    #[test]
    fn who_reply_splits_hopcount_and_realname() {
        let msg = unmarshal(":srv 352 me #a u h s alice H :3 Alice Smith");
        assert_eq!(
            msg.command,
            Command::Numeric(Numeric::WhoReply {
                client: "me".to_owned(),
                channel: "#a".to_owned(),
                user: "u".to_owned(),
                host: "h".to_owned(),
                server: "s".to_owned(),
                nick: "alice".to_owned(),
                flags: "H".to_owned(),
                hopcount: "3".to_owned(),
                realname: "Alice Smith".to_owned(),
            })
        );
    }
}
