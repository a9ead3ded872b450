//! The wire message ADT. A closed sum type covering every
//! supported IRC line: IRCv3 capability subcommands, the registration and
//! channel commands, messaging commands, typed numeric replies, and the two
//! "meta" variants that absorb anything the codec can't model
//! (`Unsupported`, `ParseError`).

use std::fmt;

/// Sender of a message (RFC 2812 section 2.3.1). Kept as three optional
/// pieces rather than a single string so callers can tell a server prefix
/// from a user prefix without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub name: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

/// A client-to-client protocol payload embedded in a PRIVMSG/NOTICE body
/// (`\x01TYPE args\x01`). Not itself a wire message; the unmarshaller peels
/// it off the text of a PRIVMSG/NOTICE and attaches it to the `ctcp` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctcp {
    Action,
    Version,
    Other(String),
}

impl Ctcp {
    pub fn parse(tag: &str) -> Ctcp {
        match tag {
            "ACTION" => Ctcp::Action,
            "VERSION" => Ctcp::Version,
            other => Ctcp::Other(other.to_owned()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Ctcp::Action => "ACTION",
            Ctcp::Version => "VERSION",
            Ctcp::Other(s) => s,
        }
    }
}

/// `JOIN` has two shapes on the wire: the sentinel `JOIN 0` (leave every
/// channel) and a normal channel list with optional per-channel keys. These
/// are kept as distinct variants rather than an empty channel list, per the
/// boundary behavior that the two must be distinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Join {
    Zero,
    Channels {
        channels: Vec<String>,
        keys: Vec<String>,
    },
}

/// One `(name, prefix.value)` pair as carried by LS/LIST/NEW capability
/// messages. `value` is `None` when the server advertised the bare name.
pub type CapPair = (String, Option<String>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cap {
    /// Client-origin `CAP LS [version]`.
    LsRequest { version: Option<u32> },
    /// Server-origin `CAP <nick> LS [*] :<caps>`. `more` mirrors the
    /// trailing `*` continuation marker.
    LsReply {
        nick: String,
        more: bool,
        caps: Vec<CapPair>,
    },
    /// Client-origin `CAP LIST`.
    ListRequest,
    ListReply {
        nick: String,
        more: bool,
        caps: Vec<String>,
    },
    /// Client-origin `CAP REQ :<caps>`.
    Req { caps: Vec<String> },
    Ack { nick: String, caps: Vec<String> },
    Nak { nick: String, caps: Vec<String> },
    New { nick: String, caps: Vec<CapPair> },
    Del { nick: String, caps: Vec<String> },
    /// Client-origin `CAP END`.
    End,
}

/// The 001/002/003/004/005/353/etc. numeric replies, each named for the
/// field it carries. Numerics that aren't named individually here (the vast
/// majority of the 3-digit space) fall through to [`Numeric::Other`], which
/// keeps the raw parameter list; the engine only pattern-matches a handful of
/// numerics in its message-handling table, so the remainder doesn't need a
/// dedicated shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Numeric {
    Welcome { client: String, message: String },
    YourHost { client: String, message: String },
    Created { client: String, message: String },
    MyInfo { client: String, params: Vec<String> },
    ISupport {
        client: String,
        tokens: Vec<String>,
        message: Option<String>,
    },
    Bounce { client: String, message: String },

    LuserClient { client: String, message: String },
    LuserOp { client: String, count: String, message: String },
    LuserUnknown { client: String, count: String, message: String },
    LuserChannels { client: String, count: String, message: String },
    LuserMe { client: String, message: String },
    LocalUsers { client: String, params: Vec<String> },
    GlobalUsers { client: String, params: Vec<String> },

    Away { client: String, nick: String, message: String },
    Unaway { client: String, message: String },
    NowAway { client: String, message: String },

    WhoisUser {
        client: String,
        nick: String,
        user: String,
        host: String,
        realname: String,
    },
    WhoisServer {
        client: String,
        nick: String,
        server: String,
        server_info: String,
    },
    WhoisOperator { client: String, nick: String, message: String },
    WhoWasUser {
        client: String,
        nick: String,
        user: String,
        host: String,
        realname: String,
    },
    EndOfWho { client: String, mask: String, message: String },
    WhoisIdle {
        client: String,
        nick: String,
        idle_secs: String,
        signon: Option<String>,
        message: String,
    },
    EndOfWhois { client: String, nick: String, message: String },
    WhoisChannels { client: String, nick: String, channels: String },
    /// 338: address-form disambiguation (host vs. IP vs. nickname-only),
    /// kept as the raw text since servers disagree on shape. Some networks
    /// send a separate descriptive `message` after the address
    /// (`<address> :is actually using host`); others fold everything into
    /// one trailing parameter, in which case `address_form` holds that text
    /// and `message` is `None`.
    WhoisActually {
        client: String,
        nick: String,
        address_form: String,
        message: Option<String>,
    },

    List {
        client: String,
        channel: String,
        visible_count: String,
        topic: String,
    },
    ListEnd { client: String, message: String },
    ChannelModeIs {
        client: String,
        channel: String,
        modestring: String,
        args: Vec<String>,
    },
    ChannelCreated { client: String, channel: String, created_at: String },
    WhoisAccount { client: String, nick: String, account: String, message: String },
    NoTopic { client: String, channel: String, message: String },
    Topic { client: String, channel: String, topic: String },
    TopicWhoTime { client: String, channel: String, nick: String, set_at: String },
    Inviting { client: String, channel: String, nick: String },
    InviteList { client: String, channel: String, mask: String },
    EndOfInviteList { client: String, channel: String, message: String },
    ExceptList { client: String, channel: String, mask: String },
    EndOfExceptList { client: String, channel: String, message: String },

    /// WHO reply. `hopcount`/`realname` are split from one trailing
    /// parameter (`<hopcount> <realname>`) by a value splitter.
    WhoReply {
        client: String,
        channel: String,
        user: String,
        host: String,
        server: String,
        nick: String,
        flags: String,
        hopcount: String,
        realname: String,
    },
    NamReply {
        client: String,
        symbol: String,
        channel: String,
        nicks: Vec<String>,
    },
    EndOfNames { client: String, channel: String, message: String },
    BanList { client: String, channel: String, mask: String },
    EndOfBanList { client: String, channel: String, message: String },
    EndOfWhoWas { client: String, nick: String, message: String },

    MotdStart { client: String, message: String },
    Motd { client: String, line: String },
    EndOfMotd { client: String, message: String },
    Time { client: String, server: String, time: String },

    NoSuchNick { client: String, nick: String, message: String },
    NoSuchChannel { client: String, channel: String, message: String },
    CannotSendToChan { client: String, channel: String, message: String },
    NoRecipient { client: String, message: String },
    NoTextToSend { client: String, message: String },
    UnknownCommand { client: String, command: String, message: String },
    NoNicknameGiven { client: String, message: String },
    ErroneousNickname { client: String, nick: String, message: String },
    NicknameInUse { client: String, nick: String, message: String },
    UserNotInChannel { client: String, nick: String, channel: String, message: String },
    NotOnChannel { client: String, channel: String, message: String },
    UserOnChannel { client: String, nick: String, channel: String, message: String },
    NotRegistered { client: String, message: String },
    NeedMoreParams { client: String, command: String, message: String },
    AlreadyRegistered { client: String, message: String },
    PasswdMismatch { client: String, message: String },
    YoureBannedCreep { client: String, message: String },
    ChannelIsFull { client: String, channel: String, message: String },
    UnknownMode { client: String, modechar: String, message: String },
    InviteOnlyChan { client: String, channel: String, message: String },
    BannedFromChan { client: String, channel: String, message: String },
    BadChannelKey { client: String, channel: String, message: String },
    NoChanModes { client: String, channel: String, message: String },
    NoPrivileges { client: String, message: String },
    ChanOpPrivsNeeded { client: String, channel: String, message: String },

    StartTls { client: String, message: String },
    WhoisSecure { client: String, nick: String, message: String },
    StartTlsFailed { client: String, message: String },
    InvalidModeParam {
        client: String,
        target: String,
        modechar: String,
        param: String,
        message: String,
    },
    HelpStart { client: String, subject: String, line: String },
    HelpTxt { client: String, subject: String, line: String },
    EndOfHelp { client: String, subject: String, line: String },
    NoPrivs { client: String, priv_name: String, message: String },

    /// Any numeric not named above; `code` keeps the 3-digit value.
    Other { code: u16, params: Vec<String> },
}

impl Numeric {
    /// The numeric code this value renders as, used by the marshaller.
    pub fn code(&self) -> u16 {
        use Numeric::*;
        match self {
            Welcome { .. } => 1,
            YourHost { .. } => 2,
            Created { .. } => 3,
            MyInfo { .. } => 4,
            ISupport { .. } => 5,
            Bounce { .. } => 10,
            LuserClient { .. } => 251,
            LuserOp { .. } => 252,
            LuserUnknown { .. } => 253,
            LuserChannels { .. } => 254,
            LuserMe { .. } => 255,
            LocalUsers { .. } => 265,
            GlobalUsers { .. } => 266,
            Away { .. } => 301,
            Unaway { .. } => 305,
            NowAway { .. } => 306,
            WhoisUser { .. } => 311,
            WhoisServer { .. } => 312,
            WhoisOperator { .. } => 313,
            WhoWasUser { .. } => 314,
            EndOfWho { .. } => 315,
            WhoisIdle { .. } => 317,
            EndOfWhois { .. } => 318,
            WhoisChannels { .. } => 319,
            List { .. } => 322,
            ListEnd { .. } => 323,
            ChannelModeIs { .. } => 324,
            ChannelCreated { .. } => 329,
            WhoisAccount { .. } => 330,
            NoTopic { .. } => 331,
            Topic { .. } => 332,
            TopicWhoTime { .. } => 333,
            WhoisActually { .. } => 338,
            Inviting { .. } => 341,
            InviteList { .. } => 346,
            EndOfInviteList { .. } => 347,
            ExceptList { .. } => 348,
            EndOfExceptList { .. } => 349,
            WhoReply { .. } => 352,
            NamReply { .. } => 353,
            EndOfNames { .. } => 366,
            BanList { .. } => 367,
            EndOfBanList { .. } => 368,
            EndOfWhoWas { .. } => 369,
            Motd { .. } => 372,
            MotdStart { .. } => 375,
            EndOfMotd { .. } => 376,
            Time { .. } => 391,
            NoSuchNick { .. } => 401,
            NoSuchChannel { .. } => 403,
            CannotSendToChan { .. } => 404,
            NoRecipient { .. } => 411,
            NoTextToSend { .. } => 412,
            UnknownCommand { .. } => 421,
            NoNicknameGiven { .. } => 431,
            ErroneousNickname { .. } => 432,
            NicknameInUse { .. } => 433,
            UserNotInChannel { .. } => 441,
            NotOnChannel { .. } => 442,
            UserOnChannel { .. } => 443,
            NotRegistered { .. } => 451,
            NeedMoreParams { .. } => 461,
            AlreadyRegistered { .. } => 462,
            PasswdMismatch { .. } => 464,
            YoureBannedCreep { .. } => 465,
            ChannelIsFull { .. } => 471,
            UnknownMode { .. } => 472,
            InviteOnlyChan { .. } => 473,
            BannedFromChan { .. } => 474,
            BadChannelKey { .. } => 475,
            NoChanModes { .. } => 477,
            NoPrivileges { .. } => 481,
            ChanOpPrivsNeeded { .. } => 482,
            StartTls { .. } => 670,
            WhoisSecure { .. } => 671,
            StartTlsFailed { .. } => 691,
            InvalidModeParam { .. } => 696,
            HelpStart { .. } => 704,
            HelpTxt { .. } => 705,
            EndOfHelp { .. } => 706,
            NoPrivs { .. } => 723,
            Other { code, .. } => *code,
        }
    }
}

/// The non-numeric command surface: capability negotiation, registration,
/// channel operations, and plain messaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Cap(Cap),

    Pass { password: String },
    Nick { nick: String },
    User { user: String, mode: String, realname: String },
    Oper { name: String, password: String },
    Quit { reason: Option<String> },

    Join(Join),
    Part { channels: Vec<String>, reason: Option<String> },
    Kick { channel: String, nick: String, comment: Option<String> },
    Mode { target: String, modestring: Option<String>, args: Vec<String> },
    Topic { channel: String, topic: Option<String> },

    Privmsg { targets: Vec<String>, text: String, ctcp: Option<Ctcp> },
    Notice { targets: Vec<String>, text: String, ctcp: Option<Ctcp> },
    Ping { token: String },
    Pong { token: String },
    Error { reason: String },

    Numeric(Numeric),

    /// Command token not recognized by the unmarshaller. `command` is
    /// `None` only when the line itself didn't even parse structurally.
    Unsupported { command: Option<String>, params: Vec<String> },

    /// Structurally valid, semantically rejected: at least one parameter
    /// extractor fell back to its default. Carries the failed extractor
    /// names so callers can report what went wrong without discarding the
    /// rest of the message.
    ParseError {
        command: String,
        reason: String,
        error_parameters: Vec<String>,
    },
}

/// A full wire message: the raw line plus tags, optional prefix, and the
/// typed command payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub raw: String,
    pub tags: Vec<(String, Option<String>)>,
    pub prefix: Option<Prefix>,
    pub command: Command,
}

impl Message {
    pub fn new(
        raw: impl Into<String>,
        tags: Vec<(String, Option<String>)>,
        prefix: Option<Prefix>,
        command: Command,
    ) -> Self {
        Message {
            raw: raw.into(),
            tags,
            prefix,
            command,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(user) = &self.user {
            write!(f, "!{}", user)?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{}", host)?;
        }
        Ok(())
    }
}
