//! The user command surface, produced by the (out-of-scope) `/command`
//! parser and consumed by the engine.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Exit,
    Help,
    Join {
        channels: Vec<String>,
        keys: Vec<String>,
        no_switch: bool,
    },
    Kick {
        channel: String,
        nick: String,
        reason: Option<String>,
    },
    Mode {
        target: String,
        mode_string: Option<String>,
        args: Vec<String>,
    },
    Msg {
        targets: Vec<String>,
        text: String,
    },
    /// No explicit target; resolves through `focused_channel()`.
    MsgCurrent {
        text: String,
    },
    Nick {
        nick: String,
    },
    Notice {
        targets: Vec<String>,
        text: String,
    },
    Part {
        channels: Vec<String>,
        reason: Option<String>,
    },
    Quit {
        reason: Option<String>,
    },
}
