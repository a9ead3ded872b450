//! The single-writer engine loop. Work enters in exactly three
//! ways: an inbound wire line, a user command, or a periodic GC
//! tick. `Engine::run` drains a task channel and processes one task to
//! completion before the next — this serialization substitutes for locks on
//! `Session`, with `StateGuard` as the runtime backstop.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use irc_state::{Capability, Session};
use irc_wire::message::{Cap, Command as WireCommand, Ctcp, Join, Numeric};
use irc_wire::{marshal, unmarshal, Message};
use tokio::sync::mpsc;

use crate::command::Command;
use crate::connection::Connection;
use crate::display::Display;
use crate::error::EngineError;
use crate::guard::StateGuard;
use crate::nick::generate as generate_nick;
use crate::server_info::ServerInfo;
use crate::state_machine::{AtomicEngineState, EngineState};
use crate::throttle::OutboundThrottle;

const GC_INTERVAL_MILLIS: i64 = 5 * 60 * 1000;

/// Work delivered to the worker. The connection's ingress/shutdown handlers
/// and the command-parser collaborator all just push one of these onto a
/// channel; see `Engine::task_sender`.
enum CapOutcome {
    None,
    SendLine(String),
    SendCapEnd,
}

#[derive(Debug)]
pub enum WorkerTask {
    Inbound(String),
    UserCommand(Command),
    Gc(i64),
    Shutdown,
}

pub struct Engine<C, D> {
    state: AtomicEngineState,
    guard: StateGuard,
    server_info: ServerInfo,
    connection: C,
    display: D,
    session: Option<Session>,
    throttle: Option<OutboundThrottle>,
    cap_end_sent: bool,
    nick_seed: u32,
    tasks_tx: mpsc::UnboundedSender<WorkerTask>,
    tasks_rx: mpsc::UnboundedReceiver<WorkerTask>,
    gc_ticker: Option<tokio::task::JoinHandle<()>>,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Sleeps `GC_INTERVAL_MILLIS` and sends `WorkerTask::Gc` forever: a
/// standalone loop task pushed onto the same kind of channel the connection
/// uses, just without a reset signal, since a GC sweep doesn't need
/// debouncing. Stops once the worker side of `tasks_tx` is gone.
async fn gc_ticker(tasks_tx: mpsc::UnboundedSender<WorkerTask>) {
    loop {
        tokio::time::sleep(Duration::from_millis(GC_INTERVAL_MILLIS as u64)).await;
        if tasks_tx.send(WorkerTask::Gc(now_millis())).is_err() {
            return;
        }
    }
}

fn spawn_gc_ticker(tasks_tx: mpsc::UnboundedSender<WorkerTask>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(gc_ticker(tasks_tx))
}

impl<C: Connection, D: Display> Engine<C, D> {
    pub fn new(server_info: ServerInfo, connection: C, display: D) -> Self {
        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
        Engine {
            state: AtomicEngineState::new(EngineState::New),
            guard: StateGuard::new(),
            server_info,
            connection,
            display,
            session: None,
            throttle: None,
            cap_end_sent: false,
            nick_seed: 0,
            tasks_tx,
            tasks_rx,
            gc_ticker: None,
        }
    }

    pub fn with_throttle(mut self, throttle: OutboundThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// A clone of the sender that feeds the worker task queue. Hand this to
    /// the connection's ingress/shutdown handlers and to the command-parser
    /// collaborator.
    pub fn task_sender(&self) -> mpsc::UnboundedSender<WorkerTask> {
        self.tasks_tx.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// `New -> Initializing -> Disconnected`, then auto-enqueues a connect.
    pub fn start(&mut self) {
        self.guard.check();
        self.state.force(EngineState::Initializing);
        self.state.force(EngineState::Disconnected);
        let _ = self.tasks_tx.send(WorkerTask::UserCommand(Command::Connect));
    }

    /// Spawns the periodic GC ticker onto the ambient tokio runtime: every
    /// `GC_INTERVAL_MILLIS` it pushes `WorkerTask::Gc` onto the worker queue.
    /// Separate from `start()` since it needs a runtime to spawn onto, while
    /// `start()` itself stays runnable from a plain synchronous caller (e.g.
    /// tests). The returned ticker is aborted on `close()`.
    pub fn spawn_gc_ticker(&mut self) {
        self.gc_ticker = Some(spawn_gc_ticker(self.tasks_tx.clone()));
    }

    /// Drain the task queue, processing one task to completion at a time.
    pub async fn run(&mut self) {
        while let Some(task) = self.tasks_rx.recv().await {
            self.guard.check();
            self.run_task(task);
            if matches!(self.state.get(), EngineState::Closed) {
                break;
            }
        }
    }

    pub fn run_task(&mut self, task: WorkerTask) {
        self.guard.check();
        match task {
            WorkerTask::Inbound(line) => self.handle_inbound_line(&line),
            WorkerTask::UserCommand(cmd) => self.handle_user_command(cmd),
            WorkerTask::Gc(now) => {
                if let Some(session) = self.session.as_mut() {
                    session.gc(now - GC_INTERVAL_MILLIS);
                }
            }
            WorkerTask::Shutdown => self.on_shutdown(),
        }
    }

    fn connect(&mut self) {
        if !self.state.transition(EngineState::Disconnected, EngineState::Connecting) {
            return;
        }
        self.connection.start();
        self.state.force(EngineState::Connected);
        self.session = Some(Session::new());
        self.cap_end_sent = false;
        self.register();
    }

    fn register(&mut self) {
        self.send_line("CAP LS 302");
        if let Some(pass) = self.server_info.pass.clone() {
            self.send_line(&format!("PASS {pass}"));
        }
        let nick = self.resolve_nick();
        self.send_line(&format!("NICK {nick}"));
        let first = self
            .server_info
            .nicks
            .first()
            .cloned()
            .unwrap_or_else(|| nick.clone());
        self.send_line(&format!("USER {first} 0 * :{}", self.server_info.realname));
    }

    fn resolve_nick(&mut self) -> String {
        match self.server_info.nicks.first() {
            Some(n) if n == "auto" => {
                let nick = generate_nick(self.nick_seed);
                self.nick_seed += 1;
                nick
            }
            Some(n) => n.clone(),
            None => generate_nick(self.nick_seed),
        }
    }

    fn on_shutdown(&mut self) {
        self.state.force(EngineState::Disconnected);
        self.session = None;
        self.display.set_status("disconnected");
    }

    pub fn close(&mut self) {
        self.guard.check();
        if let Some(ticker) = self.gc_ticker.take() {
            ticker.abort();
        }
        self.connection.close();
        self.state.force(EngineState::Closed);
        self.session = None;
    }

    fn send_line(&mut self, line: &str) {
        let accepted = match self.throttle.as_mut() {
            Some(throttle) if !throttle.try_consume(now_millis()) => {
                log::warn!("outbound throttled, dropping line: {line:?}");
                false
            }
            _ => self.connection.offer(line),
        };
        if !accepted {
            log::warn!("connection rejected outbound line: {line:?}");
        }
    }

    fn send_command(&mut self, cmd: WireCommand) {
        let msg = Message::new(String::new(), Vec::new(), None, cmd);
        match marshal(&msg) {
            Ok(line) => self.send_line(line.trim_end_matches("\r\n")),
            Err(err) => log::error!("refusing to send malformed message: {err}"),
        }
    }

    fn send_cap_end(&mut self) {
        if !self.cap_end_sent {
            self.send_line("CAP END");
            self.cap_end_sent = true;
        }
    }

    //
    // Inbound
    //

    fn handle_inbound_line(&mut self, line: &str) {
        let msg = unmarshal(line);
        let time = self.message_time_millis(&msg);
        match &msg.command {
            WireCommand::Cap(cap) => {
                if matches!(self.state.get(), EngineState::Connected | EngineState::Registered) {
                    self.handle_cap(cap.clone());
                } else {
                    log::warn!("unsolicited CAP message while not connected: {cap:?}");
                }
            }
            WireCommand::Ping { token } => {
                if matches!(self.state.get(), EngineState::Connected | EngineState::Registered) {
                    self.send_command(WireCommand::Pong { token: token.clone() });
                }
            }
            WireCommand::Numeric(Numeric::Welcome { client, .. }) => {
                self.handle_welcome(client.clone());
            }
            _ if self.state.get() == EngineState::Registered => {
                self.handle_registered_message(&msg, time);
            }
            _ => {}
        }
    }

    fn handle_welcome(&mut self, client: String) {
        if self.state.get() != EngineState::Connected {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.set_me(&client, now_millis());
        }
        if !self.state.transition(EngineState::Connected, EngineState::Registered) {
            let err = EngineError::FatalTransition {
                from: "Connected".to_owned(),
                to: "Registered".to_owned(),
            };
            log::error!("{err}, disconnecting");
            self.on_shutdown();
            self.connection.close();
        } else {
            self.display.set_prompt(&client);
        }
    }

    fn handle_cap(&mut self, cap: Cap) {
        let registered = matches!(self.state.get(), EngineState::Registered);
        let outcome = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            match cap {
                Cap::LsReply { more, caps, .. } => {
                    if !session.capabilities().receiving() {
                        session.capabilities_mut().clear_server();
                        session.capabilities_mut().start_receiving();
                    }
                    for (name, value) in caps {
                        let capability = Capability::from(name.as_str());
                        if capability.is_known() {
                            session.capabilities_mut().add_server(capability, value);
                        }
                    }
                    if more {
                        CapOutcome::None
                    } else {
                        session.capabilities_mut().stop_receiving();
                        let names: Vec<String> =
                            session.capabilities().server_caps().map(|c| c.to_string()).collect();
                        if !names.is_empty() {
                            let to_request: Vec<Capability> =
                                session.capabilities().server_caps().cloned().collect();
                            for c in to_request {
                                session.capabilities_mut().add_requested(c);
                            }
                            CapOutcome::SendLine(format!("CAP REQ :{}", names.join(" ")))
                        } else if !registered {
                            CapOutcome::SendCapEnd
                        } else {
                            CapOutcome::None
                        }
                    }
                }
                Cap::Ack { caps, .. } => {
                    for name in caps {
                        session.capabilities_mut().enable(&Capability::from(name.as_str()));
                    }
                    if session.capabilities().requested_is_empty() && !registered {
                        CapOutcome::SendCapEnd
                    } else {
                        CapOutcome::None
                    }
                }
                Cap::Nak { caps, .. } => {
                    for name in caps {
                        session.capabilities_mut().remove_requested(&Capability::from(name.as_str()));
                    }
                    if session.capabilities().requested_is_empty() && !registered {
                        CapOutcome::SendCapEnd
                    } else {
                        CapOutcome::None
                    }
                }
                Cap::New { caps, .. } => {
                    let mut to_request = Vec::new();
                    for (name, value) in caps {
                        let capability = Capability::from(name.as_str());
                        if capability.is_known() {
                            session.capabilities_mut().add_server(capability.clone(), value);
                            if !session.capabilities().is_active(&capability) {
                                session.capabilities_mut().add_requested(capability.clone());
                                to_request.push(capability.to_string());
                            }
                        }
                    }
                    if to_request.is_empty() {
                        CapOutcome::None
                    } else {
                        CapOutcome::SendLine(format!("CAP REQ :{}", to_request.join(" ")))
                    }
                }
                Cap::Del { caps, .. } => {
                    for name in caps {
                        session.capabilities_mut().remove_server(&Capability::from(name.as_str()));
                    }
                    CapOutcome::None
                }
                Cap::LsRequest { .. } | Cap::ListRequest | Cap::ListReply { .. } | Cap::Req { .. } | Cap::End => {
                    CapOutcome::None
                }
            }
        };
        match outcome {
            CapOutcome::SendCapEnd => self.send_cap_end(),
            CapOutcome::SendLine(line) => self.send_line(&line),
            CapOutcome::None => {}
        }
    }

    fn handle_registered_message(&mut self, msg: &Message, time_millis: i64) {
        let sender = msg.prefix.as_ref().map(|p| p.name.clone());
        match &msg.command {
            WireCommand::Join(Join::Channels { channels, .. }) => {
                let Some(nick) = sender else { return };
                if let Some(session) = self.session.as_mut() {
                    for channel in channels {
                        session.add_channel_member(channel, &nick, [], time_millis);
                    }
                }
                self.display
                    .println(time_millis, Some(nick.as_str()), None, &format!("joined {}", channels.join(", ")));
            }
            WireCommand::Join(Join::Zero) => {}
            WireCommand::Part { channels, reason } => {
                let Some(nick) = sender else { return };
                if let Some(session) = self.session.as_mut() {
                    for channel in channels {
                        session.delete_channel_member(channel, &nick);
                    }
                }
                let text = match reason {
                    Some(r) => format!("left {} ({r})", channels.join(", ")),
                    None => format!("left {}", channels.join(", ")),
                };
                self.display.println(time_millis, Some(nick.as_str()), None, &text);
            }
            WireCommand::Kick { channel, nick, comment } => {
                if let Some(session) = self.session.as_mut() {
                    session.delete_channel_member(channel, nick);
                }
                let text = match comment {
                    Some(c) => format!("kicked {nick} from {channel} ({c})"),
                    None => format!("kicked {nick} from {channel}"),
                };
                self.display
                    .println(time_millis, sender.as_deref(), Some(channel.as_str()), &text);
            }
            WireCommand::Nick { nick: new_nick } => {
                let Some(old_nick) = sender else { return };
                if let Some(session) = self.session.as_mut() {
                    session.change_nickname(&old_nick, new_nick);
                }
                self.display.println(
                    time_millis,
                    Some(old_nick.as_str()),
                    None,
                    &format!("is now known as {new_nick}"),
                );
            }
            WireCommand::Quit { reason } => {
                let Some(nick) = sender else { return };
                if let Some(session) = self.session.as_mut() {
                    session.quit(&nick);
                }
                let text = match reason {
                    Some(r) => format!("quit ({r})"),
                    None => "quit".to_owned(),
                };
                self.display.println(time_millis, Some(nick.as_str()), None, &text);
            }
            WireCommand::Privmsg { targets, text, ctcp } | WireCommand::Notice { targets, text, ctcp } => {
                if let Some(nick) = &sender {
                    if let Some(session) = self.session.as_mut() {
                        session.touch(nick, time_millis);
                    }
                }
                let rendered = match ctcp {
                    Some(Ctcp::Action) => format!("* {} {}", sender.as_deref().unwrap_or(""), text),
                    Some(other) => format!("[CTCP {}] {}", other.tag(), text),
                    None => text.clone(),
                };
                for target in targets {
                    self.display
                        .println(time_millis, sender.as_deref(), Some(target.as_str()), &rendered);
                }
            }
            WireCommand::Numeric(Numeric::ISupport { tokens, .. }) => {
                if let Some(session) = self.session.as_mut() {
                    session.parameters_mut().apply_isupport_line(tokens);
                }
            }
            WireCommand::Numeric(Numeric::NamReply { channel, nicks, .. }) => {
                let prefixes: Vec<(char, char)> = self
                    .session
                    .as_ref()
                    .map(|s| s.parameters().prefix.clone())
                    .unwrap_or_default();
                if let Some(session) = self.session.as_mut() {
                    for token in nicks {
                        let (nick, modes) = decode_prefixed_nick(&prefixes, token);
                        session.add_channel_member(channel, &nick, modes, time_millis);
                    }
                }
            }
            WireCommand::Error { reason } => {
                self.display.println(time_millis, None, None, &format!("ERROR: {reason}"));
            }
            WireCommand::Unsupported { .. } => {
                self.display.println(time_millis, None, None, &format!("» {}", msg.raw));
            }
            WireCommand::ParseError { reason, .. } => {
                self.display
                    .println(time_millis, None, None, &format!("(PARSE ERROR) {reason}: {}", msg.raw));
            }
            _ => {}
        }
    }

    fn message_time_millis(&self, msg: &Message) -> i64 {
        let server_time_active = self
            .session
            .as_ref()
            .map(|s| s.capabilities().is_active(&Capability::ServerTime))
            .unwrap_or(false);
        if server_time_active {
            if let Some((_, Some(raw))) = msg.tags.iter().find(|(k, _)| k == "time") {
                if let Ok(parsed) =
                    time::OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
                {
                    return (parsed.unix_timestamp_nanos() / 1_000_000) as i64;
                }
            }
        }
        now_millis()
    }

    //
    // Outbound
    //

    fn handle_user_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.connect(),
            Command::Exit => {
                self.send_command(WireCommand::Quit { reason: None });
                self.close();
            }
            Command::Help => self.display.println(now_millis(), None, None, "no help available"),
            Command::Join { channels, keys, .. } => {
                let join = if channels.is_empty() {
                    Join::Zero
                } else {
                    Join::Channels { channels, keys }
                };
                self.send_command(WireCommand::Join(join));
            }
            Command::Kick { channel, nick, reason } => {
                self.send_command(WireCommand::Kick { channel, nick, comment: reason });
            }
            Command::Mode { target, mode_string, args } => {
                self.send_command(WireCommand::Mode { target, modestring: mode_string, args });
            }
            Command::Msg { targets, text } => {
                self.echo_outgoing(&targets, &text);
                self.send_command(WireCommand::Privmsg { targets, text, ctcp: None });
            }
            Command::MsgCurrent { text } => match self.session.as_ref().and_then(Session::focused_channel).map(str::to_owned) {
                Some(channel) => {
                    self.echo_outgoing(std::slice::from_ref(&channel), &text);
                    self.send_command(WireCommand::Privmsg { targets: vec![channel], text, ctcp: None });
                }
                None => self
                    .display
                    .println(now_millis(), None, None, "no focused channel to send to"),
            },
            Command::Nick { nick } => self.send_command(WireCommand::Nick { nick }),
            Command::Notice { targets, text } => {
                self.send_command(WireCommand::Notice { targets, text, ctcp: None });
            }
            Command::Part { channels, reason } => {
                self.send_command(WireCommand::Part { channels, reason });
            }
            Command::Quit { reason } => {
                self.send_command(WireCommand::Quit { reason });
            }
        }
    }

    fn echo_outgoing(&mut self, targets: &[String], text: &str) {
        let echoing_active = self
            .session
            .as_ref()
            .map(|s| s.capabilities().is_active(&Capability::EchoMessage))
            .unwrap_or(false);
        if echoing_active {
            return;
        }
        let me = self.session.as_ref().and_then(Session::me).map(str::to_owned);
        let time = now_millis();
        for target in targets {
            self.display.println(time, me.as_deref(), Some(target.as_str()), text);
        }
    }
}

/// Strip leading ISUPPORT PREFIX characters (e.g. `@`, `+`) from a NAMES
/// token, returning the bare nick and the mode letters those chars stand
/// for.
fn decode_prefixed_nick(prefixes: &[(char, char)], token: &str) -> (String, Vec<char>) {
    let mut modes = Vec::new();
    let mut rest = token;
    while let Some(c) = rest.chars().next() {
        match prefixes.iter().find(|(_, prefix_char)| *prefix_char == c) {
            Some((mode, _)) => {
                modes.push(*mode);
                rest = &rest[c.len_utf8()..];
            }
            None => break,
        }
    }
    (rest.to_owned(), modes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{RecordingDisplay, TestConnection};

    fn new_engine() -> Engine<TestConnection, RecordingDisplay> {
        let server_info = ServerInfo {
            addr: "irc.example.org".to_owned(),
            port: 6667,
            tls: false,
            pass: None,
            realname: "Test User".to_owned(),
            nicks: vec!["nick".to_owned()],
            auto_join: Vec::new(),
        };
        Engine::new(server_info, TestConnection::default(), RecordingDisplay::default())
    }

    #[test]
    fn decode_prefixed_nick_splits_multi_prefix() {
        let prefixes = [('o', '@'), ('v', '+')];
        assert_eq!(
            decode_prefixed_nick(&prefixes, "@+carol"),
            ("carol".to_owned(), vec!['o', 'v'])
        );
        assert_eq!(decode_prefixed_nick(&prefixes, "dave"), ("dave".to_owned(), vec![]));
    }

    #[test]
    fn registration_with_no_capabilities() {
        let mut engine = new_engine();
        engine.start();
        while let Ok(task) = engine.tasks_rx.try_recv() {
            engine.run_task(task);
        }
        assert_eq!(engine.state(), EngineState::Connected);

        engine.handle_inbound_line("CAP * LS :");
        assert!(engine.connection.sent.iter().any(|l| l == "CAP END"));

        engine.handle_inbound_line(":srv 001 nick :Welcome");
        assert_eq!(engine.state(), EngineState::Registered);
        assert_eq!(engine.session().unwrap().me(), Some("nick"));
    }

    #[test]
    fn split_ls_capability_negotiation() {
        let mut engine = new_engine();
        engine.start();
        while let Ok(task) = engine.tasks_rx.try_recv() {
            engine.run_task(task);
        }

        engine.handle_inbound_line("CAP * LS * :server-time echo-message");
        engine.handle_inbound_line("CAP * LS :message-tags");
        let req_line = engine
            .connection
            .sent
            .iter()
            .find(|l| l.starts_with("CAP REQ"))
            .cloned()
            .unwrap();
        assert!(req_line.contains("server-time"));
        assert!(req_line.contains("echo-message"));
        assert!(req_line.contains("message-tags"));

        engine.handle_inbound_line("CAP * ACK :server-time echo-message message-tags");
        assert!(engine.connection.sent.iter().any(|l| l == "CAP END"));
        let session = engine.session().unwrap();
        assert!(session.capabilities().is_active(&Capability::ServerTime));
        assert!(session.capabilities().is_active(&Capability::EchoMessage));
        assert!(session.capabilities().is_active(&Capability::MessageTags));
    }

    #[test]
    fn names_reply_applies_prefixes() {
        let mut engine = new_engine();
        engine.start();
        while let Ok(task) = engine.tasks_rx.try_recv() {
            engine.run_task(task);
        }
        engine.handle_inbound_line("CAP * LS :");
        engine.handle_inbound_line(":srv 001 nick :Welcome");
        engine.handle_inbound_line(":srv 005 nick PREFIX=(ov)@+ :are supported by this server");
        engine.handle_inbound_line(":srv 353 nick = #a :@alice +bob carol");

        let channel = engine.session().unwrap().find_channel("#a").unwrap();
        let alice = channel.membership(&irc_common::CaseMapping::Rfc1459.normalize("alice")).unwrap();
        assert!(alice.modes.contains(&'o'));
    }

    #[test]
    fn nick_collision_rekeys_me() {
        let mut engine = new_engine();
        engine.start();
        while let Ok(task) = engine.tasks_rx.try_recv() {
            engine.run_task(task);
        }
        engine.handle_inbound_line("CAP * LS :");
        engine.handle_inbound_line(":srv 001 old :Welcome");
        engine.handle_inbound_line(":old!u@h NICK new");
        assert_eq!(engine.session().unwrap().me(), Some("new"));
        assert!(engine.session().unwrap().find_user("old").is_none());
    }

    #[test]
    fn ping_pong() {
        let mut engine = new_engine();
        engine.start();
        while let Ok(task) = engine.tasks_rx.try_recv() {
            engine.run_task(task);
        }
        engine.handle_inbound_line("PING :xyz");
        assert!(engine.connection.sent.iter().any(|l| l == "PONG :xyz"));
    }

    #[tokio::test(start_paused = true)]
    async fn gc_ticker_sends_gc_task_every_interval() {
        let mut engine = new_engine();
        engine.spawn_gc_ticker();

        tokio::time::advance(Duration::from_millis(GC_INTERVAL_MILLIS as u64)).await;
        assert!(matches!(engine.tasks_rx.recv().await, Some(WorkerTask::Gc(_))));

        tokio::time::advance(Duration::from_millis(GC_INTERVAL_MILLIS as u64)).await;
        assert!(matches!(engine.tasks_rx.recv().await, Some(WorkerTask::Gc(_))));

        engine.close();
    }
}
