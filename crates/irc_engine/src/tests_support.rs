//! Test-only doubles for the `Connection` and `Display` traits, in-memory —
//! opening a real socket is out of scope for this crate.

use crate::connection::{Connection, IngressHandler, ShutdownHandler};
use crate::display::Display;

#[derive(Default)]
pub struct TestConnection {
    pub sent: Vec<String>,
    pub closed: bool,
}

impl Connection for TestConnection {
    fn start(&mut self) {}

    fn offer(&mut self, line: &str) -> bool {
        if self.closed {
            return false;
        }
        self.sent.push(line.to_owned());
        true
    }

    fn add_ingress_handler(&mut self, _handler: IngressHandler) {}

    fn add_shutdown_handler(&mut self, _handler: ShutdownHandler) {}

    fn close(&mut self) {
        self.closed = true;
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    pub lines: Vec<String>,
    pub status: Option<String>,
    pub prompt: Option<String>,
}

impl Display for RecordingDisplay {
    fn println(&mut self, _time_millis: i64, sender: Option<&str>, receiver: Option<&str>, text: &str) {
        self.lines.push(format!("{sender:?} {receiver:?} {text}"));
    }

    fn set_status(&mut self, text: &str) {
        self.status = Some(text.to_owned());
    }

    fn set_prompt(&mut self, text: &str) {
        self.prompt = Some(text.to_owned());
    }
}
