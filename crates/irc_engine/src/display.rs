//! The display callback consumed from the UI collaborator. Text is passed
//! through as plain borrowed strings: rich-text rendering itself is the
//! terminal layer's job, out of scope here.

pub trait Display {
    /// Append a styled message line. `receiver` is `None` for
    /// server-wide/status lines.
    fn println(&mut self, time_millis: i64, sender: Option<&str>, receiver: Option<&str>, text: &str);

    fn set_status(&mut self, text: &str);

    fn set_prompt(&mut self, text: &str);
}
