//! Errors surfaced by session-state operations that have a genuine
//! recoverable failure mode (as opposed to ISUPPORT token parsing, which is
//! swallowed with a warning).

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot focus {0:?}: the local user is not a member")]
    NotAMember(String),
}
