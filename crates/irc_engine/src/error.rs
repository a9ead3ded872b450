//! Error kinds with a genuine `Result` boundary in the engine: transport
//! failures reported by a `Connection`, and fatal state-machine violations.
//! Everything else (per-parameter wire errors, ISUPPORT parse failures, user
//! command mistakes) is handled inline by displaying a message and
//! continuing, per the propagation policy this crate follows.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("fatal state transition failed: {from:?} -> {to:?}")]
    FatalTransition { from: String, to: String },
}
