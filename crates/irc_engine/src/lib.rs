//! The engine loop and the connection interface it drives, plus the display
//! callback trait, the user command surface, the nickname generator, and an
//! outbound rate limiter.

pub mod command;
pub mod connection;
pub mod display;
pub mod engine;
pub mod error;
pub mod guard;
pub mod nick;
pub mod server_info;
pub mod state_machine;
pub mod throttle;

#[cfg(test)]
pub mod tests_support;

pub use command::Command;
pub use connection::{Connection, IngressHandler, ShutdownHandler};
pub use display::Display;
pub use engine::{Engine, WorkerTask};
pub use error::EngineError;
pub use server_info::ServerInfo;
pub use state_machine::EngineState;
pub use throttle::OutboundThrottle;
