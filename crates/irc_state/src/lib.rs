//! Session state: ISUPPORT parameters, capability bookkeeping, and the
//! user/channel membership graph.

pub mod capability;
pub mod error;
pub mod isupport;
pub mod session;

pub use capability::{Capability, CapabilitySet};
pub use error::StateError;
pub use isupport::{ChanModes, Parameters};
pub use session::{Channel, Membership, Session, User};
