//! The engine's connection lifecycle, driven by CAS on a single
//! atomic cell rather than a lock — the worker is single-threaded, but the
//! shutdown handler and the periodic GC scheduler may observe/transition
//! state from outside the task that's currently running, so a plain `enum`
//! field isn't enough.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    New,
    Initializing,
    Disconnected,
    Connecting,
    Connected,
    Registered,
    Closed,
}

impl EngineState {
    fn to_u8(self) -> u8 {
        match self {
            EngineState::New => 0,
            EngineState::Initializing => 1,
            EngineState::Disconnected => 2,
            EngineState::Connecting => 3,
            EngineState::Connected => 4,
            EngineState::Registered => 5,
            EngineState::Closed => 6,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => EngineState::New,
            1 => EngineState::Initializing,
            2 => EngineState::Disconnected,
            3 => EngineState::Connecting,
            4 => EngineState::Connected,
            5 => EngineState::Registered,
            _ => EngineState::Closed,
        }
    }
}

#[derive(Debug)]
pub struct AtomicEngineState(AtomicU8);

impl AtomicEngineState {
    pub fn new(initial: EngineState) -> Self {
        AtomicEngineState(AtomicU8::new(initial.to_u8()))
    }

    pub fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Compare-and-swap from `from` to `to`. Returns whether it succeeded.
    pub fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Unconditional transition, used for "any non-Closed -> Disconnected"
    /// and "any -> Closed" rules where the source state doesn't matter.
    pub fn force(&self, to: EngineState) {
        self.0.store(to.to_u8(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_succeeds_only_from_the_expected_state() {
        let s = AtomicEngineState::new(EngineState::Connected);
        assert!(!s.transition(EngineState::New, EngineState::Registered));
        assert_eq!(s.get(), EngineState::Connected);
        assert!(s.transition(EngineState::Connected, EngineState::Registered));
        assert_eq!(s.get(), EngineState::Registered);
    }
}
