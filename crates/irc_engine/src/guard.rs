//! Runtime single-writer enforcement. The engine is meant to run its state
//! mutations on exactly one worker; `StateGuard` records that thread's
//! identity the first time it's bound and panics if a later access comes
//! from anywhere else. This is a programming-error backstop, not a
//! recoverable condition.

use std::sync::OnceLock;
use std::thread::ThreadId;

#[derive(Debug, Default)]
pub struct StateGuard {
    owner: OnceLock<ThreadId>,
}

impl StateGuard {
    pub fn new() -> Self {
        StateGuard {
            owner: OnceLock::new(),
        }
    }

    /// Bind to the calling thread on first use; assert on every later call
    /// that the calling thread hasn't changed.
    pub fn check(&self) {
        let current = std::thread::current().id();
        let owner = self.owner.get_or_init(|| current);
        if *owner != current {
            log::error!(
                "state guard violation: bound to {:?}, accessed from {:?}",
                owner,
                current
            );
            panic!("irc_engine: session state accessed from a non-owning thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_checks_from_the_same_thread_succeed() {
        let guard = StateGuard::new();
        guard.check();
        guard.check();
    }

    #[test]
    fn check_from_another_thread_panics() {
        let guard = std::sync::Arc::new(StateGuard::new());
        guard.check();
        let other = guard.clone();
        let result = std::thread::spawn(move || other.check()).join();
        assert!(result.is_err(), "check() from another thread must panic");
    }
}
