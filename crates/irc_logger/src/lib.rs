//! Logging sink initialization. Every other crate in the workspace logs
//! through the `log` facade (`debug!`, `warn!`, `error!`) rather than
//! `println!`; this is the one place a concrete backend (`env_logger`) gets
//! wired in, kept as its own crate so the rest of the workspace stays
//! decoupled from the choice of sink.

use log::LevelFilter;

/// Initialize logging at the default level (`Info`), reading overrides from
/// `RUST_LOG` the way `env_logger` always does.
pub fn init() {
    init_with_level(LevelFilter::Info);
}

/// Initialize logging with an explicit default level; `RUST_LOG` still
/// takes precedence when set.
pub fn init_with_level(default_level: LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(default_level.to_string());
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_with_level(LevelFilter::Debug);
        init_with_level(LevelFilter::Debug);
    }
}
