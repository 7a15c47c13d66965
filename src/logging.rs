//! `tracing-subscriber` initialization.
//!
//! Mirrors this crate's original subscriber setup: an `EnvFilter` driven
//! by `RUST_LOG` (defaulting to `info` when unset) feeding a plain `fmt`
//! layer. Call once from `main`.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
