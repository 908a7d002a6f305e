//! An S3-compatible object store mounted as a POSIX filesystem through FUSE.

pub mod backend;
pub mod cache_manager;
pub mod config;
pub mod error;
pub mod fd;
pub mod fs;
pub mod fuse_adapter;
pub mod metadata;
pub mod path;
pub mod stat_cache;

/// Install a `tracing-subscriber` `fmt` layer driven by `RUST_LOG`
/// (defaulting to `info` when unset). Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
