//! Mounts the filesystem against the in-memory backend for manual exercise
//! without real S3 credentials.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use s3fs::backend::memory::MemoryBackend;
use s3fs::cache_manager::CacheManager;
use s3fs::fs::{Filesystem, FsConfig};
use s3fs::fuse_adapter::FuseAdapter;

#[derive(Parser)]
#[command(name = "demofs", about = "Mount an in-memory demo filesystem")]
struct Args {
    /// Local directory to mount onto.
    mountpoint: PathBuf,
}

fn main() {
    s3fs::init_tracing();
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");
    let backend = Arc::new(MemoryBackend::new());
    let caches = Arc::new(CacheManager::new(1000, std::time::Duration::from_secs(300), 256, 4096));
    caches.spawn_sweepers();

    let core = Arc::new(Filesystem::new(backend, caches, FsConfig::default()));
    let adapter = FuseAdapter::new(core, runtime.handle().clone());

    tracing::info!(mountpoint = %args.mountpoint.display(), "mounting demo filesystem");
    if let Err(err) = fuser::mount2(adapter, &args.mountpoint, &[]) {
        eprintln!("mount failed: {err}");
        std::process::exit(1);
    }
}
