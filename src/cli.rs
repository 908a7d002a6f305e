//! Mount CLI surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "s3fs-mount", about = "Mount an S3-compatible bucket as a POSIX filesystem")]
pub struct Args {
    /// Bucket to mount.
    #[arg(long)]
    pub bucket: String,

    /// Local directory to mount onto.
    #[arg(long)]
    pub mountpoint: PathBuf,

    /// AWS region.
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// S3-compatible endpoint override; forces path-style addressing.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Two-field `ACCESS:SECRET` credentials file. Falls back to
    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
    #[arg(long)]
    pub passwd_file: Option<PathBuf>,

    /// Optional TOML file with cache/page tunables.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Serialize all read/write/flush/fsync on a path behind an advisory
    /// lock instead of the default best-effort page-granularity ordering.
    #[arg(long)]
    pub enable_file_lock: bool,
}
