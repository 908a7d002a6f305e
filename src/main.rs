//! Mount entry point: parses CLI flags, resolves credentials, builds the
//! S3 backend and filesystem core, and hands control to `fuser::mount2`.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use aws_sdk_s3::config::{Credentials as AwsCredentials, Region};
use clap::Parser;
use s3fs::backend::s3::S3Backend;
use s3fs::config::{resolve_credentials, Config};
use s3fs::fuse_adapter::FuseAdapter;
use s3fs::fs::Filesystem;

fn main() -> ExitCode {
    s3fs::init_tracing();
    let args = cli::Args::parse();

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("invalid config file: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let creds = match resolve_credentials(args.passwd_file.as_deref()) {
        Ok(creds) => creds,
        Err(err) => {
            eprintln!("invalid credentials: {err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let client = runtime.block_on(build_s3_client(&args, &creds));
    let backend = Arc::new(S3Backend::new(client, args.bucket.clone()));

    let mut fs_config = config.fs_config();
    fs_config.enable_file_lock |= args.enable_file_lock;
    let caches = Arc::new(config.cache_manager());
    caches.spawn_sweepers();

    let core = Arc::new(Filesystem::new(backend, caches, fs_config));
    let adapter = FuseAdapter::new(core, runtime.handle().clone());

    tracing::info!(mountpoint = %args.mountpoint.display(), bucket = %args.bucket, "mounting");
    match fuser::mount2(adapter, &args.mountpoint, &[]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mount failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn build_s3_client(
    args: &cli::Args,
    creds: &s3fs::config::Credentials,
) -> aws_sdk_s3::Client {
    let credentials = AwsCredentials::new(
        creds.access_key_id.clone(),
        creds.secret_access_key.clone(),
        creds.session_token.clone(),
        None,
        "s3fs-mount",
    );
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(args.region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &args.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared_config = loader.load().await;

    let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
    if args.endpoint.is_some() {
        s3_builder = s3_builder.force_path_style(true);
    }
    aws_sdk_s3::Client::from_conf(s3_builder.build())
}
