//!
//! eventshare server binary
//! ------------------------
//! Command-line entry point for the eventshare HTTP API. Configuration comes from
//! environment variables, with `--http-port` and `--data-dir` taking precedence.

use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

use eventshare::config::Config;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("eventshare Server\n\nUSAGE:\n  eventshare_server [--http-port N] [--data-dir PATH]\n\nOPTIONS:\n  --http-port N       HTTP API port (env: EVENTSHARE_HTTP_PORT or PORT, default 5000)\n  --data-dir PATH     Store and uploads folder (env: EVENTSHARE_DATA_DIR, default data)\n\nENVIRONMENT:\n  JWT_SECRET                      Token signing secret (required)\n  EVENTSHARE_TOKEN_TTL_DAYS       Token lifetime in days (default 5)\n  EVENTSHARE_HASH_MEMORY_KIB      Argon2 memory cost (default 19456)\n  EVENTSHARE_HASH_ITERATIONS      Argon2 time cost (default 2)\n  EVENTSHARE_HASH_PARALLELISM     Argon2 lanes (default 1)\n  EVENTSHARE_MAX_UPLOAD_BYTES     Largest accepted image (default 5242880)\n");
        return Ok(());
    }

    let mut cfg = Config::from_env()?;
    if let Some(raw) = arg_value(&args, "--http-port") {
        cfg.http_port = raw.parse::<u16>().map_err(|e| anyhow!("invalid --http-port '{}': {}", raw, e))?;
    }
    if let Some(dir) = arg_value(&args, "--data-dir") {
        cfg.data_dir = PathBuf::from(dir);
    }

    println!("eventshare starting: http={}, data_dir={}", cfg.http_port, cfg.data_dir.display());
    tracing::info!("Using port: http={}, data_dir={}", cfg.http_port, cfg.data_dir.display());
    eventshare::server::run(cfg).await
}
