//!
//! eventshare configuration
//! ------------------------
//! Every tunable the server needs is collected into a single `Config` value that
//! is built once at startup and passed to component constructors. The server
//! binary layers CLI flags over environment variables over the defaults below.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use secrecy::SecretString;

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 5;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Argon2id cost parameters used for new password hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self { memory_kib: 19_456, iterations: 2, parallelism: 1 }
    }
}

#[derive(Debug)]
pub struct Config {
    pub http_port: u16,
    /// Holds the store snapshot and the `uploads/` blob directory.
    pub data_dir: PathBuf,
    pub jwt_secret: SecretString,
    pub token_ttl: chrono::Duration,
    pub hash_cost: HashCost,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Configuration with defaults for everything but the data folder and signing secret.
    pub fn new(data_dir: impl AsRef<Path>, jwt_secret: SecretString) -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            data_dir: data_dir.as_ref().to_path_buf(),
            jwt_secret,
            token_ttl: chrono::Duration::days(DEFAULT_TOKEN_TTL_DAYS),
            hash_cost: HashCost::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Build from an environment lookup. `JWT_SECRET` is mandatory.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET must be set to a non-empty value"))?;
        let data_dir = lookup("EVENTSHARE_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut cfg = Config::new(data_dir, SecretString::from(secret));

        if let Some(port) = parse_var::<u16, _>(&lookup, "EVENTSHARE_HTTP_PORT")?.or(parse_var::<u16, _>(&lookup, "PORT")?) {
            cfg.http_port = port;
        }
        if let Some(days) = parse_var::<i64, _>(&lookup, "EVENTSHARE_TOKEN_TTL_DAYS")? {
            if days <= 0 { return Err(anyhow!("EVENTSHARE_TOKEN_TTL_DAYS must be positive")); }
            cfg.token_ttl = chrono::Duration::days(days);
        }
        if let Some(m) = parse_var::<u32, _>(&lookup, "EVENTSHARE_HASH_MEMORY_KIB")? { cfg.hash_cost.memory_kib = m; }
        if let Some(t) = parse_var::<u32, _>(&lookup, "EVENTSHARE_HASH_ITERATIONS")? { cfg.hash_cost.iterations = t; }
        if let Some(p) = parse_var::<u32, _>(&lookup, "EVENTSHARE_HASH_PARALLELISM")? { cfg.hash_cost.parallelism = p; }
        if let Some(n) = parse_var::<usize, _>(&lookup, "EVENTSHARE_MAX_UPLOAD_BYTES")? { cfg.max_upload_bytes = n; }
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn store_path(&self) -> PathBuf { self.data_dir.join("store.bin") }

    pub fn uploads_dir(&self) -> PathBuf { self.data_dir.join("uploads") }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid value for {}: '{}' ({})", name, raw, e)),
        None => Ok(None),
    }
}
