use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

pub const DEV_SECRET: &str = "dev-secret-change-me";

/// Sessions must outlive the request that creates them and stay within
/// what a token expiry can express.
const SESSION_DAYS: RangeInclusive<i64> = 1..=3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub secret_key: String,
    pub session_days: i64,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            host: var("WARBLER_HOST", "0.0.0.0"),
            port: parse(&lookup, "WARBLER_PORT", 3000)?,
            db_path: PathBuf::from(var("WARBLER_DB_PATH", "warbler.db")),
            secret_key: var("WARBLER_SECRET_KEY", DEV_SECRET),
            session_days: parse_in(&lookup, "WARBLER_SESSION_DAYS", 7, SESSION_DAYS)?,
            hash_memory_kib: parse(&lookup, "WARBLER_HASH_MEMORY_KIB", 19 * 1024)?,
            hash_iterations: parse(&lookup, "WARBLER_HASH_ITERATIONS", 2)?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.parse().with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_in<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse(lookup, key, default)?;
    if !range.contains(&value) {
        bail!(
            "Invalid {}: {} is outside {}..={}",
            key,
            value,
            range.start(),
            range.end()
        );
    }
    Ok(value)
}
