use std::{str::FromStr, time::Duration};

use anyhow::Context;

/// Server ping cadence and how long a silent connection may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Heartbeat {
            interval: Duration::from_secs(25),
            timeout: Duration::from_secs(60),
        }
    }
}

const DEFAULT_ORIGINS: &str =
    "http://localhost:3000,http://localhost:3001,https://freelance-heroku.vercel.app";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub jwt_secret: String,
    /// Empty means any origin, without credentials.
    pub cors_origins: Vec<String>,
    pub heartbeat: Heartbeat,
}

impl Config {
    /// Reads `.env` if there is one, then the process environment.
    pub fn from_env() -> anyhow::Result<Config> {
        let _ = dotenv::dotenv();

        let defaults = Heartbeat::default();
        Ok(Config {
            database_url: var_or("DATABASE_URL", "sqlite://tradewinds.db?mode=rwc"),
            bind_address: var_or("BIND_ADDRESS", "0.0.0.0:8080"),
            jwt_secret: dotenv::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            cors_origins: split_origins(&var_or("CORS_ORIGINS", DEFAULT_ORIGINS)),
            heartbeat: Heartbeat {
                interval: secs_or("HEARTBEAT_INTERVAL_SECS", defaults.interval)?,
                timeout: secs_or("HEARTBEAT_TIMEOUT_SECS", defaults.timeout)?,
            },
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_owned())
}

fn secs_or(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match dotenv::var(key) {
        Ok(raw) => Ok(Duration::from_secs(
            u64::from_str(raw.trim()).with_context(|| format!("{key} must be a number of seconds"))?,
        )),
        Err(_) => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(str::to_owned)
        .collect()
}
