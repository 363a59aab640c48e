use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reviewer_core::DEFAULT_MAX_REVIEWERS;

/// File name of the SQLite database inside `STATE_DIR`.
pub const DATABASE_FILE: &str = "reviewer-state.db";

/// Where teams, users, and pull requests are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// SQLite database under `state_dir`. Survives restarts.
    Sqlite,
    /// Process memory. Lost on restart.
    Memory,
}

impl StorageKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("STORAGE must be 'sqlite' or 'memory', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage: StorageKind,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Default filter for log output, e.g. `info` or `reviewer_server=debug`.
    pub log_level: String,
    pub max_reviewers: usize,
    pub request_timeout: Duration,
    /// Fixed seed for reviewer selection. Unset means entropy-seeded.
    pub rng_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let storage = match lookup("STORAGE") {
            Some(value) => StorageKind::parse(&value)?,
            None => StorageKind::Sqlite,
        };

        let state_dir = lookup("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let log_level = lookup("LOG_LEVEL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());

        let max_reviewers = match lookup("MAX_REVIEWERS") {
            Some(value) => value
                .parse::<usize>()
                .context("MAX_REVIEWERS must be a valid number")?,
            None => DEFAULT_MAX_REVIEWERS,
        };
        if max_reviewers == 0 {
            bail!("MAX_REVIEWERS must be at least 1");
        }

        let request_timeout_secs = lookup("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .context("REQUEST_TIMEOUT_SECS must be a valid number")?;

        let rng_seed = parse_rng_seed(lookup("REVIEWER_RNG_SEED"))?;

        Ok(Config {
            port,
            storage,
            state_dir,
            log_level,
            max_reviewers,
            request_timeout: Duration::from_secs(request_timeout_secs),
            rng_seed,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join(DATABASE_FILE)
    }
}

/// Parse REVIEWER_RNG_SEED. Missing or blank means no fixed seed.
pub fn parse_rng_seed(value: Option<String>) -> Result<Option<u64>> {
    match value.filter(|s| !s.trim().is_empty()) {
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .context("REVIEWER_RNG_SEED must be a valid unsigned number"),
        None => Ok(None),
    }
}
