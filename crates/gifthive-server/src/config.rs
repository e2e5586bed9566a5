use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Server settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("GIFTHIVE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("GIFTHIVE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("GIFTHIVE_PORT must be a port number")?;
        let db_path = lookup("GIFTHIVE_DB_PATH")
            .unwrap_or_else(|| "gifthive.db".into())
            .into();

        Ok(Self { host, port, db_path })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
