//! Server configuration from the environment

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Rejection notices are POSTed here when set
    pub notify_webhook_url: Option<String>,
    /// How many recent rejection notices `/api/notifications` keeps
    pub notify_inbox_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:approval.db".into());

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let notify_webhook_url = lookup("NOTIFY_WEBHOOK_URL").filter(|s| !s.trim().is_empty());

        let notify_inbox_capacity = lookup("NOTIFY_INBOX_CAPACITY")
            .unwrap_or_else(|| "100".to_string())
            .parse::<usize>()
            .context("NOTIFY_INBOX_CAPACITY must be a valid number")?;

        Ok(Config {
            database_url,
            bind_addr,
            notify_webhook_url,
            notify_inbox_capacity,
        })
    }
}
