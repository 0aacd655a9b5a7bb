use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let request_timeout_secs: u64 = match std::env::var("REQUEST_TIMEOUT_SECS") {
            Ok(value) => value
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            Err(_) => 10,
        };

        Ok(Self {
            host: std::env::var("HOST").context("Cannot load HOST env variable")?,
            port: std::env::var("PORT")
                .context("PORT must be a number")?
                .parse()?,
            database_url: std::env::var("DATABASE_URL")
                .context("Cannot load DATABASE_URL env variable")?,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}
