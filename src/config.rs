use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_HOST: &str = "https://www.materialsproject.org";

/// Sent on every API request so the service can identify this client.
const USER_AGENT: &str = concat!("mp_harvester/", env!("CARGO_PKG_VERSION"));

/// Runtime configuration: CLI flags plus the MP_API_KEY environment variable.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub api_key: String,
    pub user_agent: String,
    pub raw_dir: PathBuf,
    pub out_dir: PathBuf,
    pub delay_ms: u64,
    pub strict: bool,
}

impl Config {
    pub fn new(
        host: String,
        raw_dir: PathBuf,
        out_dir: PathBuf,
        delay_ms: u64,
        strict: bool,
    ) -> Result<Self> {
        let api_key = std::env::var("MP_API_KEY")
            .context("MP_API_KEY environment variable must be set")?;
        Ok(Self {
            host,
            api_key,
            user_agent: USER_AGENT.to_string(),
            raw_dir,
            out_dir,
            delay_ms,
            strict,
        })
    }
}
