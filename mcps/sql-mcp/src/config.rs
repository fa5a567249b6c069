//! Configuration for SQL MCP Server
//!
//! Reads the same settings as the conversational agent: `DATABASE_PATH`,
//! `LOG_QUERIES` and `LOG_FILE`, over `.sql-agent.toml`, over defaults.
//! Model settings are not needed here.

use std::path::PathBuf;

use anyhow::Result;
use sql_agent::config::{parse_truthy, AgentConfig, AuditConfig, FileConfig, Overrides};

/// Resolved server settings
#[derive(Debug, Clone)]
pub struct SqlMcpConfig {
    /// Database opened afresh for every request
    pub database_path: PathBuf,
    pub audit: AuditConfig,
}

impl SqlMcpConfig {
    /// Load from the process environment and the config file
    pub fn from_env() -> Result<Self> {
        Self::resolve(env_overrides(|key| std::env::var(key).ok()), FileConfig::load()?)
    }

    /// Merge already-collected layers
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let resolved = AgentConfig::resolve(overrides, file)?;
        Ok(Self {
            database_path: resolved.database_path,
            audit: resolved.audit,
        })
    }
}

fn env_overrides(var: impl Fn(&str) -> Option<String>) -> Overrides {
    Overrides {
        database_path: var("DATABASE_PATH").map(PathBuf::from),
        log_queries: var("LOG_QUERIES").map(|v| parse_truthy(&v)),
        log_file: var("LOG_FILE").map(PathBuf::from),
        ..Default::default()
    }
}
