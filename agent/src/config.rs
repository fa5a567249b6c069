//! Configuration loading
//!
//! Settings are resolved once at startup, in order of precedence:
//! 1. Command-line flags and environment variables ([`Overrides`], filled by clap)
//! 2. `.sql-agent.toml` (walking up from the working directory, then the global config dir)
//! 3. Built-in defaults
//!
//! The resulting [`AgentConfig`] is passed to every component that needs it;
//! nothing below `main` reads the environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file searched for by [`FileConfig::load`]
pub const CONFIG_FILE_NAME: &str = ".sql-agent.toml";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LOG_FILE: &str = "queries.log";
pub const DEFAULT_MAX_ROUNDS: usize = 20;

/// Configuration problems; all of them are fatal before a session starts
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_PATH environment variable not set")]
    MissingDatabasePath,

    #[error("OPENAI_API_KEY is required when talking to {0}")]
    MissingApiKey(String),

    #[error("invalid model base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("max rounds must be at least 1")]
    InvalidMaxRounds,

    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Interpret a switch value: `1`, `true`, `yes`, `on` (any case) are true
pub fn parse_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Find a config file by walking up the directory tree, then checking global config.
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    // Fallback: ~/.config/sql-agent/.sql-agent.toml
    let global_path = dirs::config_dir()?.join("sql-agent").join(filename);
    global_path.exists().then_some(global_path)
}

// ============================================================================
// File layer (.sql-agent.toml)
// ============================================================================

/// Contents of `.sql-agent.toml`; every key is optional
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub audit: AuditSection,
    #[serde(default)]
    pub agent: AgentSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LlmSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditSection {
    pub enabled: Option<bool>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentSection {
    pub system_prompt: Option<String>,
    pub max_rounds: Option<usize>,
}

impl FileConfig {
    /// Load `.sql-agent.toml` if one exists, otherwise an empty layer
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading config from: {}", path.display());
            return Self::load_from_path(&path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Values supplied on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub log_queries: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub system_prompt: Option<String>,
    pub max_rounds: Option<usize>,
}

/// Model endpoint settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    /// Base of an OpenAI-compatible API, e.g. `http://localhost:11434/v1` for Ollama
    pub base_url: String,
    pub api_key: Option<String>,
}

impl LlmConfig {
    /// Check the endpoint before any request is made
    pub fn validate(&self) -> Result<url::Url, ConfigError> {
        let url = url::Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;

        let needs_key = url.host_str() == Some("api.openai.com");
        if needs_key && self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingApiKey(self.base_url.clone()));
        }

        Ok(url)
    }
}

/// Query audit log settings
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// Fully resolved settings for one session
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub database_path: PathBuf,
    pub llm: LlmConfig,
    pub audit: AuditConfig,
    /// Replaces the built-in system directive when set
    pub system_prompt: Option<String>,
    /// Model calls allowed per user turn
    pub max_rounds: usize,
}

impl AgentConfig {
    /// Merge overrides over the file layer over defaults
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self, ConfigError> {
        let database_path = overrides
            .database_path
            .filter(|p| !p.as_os_str().is_empty())
            .or(file.database.path)
            .ok_or(ConfigError::MissingDatabasePath)?;

        let max_rounds = overrides
            .max_rounds
            .or(file.agent.max_rounds)
            .unwrap_or(DEFAULT_MAX_ROUNDS);
        if max_rounds == 0 {
            return Err(ConfigError::InvalidMaxRounds);
        }

        let defaults = AuditConfig::default();

        Ok(Self {
            database_path,
            llm: LlmConfig {
                model: overrides
                    .model
                    .or(file.llm.model)
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: overrides
                    .base_url
                    .or(file.llm.base_url)
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                api_key: overrides.api_key,
            },
            audit: AuditConfig {
                enabled: overrides
                    .log_queries
                    .or(file.audit.enabled)
                    .unwrap_or(defaults.enabled),
                path: overrides
                    .log_file
                    .or(file.audit.path)
                    .unwrap_or(defaults.path),
            },
            system_prompt: overrides.system_prompt.or(file.agent.system_prompt),
            max_rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn with_db(path: &str) -> Overrides {
        Overrides {
            database_path: Some(PathBuf::from(path)),
            ..Default::default()
        }
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", "Yes", "on", " on "] {
            assert!(parse_truthy(value), "{value} should be truthy");
        }
        for value in ["0", "false", "no", "off", "", "enabled"] {
            assert!(!parse_truthy(value), "{value} should be falsy");
        }
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::resolve(with_db("shop.db"), FileConfig::default()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("shop.db"));
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.audit, AuditConfig::default());
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_missing_database_path() {
        let err = AgentConfig::resolve(Overrides::default(), FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabasePath));

        let err = AgentConfig::resolve(with_db(""), FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabasePath));
    }

    #[test]
    fn test_zero_max_rounds_rejected() {
        let overrides = Overrides {
            max_rounds: Some(0),
            ..with_db("shop.db")
        };
        let err = AgentConfig::resolve(overrides, FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMaxRounds));
    }

    #[test]
    fn test_overrides_beat_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [database]
            path = "from-file.db"

            [llm]
            model = "llama3.1:8b"
            base_url = "http://localhost:11434/v1"

            [audit]
            enabled = false
            path = "file.log"

            [agent]
            max_rounds = 5
            "#,
        )
        .unwrap();

        let overrides = Overrides {
            model: Some("gpt-4o".to_string()),
            log_queries: Some(true),
            ..with_db("cli.db")
        };

        let config = AgentConfig::resolve(overrides, file).unwrap();
        assert_eq!(config.database_path, PathBuf::from("cli.db"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert!(config.audit.enabled);
        assert_eq!(config.audit.path, PathBuf::from("file.log"));
        assert_eq!(config.max_rounds, 5);
    }

    #[test]
    fn test_file_supplies_database_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[database]\npath = \"data/app.db\"\n").unwrap();

        let file = FileConfig::load_from_path(&path).unwrap();
        let config = AgentConfig::resolve(Overrides::default(), file).unwrap();
        assert_eq!(config.database_path, PathBuf::from("data/app.db"));
    }

    #[test]
    fn test_bad_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[database\n").unwrap();

        let err = FileConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_openai_endpoint_needs_key() {
        let llm = LlmConfig {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        };
        assert!(matches!(llm.validate(), Err(ConfigError::MissingApiKey(_))));

        let llm = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..llm
        };
        assert!(llm.validate().is_ok());
    }

    #[test]
    fn test_local_endpoint_without_key() {
        let llm = LlmConfig {
            model: "qwen2.5:7b".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: None,
        };
        assert!(llm.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let llm = LlmConfig {
            model: DEFAULT_MODEL.to_string(),
            base_url: "not a url".to_string(),
            api_key: None,
        };
        assert!(matches!(llm.validate(), Err(ConfigError::InvalidBaseUrl { .. })));
    }
}
