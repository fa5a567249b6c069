//! CLI argument definitions
//!
//! Every setting can also come from the environment; both feed
//! [`Overrides`], which sits above the config file layer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mcp_common::LogFormat;

use crate::config::{parse_truthy, Overrides};

#[derive(Parser, Debug)]
#[command(name = "sql-agent")]
#[command(about = "Ask natural-language questions about a SQLite database")]
pub struct Cli {
    /// Defaults to `chat`
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// SQLite database file
    #[arg(long = "db", env = "DATABASE_PATH", global = true)]
    pub database_path: Option<PathBuf>,

    /// Model id (default: from .sql-agent.toml or gpt-4o-mini)
    #[arg(short = 'm', long, env = "OPENAI_MODEL", global = true)]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// API key for the model endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Append executed statements to the audit log (1/true/yes/on)
    #[arg(long, env = "LOG_QUERIES", value_parser = parse_switch, global = true)]
    pub log_queries: Option<bool>,

    /// Audit log file
    #[arg(long, env = "LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Replace the built-in system directive
    #[arg(long, env = "SQL_AGENT_SYSTEM_PROMPT", global = true)]
    pub system_prompt: Option<String>,

    /// Model calls allowed per question
    #[arg(long, env = "SQL_AGENT_MAX_ROUNDS", global = true)]
    pub max_rounds: Option<usize>,

    /// Diagnostic log format on stderr (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Interactive session (the default)
    Chat {
        /// Print tool activity to stderr
        #[arg(long, short)]
        verbose: bool,
    },
    /// Answer a single question and exit
    Ask {
        /// The question
        question: String,
        /// Print tool activity to stderr
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the database schema
    Schema,
    /// Run one SQL statement through the bounded executor
    Query {
        /// SQL text
        sql: String,
        /// Maximum rows to return (clamped to 1-500)
        #[arg(long, short)]
        limit: Option<i64>,
    },
    /// Print the tool catalogue offered to the model
    Tools,
}

impl Cli {
    /// The subcommand to run, `chat` when none was given
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Chat { verbose: false })
    }

    /// Settings that take precedence over the config file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            database_path: self.database_path.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            log_queries: self.log_queries,
            log_file: self.log_file.clone(),
            system_prompt: self.system_prompt.clone(),
            max_rounds: self.max_rounds,
        }
    }
}

fn parse_switch(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(parse_truthy(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sql-agent").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_chat_is_default() {
        let cli = parse(&["--db", "shop.db"]);
        assert_eq!(cli.command(), Commands::Chat { verbose: false });
        assert_eq!(cli.overrides().database_path, Some(PathBuf::from("shop.db")));
    }

    #[test]
    fn test_query_subcommand() {
        let cli = parse(&["query", "SELECT 1", "--limit", "5", "--db", "a.db"]);
        assert_eq!(
            cli.command(),
            Commands::Query {
                sql: "SELECT 1".to_string(),
                limit: Some(5),
            }
        );
    }

    #[test]
    fn test_log_queries_switch() {
        let cli = parse(&["--log-queries", "off", "schema"]);
        assert_eq!(cli.overrides().log_queries, Some(false));

        let cli = parse(&["--log-queries", "YES", "schema"]);
        assert_eq!(cli.overrides().log_queries, Some(true));
    }

    #[test]
    fn test_log_format() {
        let cli = parse(&["--log-format", "json", "tools"]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["sql-agent", "--log-format", "xml", "tools"]).is_err());
    }
}
