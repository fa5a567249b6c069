//! Tracing setup shared by the `sql-agent` and `sql-mcp` binaries
//!
//! Logs always go to stderr: stdout belongs to the MCP protocol for the
//! server and to the conversation for the CLI.

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, no ANSI colors
    #[default]
    Text,
    /// One JSON object per line (for log aggregation)
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

/// Initialize tracing for one of the workspace binaries
///
/// A non-empty `RUST_LOG` replaces the default directive, which enables
/// `default_level` for `crate_name` only.
///
/// ```rust,ignore
/// mcp_common::init_tracing("sql_mcp", "info", LogFormat::Text)?;
/// ```
pub fn init_tracing(crate_name: &str, default_level: &str, format: LogFormat) -> anyhow::Result<()> {
    let directive = format!("{}={}", crate_name, default_level);
    let filter = env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), &directive)?;

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?,
    }

    Ok(())
}

/// Filter from a `RUST_LOG` value, or `default_directive` when it is unset or blank
fn env_filter(rust_log: Option<&str>, default_directive: &str) -> anyhow::Result<EnvFilter> {
    match rust_log.map(str::trim).filter(|v| !v.is_empty()) {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::try_new(default_directive)?),
    }
}

/// Generate `main` for a stdio MCP server
///
/// `$constructor` is a path to a function returning `anyhow::Result<Server>`;
/// a construction error (usually configuration) aborts before the transport
/// is opened.
///
/// ```rust,ignore
/// mcp_common::serve_stdio!(SqlMcpServer::from_env, "sql_mcp");
/// ```
#[macro_export]
macro_rules! serve_stdio {
    ($constructor:path, $crate_name:literal) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            let format = std::env::var("LOG_FORMAT")
                .ok()
                .and_then(|v| v.parse::<$crate::LogFormat>().ok())
                .unwrap_or_default();
            $crate::init_tracing($crate_name, "info", format)?;

            tracing::info!(concat!("Starting ", $crate_name, " MCP Server"));

            let server = $constructor()?;
            let service = server.serve(rmcp::transport::stdio()).await?;

            tracing::info!("Server running, waiting for requests...");

            service.waiting().await?;

            tracing::info!("Server shutting down");
            Ok(())
        }
    };
}
