use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;

use sql_agent::agent::{event_channel, Session, TurnEnd, ROUND_LIMIT_NOTICE};
use sql_agent::cli::{spawn_progress_printer, Cli, Commands, Repl, ReplExit};
use sql_agent::config::{AgentConfig, FileConfig};
use sql_agent::db::{self, AuditLog, RowLimit};
use sql_agent::llm::OpenAiClient;
use sql_agent::tools;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // .env is optional; real environment variables win over it
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env: {}", e);
        }
    }

    let cli = Cli::parse();
    mcp_common::init_tracing("sql_agent", "warn", cli.log_format)?;

    let command = cli.command();
    if command == Commands::Tools {
        println!("{}", serde_json::to_string_pretty(&tools::tool_definitions())?);
        return Ok(ExitCode::SUCCESS);
    }

    let config = AgentConfig::resolve(cli.overrides(), FileConfig::load()?)?;

    match command {
        Commands::Chat { verbose } => run_chat(&config, verbose).await,
        Commands::Ask { question, verbose } => run_ask(&config, &question, verbose).await,
        Commands::Schema => {
            let conn = db::open(&config.database_path)?;
            println!("{}", db::describe_schema(&conn)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Query { sql, limit } => {
            let conn = db::open(&config.database_path)?;
            let limit = limit.map(RowLimit::new).unwrap_or_default();
            let outcome = db::execute(&conn, &sql, limit, &AuditLog::from_config(&config.audit));
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(if outcome.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Tools => Ok(ExitCode::SUCCESS),
    }
}

/// Build a session from validated configuration
///
/// With `verbose`, also returns the progress printer; it exits once the
/// session (and with it the event sender) is dropped.
fn open_session(config: &AgentConfig, verbose: bool) -> Result<(Session, Option<JoinHandle<()>>)> {
    let model = OpenAiClient::from_config(&config.llm)?;
    let conn = db::open(&config.database_path)?;

    let mut session = Session::new(conn, Box::new(model), AuditLog::from_config(&config.audit))
        .with_max_rounds(config.max_rounds);
    if let Some(prompt) = &config.system_prompt {
        session = session.with_system_prompt(prompt);
    }
    let printer = if verbose {
        let (tx, rx) = event_channel();
        session = session.with_event_sender(tx);
        Some(spawn_progress_printer(rx))
    } else {
        None
    };

    tracing::info!(
        "Session ready: model {} on {:?}",
        session.model(),
        config.database_path
    );
    Ok((session, printer))
}

/// Close the session, then let the printer flush the remaining events
async fn finish_session(session: Session, printer: Option<JoinHandle<()>>) -> Result<()> {
    session.close()?;
    if let Some(printer) = printer {
        printer.await.context("Progress printer failed")?;
    }
    Ok(())
}

async fn run_chat(config: &AgentConfig, verbose: bool) -> Result<ExitCode> {
    let (mut session, printer) = open_session(config, verbose)?;

    println!("Ask questions about {}. Type 'exit' to quit.", config.database_path.display());
    println!("Model: {}", session.model());
    println!();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let exit = Repl::new(&mut session, std::io::stdout())
        .run(stdin)
        .await
        .context("Terminal I/O failed")?;

    finish_session(session, printer).await?;
    tracing::info!("Session ended: {:?}", exit);

    Ok(match exit {
        ReplExit::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

async fn run_ask(config: &AgentConfig, question: &str, verbose: bool) -> Result<ExitCode> {
    let (mut session, printer) = open_session(config, verbose)?;

    let code = match session.ask(question).await {
        Ok(outcome) => {
            if let Some(answer) = outcome.answer {
                println!("{}", answer);
            }
            if outcome.end == TurnEnd::RoundLimit {
                println!("{}", ROUND_LIMIT_NOTICE);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Turn failed: {:#}", e);
            eprintln!("{}", sql_agent::cli::repl::FAILURE_MESSAGE);
            ExitCode::FAILURE
        }
    };

    finish_session(session, printer).await?;
    Ok(code)
}
