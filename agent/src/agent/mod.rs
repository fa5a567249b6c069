//! Conversation loop
//!
//! One [`Session`] owns the history, the database connection and the model.
//! Each call to [`Session::ask`] runs a turn:
//! 1. The question is appended as a user entry
//! 2. The model receives the full history and the tool catalogue
//! 3. Every tool invocation it requests is dispatched and answered with
//!    exactly one tool-result entry carrying the same id
//! 4. The turn ends on a plain reply, on `finish`, or at the round cap

use std::time::Instant;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_ROUNDS;
use crate::db::AuditLog;
use crate::llm::{ChatMessage, ChatModel, ToolDefinition};
use crate::tools::{self, Dispatcher, ToolOutput, FINISH};

// Session event emission for verbose output
pub mod events;
pub use events::{event_channel, AgentEvent, AgentEventSender, EventReceiver, EventSender};

/// Directive used when the configuration does not override it
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a meticulous SQLite analyst. \
Use get_schema to learn the database structure before writing SQL, and run_sql to run \
queries. Prefer small, precise queries and check results before drawing conclusions. \
When you are done, always call finish with a clear, concise answer for the user.";

/// Shown when a turn stops at the round cap
pub const ROUND_LIMIT_NOTICE: &str =
    "Stopped after reaching the maximum number of steps for one question. Try asking a narrower question.";

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEnd {
    /// The model replied without requesting tools
    Reply,
    /// The model invoked `finish`
    Finish,
    /// The round cap was reached first
    RoundLimit,
}

/// Result of one [`Session::ask`]
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text to show the user, if the turn produced any
    pub answer: Option<String>,
    pub end: TurnEnd,
    /// Model calls made during the turn
    pub rounds: usize,
}

/// A conversation with the model over one database connection
pub struct Session {
    model: Box<dyn ChatModel>,
    conn: Connection,
    audit: AuditLog,
    tools: Vec<ToolDefinition>,
    history: Vec<ChatMessage>,
    max_rounds: usize,
    event_sender: AgentEventSender,
}

impl Session {
    /// Start a session whose history holds only the default directive
    pub fn new(conn: Connection, model: Box<dyn ChatModel>, audit: AuditLog) -> Self {
        Self {
            model,
            conn,
            audit,
            tools: tools::tool_definitions(),
            history: vec![ChatMessage::system(DEFAULT_SYSTEM_PROMPT)],
            max_rounds: DEFAULT_MAX_ROUNDS,
            event_sender: AgentEventSender::none(),
        }
    }

    /// Replace the directive
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.history[0] = ChatMessage::system(prompt);
        self
    }

    /// Cap the model calls per turn; zero is raised to one
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Emit events for this session
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = AgentEventSender::new(sender);
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn model(&self) -> &str {
        self.model.model()
    }

    /// Release the database connection
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| e)
            .context("Failed to close database connection")
    }

    /// Run one turn for `question`
    ///
    /// Errors are unexpected failures (model transport, introspection); the
    /// caller is expected to end the session on them.
    pub async fn ask(&mut self, question: &str) -> Result<TurnOutcome> {
        let started = Instant::now();
        self.event_sender.turn_start(question);
        self.history.push(ChatMessage::user(question));

        match self.run_rounds().await {
            Ok(outcome) => {
                tracing::info!(
                    "Turn ended ({:?}) after {} round(s) in {}ms",
                    outcome.end,
                    outcome.rounds,
                    started.elapsed().as_millis()
                );
                self.event_sender
                    .turn_complete(outcome.end, outcome.rounds, started.elapsed());
                Ok(outcome)
            }
            Err(e) => {
                self.event_sender.error(&format!("{:#}", e));
                Err(e)
            }
        }
    }

    async fn run_rounds(&mut self) -> Result<TurnOutcome> {
        let mut rounds = 0;

        loop {
            if rounds >= self.max_rounds {
                tracing::warn!("Turn reached the round cap ({}), stopping", self.max_rounds);
                return Ok(TurnOutcome {
                    answer: None,
                    end: TurnEnd::RoundLimit,
                    rounds,
                });
            }
            rounds += 1;
            self.event_sender.round(rounds);
            tracing::debug!("Round {} with {} history entries", rounds, self.history.len());

            let reply = self
                .model
                .complete(&self.history, &self.tools)
                .await
                .context("Model request failed")?
                .normalized();

            if reply.invocations().is_empty() {
                let answer = reply
                    .content
                    .as_deref()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string);
                self.history.push(reply);
                return Ok(TurnOutcome {
                    answer,
                    end: TurnEnd::Reply,
                    rounds,
                });
            }

            let invocations = reply.invocations().to_vec();
            self.history.push(reply);
            tracing::debug!("Dispatching {} tool invocation(s)", invocations.len());

            let mut finished = false;
            let mut answer: Option<String> = None;

            for invocation in &invocations {
                let name = invocation.function.name.as_str();
                let raw_arguments = invocation.function.arguments.as_str();
                self.event_sender.tool_start(&invocation.id, name, raw_arguments);

                let tool_started = Instant::now();
                let output = Dispatcher::new(&self.conn, &self.audit)
                    .dispatch_raw(name, raw_arguments)
                    .with_context(|| format!("Tool {} failed", name))?;

                self.event_sender
                    .tool_complete(&invocation.id, name, tool_started.elapsed(), output.is_ok());

                if name == FINISH {
                    finished = true;
                }
                if let ToolOutput::Finish(response) = &output {
                    let response = response.trim();
                    if answer.is_none() && !response.is_empty() {
                        answer = Some(response.to_string());
                    }
                }

                self.history
                    .push(ChatMessage::tool_result(&invocation.id, output.to_json_string()));
            }

            if finished {
                return Ok(TurnOutcome {
                    answer,
                    end: TurnEnd::Finish,
                    rounds,
                });
            }
        }
    }
}
