//! REPL (Read-Eval-Print Loop) for interactive CLI
//!
//! Reads one question per line, runs a turn, prints the answer. The loop ends
//! on end of input, an exit keyword, Ctrl-C, or the first failed turn.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;

use crate::agent::{AgentEvent, EventReceiver, Session, TurnEnd, ROUND_LIMIT_NOTICE};

/// Words that end the session, compared case-insensitively
pub const EXIT_KEYWORDS: &[&str] = &["exit", "quit", "kilep", "kilép", "q"];

/// Shown when a turn fails unexpectedly; details go to the tracing log
pub const FAILURE_MESSAGE: &str = "Sorry, something went wrong while answering. Ending the session.";

const PROMPT: &str = "> ";

/// Why the REPL stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    EndOfInput,
    ExitKeyword,
    Interrupted,
    /// A turn failed; the session must not continue
    Failed,
}

pub fn is_exit_keyword(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_KEYWORDS.iter().any(|word| *word == input)
}

/// Interactive REPL over one session
pub struct Repl<'a, W: Write> {
    session: &'a mut Session,
    out: W,
}

impl<'a, W: Write> Repl<'a, W> {
    pub fn new(session: &'a mut Session, out: W) -> Self {
        Self { session, out }
    }

    /// Run until the session ends
    pub async fn run<R>(&mut self, input: R) -> Result<ReplExit>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            write!(self.out, "{}", PROMPT)?;
            self.out.flush()?;

            let read = tokio::select! {
                line = lines.next_line() => Some(line?),
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = read else {
                return self.interrupted();
            };

            let Some(line) = line else {
                writeln!(self.out)?;
                return Ok(ReplExit::EndOfInput);
            };

            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if is_exit_keyword(question) {
                return Ok(ReplExit::ExitKeyword);
            }

            let result = tokio::select! {
                result = self.session.ask(question) => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            };

            match result {
                None => return self.interrupted(),
                Some(Ok(outcome)) => {
                    if let Some(answer) = &outcome.answer {
                        writeln!(self.out, "\n{}\n", answer)?;
                    }
                    if outcome.end == TurnEnd::RoundLimit {
                        writeln!(self.out, "\n{}\n", ROUND_LIMIT_NOTICE)?;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Turn failed: {:#}", e);
                    writeln!(self.out, "\n{}", FAILURE_MESSAGE)?;
                    return Ok(ReplExit::Failed);
                }
            }
        }
    }

    fn interrupted(&mut self) -> Result<ReplExit> {
        writeln!(self.out)?;
        Ok(ReplExit::Interrupted)
    }
}

/// Print tool activity to stderr until the sender side is dropped
pub fn spawn_progress_printer(mut events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::ToolStart { name, arguments, .. } => {
                    let preview: String = arguments.chars().take(60).collect();
                    let ellipsis = if arguments.chars().count() > 60 { "..." } else { "" };
                    eprintln!("[       ...] Calling {} ({}{})", name, preview, ellipsis);
                }
                AgentEvent::ToolComplete {
                    name, duration, ok, ..
                } => {
                    let status = if ok { "" } else { " (error)" };
                    eprintln!("[{:>7}ms] → {}{}", duration.as_millis(), name, status);
                }
                AgentEvent::TurnComplete {
                    rounds,
                    total_duration,
                    ..
                } => {
                    eprintln!(
                        "[{:>7}ms] Total ({} round{})",
                        total_duration.as_millis(),
                        rounds,
                        if rounds == 1 { "" } else { "s" }
                    );
                }
                AgentEvent::Error { message } => eprintln!("[  error  ] {}", message),
                AgentEvent::TurnStart { .. } | AgentEvent::Round { .. } => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_keywords() {
        for word in ["exit", "QUIT", "q", "Kilep", "KILÉP", "  quit  "] {
            assert!(is_exit_keyword(word), "{word} should end the session");
        }
        for word in ["", "quite", "exit now", "how many users?"] {
            assert!(!is_exit_keyword(word), "{word} should not end the session");
        }
    }

    #[tokio::test]
    async fn test_progress_printer_runs_until_sender_drops() {
        use crate::agent::{event_channel, AgentEventSender};
        use std::time::Duration;

        let (tx, rx) = event_channel();
        let printer = spawn_progress_printer(rx);

        let events = AgentEventSender::new(tx);
        events.tool_start("c1", "run_sql", r#"{"query": "SELECT 1"}"#);
        events.tool_complete("c1", "run_sql", Duration::from_millis(3), true);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!printer.is_finished());

        events.turn_complete(TurnEnd::Finish, 1, Duration::from_millis(5));
        drop(events);
        tokio::time::timeout(Duration::from_secs(5), printer)
            .await
            .expect("printer should stop once the sender is gone")
            .unwrap();
    }
}
