//! Session events for real-time visibility
//!
//! The conversation loop reports progress here; the CLI's `--verbose` mode
//! prints them to stderr. Nothing in the loop depends on a receiver existing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::TurnEnd;

// ============================================================================
// Session Events
// ============================================================================

/// Events emitted while answering one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A user question was added to the history
    TurnStart { question: String },

    /// A model round is about to be sent
    Round { number: usize },

    /// A tool invocation is about to be dispatched
    ToolStart {
        id: String,
        name: String,
        /// Raw argument text as sent by the model
        arguments: String,
    },

    /// A tool invocation produced its result
    ToolComplete {
        id: String,
        name: String,
        #[serde(with = "duration_millis")]
        duration: Duration,
        /// `false` when the result payload carries `ok: false`
        ok: bool,
    },

    /// The turn ended
    TurnComplete {
        end: TurnEnd,
        rounds: usize,
        #[serde(with = "duration_millis")]
        total_duration: Duration,
    },

    /// The turn failed and the session is ending
    Error { message: String },
}

/// Serialize Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// ============================================================================
// Event Channel
// ============================================================================

/// Sender for session events
pub type EventSender = mpsc::UnboundedSender<AgentEvent>;

/// Receiver for session events
pub type EventReceiver = mpsc::UnboundedReceiver<AgentEvent>;

/// Create a new event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Optional sender; events are dropped when no one listens
#[derive(Clone, Default)]
pub struct AgentEventSender {
    sender: Option<EventSender>,
}

impl AgentEventSender {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sender that discards every event
    pub fn none() -> Self {
        Self { sender: None }
    }

    pub fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    pub fn send(&self, event: AgentEvent) {
        if let Some(ref sender) = self.sender {
            // Receiver may have dropped
            let _ = sender.send(event);
        }
    }

    pub fn turn_start(&self, question: &str) {
        self.send(AgentEvent::TurnStart {
            question: question.to_string(),
        });
    }

    pub fn round(&self, number: usize) {
        self.send(AgentEvent::Round { number });
    }

    pub fn tool_start(&self, id: &str, name: &str, arguments: &str) {
        self.send(AgentEvent::ToolStart {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        });
    }

    pub fn tool_complete(&self, id: &str, name: &str, duration: Duration, ok: bool) {
        self.send(AgentEvent::ToolComplete {
            id: id.to_string(),
            name: name.to_string(),
            duration,
            ok,
        });
    }

    pub fn turn_complete(&self, end: TurnEnd, rounds: usize, total_duration: Duration) {
        self.send(AgentEvent::TurnComplete {
            end,
            rounds,
            total_duration,
        });
    }

    pub fn error(&self, message: &str) {
        self.send(AgentEvent::Error {
            message: message.to_string(),
        });
    }
}
