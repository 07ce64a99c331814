//! Run log and live run events
//!
//! Every run keeps an ordered log of what each role did. Entries are
//! mirrored to `tracing` and, together with state changes and scratchpad
//! snapshots, published as [`RunEvent`]s for live display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::artifact::Artifact;
use crate::plan::AgentRole;
use crate::runner::RunState;

// ============================================================================
// Run Log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One line of a run's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub role: AgentRole,
    pub message: String,
    pub level: LogLevel,
}

/// Ordered log of a single run
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
    events: RunEventSender,
}

impl RunLog {
    pub fn new(events: RunEventSender) -> Self {
        Self {
            entries: Vec::new(),
            events,
        }
    }

    pub fn info(&mut self, role: AgentRole, message: impl Into<String>) {
        self.push(role, message.into(), LogLevel::Info);
    }

    pub fn warning(&mut self, role: AgentRole, message: impl Into<String>) {
        self.push(role, message.into(), LogLevel::Warning);
    }

    pub fn error(&mut self, role: AgentRole, message: impl Into<String>) {
        self.push(role, message.into(), LogLevel::Error);
    }

    fn push(&mut self, role: AgentRole, message: String, level: LogLevel) {
        match level {
            LogLevel::Info => tracing::info!(role = %role, "{}", message),
            LogLevel::Warning => tracing::warn!(role = %role, "{}", message),
            LogLevel::Error => tracing::error!(role = %role, "{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            role,
            message,
            level,
        };
        self.events.send(RunEvent::Log(entry.clone()));
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

// ============================================================================
// Run Events
// ============================================================================

/// Events published while a run progresses
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    StateChanged {
        state: RunState,
    },

    StepStarted {
        ordinal: u32,
        role: AgentRole,
        task: String,
    },

    Log(LogEntry),

    /// Full scratchpad text after a step was approved
    ScratchpadUpdated {
        ordinal: u32,
        scratchpad: String,
    },

    ArtifactsReady {
        artifacts: Vec<Artifact>,
    },
}

/// Sender for run events
pub type EventSender = mpsc::UnboundedSender<RunEvent>;

/// Receiver for run events
pub type EventReceiver = mpsc::UnboundedReceiver<RunEvent>;

/// Create a new event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Cloneable sender that drops events when nobody listens
#[derive(Debug, Clone, Default)]
pub struct RunEventSender {
    sender: Option<EventSender>,
}

impl RunEventSender {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a no-op sender (events are discarded)
    pub fn none() -> Self {
        Self { sender: None }
    }

    pub fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    pub fn send(&self, event: RunEvent) {
        if let Some(ref sender) = self.sender {
            // Receiver may have dropped
            let _ = sender.send(event);
        }
    }

    pub fn state_changed(&self, state: &RunState) {
        self.send(RunEvent::StateChanged {
            state: state.clone(),
        });
    }

    pub fn step_started(&self, ordinal: u32, role: AgentRole, task: &str) {
        self.send(RunEvent::StepStarted {
            ordinal,
            role,
            task: task.to_string(),
        });
    }

    pub fn scratchpad_updated(&self, ordinal: u32, scratchpad: String) {
        self.send(RunEvent::ScratchpadUpdated {
            ordinal,
            scratchpad,
        });
    }

    pub fn artifacts_ready(&self, artifacts: &[Artifact]) {
        self.send(RunEvent::ArtifactsReady {
            artifacts: artifacts.to_vec(),
        });
    }
}
