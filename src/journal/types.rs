use crate::{acl::AclMessage, acl::ConversationId, agent::AgentState, event::Event};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A committed state change of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub from: AgentState,
    pub to: AgentState,
    pub trigger: String,
}

/// Everything the simulation reports to its sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    Transition(TransitionRecord),
    Message(AclMessage),
    Event {
        timestamp: DateTime<Utc>,
        event: Event,
    },
    Rejection {
        timestamp: DateTime<Utc>,
        subject: String,
        reason: String,
    },
    ConversationClosed {
        timestamp: DateTime<Utc>,
        conversation_id: ConversationId,
        reason: String,
    },
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transition(_) => "transition",
            Self::Message(_) => "message",
            Self::Event { .. } => "event",
            Self::Rejection { .. } => "rejection",
            Self::ConversationClosed { .. } => "conversation_closed",
        }
    }

    /// The entity a record is about: agent, sender, event or conversation.
    pub fn subject(&self) -> &str {
        match self {
            Self::Transition(t) => &t.agent_id,
            Self::Message(m) => &m.sender,
            Self::Event { event, .. } => event.id(),
            Self::Rejection { subject, .. } => subject,
            Self::ConversationClosed {
                conversation_id, ..
            } => conversation_id.as_str(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Transition(t) => t.timestamp,
            Self::Message(m) => m.timestamp,
            Self::Event { timestamp, .. }
            | Self::Rejection { timestamp, .. }
            | Self::ConversationClosed { timestamp, .. } => *timestamp,
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.timestamp().format("%H:%M:%S");
        match self {
            Self::Transition(t) => write!(
                f,
                "[{}] TRANSITION {}: {} -> {} ({})",
                at, t.agent_id, t.from, t.to, t.trigger
            ),
            Self::Message(m) => m.fmt(f),
            Self::Event { event, .. } => write!(f, "[{}] EVENT {}", at, event),
            Self::Rejection { subject, reason, .. } => {
                write!(f, "[{}] REJECTED {}: {}", at, subject, reason)
            }
            Self::ConversationClosed {
                conversation_id,
                reason,
                ..
            } => write!(f, "[{}] CLOSED {}: {}", at, conversation_id, reason),
        }
    }
}
