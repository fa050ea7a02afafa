use crate::{acl::Performative, conversation::ConversationState};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sensor report from '{sensor_id}': {reason}")]
    InvalidReport { sensor_id: String, reason: String },

    #[error("Invalid message field '{field}': {reason}")]
    InvalidMessage { field: String, reason: String },

    #[error("Unexpected {performative} in conversation {conversation_id} (state: {state})")]
    UnexpectedPerformative {
        conversation_id: String,
        performative: Performative,
        state: ConversationState,
    },

    #[error("Conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: String },

    #[error("Agent not found: {agent_id}")]
    AgentNotFound { agent_id: String },

    #[error("Invalid transition table '{table}': {reason}")]
    InvalidTransitionTable { table: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::Config(s) => Self::Config(s.clone()),
            Self::InvalidReport { sensor_id, reason } => Self::InvalidReport {
                sensor_id: sensor_id.clone(),
                reason: reason.clone(),
            },
            Self::InvalidMessage { field, reason } => Self::InvalidMessage {
                field: field.clone(),
                reason: reason.clone(),
            },
            Self::UnexpectedPerformative {
                conversation_id,
                performative,
                state,
            } => Self::UnexpectedPerformative {
                conversation_id: conversation_id.clone(),
                performative: *performative,
                state: *state,
            },
            Self::ConversationNotFound { conversation_id } => Self::ConversationNotFound {
                conversation_id: conversation_id.clone(),
            },
            Self::AgentNotFound { agent_id } => Self::AgentNotFound {
                agent_id: agent_id.clone(),
            },
            Self::InvalidTransitionTable { table, reason } => Self::InvalidTransitionTable {
                table: table.clone(),
                reason: reason.clone(),
            },
            Self::Internal(s) => Self::Internal(s.clone()),
            // For errors that can't be cloned, convert to string representation
            Self::Database(e) => Self::Internal(format!("Database error: {}", e)),
            Self::Serialization(e) => Self::Internal(format!("Serialization error: {}", e)),
            Self::Yaml(e) => Self::Internal(format!("YAML error: {}", e)),
            Self::Io(e) => Self::Internal(format!("IO error: {}", e)),
        }
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_report(sensor_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReport {
            sensor_id: sensor_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_message(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTransitionTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// True for the errors the simulation journals and moves past.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidReport { .. }
                | Self::InvalidMessage { .. }
                | Self::UnexpectedPerformative { .. }
                | Self::ConversationNotFound { .. }
                | Self::AgentNotFound { .. }
        )
    }
}
