use crate::{
    Error, Result,
    acl::{AclMessage, ConversationId, Performative},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    Initiated,
    Agreed,
    Refused,
    Informed,
    Confirmed,
    Closed,
}

impl ConversationState {
    /// Position in the lifecycle order. AGREED and REFUSED share a rank:
    /// they are alternative outcomes of the same step.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Initiated => 0,
            Self::Agreed | Self::Refused => 1,
            Self::Informed => 2,
            Self::Confirmed => 3,
            Self::Closed => 4,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::Agreed => "AGREED",
            Self::Refused => "REFUSED",
            Self::Informed => "INFORMED",
            Self::Confirmed => "CONFIRMED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical exchange between an initiator and a responder.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    id: ConversationId,
    initiator: String,
    responder: String,
    state: ConversationState,
    trail: Vec<ConversationState>,
    history: Vec<AclMessage>,
    started_at: DateTime<Utc>,
}

impl Conversation {
    pub(super) fn open(request: AclMessage) -> Self {
        Self {
            id: request.conversation_id.clone(),
            initiator: request.sender.clone(),
            responder: request.receiver.clone(),
            state: ConversationState::Initiated,
            trail: vec![ConversationState::Initiated],
            started_at: request.timestamp,
            history: vec![request],
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn initiator(&self) -> &str {
        &self.initiator
    }

    pub fn responder(&self) -> &str {
        &self.responder
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Every state entered so far, in order.
    pub fn trail(&self) -> &[ConversationState] {
        &self.trail
    }

    pub fn history(&self) -> &[AclMessage] {
        &self.history
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn involves(&self, agent_id: &str) -> bool {
        self.initiator == agent_id || self.responder == agent_id
    }

    /// True when `message_id` names a QUERY-IF here that nothing has answered yet.
    pub fn has_open_query(&self, message_id: &str) -> bool {
        let asked = self
            .history
            .iter()
            .any(|m| m.performative == Performative::QueryIf && m.message_id == message_id);
        let answered = self
            .history
            .iter()
            .any(|m| m.in_reply_to.as_deref() == Some(message_id));
        asked && !answered
    }

    pub(super) fn record(&mut self, message: AclMessage) {
        self.history.push(message);
    }

    /// Move forward along the lifecycle; backward or sideways moves are refused.
    pub(super) fn advance(&mut self, next: ConversationState) -> Result<()> {
        if next.rank() <= self.state.rank() {
            return Err(Error::internal(format!(
                "conversation {} cannot go from {} to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        self.trail.push(next);
        Ok(())
    }
}
