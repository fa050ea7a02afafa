use super::{Conversation, ConversationState};
use crate::{
    Error, Result,
    acl::{AclMessage, ConversationId, Performative},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Live and finished conversations, indexed by conversation id.
///
/// Finished conversations are kept so their ids can never be reused.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    conversations: HashMap<ConversationId, Conversation>,
    order: Vec<ConversationId>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn state(&self, id: &ConversationId) -> Option<ConversationState> {
        self.get(id).map(Conversation::state)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Conversations in the order they were opened.
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.order.iter().filter_map(|id| self.conversations.get(id))
    }

    pub fn open_count(&self) -> usize {
        self.iter().filter(|c| c.is_open()).count()
    }

    /// Open conversations that started before `cutoff`.
    pub fn started_before(&self, cutoff: DateTime<Utc>) -> Vec<ConversationId> {
        self.iter()
            .filter(|c| c.is_open() && c.started_at() < cutoff)
            .map(|c| c.id().clone())
            .collect()
    }

    /// Apply a received message to its conversation.
    ///
    /// Rejected messages leave every conversation untouched.
    pub fn apply(&mut self, message: &AclMessage) -> Result<ConversationState> {
        message.validate()?;
        let id = &message.conversation_id;

        if message.performative == Performative::Request {
            if let Some(existing) = self.conversations.get(id) {
                warn!(
                    "REQUEST reuses conversation id {} (state {})",
                    id,
                    existing.state()
                );
                return Err(unexpected(message, existing.state()));
            }
            info!(
                "💬 Conversation {} opened: {} -> {}",
                id, message.sender, message.receiver
            );
            self.conversations
                .insert(id.clone(), Conversation::open(message.clone()));
            self.order.push(id.clone());
            return Ok(ConversationState::Initiated);
        }

        let conversation =
            self.conversations
                .get_mut(id)
                .ok_or_else(|| Error::ConversationNotFound {
                    conversation_id: id.to_string(),
                })?;

        if !conversation.involves(&message.sender) {
            return Err(Error::invalid_message(
                "sender",
                format!("'{}' is not a participant of {}", message.sender, id),
            ));
        }
        if !conversation.involves(&message.receiver) {
            return Err(Error::invalid_message(
                "receiver",
                format!("'{}' is not a participant of {}", message.receiver, id),
            ));
        }

        let state = conversation.state();
        let from_responder = message.sender == conversation.responder();
        let responder_performative = matches!(
            message.performative,
            Performative::Agree | Performative::Refuse | Performative::Inform
        );
        if !state.is_open() || from_responder != responder_performative {
            return Err(unexpected(message, state));
        }

        let answers_query = message.performative == Performative::Inform
            && message
                .in_reply_to
                .as_deref()
                .is_some_and(|query| conversation.has_open_query(query));

        use ConversationState::*;
        let next: &[ConversationState] = match (state, message.performative) {
            (_, Performative::QueryIf) => &[],
            (_, Performative::Inform) if answers_query => &[],
            (Initiated, Performative::Agree) => &[Agreed],
            (Initiated, Performative::Refuse) => &[Refused, Closed],
            (Agreed, Performative::Inform) => &[Informed],
            (Informed, Performative::Confirm) => &[Confirmed, Closed],
            _ => return Err(unexpected(message, state)),
        };

        conversation.record(message.clone());
        for step in next {
            conversation.advance(*step)?;
        }

        let current = conversation.state();
        if current != state {
            info!(
                "💬 Conversation {}: {} -> {} ({})",
                id, state, current, message.performative
            );
        } else {
            debug!(
                "Conversation {} stays {} after {}",
                id, current, message.performative
            );
        }
        Ok(current)
    }

    /// Force a conversation closed. Returns false when it already was.
    pub fn cancel(&mut self, id: &ConversationId) -> Result<bool> {
        let conversation =
            self.conversations
                .get_mut(id)
                .ok_or_else(|| Error::ConversationNotFound {
                    conversation_id: id.to_string(),
                })?;
        if !conversation.is_open() {
            return Ok(false);
        }
        let previous = conversation.state();
        conversation.advance(ConversationState::Closed)?;
        info!("Conversation {} cancelled in state {}", id, previous);
        Ok(true)
    }
}

fn unexpected(message: &AclMessage, state: ConversationState) -> Error {
    Error::UnexpectedPerformative {
        conversation_id: message.conversation_id.to_string(),
        performative: message.performative,
        state,
    }
}
