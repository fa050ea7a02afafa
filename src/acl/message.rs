use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use uuid::Uuid;

pub const DEFAULT_ONTOLOGY: &str = "disaster-response";

pub type Content = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Performative {
    #[serde(rename = "INFORM")]
    Inform,
    #[serde(rename = "REQUEST")]
    Request,
    #[serde(rename = "AGREE")]
    Agree,
    #[serde(rename = "REFUSE")]
    Refuse,
    #[serde(rename = "CONFIRM")]
    Confirm,
    #[serde(rename = "QUERY-IF")]
    QueryIf,
}

impl Performative {
    pub const ALL: [Performative; 6] = [
        Self::Inform,
        Self::Request,
        Self::Agree,
        Self::Refuse,
        Self::Confirm,
        Self::QueryIf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inform => "INFORM",
            Self::Request => "REQUEST",
            Self::Agree => "AGREE",
            Self::Refuse => "REFUSE",
            Self::Confirm => "CONFIRM",
            Self::QueryIf => "QUERY-IF",
        }
    }
}

impl fmt::Display for Performative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Performative {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                Error::invalid_message("performative", format!("unrecognized value '{}'", s))
            })
    }
}

/// Opaque conversation token chosen by the initiating party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclMessage {
    pub message_id: String,
    pub performative: Performative,
    pub sender: String,
    pub receiver: String,
    #[serde(default)]
    pub content: Content,
    pub conversation_id: ConversationId,
    pub ontology: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AclMessage {
    /// Build and validate a message. Malformed input is rejected here and
    /// never reaches a conversation.
    pub fn new(
        performative: Performative,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: Content,
        conversation_id: impl Into<ConversationId>,
        ontology: impl Into<String>,
    ) -> Result<Self> {
        let message = Self {
            message_id: format!("MSG-{}", Uuid::new_v4()),
            performative,
            sender: sender.into(),
            receiver: receiver.into(),
            content,
            conversation_id: conversation_id.into(),
            ontology: ontology.into(),
            in_reply_to: None,
            timestamp: Utc::now(),
        };
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> Result<()> {
        if self.message_id.trim().is_empty() {
            return Err(Error::invalid_message("message_id", "must not be empty"));
        }
        if self.sender.trim().is_empty() {
            return Err(Error::invalid_message("sender", "must not be empty"));
        }
        if self.receiver.trim().is_empty() {
            return Err(Error::invalid_message("receiver", "must not be empty"));
        }
        if self.sender == self.receiver {
            return Err(Error::invalid_message(
                "receiver",
                format!("must differ from sender '{}'", self.sender),
            ));
        }
        if self.conversation_id.as_str().trim().is_empty() {
            return Err(Error::invalid_message("conversation_id", "must not be empty"));
        }
        if self.ontology.trim().is_empty() {
            return Err(Error::invalid_message("ontology", "must not be empty"));
        }
        Ok(())
    }

    /// Reply in the same conversation, addressed back to the sender.
    pub fn reply(&self, performative: Performative, content: Content) -> Result<Self> {
        let mut reply = Self::new(
            performative,
            self.receiver.clone(),
            self.sender.clone(),
            content,
            self.conversation_id.clone(),
            self.ontology.clone(),
        )?;
        reply.in_reply_to = Some(self.message_id.clone());
        Ok(reply)
    }

    pub fn with_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// String field of the content map, if present.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a machine-readable record; the result is validated like a
    /// freshly constructed message.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(json)?;
        let canonical = match value.get("performative").and_then(Value::as_str) {
            Some(raw) => Some(raw.parse::<Performative>()?),
            None => None,
        };
        if let Some(performative) = canonical {
            value["performative"] = Value::from(performative.as_str());
        }
        let message: Self = serde_json::from_value(value)?;
        message.validate()?;
        Ok(message)
    }
}

impl fmt::Display for AclMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} -> {} conversation={} ontology={} content={}",
            self.timestamp.format("%H:%M:%S"),
            self.performative,
            self.sender,
            self.receiver,
            self.conversation_id,
            self.ontology,
            Value::Object(self.content.clone())
        )
    }
}
