//! Conversation lifecycle tracking for request/inform exchanges.
//!
//! Driven by ACL messages, not sensor events. Timeouts are the caller's
//! concern: it decides when an exchange is stale and calls
//! [`ConversationRegistry::cancel`].

mod registry;
mod types;

pub use registry::ConversationRegistry;
pub use types::{Conversation, ConversationState};
