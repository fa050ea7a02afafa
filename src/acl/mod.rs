mod message;

pub use message::{AclMessage, Content, ConversationId, DEFAULT_ONTOLOGY, Performative};

/// Build a content map from a JSON object literal; non-objects give an empty map.
pub fn content(value: serde_json::Value) -> Content {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Content::new(),
    }
}
