use super::Record;
use crate::acl::Performative;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Totals over a run, as summarized at the end of the simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JournalStats {
    pub total_records: usize,
    pub total_messages: usize,
    pub conversations: usize,
    pub by_performative: BTreeMap<Performative, usize>,
    pub sent_by_agent: BTreeMap<String, usize>,
    pub transitions: usize,
    pub events: usize,
    pub rejections: usize,
    pub closed_conversations: usize,
}

impl JournalStats {
    pub fn from_records(records: &[Record]) -> Self {
        let mut stats = Self {
            total_records: records.len(),
            ..Default::default()
        };
        let mut conversations = BTreeSet::new();

        for record in records {
            match record {
                Record::Message(message) => {
                    stats.total_messages += 1;
                    conversations.insert(message.conversation_id.clone());
                    *stats.by_performative.entry(message.performative).or_default() += 1;
                    *stats.sent_by_agent.entry(message.sender.clone()).or_default() += 1;
                }
                Record::Transition(_) => stats.transitions += 1,
                Record::Event { .. } => stats.events += 1,
                Record::Rejection { .. } => stats.rejections += 1,
                Record::ConversationClosed { .. } => stats.closed_conversations += 1,
            }
        }

        stats.conversations = conversations.len();
        stats
    }

    pub fn count(&self, performative: Performative) -> usize {
        self.by_performative.get(&performative).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AclMessage, Content, DEFAULT_ONTOLOGY};
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;

    fn message(
        performative: Performative,
        sender: &str,
        receiver: &str,
        conversation: &str,
    ) -> Record {
        Record::Message(
            AclMessage::new(
                performative,
                sender,
                receiver,
                Content::new(),
                conversation,
                DEFAULT_ONTOLOGY,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_counts_by_kind() {
        let records = vec![
            message(Performative::Request, "COORD-001", "FIELD-001", "C1"),
            message(Performative::Agree, "FIELD-001", "COORD-001", "C1"),
            message(Performative::Request, "COORD-001", "FIELD-002", "C2"),
            Record::Rejection {
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                subject: "C3".into(),
                reason: "conversation not found".into(),
            },
        ];

        let stats = JournalStats::from_records(&records);
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.conversations, 2);
        assert_eq!(stats.count(Performative::Request), 2);
        assert_eq!(stats.count(Performative::Confirm), 0);
        assert_eq!(stats.sent_by_agent.get("COORD-001"), Some(&2));
        assert_eq!(stats.rejections, 1);
    }

    #[test]
    fn test_empty_journal() {
        assert_eq!(JournalStats::from_records(&[]), JournalStats::default());
    }
}
