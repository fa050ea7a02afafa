//! Record sink for transitions, messages, events and rejections.

mod sink;
mod stats;
mod storage;
mod types;

pub use sink::{MemoryJournal, RecordSink};
pub use stats::JournalStats;
pub use storage::JournalStorage;
pub use types::{Record, TransitionRecord};
