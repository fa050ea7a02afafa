use super::Record;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Destination for simulation records. Implementations decide the format.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(&self, record: Record) -> Result<()>;
}

/// Ordered in-memory sink, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        let records = self
            .records
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        Ok(records.clone())
    }

    pub fn lines(&self) -> Result<Vec<String>> {
        Ok(self.records()?.iter().map(ToString::to_string).collect())
    }
}

#[async_trait]
impl RecordSink for MemoryJournal {
    async fn write(&self, record: Record) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        records.push(record);
        Ok(())
    }
}
