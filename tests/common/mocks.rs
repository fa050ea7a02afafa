use async_trait::async_trait;
use disaster_response::{
    Error, Result,
    journal::{Record, RecordSink},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// Sink that accepts a fixed number of records and then fails every write.
#[derive(Debug, Clone)]
pub struct FailingSink {
    remaining: Arc<AtomicUsize>,
    pub accepted: Arc<Mutex<Vec<Record>>>,
}

impl FailingSink {
    pub fn after(writes: usize) -> Self {
        Self {
            remaining: Arc::new(AtomicUsize::new(writes)),
            accepted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn accepted(&self) -> Vec<Record> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for FailingSink {
    async fn write(&self, record: Record) -> Result<()> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err(Error::internal("journal is unavailable"));
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        self.accepted.lock().unwrap().push(record);
        Ok(())
    }
}
