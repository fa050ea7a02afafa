use super::{Record, RecordSink};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Database};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI64, Ordering},
};
use tracing::{debug, info, warn};

struct Backend {
    _db: Database,
    conn: Connection,
}

/// Journal persisted to a libsql database, one row per record.
pub struct JournalStorage {
    backend: Option<Backend>,
    // In-memory fallback storage, keyed by write sequence
    fallback: Arc<Mutex<Vec<(i64, Record)>>>,
    sequence: AtomicI64,
}

impl JournalStorage {
    pub async fn new(db_path: &str) -> Result<Self> {
        let (backend, last) = match Self::init_database(db_path).await {
            Ok((backend, last)) => {
                info!("Journal database initialized: {} (last seq {})", db_path, last);
                (Some(backend), last)
            }
            Err(e) => {
                warn!(
                    "Journal database initialization failed, using in-memory fallback: {}",
                    e
                );
                (None, 0)
            }
        };

        Ok(Self {
            backend,
            fallback: Arc::new(Mutex::new(Vec::new())),
            sequence: AtomicI64::new(last),
        })
    }

    async fn init_database(db_path: &str) -> Result<(Backend, i64)> {
        let db = Builder::new_local(db_path).build().await?;
        let conn = db.connect()?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                seq INTEGER NOT NULL,
                kind TEXT NOT NULL,
                subject TEXT NOT NULL,
                line TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at DATETIME NOT NULL
            )
            "#,
            (),
        )
        .await?;
        let last = Self::last_sequence(&conn).await?;
        Ok((Backend { _db: db, conn }, last))
    }

    async fn last_sequence(conn: &Connection) -> Result<i64> {
        let mut rows = conn
            .query("SELECT COALESCE(MAX(seq), 0) FROM records", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    async fn save_to_db(&self, conn: &Connection, seq: i64, record: &Record) -> Result<()> {
        conn.execute(
            "INSERT INTO records (seq, kind, subject, line, payload, recorded_at) VALUES (?, ?, ?, ?, ?, ?)",
            (
                seq,
                record.kind(),
                record.subject(),
                record.to_string(),
                record.to_json()?,
                Utc::now().to_rfc3339(),
            ),
        )
        .await?;
        Ok(())
    }

    fn save_to_fallback(&self, seq: i64, record: Record) -> Result<()> {
        let mut fallback = self
            .fallback
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        fallback.push((seq, record));
        Ok(())
    }

    /// Every record in insertion order.
    pub async fn list(&self) -> Result<Vec<Record>> {
        if let Some(backend) = &self.backend {
            match self.list_from_db(&backend.conn).await {
                Ok(records) => {
                    debug!("Retrieved {} records from journal database", records.len());
                    return Ok(records);
                }
                Err(e) => {
                    warn!("Failed to read journal database, using fallback: {}", e);
                }
            }
        }
        Ok(self
            .fallback_entries()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    async fn list_from_db(&self, conn: &Connection) -> Result<Vec<Record>> {
        let mut rows = conn
            .query("SELECT seq, payload FROM records ORDER BY seq ASC, id ASC", ())
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let seq: i64 = row.get(0)?;
            let payload: String = row.get(1)?;
            entries.push((seq, serde_json::from_str(&payload)?));
        }

        // Records written while the database was failing only exist in memory.
        entries.extend(self.fallback_entries()?);
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, record)| record).collect())
    }

    fn fallback_entries(&self) -> Result<Vec<(i64, Record)>> {
        let fallback = self
            .fallback
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        Ok(fallback.clone())
    }

    /// Human-readable lines for one subject, in insertion order.
    pub async fn lines_for(&self, subject: &str) -> Result<Vec<String>> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter(|r| r.subject() == subject)
            .map(ToString::to_string)
            .collect())
    }
}

#[async_trait]
impl RecordSink for JournalStorage {
    async fn write(&self, record: Record) -> Result<()> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(backend) = &self.backend {
            match self.save_to_db(&backend.conn, seq, &record).await {
                Ok(()) => {
                    debug!("Journaled {} record for {}", record.kind(), record.subject());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to write journal database, using fallback: {}", e);
                }
            }
        }
        self.save_to_fallback(seq, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::ConversationId;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn closed(id: &str) -> Record {
        Record::ConversationClosed {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            conversation_id: ConversationId::new(id),
            reason: "timeout".into(),
        }
    }

    fn rejection(subject: &str) -> Record {
        Record::Rejection {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            subject: subject.into(),
            reason: "conversation not found".into(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let storage = JournalStorage::new(":memory:").await.unwrap();
        assert!(storage.is_persistent());

        storage.write(closed("C1")).await.unwrap();
        storage.write(rejection("C2")).await.unwrap();

        let records = storage.list().await.unwrap();
        assert_eq!(records, vec![closed("C1"), rejection("C2")]);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("journal.db");
        let db_path = db_path.to_string_lossy().to_string();

        {
            let storage = JournalStorage::new(&db_path).await.unwrap();
            storage.write(closed("C1")).await.unwrap();
            storage.write(closed("C2")).await.unwrap();
        }

        let reopened = JournalStorage::new(&db_path).await.unwrap();
        let records = reopened.list().await.unwrap();
        assert_eq!(records, vec![closed("C1"), closed("C2")]);

        reopened.write(closed("C3")).await.unwrap();
        let records = reopened.list().await.unwrap();
        assert_eq!(records.last(), Some(&closed("C3")));
        assert_eq!(
            reopened.lines_for("C2").await.unwrap(),
            vec!["[00:00:00] CLOSED C2: timeout".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fallback_when_db_fails() {
        let storage = JournalStorage::new("/invalid/path/to/journal.db").await.unwrap();
        assert!(!storage.is_persistent());

        storage.write(rejection("C7")).await.unwrap();
        assert_eq!(storage.list().await.unwrap(), vec![rejection("C7")]);
    }

    #[tokio::test]
    async fn test_failed_writes_keep_their_place() {
        let storage = JournalStorage::new(":memory:").await.unwrap();
        storage.write(closed("C1")).await.unwrap();

        let conn = &storage.backend.as_ref().unwrap().conn;
        conn.execute("ALTER TABLE records RENAME TO records_offline", ())
            .await
            .unwrap();
        storage.write(closed("C2")).await.unwrap();
        conn.execute("ALTER TABLE records_offline RENAME TO records", ())
            .await
            .unwrap();
        storage.write(closed("C3")).await.unwrap();

        assert_eq!(
            storage.list().await.unwrap(),
            vec![closed("C1"), closed("C2"), closed("C3")]
        );
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let storage = Arc::new(JournalStorage::new(":memory:").await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage.write(closed(&format!("C{}", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(storage.list().await.unwrap().len(), 10);
    }
}
