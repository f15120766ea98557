//! SQLite cursor store with a reply journal.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::cursor::{CursorError, CursorStore, ReplyRecord, ReplyStatus};
use super::{AccountId, MentionId};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, CursorError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CursorError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let db = Self { conn: Mutex::new(Connection::open(path)?) };
        db.init_schema()?;

        let replies = db.reply_count()?;
        info!("Opened state database {:?} ({} replies journaled)", path, replies);
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, CursorError> {
        let db = Self { conn: Mutex::new(Connection::open_in_memory()?) };
        db.init_schema()?;
        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement cannot leave SQLite itself inconsistent
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> Result<(), CursorError> {
        self.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cursor (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_seen_id INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS replies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mention_id INTEGER NOT NULL,
                author_id TEXT NOT NULL,
                text TEXT NOT NULL,
                reply TEXT,
                status TEXT NOT NULL,
                replied_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_replies_mention_id ON replies(mention_id);
        "#,
        )?;
        Ok(())
    }

    pub fn reply_count(&self) -> Result<usize, CursorError> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM replies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Newest journal entries first.
    pub fn recent_replies(&self, limit: usize) -> Result<Vec<ReplyRecord>, CursorError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT mention_id, author_id, text, reply, status, replied_at
             FROM replies ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mention_id, author_id, text, reply, status, replied_at)| {
                let replied_at = DateTime::parse_from_rfc3339(&replied_at)
                    .map_err(|e| CursorError::Corrupt(format!("replied_at '{replied_at}': {e}")))?
                    .with_timezone(&Utc);
                Ok(ReplyRecord {
                    mention_id: from_sql_id(mention_id)?,
                    author_id: AccountId(author_id),
                    text,
                    reply,
                    status: if status == "sent" { ReplyStatus::Sent } else { ReplyStatus::Failed },
                    replied_at,
                })
            })
            .collect()
    }
}

fn to_sql_id(id: MentionId) -> Result<i64, CursorError> {
    i64::try_from(id.0).map_err(|_| CursorError::Corrupt(format!("id {id} does not fit in SQLite")))
}

fn from_sql_id(id: i64) -> Result<MentionId, CursorError> {
    u64::try_from(id)
        .map(MentionId)
        .map_err(|_| CursorError::Corrupt(format!("negative id {id}")))
}

impl CursorStore for Database {
    fn load(&self) -> Result<Option<MentionId>, CursorError> {
        let stored: Option<i64> = self
            .lock()
            .query_row("SELECT last_seen_id FROM cursor WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        stored.map(from_sql_id).transpose()
    }

    fn save(&self, id: MentionId) -> Result<(), CursorError> {
        let value = to_sql_id(id)?;
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO cursor (id, last_seen_id) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_seen_id = excluded.last_seen_id",
            params![value],
        )?;
        tx.commit()?;
        debug!("Cursor saved: {}", id);
        Ok(())
    }

    fn record_reply(&self, record: &ReplyRecord) -> Result<(), CursorError> {
        self.lock().execute(
            "INSERT INTO replies (mention_id, author_id, text, reply, status, replied_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_sql_id(record.mention_id)?,
                record.author_id.0,
                record.text,
                record.reply,
                record.status.as_str(),
                record.replied_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: u64, status: ReplyStatus) -> ReplyRecord {
        ReplyRecord {
            mention_id: MentionId(id),
            author_id: AccountId("7".into()),
            text: format!("mention {id}"),
            reply: (status == ReplyStatus::Sent).then(|| "thanks".to_string()),
            status,
            replied_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_cursor() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.load().unwrap(), None);
    }

    #[test]
    fn test_cursor_overwrites_single_row() {
        let db = Database::in_memory().unwrap();
        db.save(MentionId(10)).unwrap();
        db.save(MentionId(25)).unwrap();
        assert_eq!(db.load().unwrap(), Some(MentionId(25)));

        let rows: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM cursor", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_cursor_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let db = Database::open(&path).unwrap();
            db.save(MentionId(1_790_000_000_000_000_000)).unwrap();
            db.record_reply(&record(1, ReplyStatus::Sent)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.load().unwrap(), Some(MentionId(1_790_000_000_000_000_000)));
        assert_eq!(db.reply_count().unwrap(), 1);
    }

    #[test]
    fn test_id_out_of_range() {
        let db = Database::in_memory().unwrap();
        let err = db.save(MentionId(u64::MAX)).unwrap_err();
        assert!(matches!(err, CursorError::Corrupt(_)));
        assert_eq!(db.load().unwrap(), None);
    }

    #[test]
    fn test_reply_journal() {
        let db = Database::in_memory().unwrap();
        db.record_reply(&record(1, ReplyStatus::Sent)).unwrap();
        db.record_reply(&record(2, ReplyStatus::Failed)).unwrap();
        db.record_reply(&record(3, ReplyStatus::Sent)).unwrap();

        let recent = db.recent_replies(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].mention_id, MentionId(3));
        assert_eq!(recent[1].mention_id, MentionId(2));
        assert_eq!(recent[1].status, ReplyStatus::Failed);
        assert_eq!(recent[1].reply, None);
        assert_eq!(recent[0].reply.as_deref(), Some("thanks"));
    }
}
