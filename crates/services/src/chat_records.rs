//! Chat record storage.
//!
//! One row per chat message, keyed by journal entry and user. Rows are only
//! ever inserted and read back in creation order.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use shared::chat::{ChatMessage, ChatRole};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("chat record store is unavailable (lock poisoned)")]
    Poisoned,
    #[error("invalid chat record {id}: {reason}")]
    InvalidRecord { id: i64, reason: String },
}

/// Row to insert. `is_public` is always false for journal chats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatRecord {
    pub user_id: String,
    pub journal_entry_id: Option<String>,
    pub message: String,
    pub role: ChatRole,
    pub is_public: bool,
    pub research_consent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub id: i64,
    pub user_id: String,
    pub journal_entry_id: Option<String>,
    pub message: String,
    pub role: ChatRole,
    pub is_public: bool,
    pub research_consent: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.message.clone(),
        }
    }
}

pub trait ChatRecordStore: Send + Sync {
    fn insert(&self, record: &NewChatRecord) -> Result<i64, StoreError>;

    /// All records for one conversation, oldest first.
    fn list_for_entry(&self, entry_id: &str, user_id: &str) -> Result<Vec<ChatRecord>, StoreError>;
}

pub struct SqliteChatStore {
    conn: Mutex<Connection>,
}

impl SqliteChatStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open chat database {}", db_path.display()))?;
        Self::init_schema(&conn)?;

        tracing::info!(path = %db_path.display(), "opened chat record store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ai_chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                journal_entry_id TEXT,
                message TEXT NOT NULL,
                role TEXT NOT NULL,
                is_public INTEGER NOT NULL DEFAULT 0,
                research_consent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_entry_user
                ON ai_chat_messages(journal_entry_id, user_id)",
            [],
        )?;

        Ok(())
    }

    /// Insert with an explicit creation time (imports, tests).
    fn insert_at(
        &self,
        record: &NewChatRecord,
        created_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO ai_chat_messages
                (user_id, journal_entry_id, message, role, is_public, research_consent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.user_id,
                record.journal_entry_id,
                record.message,
                record.role.as_str(),
                record.is_public,
                record.research_consent,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM ai_chat_messages", [], |row| row.get(0))?)
    }
}

impl ChatRecordStore for SqliteChatStore {
    fn insert(&self, record: &NewChatRecord) -> Result<i64, StoreError> {
        self.insert_at(record, Utc::now())
    }

    fn list_for_entry(&self, entry_id: &str, user_id: &str) -> Result<Vec<ChatRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, journal_entry_id, message, role, is_public, research_consent, created_at
             FROM ai_chat_messages
             WHERE journal_entry_id = ?1 AND user_id = ?2
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![entry_id, user_id], |row| {
            Ok(RawRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                journal_entry_id: row.get(2)?,
                message: row.get(3)?,
                role: row.get(4)?,
                is_public: row.get(5)?,
                research_consent: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(raw?.into_record()?);
        }
        Ok(records)
    }
}

struct RawRecord {
    id: i64,
    user_id: String,
    journal_entry_id: Option<String>,
    message: String,
    role: String,
    is_public: bool,
    research_consent: bool,
    created_at: String,
}

impl RawRecord {
    fn into_record(self) -> Result<ChatRecord, StoreError> {
        let role = ChatRole::parse(&self.role).ok_or_else(|| StoreError::InvalidRecord {
            id: self.id,
            reason: format!("unknown role {:?}", self.role),
        })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::InvalidRecord {
                id: self.id,
                reason: format!("bad timestamp: {}", e),
            })?
            .with_timezone(&Utc);

        Ok(ChatRecord {
            id: self.id,
            user_id: self.user_id,
            journal_entry_id: self.journal_entry_id,
            message: self.message,
            role,
            is_public: self.is_public,
            research_consent: self.research_consent,
            created_at,
        })
    }
}
