use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use acis_core::error::{AcisError, Result};
use acis_core::onboarding::OnboardingState;
use acis_core::traits::SessionStore;
use acis_core::types::{ChatMessage, Role, SessionId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_messages_session
        ON messages(session_id, id);

    CREATE TABLE IF NOT EXISTS onboarding_states (
        session_id TEXT PRIMARY KEY,
        state TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );";

fn db_err(e: impl std::fmt::Display) -> AcisError {
    AcisError::Database(e.to_string())
}

/// SQLite-backed store for chat history and onboarding state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AcisError::Database(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;

        // WAL keeps readers from blocking the writer
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database. Contents live as long as the store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(db_err)
    }

    /// Number of stored messages for a session.
    pub fn message_count(&self, sid: &SessionId) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                params![sid.0],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }
}

fn parse_role(role: &str) -> Role {
    match role {
        "system" => Role::System,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}

impl SessionStore for SqliteStore {
    fn append_messages(&self, sid: &SessionId, msgs: &[ChatMessage]) -> BoxFuture<'_, Result<()>> {
        let sid = sid.0.clone();
        let rows: Result<Vec<_>> = msgs
            .iter()
            .map(|m| -> Result<(&'static str, String, String)> {
                let content = serde_json::to_string(&m.content)?;
                let timestamp = m.timestamp.unwrap_or_else(Utc::now).to_rfc3339();
                Ok((m.role.as_str(), content, timestamp))
            })
            .collect();

        Box::pin(async move {
            let rows = rows?;
            let mut conn = self.lock()?;
            let tx = conn.transaction().map_err(db_err)?;
            for (role, content, timestamp) in &rows {
                tx.execute(
                    "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    params![sid, role, content, timestamp],
                )
                .map_err(db_err)?;
            }
            tx.commit().map_err(db_err)?;
            Ok(())
        })
    }

    fn load_history(&self, sid: &SessionId, limit: usize) -> BoxFuture<'_, Result<Vec<ChatMessage>>> {
        let sid = sid.0.clone();

        Box::pin(async move {
            let conn = self.lock()?;

            // Newest `limit` rows, flipped back to chronological order below
            let mut stmt = conn
                .prepare(
                    "SELECT role, content, timestamp FROM messages
                     WHERE session_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![sid, limit as i64], |row| {
                    let role: String = row.get(0)?;
                    let content: String = row.get(1)?;
                    let timestamp: String = row.get(2)?;
                    Ok((role, content, timestamp))
                })
                .map_err(db_err)?;

            let mut messages = Vec::new();
            for row in rows {
                let (role, content, timestamp) = row.map_err(db_err)?;
                messages.push(ChatMessage {
                    role: parse_role(&role),
                    content: serde_json::from_str(&content)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc)),
                });
            }
            messages.reverse();
            Ok(messages)
        })
    }

    fn load_state(&self, sid: &SessionId) -> BoxFuture<'_, Result<OnboardingState>> {
        let sid = sid.0.clone();

        Box::pin(async move {
            let conn = self.lock()?;
            let raw: Option<String> = conn
                .query_row(
                    "SELECT state FROM onboarding_states WHERE session_id = ?1",
                    params![sid],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;

            match raw {
                Some(raw) => Ok(serde_json::from_str(&raw)?),
                None => Ok(OnboardingState::default()),
            }
        })
    }

    fn save_state(&self, sid: &SessionId, state: &OnboardingState) -> BoxFuture<'_, Result<()>> {
        let sid = sid.0.clone();
        let encoded = serde_json::to_string(state);

        Box::pin(async move {
            let encoded = encoded?;
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO onboarding_states (session_id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
                params![sid, encoded, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn reset_session(&self, sid: &SessionId) -> BoxFuture<'_, Result<()>> {
        let sid = sid.0.clone();

        Box::pin(async move {
            let mut conn = self.lock()?;
            let tx = conn.transaction().map_err(db_err)?;
            let messages = tx
                .execute("DELETE FROM messages WHERE session_id = ?1", params![sid])
                .map_err(db_err)?;
            tx.execute(
                "DELETE FROM onboarding_states WHERE session_id = ?1",
                params![sid],
            )
            .map_err(db_err)?;
            tx.commit().map_err(db_err)?;
            debug!(session = %sid, messages, "Session reset");
            Ok(())
        })
    }

    fn list_sessions(&self) -> BoxFuture<'_, Result<Vec<SessionId>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(
                    "SELECT session_id FROM messages
                     UNION
                     SELECT session_id FROM onboarding_states
                     ORDER BY 1",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(db_err)?;

            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(SessionId(row.map_err(db_err)?));
            }
            Ok(sessions)
        })
    }
}
