//! Local persistence for the admin CLI.
//!
//! Stores:
//! - The admin session token obtained at login
//! - A journal of every purchase and product action issued from this machine

use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use crate::error::{AdminError, Result};
use crate::lifecycle::AdminAction;

/// Database connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Stored admin session.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredSession {
    pub token: String,
    pub username: Option<String>,
    pub saved_at: String,
}

/// Outcome of a journaled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Succeeded => "succeeded",
            ActionOutcome::Failed => "failed",
        }
    }
}

/// One journaled admin action.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JournalEntry {
    pub id: String,
    pub action: String,
    /// Purchase or product id the action targeted
    pub target_id: Option<String>,
    pub outcome: String,
    pub message: Option<String>,
    pub recorded_at: String,
}

impl Database {
    /// Connect and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every in-memory connection is a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| AdminError::Storage(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        // Single-row session
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                token TEXT NOT NULL,
                username TEXT,
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS action_journal (
                id TEXT PRIMARY KEY,
                action TEXT NOT NULL,
                target_id TEXT,
                outcome TEXT NOT NULL,
                message TEXT,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_action_journal_time ON action_journal(recorded_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Session ====================

    /// Save the session token, replacing any previous one.
    pub async fn save_session(&self, token: &str, username: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session (id, token, username, saved_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                token = excluded.token,
                username = excluded.username,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(token)
        .bind(username)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_session(&self) -> Result<Option<StoredSession>> {
        let session = sqlx::query_as::<_, StoredSession>(
            "SELECT token, username, saved_at FROM session WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Forget the stored session. Returns whether one existed.
    pub async fn clear_session(&self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM session WHERE id = 1")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Journal ====================

    /// Record an action. `action` is an [`AdminAction`] name, `"create"`, or
    /// one of the product actions.
    pub async fn record_action(
        &self,
        action: &str,
        target_id: Option<&str>,
        outcome: ActionOutcome,
        message: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO action_journal (id, action, target_id, outcome, message, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(action)
        .bind(target_id)
        .bind(outcome.as_str())
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Record a lifecycle action against a purchase.
    pub async fn record_lifecycle(
        &self,
        action: AdminAction,
        purchase_id: &str,
        outcome: ActionOutcome,
        message: &str,
    ) -> Result<String> {
        self.record_action(action.as_str(), Some(purchase_id), outcome, Some(message))
            .await
    }

    /// Most recent journal entries, newest first.
    pub async fn recent_actions(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, action, target_id, outcome, message, recorded_at
            FROM action_journal
            ORDER BY rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
