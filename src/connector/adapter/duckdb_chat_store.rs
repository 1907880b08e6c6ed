use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{MessageRepository, UserRepository};
use crate::domain::{current_timestamp, DomainError, MessageAttributes, Role, StoredMessage, User};

const MESSAGE_COLUMNS: &str =
    "id, user_id, role, content, timestamp, image_data, reasoning_summary, streamed";

/// Users and conversation history in a DuckDB file.
pub struct DuckdbChatStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbChatStore {
    pub fn new(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE SEQUENCE IF NOT EXISTS users_id_seq START 1;
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY DEFAULT nextval('users_id_seq'),
                username TEXT NOT NULL UNIQUE,
                created_at BIGINT NOT NULL
            );

            CREATE SEQUENCE IF NOT EXISTS messages_id_seq START 1;
            CREATE TABLE IF NOT EXISTS messages (
                id BIGINT PRIMARY KEY DEFAULT nextval('messages_id_seq'),
                user_id BIGINT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
                image_data TEXT,
                reasoning_summary TEXT,
                streamed BOOLEAN DEFAULT FALSE
            );
            CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;

        debug!("DuckDB chat schema initialized");
        Ok(())
    }

    fn read_message(row: &Row<'_>) -> duckdb::Result<(StoredMessage, String)> {
        let role: String = row.get(2)?;
        let attributes = MessageAttributes {
            image: row.get(5)?,
            reasoning_summary: row.get(6)?,
            streamed: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
        };
        let message = StoredMessage::reconstitute(
            row.get(0)?,
            row.get(1)?,
            Role::parse(&role).unwrap_or(Role::User),
            row.get(3)?,
            row.get(4)?,
            attributes,
        );
        Ok((message, role))
    }

    fn check_role((message, raw_role): (StoredMessage, String)) -> Result<StoredMessage, DomainError> {
        match Role::parse(&raw_role) {
            Some(_) => Ok(message),
            None => Err(DomainError::storage(format!(
                "Message {} has unknown role '{}'",
                message.id(),
                raw_role
            ))),
        }
    }
}

#[async_trait]
impl UserRepository for DuckdbChatStore {
    async fn register(&self, username: &str) -> Result<User, DomainError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::invalid_input("Username is required"));
        }

        let conn = self.conn.lock().await;
        let existing = conn.query_row(
            "SELECT id, username, created_at FROM users WHERE username = ?1",
            params![username],
            |row| Ok(User::reconstitute(row.get(0)?, row.get(1)?, row.get(2)?)),
        );
        match existing {
            Ok(user) => return Ok(user),
            Err(duckdb::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(DomainError::storage(format!("Failed to query user: {}", e))),
        }

        let created_at = current_timestamp();
        let id: i64 = conn
            .query_row(
                "INSERT INTO users (username, created_at) VALUES (?1, ?2) RETURNING id",
                params![username, created_at],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to create user: {}", e)))?;

        debug!("Created user {} ({})", username, id);
        Ok(User::reconstitute(id, username.to_string(), created_at))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        let conn = self.conn.lock().await;
        match conn.query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?1",
            params![id],
            |row| Ok(User::reconstitute(row.get(0)?, row.get(1)?, row.get(2)?)),
        ) {
            Ok(user) => Ok(Some(user)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to query user: {}", e))),
        }
    }
}

#[async_trait]
impl MessageRepository for DuckdbChatStore {
    async fn append_message(
        &self,
        user_id: i64,
        content: &str,
        role: Role,
        attributes: MessageAttributes,
    ) -> Result<i64, DomainError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            r#"
            INSERT INTO messages (user_id, role, content, timestamp, image_data, reasoning_summary, streamed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            "#,
            params![
                user_id,
                role.as_str(),
                content,
                current_timestamp(),
                attributes.image,
                attributes.reasoning_summary,
                attributes.streamed,
            ],
            |row| row.get(0),
        )
        .map_err(|e| DomainError::storage(format!("Failed to save message: {}", e)))
    }

    async fn list_messages(&self, user_id: i64) -> Result<Vec<StoredMessage>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM messages WHERE user_id = ?1 ORDER BY timestamp, id",
                MESSAGE_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], Self::read_message)
            .map_err(|e| DomainError::storage(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            messages.push(Self::check_role(row)?);
        }
        Ok(messages)
    }

    async fn find_message(&self, id: i64) -> Result<Option<StoredMessage>, DomainError> {
        let conn = self.conn.lock().await;
        match conn.query_row(
            &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
            params![id],
            Self::read_message,
        ) {
            Ok(row) => Self::check_role(row).map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to query message: {}", e))),
        }
    }

    async fn clear_messages(&self, user_id: i64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute("DELETE FROM messages WHERE user_id = ?1", params![user_id])
            .map_err(|e| DomainError::storage(format!("Failed to clear messages: {}", e)))?;
        debug!("Deleted {} messages for user {}", deleted, user_id);
        Ok(())
    }
}
