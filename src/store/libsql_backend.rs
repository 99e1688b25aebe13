//! libSQL backend — async `MessageGateway` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::message::model::{Direction, PropertyType, Status};
use crate::store::migrations;
use crate::store::traits::{MessageGateway, MessageQuery, MessageRow};

/// libSQL message store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlGateway {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlGateway {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let gateway = Self::connect(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(gateway)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::connect(db).await
    }

    async fn connect(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Classify an insert failure; key violations become `Constraint`.
fn insert_error(op: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {message}"))
    } else {
        DatabaseError::Query(format!("{op}: {message}"))
    }
}

fn opt_integer(n: Option<i64>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(n),
        None => libsql::Value::Null,
    }
}

fn opt_datetime(t: Option<DateTime<Utc>>) -> libsql::Value {
    match t {
        Some(t) => libsql::Value::Text(t.to_rfc3339()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a MessageRow.
///
/// Column order matches MESSAGE_COLUMNS:
/// 0:extern_msg_id, 1:msg_type, 2:msg_name, 3:msg_direction, 4:msg_status,
/// 5:start_time, 6:end_time
fn row_to_message(row: &libsql::Row) -> Result<MessageRow, libsql::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        msg_type: row.get(1)?,
        name: row.get(2)?,
        direction: row.get(3)?,
        status: row.get(4)?,
        start_time: parse_optional_datetime(row.get(5)?),
        end_time: parse_optional_datetime(row.get(6)?),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const MESSAGE_COLUMNS: &str =
    "extern_msg_id, msg_type, msg_name, msg_direction, msg_status, start_time, end_time";

#[async_trait]
impl MessageGateway for LibSqlGateway {
    async fn insert_message(&self, row: &MessageRow) -> Result<u64, DatabaseError> {
        let inserted = self
            .conn()
            .execute(
                &format!("INSERT INTO extern_msg ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    opt_text(row.id.as_deref()),
                    opt_text(row.msg_type.as_deref()),
                    opt_text(row.name.as_deref()),
                    opt_integer(row.direction),
                    opt_integer(row.status),
                    opt_datetime(row.start_time),
                    opt_datetime(row.end_time),
                ],
            )
            .await
            .map_err(|e| insert_error("insert_message", e))?;

        debug!(id = ?row.id, "Message row inserted");
        Ok(inserted)
    }

    async fn insert_property(
        &self,
        message_id: &str,
        name: &str,
        prop_type: PropertyType,
        value: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO extern_msg_prop (extern_msg_id, prop_name, prop_type, prop_value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id, name, prop_type.code(), opt_text(value)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_property: {e}")))
    }

    async fn update_status(
        &self,
        message_id: &str,
        status: Status,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<u64, DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE extern_msg SET msg_status = ?1, end_time = ?2
                 WHERE extern_msg_id = ?3 AND msg_direction = ?4",
                params![
                    status.code(),
                    opt_datetime(end_time),
                    message_id,
                    Direction::Outbound.code(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_status: {e}")))?;

        debug!(id = message_id, status = %status, rows = updated, "Message status updated in DB");
        Ok(updated)
    }

    async fn delete_properties(&self, message_id: &str) -> Result<u64, DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM extern_msg_prop WHERE extern_msg_id = ?1",
                params![message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_properties: {e}")))
    }

    async fn delete_message(&self, message_id: &str) -> Result<u64, DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM extern_msg WHERE extern_msg_id = ?1",
                params![message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_message: {e}")))
    }

    async fn query(&self, query: &MessageQuery) -> Result<Vec<MessageRow>, DatabaseError> {
        let pending = format!(
            "SELECT {MESSAGE_COLUMNS} FROM extern_msg WHERE msg_direction = {} AND msg_status = {}",
            Direction::Outbound.code(),
            Status::New.code()
        );
        let conn = self.conn();
        let result = match query {
            MessageQuery::ById(id) => {
                conn.query(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM extern_msg WHERE extern_msg_id = ?1"),
                    params![id.as_str()],
                )
                .await
            }
            MessageQuery::Pending { msg_type, name } => {
                conn.query(
                    &format!("{pending} AND msg_type = ?1 AND msg_name = ?2 ORDER BY start_time ASC"),
                    params![msg_type.as_str(), name.as_str()],
                )
                .await
            }
            MessageQuery::PendingByType(msg_type) => {
                conn.query(
                    &format!("{pending} AND msg_type = ?1 ORDER BY start_time ASC"),
                    params![msg_type.as_str()],
                )
                .await
            }
            MessageQuery::AllPending => {
                conn.query(&format!("{pending} ORDER BY start_time ASC"), ())
                    .await
            }
        };
        let mut rows = result.map_err(|e| DatabaseError::Query(format!("query: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    warn!("Skipping message row: {e}");
                }
            }
        }
        Ok(messages)
    }

    async fn query_properties(
        &self,
        message_id: &str,
    ) -> Result<Vec<(String, Option<String>)>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT prop_name, prop_value FROM extern_msg_prop
                 WHERE extern_msg_id = ?1 ORDER BY rowid ASC",
                params![message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("query_properties: {e}")))?;

        let mut props = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let name: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
            let value: Option<String> = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
            props.push((name, value));
        }
        Ok(props)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
