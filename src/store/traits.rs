//! `MessageGateway` trait — async interface to the message and property tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::message::model::{PropertyType, Status};

/// One row of the message table. Every column is nullable on read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRow {
    pub id: Option<String>,
    pub msg_type: Option<String>,
    pub name: Option<String>,
    /// Stored direction code.
    pub direction: Option<i64>,
    /// Stored status code.
    pub status: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// The fixed set of message lookups the reader issues.
///
/// "Pending" means direction Outbound and status New, ordered by start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageQuery {
    ById(String),
    Pending { msg_type: String, name: String },
    PendingByType(String),
    AllPending,
}

/// Backend-agnostic store for messages and their properties.
///
/// Write operations return the number of rows affected.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Insert a message row.
    async fn insert_message(&self, row: &MessageRow) -> Result<u64, DatabaseError>;

    /// Insert one property row for a message.
    async fn insert_property(
        &self,
        message_id: &str,
        name: &str,
        prop_type: PropertyType,
        value: Option<&str>,
    ) -> Result<u64, DatabaseError>;

    /// Update status and end time. Only Outbound rows are touched.
    async fn update_status(
        &self,
        message_id: &str,
        status: Status,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<u64, DatabaseError>;

    /// Delete every property row of a message.
    async fn delete_properties(&self, message_id: &str) -> Result<u64, DatabaseError>;

    /// Delete the message row.
    async fn delete_message(&self, message_id: &str) -> Result<u64, DatabaseError>;

    /// Run one of the fixed message lookups.
    async fn query(&self, query: &MessageQuery) -> Result<Vec<MessageRow>, DatabaseError>;

    /// `(name, value)` pairs for a message's properties.
    async fn query_properties(
        &self,
        message_id: &str,
    ) -> Result<Vec<(String, Option<String>)>, DatabaseError>;
}
