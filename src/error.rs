//! Error types for extern-msg.

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Batch send error: {0}")]
    Batch(#[from] BatchSendError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors raised by a [`MessageGateway`](crate::store::MessageGateway).
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by message entities, ingestion, and the reader.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid message state{}: {reason}", fmt_id(.id))]
    State { id: Option<String>, reason: String },

    #[error("Property name '{name}' already exists with value '{}'", .existing.as_deref().unwrap_or("null"))]
    DuplicateProperty {
        name: String,
        existing: Option<String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed line: {line}")]
    MalformedRecord { line: String },

    #[error("Persistence failed{}: {source}", fmt_id(.id))]
    Persistence {
        id: Option<String>,
        #[source]
        source: DatabaseError,
    },

    #[error("Format string '{0}' is not supported")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MessageError {
    /// The message ID associated with the failure, when one is known.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::State { id, .. } | Self::Persistence { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}

fn fmt_id(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" for message {id}"),
        None => String::new(),
    }
}

/// Every per-message failure collected while sending a batch.
#[derive(Debug, thiserror::Error)]
#[error("{} occurred while sending messages", describe_count(.failures.len()))]
pub struct BatchSendError {
    /// `(position in the batch, error)` pairs, in batch order.
    pub failures: Vec<(usize, MessageError)>,
}

fn describe_count(n: usize) -> String {
    if n == 1 {
        "An error".to_string()
    } else {
        format!("Errors ({n})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_error_mentions_message_id() {
        let err = MessageError::State {
            id: Some("abc".into()),
            reason: "status must be New".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid message state for message abc: status must be New"
        );
        assert_eq!(err.message_id(), Some("abc"));
    }

    #[test]
    fn duplicate_property_renders_null() {
        let err = MessageError::DuplicateProperty {
            name: "Amount".into(),
            existing: None,
        };
        assert_eq!(
            err.to_string(),
            "Property name 'Amount' already exists with value 'null'"
        );
    }

    #[test]
    fn batch_error_counts_failures() {
        let one = BatchSendError {
            failures: vec![(0, MessageError::Validation("x".into()))],
        };
        assert_eq!(one.to_string(), "An error occurred while sending messages");

        let two = BatchSendError {
            failures: vec![
                (0, MessageError::Validation("x".into())),
                (3, MessageError::NotFound("y".into())),
            ],
        };
        assert_eq!(two.to_string(), "Errors (2) occurred while sending messages");
    }

    #[test]
    fn persistence_error_keeps_source() {
        use std::error::Error as _;
        let err = MessageError::Persistence {
            id: None,
            source: DatabaseError::Query("boom".into()),
        };
        assert!(err.source().is_some());
        assert_eq!(err.message_id(), None);
    }
}
