//! Message reader: pulls pending outbound messages from the store and
//! hands them to registered listeners.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ReaderConfig;
use crate::error::MessageError;
use crate::message::{ComparisonMode, ExternMessage, Status};
use crate::store::{MessageGateway, MessageQuery};

type ReceivedListener = Box<dyn Fn(&ExternMessage) + Send + Sync>;

/// Reads messages written for this side of the exchange.
pub struct MessageReader {
    store: Arc<dyn MessageGateway>,
    config: ReaderConfig,
    listeners: Vec<ReceivedListener>,
}

impl MessageReader {
    pub fn new(store: Arc<dyn MessageGateway>, config: ReaderConfig) -> Self {
        Self {
            store,
            config,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Register a listener called once per received message.
    pub fn on_received(&mut self, listener: impl Fn(&ExternMessage) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Fetch one message by ID, whatever its direction or status.
    /// Listeners are not notified.
    pub async fn get(&self, id: &str) -> Result<Option<ExternMessage>, MessageError> {
        if id.trim().is_empty() {
            return Err(MessageError::Validation("Message ID is required".into()));
        }
        let mut found = load(
            self.store.as_ref(),
            &MessageQuery::ById(id.to_string()),
            self.config.comparison,
        )
        .await?;
        Ok((!found.is_empty()).then(|| found.swap_remove(0)))
    }

    /// Receive pending messages of one type and name.
    pub async fn receive_named(
        &self,
        msg_type: &str,
        name: &str,
    ) -> Result<Vec<ExternMessage>, MessageError> {
        if msg_type.trim().is_empty() {
            return Err(MessageError::Validation("Message type is required".into()));
        }
        if name.trim().is_empty() {
            return Err(MessageError::Validation("Message name is required".into()));
        }
        self.receive(MessageQuery::Pending {
            msg_type: msg_type.to_string(),
            name: name.to_string(),
        })
        .await
    }

    /// Receive pending messages of one type.
    pub async fn receive_type(&self, msg_type: &str) -> Result<Vec<ExternMessage>, MessageError> {
        if msg_type.trim().is_empty() {
            return Err(MessageError::Validation("Message type is required".into()));
        }
        self.receive(MessageQuery::PendingByType(msg_type.to_string()))
            .await
    }

    /// Receive every pending message.
    pub async fn receive_all(&self) -> Result<Vec<ExternMessage>, MessageError> {
        self.receive(MessageQuery::AllPending).await
    }

    async fn receive(&self, query: MessageQuery) -> Result<Vec<ExternMessage>, MessageError> {
        let mut messages = load(self.store.as_ref(), &query, self.config.comparison).await?;
        debug!(query = ?query, count = messages.len(), "Pending messages loaded");

        for msg in &mut messages {
            if self.config.set_status_processing_on_receive
                && !msg
                    .set_database_status(self.store.as_ref(), Status::Processing)
                    .await?
            {
                warn!(id = ?msg.id(), "Could not mark received message as processing");
            }
            for listener in &self.listeners {
                listener(&*msg);
            }
        }
        Ok(messages)
    }
}

impl ExternMessage {
    /// Load one message by ID with the default comparison mode.
    pub async fn from_store(
        store: &dyn MessageGateway,
        id: &str,
    ) -> Result<Option<ExternMessage>, MessageError> {
        if id.trim().is_empty() {
            return Err(MessageError::Validation("Message ID is required".into()));
        }
        let mut found = load(
            store,
            &MessageQuery::ById(id.to_string()),
            ComparisonMode::default(),
        )
        .await?;
        Ok((!found.is_empty()).then(|| found.swap_remove(0)))
    }
}

/// Run a lookup and rebuild each row with its properties.
async fn load(
    store: &dyn MessageGateway,
    query: &MessageQuery,
    comparison: ComparisonMode,
) -> Result<Vec<ExternMessage>, MessageError> {
    let rows = store
        .query(query)
        .await
        .map_err(|source| MessageError::Persistence { id: None, source })?;

    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let props = match row.id.as_deref() {
            Some(id) => store
                .query_properties(id)
                .await
                .map_err(|source| MessageError::Persistence {
                    id: Some(id.to_string()),
                    source,
                })?,
            None => Vec::new(),
        };
        messages.push(ExternMessage::from_row(row, props, comparison)?);
    }
    Ok(messages)
}
