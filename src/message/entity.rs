//! The `ExternMessage` record, its property bag, and its lifecycle.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, MessageError};
use crate::store::{MessageGateway, MessageRow};

use super::events::{Listeners, MessageEvent};
use super::model::{
    ComparisonMode, Direction, MAX_MESSAGE_ID_LEN, MAX_MSG_NAME_LEN, MAX_MSG_TYPE_LEN,
    PropertyType, Status, time_floor,
};
use super::properties::{self, PropertyBag, SetOutcome};

/// A typed, named, directional unit of work exchanged with the backend.
///
/// Equality is `PartialEq` only: a message without an ID is not equal to
/// anything, itself included. Use [`ExternMessage::key`] to put messages in
/// a map or set.
#[derive(Debug)]
pub struct ExternMessage {
    id: Option<String>,
    msg_type: String,
    name: String,
    direction: Direction,
    status: Status,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    properties: PropertyBag,
    listeners: Listeners,
}

/// Normalized identity of a message that has an ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub id: String,
    pub name: String,
    pub msg_type: String,
}

impl Default for ExternMessage {
    fn default() -> Self {
        Self::empty(ComparisonMode::default())
    }
}

impl ExternMessage {
    /// An empty message: no type, name, or ID, Undefined direction and status.
    pub fn empty(comparison: ComparisonMode) -> Self {
        Self {
            id: None,
            msg_type: String::new(),
            name: String::new(),
            direction: Direction::Undefined,
            status: Status::Undefined,
            start_time: time_floor(),
            end_time: None,
            properties: PropertyBag::new(comparison),
            listeners: Listeners::default(),
        }
    }

    /// A new inbound message ready to send, started now.
    pub fn new(msg_type: &str, name: &str) -> Result<Self, MessageError> {
        Self::with_status(msg_type, name, Status::New)
    }

    /// A message with the given status. Only `New` messages are made inbound
    /// and stamped with a start time.
    pub fn with_status(msg_type: &str, name: &str, status: Status) -> Result<Self, MessageError> {
        Self::build(msg_type, name, status, ComparisonMode::default())
    }

    /// Like [`new`](Self::new), with an explicit comparison mode. The mode is
    /// fixed for the life of the message.
    pub fn new_with_comparison(
        msg_type: &str,
        name: &str,
        comparison: ComparisonMode,
    ) -> Result<Self, MessageError> {
        Self::build(msg_type, name, Status::New, comparison)
    }

    fn build(
        msg_type: &str,
        name: &str,
        status: Status,
        comparison: ComparisonMode,
    ) -> Result<Self, MessageError> {
        let mut msg = Self::empty(comparison);
        msg.set_msg_type(msg_type)?;
        msg.set_name(name)?;
        msg.status = status;
        if status == Status::New {
            msg.direction = Direction::Inbound;
            msg.start_time = Utc::now();
        }
        Ok(msg)
    }

    /// A new message with the given property names defined (null values).
    /// Blank names are skipped.
    pub fn with_property_names<'a>(
        msg_type: &str,
        name: &str,
        property_names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, MessageError> {
        let mut msg = Self::new(msg_type, name)?;
        for prop in property_names {
            if !prop.trim().is_empty() {
                msg.add_property(prop, None)?;
            }
        }
        Ok(msg)
    }

    /// A new message shaped like `template`: same type, name, comparison mode
    /// and property names, with every value null.
    pub fn from_template(template: &ExternMessage) -> Self {
        let mut properties = PropertyBag::new(template.comparison());
        for prop in template.property_names() {
            // Names were validated and de-duplicated when the template was built.
            let _ = properties.add(prop, None);
        }
        Self {
            msg_type: template.msg_type.clone(),
            name: template.name.clone(),
            direction: Direction::Inbound,
            status: Status::New,
            start_time: Utc::now(),
            properties,
            ..Self::empty(template.comparison())
        }
    }

    /// Rebuild a message from a stored row and its property rows.
    pub fn from_row(
        row: MessageRow,
        props: Vec<(String, Option<String>)>,
        comparison: ComparisonMode,
    ) -> Result<Self, MessageError> {
        let corrupt = |reason: String| MessageError::Persistence {
            id: row.id.clone(),
            source: DatabaseError::Serialization(reason),
        };

        let direction_code = row.direction.unwrap_or(0);
        let direction = Direction::from_code(direction_code)
            .ok_or_else(|| corrupt(format!("Message direction '{direction_code}' is not valid")))?;
        let status_code = row.status.unwrap_or(0);
        let status = Status::from_code(status_code)
            .ok_or_else(|| corrupt(format!("Message status '{status_code}' is not valid")))?;
        let id = match row.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(corrupt("Invalid message ID encountered".into())),
        };

        let mut msg = Self::empty(comparison);
        msg.set_id(Some(id)).map_err(|e| corrupt(e.to_string()))?;
        msg.set_msg_type(row.msg_type.as_deref().unwrap_or_default())
            .map_err(|e| corrupt(e.to_string()))?;
        msg.set_name(row.name.as_deref().unwrap_or_default())
            .map_err(|e| corrupt(e.to_string()))?;
        msg.direction = direction;
        msg.status = status;
        if let Some(start) = row.start_time {
            msg.set_start_time(start).map_err(|e| corrupt(e.to_string()))?;
        }
        if let Some(end) = row.end_time {
            msg.set_end_time(Some(end)).map_err(|e| corrupt(e.to_string()))?;
        }

        for (name, value) in props {
            if name.trim().is_empty() {
                return Err(corrupt("Invalid property name encountered".into()));
            }
            msg.properties
                .set(&name, value.as_deref())
                .map_err(|e| corrupt(e.to_string()))?;
        }
        Ok(msg)
    }

    // ── Fields ──────────────────────────────────────────────────────

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set or clear the ID. A blank ID clears it.
    pub fn set_id(&mut self, id: Option<&str>) -> Result<(), MessageError> {
        let id = id.filter(|id| !id.trim().is_empty());
        check_len(id.unwrap_or_default(), MAX_MESSAGE_ID_LEN, "Message ID")?;
        self.id = id.map(str::to_string);
        Ok(())
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn set_msg_type(&mut self, msg_type: &str) -> Result<(), MessageError> {
        check_len(msg_type, MAX_MSG_TYPE_LEN, "Message type")?;
        self.msg_type = msg_type.to_string();
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), MessageError> {
        check_len(name, MAX_MSG_NAME_LEN, "Message name")?;
        self.name = name.to_string();
        Ok(())
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn set_start_time(&mut self, start_time: DateTime<Utc>) -> Result<(), MessageError> {
        check_floor(start_time, "Start time")?;
        self.start_time = start_time;
        Ok(())
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub(crate) fn set_end_time(&mut self, end_time: Option<DateTime<Utc>>) -> Result<(), MessageError> {
        if let Some(end) = end_time {
            check_floor(end, "End time")?;
        }
        self.end_time = end_time;
        Ok(())
    }

    pub fn comparison(&self) -> ComparisonMode {
        self.properties.mode()
    }

    /// Register a listener for property and send notifications.
    pub fn subscribe(&mut self, listener: impl Fn(&MessageEvent) + Send + Sync + 'static) {
        self.listeners.subscribe(listener);
    }

    // ── Properties ──────────────────────────────────────────────────

    /// Define a new property. Fails if the name is already defined.
    pub fn add_property<'a>(
        &mut self,
        name: &str,
        value: impl Into<Option<&'a str>>,
    ) -> Result<(), MessageError> {
        let value = value.into();
        self.properties.add(name, value)?;
        debug!(property = name, "Property added");
        self.listeners.emit(MessageEvent::PropertyAdded {
            name: name.to_string(),
            value: value.map(str::to_string),
        });
        Ok(())
    }

    /// Define or update a property. A change notification fires only when
    /// the value actually differs under the comparison mode.
    pub fn set_property<'a>(
        &mut self,
        name: &str,
        value: impl Into<Option<&'a str>>,
    ) -> Result<(), MessageError> {
        let value = value.into();
        match self.properties.set(name, value)? {
            SetOutcome::Added => {
                debug!(property = name, "Property added");
                self.listeners.emit(MessageEvent::PropertyAdded {
                    name: name.to_string(),
                    value: value.map(str::to_string),
                });
            }
            SetOutcome::Changed { name, old } => {
                debug!(property = %name, "Property value changed");
                self.listeners.emit(MessageEvent::PropertyChanged {
                    name,
                    old,
                    new: value.map(str::to_string),
                });
            }
            SetOutcome::Unchanged => {}
        }
        Ok(())
    }

    /// Value of a defined property. `Ok(None)` means defined with a null value.
    pub fn property(&self, name: &str) -> Result<Option<&str>, MessageError> {
        properties::validate_name(name)?;
        self.properties
            .entry(name)
            .map(|(_, value)| value)
            .ok_or_else(|| MessageError::NotFound(format!("Property '{name}' is not defined")))
    }

    pub fn has_property(&self, name: &str) -> Result<bool, MessageError> {
        properties::validate_name(name)?;
        Ok(self.properties.contains(name))
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.names()
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn clear_properties(&mut self) {
        self.properties.clear();
    }

    pub fn clear_property_values(&mut self) {
        self.properties.clear_values();
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Write the message and its properties to the store.
    ///
    /// Assigns an ID if none is set and stamps the start time if it is still
    /// at the floor. The in-memory status is left at `New`.
    pub async fn send(&mut self, store: &dyn MessageGateway) -> Result<(), MessageError> {
        if self.msg_type.trim().is_empty() {
            return Err(MessageError::Validation("Message type is required".into()));
        }
        if self.name.trim().is_empty() {
            return Err(MessageError::Validation("Message name is required".into()));
        }

        let id = match &self.id {
            Some(id) => id.clone(),
            None => {
                let id = Uuid::new_v4().to_string();
                self.id = Some(id.clone());
                id
            }
        };

        if self.direction == Direction::Undefined {
            return Err(MessageError::State {
                id: Some(id),
                reason: format!(
                    "Message direction '{}' is invalid when sending a message",
                    self.direction
                ),
            });
        }
        if self.status != Status::New {
            return Err(MessageError::State {
                id: Some(id),
                reason: format!(
                    "Message status must be set to '{}' when sending a message",
                    Status::New
                ),
            });
        }

        if self.start_time <= time_floor() {
            self.start_time = Utc::now();
        }

        self.insert_rows(store, &id)
            .await
            .map_err(|source| MessageError::Persistence {
                id: Some(id.clone()),
                source,
            })?;

        info!(
            id = %id,
            msg_type = %self.msg_type,
            name = %self.name,
            properties = self.properties.len(),
            "Message sent"
        );
        self.listeners.emit(MessageEvent::Sent { id });
        Ok(())
    }

    async fn insert_rows(&self, store: &dyn MessageGateway, id: &str) -> Result<(), DatabaseError> {
        let inserted = store.insert_message(&self.to_row()).await?;
        if inserted == 0 {
            return Err(DatabaseError::Query(format!(
                "message row for {id} was not inserted"
            )));
        }

        let mut prop_rows = 0;
        for (name, value) in self.properties.iter() {
            prop_rows += store
                .insert_property(id, name, PropertyType::Undefined, value)
                .await?;
        }
        let expected = self.properties.len() as u64;
        if prop_rows != expected {
            return Err(DatabaseError::Query(format!(
                "inserted {prop_rows} of {expected} property rows for {id}"
            )));
        }
        Ok(())
    }

    /// Update the stored status of an outbound message.
    ///
    /// Moving to `Complete` or `Error` stamps an end time unless one is
    /// already recorded. Store failures return `Ok(false)`; only broken
    /// preconditions are errors.
    pub async fn set_database_status(
        &mut self,
        store: &dyn MessageGateway,
        status: Status,
    ) -> Result<bool, MessageError> {
        let Some(id) = self.id.clone() else {
            return Err(MessageError::NotFound(
                "Message ID is required when setting the database status of a message".into(),
            ));
        };
        if status == Status::Undefined {
            return Err(MessageError::Validation(format!(
                "Message status cannot be set to '{status}'"
            )));
        }
        if self.direction != Direction::Outbound {
            return Err(MessageError::State {
                id: Some(id),
                reason: format!(
                    "Direction '{}' is invalid when setting the database status of a message",
                    self.direction
                ),
            });
        }

        let has_end = self.end_time.is_some_and(|end| end > time_floor());
        let stamped = (status.is_terminal() && !has_end).then(Utc::now);
        let end_time = stamped.or(self.end_time);

        match store.update_status(&id, status, end_time).await {
            Ok(rows) if rows > 0 => {
                self.status = status;
                if stamped.is_some() {
                    self.end_time = stamped;
                }
                debug!(id = %id, status = %status, "Message status updated");
                Ok(true)
            }
            Ok(_) => {
                warn!(id = %id, status = %status, "Status update matched no outbound message");
                Ok(false)
            }
            Err(e) => {
                warn!(id = %id, status = %status, error = %e, "Status update failed");
                Ok(false)
            }
        }
    }

    /// Remove the message and its properties from the store.
    ///
    /// Returns `Ok(false)` when the store fails or no message row was
    /// deleted. A message with no property rows is fine.
    pub async fn delete(&self, store: &dyn MessageGateway) -> Result<bool, MessageError> {
        let Some(id) = self.id.as_deref() else {
            return Err(MessageError::NotFound(
                "Message ID is required when deleting a message".into(),
            ));
        };

        if let Err(e) = store.delete_properties(id).await {
            warn!(id = id, error = %e, "Deleting message properties failed");
            return Ok(false);
        }
        match store.delete_message(id).await {
            Ok(rows) if rows > 0 => {
                debug!(id = id, "Message deleted");
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) => {
                warn!(id = id, error = %e, "Deleting message failed");
                Ok(false)
            }
        }
    }

    /// The message columns as written to the store.
    pub fn to_row(&self) -> MessageRow {
        MessageRow {
            id: self.id.clone(),
            msg_type: Some(self.msg_type.clone()),
            name: Some(self.name.clone()),
            direction: Some(self.direction.code()),
            status: Some(self.status.code()),
            start_time: Some(self.start_time),
            end_time: self.end_time,
        }
    }

    // ── Identity ────────────────────────────────────────────────────

    /// Normalized identity, or `None` when the message has no ID yet.
    pub fn key(&self) -> Option<MessageKey> {
        let id = self.id.as_deref()?;
        let mode = self.comparison();
        Some(MessageKey {
            id: mode.normalize(id).into_owned(),
            name: mode.normalize(&self.name).into_owned(),
            msg_type: mode.normalize(&self.msg_type).into_owned(),
        })
    }

    /// Deterministic hash of [`key`](Self::key); `None` without an ID.
    pub fn hash_code(&self) -> Option<u64> {
        let key = self.key()?;
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        Some(hasher.finish())
    }
}

impl PartialEq for ExternMessage {
    fn eq(&self, other: &Self) -> bool {
        let mode = self.comparison();
        if mode != other.comparison() {
            return false;
        }
        match (self.id.as_deref(), other.id.as_deref()) {
            (Some(a), Some(b)) => {
                mode.equals(a, b)
                    && mode.equals(&self.msg_type, &other.msg_type)
                    && mode.equals(&self.name, &other.name)
            }
            _ => false,
        }
    }
}

impl Hash for ExternMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal messages share a mode, so their keys normalize alike.
        // ID-less messages are never equal, so `None` is consistent.
        self.key().hash(state);
    }
}

fn check_len(value: &str, max: usize, what: &str) -> Result<(), MessageError> {
    if value.chars().count() > max {
        return Err(MessageError::Validation(format!(
            "{what} cannot be more than {max} characters in length"
        )));
    }
    Ok(())
}

fn check_floor(time: DateTime<Utc>, what: &str) -> Result<(), MessageError> {
    if time < time_floor() {
        return Err(MessageError::Validation(format!(
            "{what} cannot be earlier than {}",
            time_floor().to_rfc3339()
        )));
    }
    Ok(())
}
