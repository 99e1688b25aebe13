//! Bulk construction of messages from dictionaries and delimited files,
//! and batch sending.

pub mod delimited;

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{BatchSendError, MessageError};
use crate::message::{Direction, ExternMessage, Status};
use crate::store::MessageGateway;

pub use delimited::{DelimitedRecordParser, split_record};

/// Text encoding of an ingested file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// 7-bit ASCII; bytes above 0x7F decode as `?`.
    #[default]
    Ascii,
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(format!("Unknown encoding: {other}")),
        }
    }
}

/// A dictionary value: either already typed or text to be parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
    Direction(Direction),
    Status(Status),
}

impl FieldValue {
    /// Text form, as used for IDs, names, and property values.
    fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.clone()),
            Self::Integer(n) => Some(n.to_string()),
            Self::Timestamp(t) => Some(t.to_rfc3339()),
            Self::Direction(d) => Some(d.to_string()),
            Self::Status(s) => Some(s.to_string()),
        }
    }

    fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            Self::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    fn as_direction(&self) -> Option<Direction> {
        match self {
            Self::Direction(d) => Some(*d),
            Self::Integer(n) => Direction::from_code(*n),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_status(&self) -> Option<Status> {
        match self {
            Self::Status(s) => Some(*s),
            Self::Integer(n) => Status::from_code(*n),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Direction> for FieldValue {
    fn from(d: Direction) -> Self {
        Self::Direction(d)
    }
}

impl From<Status> for FieldValue {
    fn from(s: Status) -> Self {
        Self::Status(s)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Self::Null,
            Value::String(s) => Self::Text(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Text(n.to_string()),
            },
            other => Self::Text(other.to_string()),
        }
    }
}

/// Parse the timestamp layouts found in exported message files.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%m/%d/%Y %H:%M:%S", "%m/%d/%Y %I:%M:%S %p"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(ndt.and_utc());
        }
    }
    for layout in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, layout) {
            return date.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
        }
    }
    None
}

/// Build a message from key/value pairs.
///
/// `MSGID`, `MSGNAME`, `MSGTYPE`, `MSGSTART`, `MSGEND`, `MSGDIRECTION`
/// (or `MSGDIR`) and `MSGSTATUS` fill the message fields, matched without
/// regard to case. Values that cannot be parsed are skipped; values that
/// parse but break a field limit fail with [`MessageError::Validation`].
/// Every other key becomes a property. Required fields are not checked here;
/// [`ExternMessage::send`] does that.
pub fn from_dictionary<K, V>(
    entries: impl IntoIterator<Item = (K, V)>,
) -> Result<ExternMessage, MessageError>
where
    K: AsRef<str>,
    V: Into<FieldValue>,
{
    let mut msg = ExternMessage::default();
    for (key, value) in entries {
        let key = key.as_ref();
        if key.is_empty() {
            continue;
        }
        let value: FieldValue = value.into();
        let applied = match key.to_ascii_uppercase().as_str() {
            "MSGID" => {
                msg.set_id(value.as_text().as_deref())?;
                true
            }
            "MSGNAME" => {
                msg.set_name(&value.as_text().unwrap_or_default())?;
                true
            }
            "MSGTYPE" => {
                msg.set_msg_type(&value.as_text().unwrap_or_default())?;
                true
            }
            "MSGSTART" => match value.as_timestamp() {
                Some(t) => {
                    msg.set_start_time(t)?;
                    true
                }
                None => false,
            },
            "MSGEND" => match value.as_timestamp() {
                Some(t) => {
                    msg.set_end_time(Some(t))?;
                    true
                }
                None => false,
            },
            "MSGDIRECTION" | "MSGDIR" => value
                .as_direction()
                .map(|d| msg.set_direction(d))
                .is_some(),
            "MSGSTATUS" => value.as_status().map(|s| msg.set_status(s)).is_some(),
            _ => {
                msg.set_property(key, value.as_text().as_deref())?;
                true
            }
        };
        if !applied {
            debug!(key = key, value = ?value, "Skipping unusable message field");
        }
    }
    Ok(msg)
}

/// [`from_dictionary`] over several dictionaries.
pub fn from_dictionaries<D, K, V>(
    dictionaries: impl IntoIterator<Item = D>,
) -> Result<Vec<ExternMessage>, MessageError>
where
    D: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<FieldValue>,
{
    dictionaries.into_iter().map(from_dictionary).collect()
}

/// Read messages from a delimited text file.
///
/// Each data line is `id,type,name[,propName,propValue]*`. An empty ID is
/// left unset. A trailing property name without a value gets a null value.
pub fn from_file(path: &Path, config: &IngestConfig) -> Result<Vec<ExternMessage>, MessageError> {
    if !path.exists() {
        return Err(MessageError::NotFound(format!(
            "File '{}' does not exist",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    let contents = config.encoding.decode(&bytes);
    let parser = DelimitedRecordParser::new(config.delimiter, config.quote);

    let mut messages = Vec::new();
    for line in contents.lines().skip(config.header_rows) {
        if line.is_empty() {
            continue;
        }
        messages.push(message_from_fields(line, &parser.parse(line))?);
    }

    info!(path = %path.display(), count = messages.len(), "Messages read from file");
    Ok(messages)
}

fn message_from_fields(line: &str, fields: &[String]) -> Result<ExternMessage, MessageError> {
    let [id, msg_type, name, props @ ..] = fields else {
        return Err(MessageError::MalformedRecord {
            line: line.to_string(),
        });
    };

    let mut msg = ExternMessage::default();
    msg.set_id(Some(id.as_str()))?;
    msg.set_msg_type(msg_type)?;
    msg.set_name(name)?;
    msg.set_status(Status::New);
    msg.set_direction(Direction::Inbound);
    msg.set_start_time(Utc::now())?;

    for pair in props.chunks(2) {
        let value = pair.get(1).map(String::as_str);
        msg.set_property(&pair[0], value)?;
    }
    Ok(msg)
}

/// Send every message, continuing past failures.
///
/// Each failure is reported with the message's position in `messages`.
pub async fn send_all(
    store: &dyn MessageGateway,
    messages: &mut [ExternMessage],
) -> Result<(), BatchSendError> {
    let mut failures = Vec::new();
    for (index, msg) in messages.iter_mut().enumerate() {
        if let Err(e) = msg.send(store).await {
            warn!(index = index, error = %e, "Message send failed");
            failures.push((index, e));
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(BatchSendError { failures })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::TimeZone;

    use super::*;
    use crate::message::model::time_floor;

    fn write_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_invoice_line_with_quoted_vendor() {
        let file = write_file(
            b",AP,Invoice,Amount,156.78,Vendor,\"Acme Consulting, Inc.\",Date,5/27/2018\n",
        );
        let messages = from_file(file.path(), &IngestConfig::default()).unwrap();
        assert_eq!(messages.len(), 1);

        let msg = &messages[0];
        assert_eq!(msg.msg_type(), "AP");
        assert_eq!(msg.name(), "Invoice");
        assert!(msg.id().is_none());
        assert_eq!(msg.status(), Status::New);
        assert_eq!(msg.direction(), Direction::Inbound);
        assert_eq!(msg.property_count(), 3);
        assert_eq!(msg.property("Amount").unwrap(), Some("156.78"));
        assert_eq!(msg.property("Vendor").unwrap(), Some("Acme Consulting, Inc."));
        assert_eq!(msg.property("Date").unwrap(), Some("5/27/2018"));
    }

    #[test]
    fn short_line_is_malformed() {
        let file = write_file(b"1,AP,Invoice\nAP,Invoice\n");
        match from_file(file.path(), &IngestConfig::default()) {
            Err(MessageError::MalformedRecord { line }) => assert_eq!(line, "AP,Invoice"),
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn skips_headers_and_blank_lines() {
        let file = write_file(b"id,type,name\n\nm-1,AP,Invoice\r\n\nm-2,AP,Credit,Flag\n");
        let config = IngestConfig {
            header_rows: 1,
            ..Default::default()
        };
        let messages = from_file(file.path(), &config).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id(), Some("m-1"));
        assert_eq!(messages[0].name(), "Invoice");
        assert_eq!(messages[1].property("Flag").unwrap(), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = from_file(Path::new("/no/such/file.csv"), &IngestConfig::default());
        assert!(matches!(result, Err(MessageError::NotFound(_))));
    }

    #[test]
    fn empty_file_yields_no_messages() {
        let file = write_file(b"");
        assert!(from_file(file.path(), &IngestConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn encodings_decode_high_bytes() {
        let bytes = [b'a', 0xE9, b'b'];
        assert_eq!(TextEncoding::Ascii.decode(&bytes), "a?b");
        assert_eq!(TextEncoding::Latin1.decode(&bytes), "aéb");
        assert_eq!(TextEncoding::Utf8.decode("é".as_bytes()), "é");
    }

    #[test]
    fn latin1_file_keeps_accents() {
        let file = write_file(b"1,AP,Invoice,Vendor,Caf\xE9\n");
        let config = IngestConfig {
            encoding: TextEncoding::Latin1,
            ..Default::default()
        };
        let messages = from_file(file.path(), &config).unwrap();
        assert_eq!(messages[0].property("Vendor").unwrap(), Some("Café"));
    }

    #[test]
    fn dictionary_maps_known_keys() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let msg = from_dictionary(vec![
            ("msgid", FieldValue::from("m-1")),
            ("MsgType", "AP".into()),
            ("MSGNAME", "Invoice".into()),
            ("MSGSTART", start.into()),
            ("MSGEND", "2024-01-03 00:00:00".into()),
            ("msgdir", "Outbound".into()),
            ("MSGSTATUS", 2i64.into()),
            ("Vendor", "Acme".into()),
            ("Note", FieldValue::Null),
        ])
        .unwrap();

        assert_eq!(msg.id(), Some("m-1"));
        assert_eq!(msg.msg_type(), "AP");
        assert_eq!(msg.name(), "Invoice");
        assert_eq!(msg.start_time(), start);
        assert_eq!(
            msg.end_time(),
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
        );
        assert_eq!(msg.direction(), Direction::Outbound);
        assert_eq!(msg.status(), Status::Processing);
        assert_eq!(msg.property_names().collect::<Vec<_>>(), vec!["Vendor", "Note"]);
        assert_eq!(msg.property("Note").unwrap(), None);
    }

    #[test]
    fn dictionary_skips_unparsable_fields() {
        let msg = from_dictionary(vec![
            ("MSGSTART", FieldValue::from("not a date")),
            ("MSGDIRECTION", "sideways".into()),
            ("MSGSTATUS", 12i64.into()),
            ("MSGEND", "31/31/2020".into()),
            ("", "ignored".into()),
        ])
        .unwrap();
        assert_eq!(msg.start_time(), time_floor());
        assert_eq!(msg.direction(), Direction::Undefined);
        assert_eq!(msg.status(), Status::Undefined);
        assert!(msg.end_time().is_none());
        assert_eq!(msg.property_count(), 0);
    }

    #[test]
    fn dictionary_rejects_fields_that_break_limits() {
        for entries in [
            vec![("MSGTYPE", "T".repeat(65)), ("MSGNAME", "Invoice".to_string())],
            vec![("MSGNAME", "N".repeat(65))],
            vec![("MSGID", "I".repeat(65))],
            vec![("MSGSTART", "1969-12-31".to_string())],
            vec![("MSGEND", "1969-12-31 23:59:59".to_string())],
        ] {
            let result = from_dictionary(entries.clone());
            assert!(
                matches!(result, Err(MessageError::Validation(_))),
                "expected a validation error for {entries:?}"
            );
        }
    }

    #[test]
    fn dictionary_accepts_json_values() {
        let json = serde_json::json!({"MSGTYPE": "AP", "MSGSTATUS": 1, "Amount": 12.5});
        let serde_json::Value::Object(map) = json else {
            unreachable!()
        };
        let msg = from_dictionary(map).unwrap();
        assert_eq!(msg.status(), Status::New);
        assert_eq!(msg.property("Amount").unwrap(), Some("12.5"));
    }

    #[test]
    fn dictionary_rejects_oversized_property() {
        let long = "x".repeat(300);
        let result = from_dictionary(vec![("Blob", long)]);
        assert!(matches!(result, Err(MessageError::Validation(_))));
    }

    #[test]
    fn many_dictionaries() {
        let messages = from_dictionaries(vec![
            vec![("MSGTYPE", "AP")],
            vec![("MSGTYPE", "AR")],
        ])
        .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].msg_type(), "AR");
    }

    #[test]
    fn timestamp_layouts() {
        assert!(parse_timestamp("2018-05-27T10:00:00Z").is_some());
        assert!(parse_timestamp("5/27/2018").is_some());
        assert!(parse_timestamp("5/27/2018 10:00:00").is_some());
        assert!(parse_timestamp("2018-05-27").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
