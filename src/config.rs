//! Configuration types.
//!
//! Every struct has a `Default` and a `from_env()` that overrides the
//! defaults from `EXTERN_MSG_*` variables.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::ingest::TextEncoding;
use crate::message::ComparisonMode;

/// File ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Encoding of the input file.
    pub encoding: TextEncoding,
    /// Leading lines to skip before data rows.
    pub header_rows: usize,
    pub delimiter: char,
    /// Quote character; `None` disables quoting.
    pub quote: Option<char>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Ascii,
            header_rows: 0,
            delimiter: ',',
            quote: Some('"'),
        }
    }
}

impl IngestConfig {
    /// Reads `EXTERN_MSG_ENCODING`, `EXTERN_MSG_HEADER_ROWS`,
    /// `EXTERN_MSG_DELIMITER` and `EXTERN_MSG_QUOTE`.
    ///
    /// The delimiter accepts `\t` or `tab`. An empty quote disables quoting.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("EXTERN_MSG_ENCODING") {
            config.encoding = parse_value("EXTERN_MSG_ENCODING", &raw)?;
        }
        if let Some(raw) = lookup("EXTERN_MSG_HEADER_ROWS") {
            config.header_rows = parse_value("EXTERN_MSG_HEADER_ROWS", &raw)?;
        }
        if let Some(raw) = lookup("EXTERN_MSG_DELIMITER") {
            config.delimiter = parse_char("EXTERN_MSG_DELIMITER", &raw)?;
        }
        if let Some(raw) = lookup("EXTERN_MSG_QUOTE") {
            config.quote = if raw.is_empty() {
                None
            } else {
                Some(parse_char("EXTERN_MSG_QUOTE", &raw)?)
            };
        }
        if config.quote == Some(config.delimiter) {
            return Err(ConfigError::InvalidValue {
                key: "EXTERN_MSG_QUOTE".to_string(),
                message: "quote character must differ from the delimiter".to_string(),
            });
        }
        Ok(config)
    }
}

/// Message reader settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Mark each received message `Processing` in the store before
    /// listeners see it.
    pub set_status_processing_on_receive: bool,
    /// Comparison mode of the messages the reader builds.
    pub comparison: ComparisonMode,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            set_status_processing_on_receive: false,
            comparison: ComparisonMode::IgnoreCase,
        }
    }
}

impl ReaderConfig {
    /// Reads `EXTERN_MSG_SET_PROCESSING` and `EXTERN_MSG_COMPARISON`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("EXTERN_MSG_SET_PROCESSING") {
            config.set_status_processing_on_receive = parse_bool("EXTERN_MSG_SET_PROCESSING", &raw)?;
        }
        if let Some(raw) = lookup("EXTERN_MSG_COMPARISON") {
            config.comparison = parse_value("EXTERN_MSG_COMPARISON", &raw)?;
        }
        Ok(config)
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/extern-msg.db"),
        }
    }
}

impl StoreConfig {
    /// Reads `EXTERN_MSG_DB_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("EXTERN_MSG_DB_PATH") {
            if raw.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "EXTERN_MSG_DB_PATH".to_string(),
                    message: "path is empty".to_string(),
                });
            }
            config.db_path = PathBuf::from(raw);
        }
        Ok(config)
    }
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_char(key: &str, raw: &str) -> Result<char, ConfigError> {
    match raw {
        "\\t" | "tab" | "TAB" => return Ok('\t'),
        _ => {}
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a single character, got '{raw}'"),
        }),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let ingest = IngestConfig::default();
        assert_eq!(ingest.encoding, TextEncoding::Ascii);
        assert_eq!(ingest.delimiter, ',');
        assert_eq!(ingest.quote, Some('"'));
        assert_eq!(ingest.header_rows, 0);

        let reader = ReaderConfig::default();
        assert!(!reader.set_status_processing_on_receive);
        assert_eq!(reader.comparison, ComparisonMode::IgnoreCase);

        assert_eq!(
            StoreConfig::default().db_path,
            PathBuf::from("./data/extern-msg.db")
        );
    }

    #[test]
    fn missing_variables_keep_defaults() {
        assert_eq!(
            IngestConfig::from_lookup(lookup(&[])).unwrap(),
            IngestConfig::default()
        );
        assert_eq!(
            ReaderConfig::from_lookup(lookup(&[])).unwrap(),
            ReaderConfig::default()
        );
        assert_eq!(
            StoreConfig::from_lookup(lookup(&[])).unwrap(),
            StoreConfig::default()
        );
    }

    #[test]
    fn ingest_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("EXTERN_MSG_ENCODING", "latin1"),
            ("EXTERN_MSG_HEADER_ROWS", "2"),
            ("EXTERN_MSG_DELIMITER", "tab"),
            ("EXTERN_MSG_QUOTE", ""),
        ]))
        .unwrap();
        assert_eq!(config.encoding, TextEncoding::Latin1);
        assert_eq!(config.header_rows, 2);
        assert_eq!(config.delimiter, '\t');
        assert_eq!(config.quote, None);
    }

    #[test]
    fn ingest_rejects_bad_values() {
        for pairs in [
            [("EXTERN_MSG_ENCODING", "ebcdic")],
            [("EXTERN_MSG_HEADER_ROWS", "-1")],
            [("EXTERN_MSG_DELIMITER", ";;")],
            [("EXTERN_MSG_QUOTE", ",")],
        ] {
            let err = IngestConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == pairs[0].0),
                "unexpected error for {pairs:?}: {err}"
            );
        }
    }

    #[test]
    fn reader_overrides() {
        let config = ReaderConfig::from_lookup(lookup(&[
            ("EXTERN_MSG_SET_PROCESSING", "yes"),
            ("EXTERN_MSG_COMPARISON", "CaseSensitive"),
        ]))
        .unwrap();
        assert!(config.set_status_processing_on_receive);
        assert_eq!(config.comparison, ComparisonMode::CaseSensitive);

        assert!(ReaderConfig::from_lookup(lookup(&[("EXTERN_MSG_SET_PROCESSING", "maybe")])).is_err());
    }

    #[test]
    fn store_path_override() {
        let config = StoreConfig::from_lookup(lookup(&[("EXTERN_MSG_DB_PATH", "/tmp/x.db")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert!(StoreConfig::from_lookup(lookup(&[("EXTERN_MSG_DB_PATH", " ")])).is_err());
    }
}
