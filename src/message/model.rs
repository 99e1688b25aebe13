//! Directions, statuses, comparison modes, and field limits.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a message ID.
pub const MAX_MESSAGE_ID_LEN: usize = 64;
/// Maximum length of a message type.
pub const MAX_MSG_TYPE_LEN: usize = 64;
/// Maximum length of a message name.
pub const MAX_MSG_NAME_LEN: usize = 64;
/// Maximum length of a property name.
pub const MAX_PROP_NAME_LEN: usize = 64;
/// Maximum length of a property value.
pub const MAX_PROP_VAL_LEN: usize = 256;

/// Earliest timestamp the backend accepts (1970-01-01T00:00:00Z).
pub fn time_floor() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Which way a message travels relative to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Undefined,
    /// Submitted to the backend.
    Inbound,
    /// Produced by the backend for processing.
    Outbound,
}

impl Direction {
    /// Numeric code stored in the database.
    pub fn code(self) -> i64 {
        match self {
            Self::Undefined => 0,
            Self::Inbound => 1,
            Self::Outbound => 2,
        }
    }

    /// Map a stored code back to a direction. Unknown codes yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Undefined),
            1 => Some(Self::Inbound),
            2 => Some(Self::Outbound),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Inbound => write!(f, "Inbound"),
            Self::Outbound => write!(f, "Outbound"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    /// Accepts a case-insensitive name or a numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| format!("Unknown direction code: {code}"));
        }
        match s.to_ascii_lowercase().as_str() {
            "undefined" => Ok(Self::Undefined),
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            _ => Err(format!("Unknown direction: {s}")),
        }
    }
}

/// Lifecycle stage of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Undefined,
    New,
    Processing,
    Complete,
    Error,
    Locked,
}

impl Status {
    /// Numeric code stored in the database.
    pub fn code(self) -> i64 {
        match self {
            Self::Undefined => 0,
            Self::New => 1,
            Self::Processing => 2,
            Self::Complete => 3,
            Self::Error => 4,
            Self::Locked => 999,
        }
    }

    /// Map a stored code back to a status. Unknown codes yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Undefined),
            1 => Some(Self::New),
            2 => Some(Self::Processing),
            3 => Some(Self::Complete),
            4 => Some(Self::Error),
            999 => Some(Self::Locked),
            _ => None,
        }
    }

    /// Whether reaching this status closes the message (stamps an end time).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Undefined => "Undefined",
            Self::New => "New",
            Self::Processing => "Processing",
            Self::Complete => "Complete",
            Self::Error => "Error",
            Self::Locked => "Locked",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    /// Accepts a case-insensitive name or a numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| format!("Unknown status code: {code}"));
        }
        match s.to_ascii_lowercase().as_str() {
            "undefined" => Ok(Self::Undefined),
            "new" => Ok(Self::New),
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            "locked" => Ok(Self::Locked),
            _ => Err(format!("Unknown status: {s}")),
        }
    }
}

/// Stored property type. The backend only defines one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[default]
    Undefined,
}

impl PropertyType {
    pub fn code(self) -> i64 {
        match self {
            Self::Undefined => 0,
        }
    }
}

/// Case-sensitivity policy for every string comparison on one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    CaseSensitive,
    #[default]
    IgnoreCase,
}

impl ComparisonMode {
    pub fn code(self) -> i64 {
        match self {
            Self::CaseSensitive => 0,
            Self::IgnoreCase => 1,
        }
    }

    /// Compare two strings under this mode.
    pub fn equals(self, a: &str, b: &str) -> bool {
        match self {
            Self::CaseSensitive => a == b,
            Self::IgnoreCase => {
                a.chars()
                    .flat_map(char::to_lowercase)
                    .eq(b.chars().flat_map(char::to_lowercase))
            }
        }
    }

    /// Normalize a string so that `normalize(a) == normalize(b)` iff `equals(a, b)`.
    pub fn normalize(self, s: &str) -> Cow<'_, str> {
        match self {
            Self::CaseSensitive => Cow::Borrowed(s),
            Self::IgnoreCase => Cow::Owned(s.chars().flat_map(char::to_lowercase).collect()),
        }
    }
}

impl std::fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CaseSensitive => write!(f, "CaseSensitive"),
            Self::IgnoreCase => write!(f, "IgnoreCase"),
        }
    }
}

impl std::str::FromStr for ComparisonMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "casesensitive" | "case_sensitive" | "0" => Ok(Self::CaseSensitive),
            "ignorecase" | "ignore_case" | "1" => Ok(Self::IgnoreCase),
            other => Err(format!("Unknown comparison mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_roundtrip() {
        for status in [
            Status::Undefined,
            Status::New,
            Status::Processing,
            Status::Complete,
            Status::Error,
            Status::Locked,
        ] {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(5), None);
        assert_eq!(Status::Locked.code(), 999);
    }

    #[test]
    fn direction_parses_names_and_codes() {
        assert_eq!("outbound".parse::<Direction>(), Ok(Direction::Outbound));
        assert_eq!("INBOUND".parse::<Direction>(), Ok(Direction::Inbound));
        assert_eq!("2".parse::<Direction>(), Ok(Direction::Outbound));
        assert!("sideways".parse::<Direction>().is_err());
        assert!("7".parse::<Direction>().is_err());
    }

    #[test]
    fn status_parses_names_and_codes() {
        assert_eq!("Complete".parse::<Status>(), Ok(Status::Complete));
        assert_eq!("999".parse::<Status>(), Ok(Status::Locked));
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn ignore_case_comparison() {
        let mode = ComparisonMode::IgnoreCase;
        assert!(mode.equals("Vendor", "VENDOR"));
        assert!(!mode.equals("Vendor", "Vendors"));
        assert_eq!(mode.normalize("Vendor"), mode.normalize("vEnDoR"));
    }

    #[test]
    fn case_sensitive_comparison() {
        let mode = ComparisonMode::CaseSensitive;
        assert!(!mode.equals("Vendor", "vendor"));
        assert!(mode.equals("Vendor", "Vendor"));
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Complete.is_terminal());
        assert!(Status::Error.is_terminal());
        assert!(!Status::Processing.is_terminal());
    }
}
