//! Format-code rendering for messages.
//!
//! Each single-letter code selects one view of the message. Letters whose
//! case matters (`D`/`d`, `U`/`u`, `A`/`a`, `O`/`o`) pick between a name and
//! a numeric or short form; the rest are case-insensitive.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::error::MessageError;

use super::entity::ExternMessage;
use super::model::time_floor;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A supported rendering of an [`ExternMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCode {
    /// `Type: .., Name: .., Property Count: ..`
    General,
    Name,
    Type,
    EndTime,
    StartTime,
    Id,
    DirectionName,
    DirectionCode,
    StatusName,
    StatusCode,
    /// One property name per line.
    PropertyNames,
    /// One `name: value` pair per line.
    PropertyValues,
    PropertyCount,
    ComparisonName,
    ComparisonCode,
    TypeShortName,
    TypeFullName,
}

impl std::str::FromStr for FormatCode {
    type Err = MessageError;

    /// An empty code means [`FormatCode::General`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "" | "G" | "g" => Self::General,
            "N" | "n" => Self::Name,
            "T" | "t" => Self::Type,
            "E" | "e" => Self::EndTime,
            "S" | "s" => Self::StartTime,
            "I" | "i" => Self::Id,
            "D" => Self::DirectionName,
            "d" => Self::DirectionCode,
            "U" => Self::StatusName,
            "u" => Self::StatusCode,
            "P" | "p" => Self::PropertyNames,
            "V" | "v" => Self::PropertyValues,
            "C" | "c" => Self::PropertyCount,
            "A" => Self::ComparisonName,
            "a" => Self::ComparisonCode,
            "o" => Self::TypeShortName,
            "O" => Self::TypeFullName,
            other => return Err(MessageError::Format(other.to_string())),
        };
        Ok(code)
    }
}

impl ExternMessage {
    /// Render the message for a format code such as `"G"`, `"P"` or `"u"`.
    pub fn render(&self, code: &str) -> Result<String, MessageError> {
        Ok(self.render_code(code.parse()?))
    }

    pub fn render_code(&self, code: FormatCode) -> String {
        match code {
            FormatCode::General => format!(
                "Type: {}, Name: {}, Property Count: {}",
                self.msg_type(),
                self.name(),
                self.property_count()
            ),
            FormatCode::Name => self.name().to_string(),
            FormatCode::Type => self.msg_type().to_string(),
            FormatCode::EndTime => self
                .end_time()
                .filter(|end| *end > time_floor())
                .map(format_time)
                .unwrap_or_default(),
            FormatCode::StartTime => {
                let start = self.start_time();
                if start >= time_floor() {
                    format_time(start)
                } else {
                    String::new()
                }
            }
            FormatCode::Id => self.id().unwrap_or_default().to_string(),
            FormatCode::DirectionName => self.direction().to_string(),
            FormatCode::DirectionCode => self.direction().code().to_string(),
            FormatCode::StatusName => self.status().to_string(),
            FormatCode::StatusCode => self.status().code().to_string(),
            FormatCode::PropertyNames => {
                let mut out = String::new();
                for name in self.property_names() {
                    let _ = writeln!(out, "{name}");
                }
                out
            }
            FormatCode::PropertyValues => {
                let mut out = String::new();
                for (name, value) in self.properties().iter() {
                    let _ = writeln!(out, "{name}: {}", value.unwrap_or_default());
                }
                out
            }
            FormatCode::PropertyCount => self.property_count().to_string(),
            FormatCode::ComparisonName => self.comparison().to_string(),
            FormatCode::ComparisonCode => self.comparison().code().to_string(),
            FormatCode::TypeShortName => "ExternMessage".to_string(),
            FormatCode::TypeFullName => std::any::type_name::<ExternMessage>().to_string(),
        }
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

impl std::fmt::Display for ExternMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_code(FormatCode::General))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::message::model::{ComparisonMode, Direction, Status};

    fn invoice() -> ExternMessage {
        let mut msg = ExternMessage::new("AP", "Invoice").unwrap();
        msg.add_property("X", "1").unwrap();
        msg.add_property("Y", None).unwrap();
        msg
    }

    #[test]
    fn general_summary() {
        let msg = invoice();
        assert_eq!(msg.render("G").unwrap(), "Type: AP, Name: Invoice, Property Count: 2");
        assert_eq!(msg.render("").unwrap(), msg.to_string());
    }

    #[test]
    fn property_names_one_per_line_in_order() {
        let msg = invoice();
        assert_eq!(msg.render("P").unwrap(), "X\nY\n");
        assert_eq!(msg.render("p").unwrap().lines().count(), 2);
    }

    #[test]
    fn property_values_render_null_as_empty() {
        assert_eq!(invoice().render("V").unwrap(), "X: 1\nY: \n");
    }

    #[test]
    fn case_sensitive_codes() {
        let mut msg = invoice();
        msg.set_direction(Direction::Outbound);
        msg.set_status(Status::Locked);
        assert_eq!(msg.render("D").unwrap(), "Outbound");
        assert_eq!(msg.render("d").unwrap(), "2");
        assert_eq!(msg.render("U").unwrap(), "Locked");
        assert_eq!(msg.render("u").unwrap(), "999");
        assert_eq!(msg.render("A").unwrap(), "IgnoreCase");
        assert_eq!(msg.render("a").unwrap(), "1");
        assert_eq!(msg.render("o").unwrap(), "ExternMessage");
        assert!(msg.render("O").unwrap().ends_with("ExternMessage"));
        assert!(msg.render("O").unwrap().contains("::"));
    }

    #[test]
    fn times_blank_at_floor() {
        let msg = ExternMessage::empty(ComparisonMode::CaseSensitive);
        assert_eq!(msg.render("E").unwrap(), "");
        assert_eq!(msg.render("S").unwrap(), "1970-01-01 00:00:00");

        let mut msg = invoice();
        msg.set_start_time(Utc.with_ymd_and_hms(2018, 5, 27, 8, 30, 0).unwrap())
            .unwrap();
        msg.set_end_time(Some(time_floor())).unwrap();
        assert_eq!(msg.render("s").unwrap(), "2018-05-27 08:30:00");
        assert_eq!(msg.render("e").unwrap(), "");
    }

    #[test]
    fn id_and_count() {
        let mut msg = invoice();
        assert_eq!(msg.render("I").unwrap(), "");
        msg.set_id(Some("m-1")).unwrap();
        assert_eq!(msg.render("i").unwrap(), "m-1");
        assert_eq!(msg.render("c").unwrap(), "2");
        assert_eq!(msg.render("N").unwrap(), "Invoice");
        assert_eq!(msg.render("t").unwrap(), "AP");
    }

    #[test]
    fn unsupported_code_is_format_error() {
        let msg = invoice();
        for code in ["X", "GG", "x", "q"] {
            assert!(matches!(msg.render(code), Err(MessageError::Format(_))));
        }
    }
}
