use crate::config::DisplayConfig;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;

/// How a column's cells should be rendered, derived from its type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayHint {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Binary,
}

impl DisplayHint {
    /// Case-insensitive substring match on the engine's type tag
    pub fn from_type_tag(tag: &str) -> Self {
        let tag = tag.to_uppercase();
        let has = |needle: &str| tag.contains(needle);

        if has("TIMESTAMP") || has("DATETIME") {
            DisplayHint::DateTime
        } else if has("DATE") {
            DisplayHint::Date
        } else if has("INTERVAL") {
            DisplayHint::Text
        } else if has("TIME") {
            DisplayHint::Time
        } else if has("INT") {
            DisplayHint::Integer
        } else if ["DOUBLE", "FLOAT", "REAL", "DECIMAL", "NUMERIC"]
            .iter()
            .any(|n| has(n))
        {
            DisplayHint::Float
        } else if has("BOOL") {
            DisplayHint::Boolean
        } else if has("BLOB") || has("BYTEA") || has("BINARY") {
            DisplayHint::Binary
        } else {
            DisplayHint::Text
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DisplayHint::Integer | DisplayHint::Float)
    }
}

/// Format strings applied to cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFormats {
    pub date_format: String,
    pub datetime_format: String,
    pub time_format: String,
    pub null_text: String,
}

impl Default for CellFormats {
    fn default() -> Self {
        Self::from(&DisplayConfig::default())
    }
}

impl From<&DisplayConfig> for CellFormats {
    fn from(config: &DisplayConfig) -> Self {
        Self {
            date_format: config.date_format.clone(),
            datetime_format: config.datetime_format.clone(),
            time_format: config.time_format.clone(),
            null_text: config.null_text.clone(),
        }
    }
}

/// Render one cell. Date-like text that doesn't parse is shown as is.
pub fn format_cell(value: &Value, hint: DisplayHint, formats: &CellFormats) -> String {
    let text = match value {
        Value::Null => return formats.null_text.clone(),
        Value::String(s) => s.as_str(),
        Value::Bool(b) => return b.to_string(),
        Value::Number(n) => return n.to_string(),
        other => return other.to_string(),
    };

    let formatted = match hint {
        DisplayHint::Date => parse_date(text).and_then(|d| render(d.format(&formats.date_format))),
        DisplayHint::DateTime => {
            parse_datetime(text).and_then(|dt| render(dt.format(&formats.datetime_format)))
        }
        DisplayHint::Time => parse_time(text).and_then(|t| render(t.format(&formats.time_format))),
        _ => None,
    };
    formatted.unwrap_or_else(|| text.to_string())
}

// chrono reports bad format strings as a Display error
fn render(item: impl std::fmt::Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", item).ok()?;
    Some(out)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    .or_else(|| {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hint_from_type_tag() {
        assert_eq!(DisplayHint::from_type_tag("TIMESTAMP WITH TIME ZONE"), DisplayHint::DateTime);
        assert_eq!(DisplayHint::from_type_tag("date"), DisplayHint::Date);
        assert_eq!(DisplayHint::from_type_tag("TIME"), DisplayHint::Time);
        assert_eq!(DisplayHint::from_type_tag("HUGEINT"), DisplayHint::Integer);
        assert_eq!(DisplayHint::from_type_tag("DECIMAL(18,3)"), DisplayHint::Float);
        assert_eq!(DisplayHint::from_type_tag("BOOLEAN"), DisplayHint::Boolean);
        assert_eq!(DisplayHint::from_type_tag("BLOB"), DisplayHint::Binary);
        assert_eq!(DisplayHint::from_type_tag("INTERVAL"), DisplayHint::Text);
        assert_eq!(DisplayHint::from_type_tag("VARCHAR"), DisplayHint::Text);
    }

    #[test]
    fn test_date_like_cells_use_configured_formats() {
        let formats = CellFormats {
            date_format: "%d/%m/%Y".to_string(),
            datetime_format: "%d/%m/%Y %H:%M".to_string(),
            time_format: "%H.%M".to_string(),
            null_text: "-".to_string(),
        };
        assert_eq!(format_cell(&json!("2024-03-09"), DisplayHint::Date, &formats), "09/03/2024");
        assert_eq!(
            format_cell(&json!("2024-03-09T14:05:00"), DisplayHint::DateTime, &formats),
            "09/03/2024 14:05"
        );
        assert_eq!(format_cell(&json!("14:05:59"), DisplayHint::Time, &formats), "14.05");
        assert_eq!(format_cell(&Value::Null, DisplayHint::Date, &formats), "-");
    }

    #[test]
    fn test_unparseable_values_shown_verbatim() {
        let formats = CellFormats::default();
        assert_eq!(format_cell(&json!("soon"), DisplayHint::Date, &formats), "soon");
        assert_eq!(format_cell(&json!(12.5), DisplayHint::Float, &formats), "12.5");
        assert_eq!(format_cell(&json!("\\x0aff"), DisplayHint::Binary, &formats), "\\x0aff");
    }

    #[test]
    fn test_bad_format_string_falls_back() {
        let formats = CellFormats {
            date_format: "%Q".to_string(),
            ..CellFormats::default()
        };
        assert_eq!(format_cell(&json!("2024-03-09"), DisplayHint::Date, &formats), "2024-03-09");
    }
}
