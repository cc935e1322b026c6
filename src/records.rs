//! Typed row documents
//!
//! A row is an ordered mapping from field name to a scalar [`FieldValue`].
//! Values arrive loosely typed (CSV cells are text) and are coerced to the
//! schema's declared [`DataType`] during validation.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::database::entities::common_types::DataType;

/// Field name to value, in column order
pub type RowDocument = IndexMap<String, FieldValue>;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d"];

/// A single scalar cell.
///
/// Serialized untagged so stored rows stay plain JSON objects. On the way
/// back in, ISO dates are recognised before falling back to text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    /// Build a value from a raw text cell, treating blank cells as null
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(trimmed.to_string())
        }
    }

    /// Null and blank text both count as missing
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::Text(text) => parse_date(text),
            _ => None,
        }
    }

    /// Canonical text form, used for uniqueness keys and text comparisons
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Coerce this value to `data_type`, returning the normalized value.
    ///
    /// Missing values pass through unchanged; presence is checked separately.
    pub fn coerce(&self, data_type: DataType) -> Result<FieldValue, String> {
        if self.is_missing() {
            return Ok(FieldValue::Null);
        }

        match data_type {
            DataType::String => Ok(FieldValue::Text(self.to_text())),
            DataType::Number => self
                .as_number()
                .map(FieldValue::Number)
                .ok_or_else(|| format!("'{}' is not a number", self)),
            DataType::Date => self
                .as_date()
                .map(FieldValue::Date)
                .ok_or_else(|| format!("'{}' is not a date", self)),
            DataType::Boolean => match self {
                FieldValue::Boolean(b) => Ok(FieldValue::Boolean(*b)),
                FieldValue::Number(n) if *n == 0.0 || *n == 1.0 => {
                    Ok(FieldValue::Boolean(*n == 1.0))
                }
                FieldValue::Text(text) => parse_bool(text)
                    .map(FieldValue::Boolean)
                    .ok_or_else(|| format!("'{}' is not a boolean", text)),
                other => Err(format!("'{}' is not a boolean", other)),
            },
            DataType::Email => {
                let text = self.to_text();
                if EMAIL_REGEX.is_match(&text) {
                    Ok(FieldValue::Text(text))
                } else {
                    Err(format!("'{}' is not an email address", text))
                }
            }
            DataType::Url => {
                let text = self.to_text();
                match url::Url::parse(&text) {
                    Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                        Ok(FieldValue::Text(text))
                    }
                    _ => Err(format!("'{}' is not an http(s) URL", text)),
                }
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            FieldValue::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Serialize a row into the JSON document stored in the database
pub fn row_to_json(row: &RowDocument) -> serde_json::Value {
    serde_json::to_value(row).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
}

/// Read a stored JSON document back into a row
pub fn row_from_json(value: &serde_json::Value) -> Result<RowDocument, serde_json::Error> {
    serde_json::from_value(value.clone())
}
