use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Processing state of an uploaded dataset
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatasetStatus {
    Processing,
    Ready,
    Error,
}

/// Declared type of a schema field
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataType {
    String,
    Number,
    Date,
    Boolean,
    Email,
    Url,
}

/// Outcome of validating a single staged row
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Warning,
}

impl ValidationStatus {
    /// Rows marked invalid are never merged into a dataset
    pub fn is_eligible_for_apply(&self) -> bool {
        !matches!(self, ValidationStatus::Invalid)
    }
}

/// Kind of check a business rule performs
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RuleType {
    FieldValidation,
    CrossField,
    RangeCheck,
    CustomSql,
}

/// How a failing check affects the row status
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Warning,
    #[default]
    Error,
}

/// Uploaded file formats understood by the importer
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Tsv,
    Json,
    Xlsx,
    Xls,
    Ods,
}

impl FileFormat {
    pub fn from_extension(filename: &str) -> Option<Self> {
        let extension = filename.rsplit_once('.')?.1.to_lowercase();
        match extension.as_str() {
            "csv" => Some(FileFormat::Csv),
            "tsv" | "tab" => Some(FileFormat::Tsv),
            "json" => Some(FileFormat::Json),
            "xlsx" | "xlsm" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            "ods" => Some(FileFormat::Ods),
            _ => None,
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileFormat::Xlsx | FileFormat::Xls | FileFormat::Ods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_strings_round_trip_through_strum() {
        assert_eq!(DatasetStatus::Processing.as_ref(), "processing");
        assert_eq!(DataType::from_str("email").unwrap(), DataType::Email);
        assert_eq!(RuleType::CrossField.to_string(), "cross_field");
        assert_eq!(RuleType::from_str("range_check").unwrap(), RuleType::RangeCheck);
        assert!(RuleType::from_str("lookup").is_err());
    }

    #[test]
    fn test_file_format_from_extension() {
        assert_eq!(FileFormat::from_extension("data.CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("q3.xlsx"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_extension("rows.tsv"), Some(FileFormat::Tsv));
        assert_eq!(FileFormat::from_extension("notes.txt"), None);
        assert_eq!(FileFormat::from_extension("no_extension"), None);
        assert!(FileFormat::Ods.is_spreadsheet());
    }

    #[test]
    fn test_invalid_rows_are_not_eligible() {
        assert!(ValidationStatus::Valid.is_eligible_for_apply());
        assert!(ValidationStatus::Warning.is_eligible_for_apply());
        assert!(!ValidationStatus::Invalid.is_eligible_for_apply());
    }

    #[test]
    fn test_error_outranks_warning() {
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(Severity::default(), Severity::Error);
    }
}
