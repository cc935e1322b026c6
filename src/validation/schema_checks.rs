use std::collections::{HashMap, HashSet};

use crate::database::entities::common_types::{DataType, Severity};
use crate::database::entities::schema_fields;
use crate::records::{FieldValue, RowDocument};

use super::{IssueCode, RowIssue};

/// Declared column, resolved from a stored schema field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub data_type: DataType,
    pub is_required: bool,
    pub is_unique: bool,
}

impl From<&schema_fields::Model> for FieldSpec {
    fn from(field: &schema_fields::Model) -> Self {
        Self {
            name: field.name.clone(),
            data_type: field.get_data_type().unwrap_or(DataType::String),
            is_required: field.is_required,
            is_unique: field.is_unique,
        }
    }
}

/// Result of checking one row against the schema
#[derive(Clone, Debug, Default)]
pub struct SchemaCheck {
    pub normalized: RowDocument,
    pub issues: Vec<RowIssue>,
    /// Fields with an error-severity schema issue; rules skip these
    pub failed_fields: HashSet<String>,
}

/// Required, type and uniqueness checks for the fields of one schema.
///
/// Unique values are tracked across calls: seed with the dataset's existing
/// rows, then [`SchemaChecker::record`] each accepted row so later rows of
/// the same submission see it.
#[derive(Debug)]
pub struct SchemaChecker {
    schema_id: i32,
    fields: Vec<FieldSpec>,
    seen: HashMap<String, HashSet<String>>,
}

impl SchemaChecker {
    pub fn new(schema_id: i32, fields: &[schema_fields::Model]) -> Self {
        let mut ordered: Vec<&schema_fields::Model> = fields.iter().collect();
        ordered.sort_by_key(|field| field.position);
        Self::from_specs(schema_id, ordered.into_iter().map(FieldSpec::from).collect())
    }

    pub fn from_specs(schema_id: i32, fields: Vec<FieldSpec>) -> Self {
        let seen = fields
            .iter()
            .filter(|field| field.is_unique)
            .map(|field| (field.name.clone(), HashSet::new()))
            .collect();
        Self {
            schema_id,
            fields,
            seen,
        }
    }

    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    pub fn has_unique_fields(&self) -> bool {
        !self.seen.is_empty()
    }

    /// Register the unique values of a row that already lives in the dataset
    pub fn seed_existing(&mut self, row: &RowDocument) {
        for field in self.fields.iter().filter(|field| field.is_unique) {
            if let Some(key) = unique_key(field, row) {
                if let Some(values) = self.seen.get_mut(&field.name) {
                    values.insert(key);
                }
            }
        }
    }

    /// Register an accepted staged row
    pub fn record(&mut self, normalized: &RowDocument) {
        self.seed_existing(normalized);
    }

    /// First unique field whose value is already taken, as `(field, value)`.
    /// Values of a row without a clash are recorded.
    pub fn claim_unique(&mut self, row: &RowDocument) -> Option<(String, String)> {
        let keys: Vec<(String, String)> = self
            .fields
            .iter()
            .filter(|field| field.is_unique)
            .filter_map(|field| unique_key(field, row).map(|key| (field.name.clone(), key)))
            .collect();

        let clash = keys.iter().find(|(name, key)| {
            self.seen
                .get(name)
                .map_or(false, |values| values.contains(key))
        });
        if let Some(clash) = clash {
            return Some(clash.clone());
        }

        for (name, key) in keys {
            if let Some(values) = self.seen.get_mut(&name) {
                values.insert(key);
            }
        }
        None
    }

    pub fn check(&self, row: &RowDocument) -> SchemaCheck {
        let mut normalized = row.clone();
        let mut issues = Vec::new();
        let mut failed_fields = HashSet::new();

        for field in &self.fields {
            let value = row.get(&field.name).cloned().unwrap_or(FieldValue::Null);

            if value.is_missing() {
                if field.is_required {
                    issues.push(RowIssue::schema(
                        &field.name,
                        IssueCode::Required,
                        Severity::Error,
                        format!("Field '{}' is required", field.name),
                    ));
                    failed_fields.insert(field.name.clone());
                }
                continue;
            }

            let coerced = match value.coerce(field.data_type) {
                Ok(coerced) => coerced,
                Err(reason) => {
                    issues.push(RowIssue::schema(
                        &field.name,
                        IssueCode::InvalidType,
                        Severity::Error,
                        format!(
                            "Field '{}' expects {}: {}",
                            field.name, field.data_type, reason
                        ),
                    ));
                    failed_fields.insert(field.name.clone());
                    continue;
                }
            };

            if field.is_unique {
                let key = coerced.to_text();
                let taken = self
                    .seen
                    .get(&field.name)
                    .map(|values| values.contains(&key))
                    .unwrap_or(false);
                if taken {
                    issues.push(RowIssue::schema(
                        &field.name,
                        IssueCode::Duplicate,
                        Severity::Error,
                        format!("Value '{}' for field '{}' is not unique", key, field.name),
                    ));
                    failed_fields.insert(field.name.clone());
                }
            }

            normalized.insert(field.name.clone(), coerced);
        }

        for name in row.keys() {
            if !self.fields.iter().any(|field| &field.name == name) {
                issues.push(RowIssue::schema(
                    name,
                    IssueCode::UnexpectedField,
                    Severity::Warning,
                    format!("Field '{}' is not part of the schema", name),
                ));
            }
        }

        SchemaCheck {
            normalized,
            issues,
            failed_fields,
        }
    }
}

fn unique_key(field: &FieldSpec, row: &RowDocument) -> Option<String> {
    let value = row.get(&field.name)?;
    if value.is_missing() {
        return None;
    }
    let key = value
        .coerce(field.data_type)
        .map(|coerced| coerced.to_text())
        .unwrap_or_else(|_| value.to_text());
    Some(key)
}
