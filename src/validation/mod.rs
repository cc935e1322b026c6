//! Row validation for staged submissions
//!
//! A row is first checked against the dataset's active schema (presence,
//! type coercion, uniqueness, unexpected fields) and then against the
//! dataset's active business rules. Failures are recorded as [`RowIssue`]s;
//! they never abort the pass.

pub mod rules;
pub mod schema_checks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::entities::common_types::{Severity, ValidationStatus};
use crate::records::RowDocument;

pub use rules::{CompiledRule, RuleCheck, RuleSet};
pub use schema_checks::{FieldSpec, SchemaCheck, SchemaChecker};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Required,
    InvalidType,
    Duplicate,
    UnexpectedField,
    RuleViolation,
}

/// One failed check on one row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub field: Option<String>,
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<i32>,
}

impl RowIssue {
    pub fn schema(field: &str, code: IssueCode, severity: Severity, message: String) -> Self {
        Self {
            field: Some(field.to_string()),
            code,
            severity,
            message,
            rule_id: None,
        }
    }

    pub fn rule(field: &str, rule: &CompiledRule) -> Self {
        Self {
            field: Some(field.to_string()),
            code: IssueCode::RuleViolation,
            severity: rule.severity,
            message: rule.error_message.clone(),
            rule_id: Some(rule.id),
        }
    }
}

/// Row status from its issues: any error makes it invalid, warnings alone
/// make it a warning
pub fn status_for(issues: &[RowIssue]) -> ValidationStatus {
    match issues.iter().map(|issue| issue.severity).max() {
        Some(Severity::Error) => ValidationStatus::Invalid,
        Some(Severity::Warning) => ValidationStatus::Warning,
        None => ValidationStatus::Valid,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowOutcome {
    pub status: ValidationStatus,
    pub issues: Vec<RowIssue>,
    pub normalized: RowDocument,
}

/// Validates the rows of one submission in order.
///
/// Stateful: rows that are not invalid register their unique values so later
/// rows of the same submission are checked against them.
#[derive(Debug)]
pub struct RowValidator {
    schema: Option<SchemaChecker>,
    rules: RuleSet,
}

impl RowValidator {
    pub fn new(schema: Option<SchemaChecker>, rules: RuleSet) -> Self {
        Self { schema, rules }
    }

    pub fn schema_id(&self) -> Option<i32> {
        self.schema.as_ref().map(|schema| schema.schema_id())
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn schema_mut(&mut self) -> Option<&mut SchemaChecker> {
        self.schema.as_mut()
    }

    pub fn validate(&mut self, row: &RowDocument) -> RowOutcome {
        let SchemaCheck {
            normalized,
            mut issues,
            mut failed_fields,
        } = match &self.schema {
            Some(schema) => schema.check(row),
            None => SchemaCheck {
                normalized: row.clone(),
                ..Default::default()
            },
        };

        issues.extend(self.rules.evaluate(&normalized, &mut failed_fields));
        let status = status_for(&issues);

        if status.is_eligible_for_apply() {
            if let Some(schema) = self.schema.as_mut() {
                schema.record(&normalized);
            }
        }

        RowOutcome {
            status,
            issues,
            normalized,
        }
    }
}

/// Aggregate stored in `data_submissions.validation_results`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub warning_rows: usize,
    pub invalid_rows: usize,
    pub schema_id: Option<i32>,
    pub rules_evaluated: usize,
    pub rules_skipped: usize,
    pub validated_at: DateTime<Utc>,
}

impl ValidationSummary {
    pub fn new(schema_id: Option<i32>, rules: &RuleSet) -> Self {
        Self {
            total_rows: 0,
            valid_rows: 0,
            warning_rows: 0,
            invalid_rows: 0,
            schema_id,
            rules_evaluated: rules.evaluated_count(),
            rules_skipped: rules.skipped_count(),
            validated_at: Utc::now(),
        }
    }

    pub fn tally(&mut self, status: ValidationStatus) {
        self.total_rows += 1;
        match status {
            ValidationStatus::Valid => self.valid_rows += 1,
            ValidationStatus::Warning => self.warning_rows += 1,
            ValidationStatus::Invalid => self.invalid_rows += 1,
        }
    }

    pub fn eligible_rows(&self) -> usize {
        self.valid_rows + self.warning_rows
    }
}
