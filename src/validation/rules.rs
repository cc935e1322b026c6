//! Business rule compilation and evaluation
//!
//! Stored rules carry a free-form JSON `rule_config`. It is parsed once per
//! validation pass into a typed [`RuleCheck`]; malformed or unsupported
//! rules are skipped rather than failing the pass.

use std::cmp::Ordering;
use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::database::entities::business_rules;
use crate::database::entities::common_types::{RuleType, Severity};
use crate::records::{FieldValue, RowDocument};

use super::RowIssue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldValidationConfig {
    pub field: String,
    #[serde(default)]
    pub not_empty: bool,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOperator {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Eq => ordering == Ordering::Equal,
            ComparisonOperator::Ne => ordering != Ordering::Equal,
            ComparisonOperator::Lt => ordering == Ordering::Less,
            ComparisonOperator::Lte => ordering != Ordering::Greater,
            ComparisonOperator::Gt => ordering == Ordering::Greater,
            ComparisonOperator::Gte => ordering != Ordering::Less,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossFieldConfig {
    pub field: String,
    pub operator: ComparisonOperator,
    pub other_field: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeCheckConfig {
    pub field: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Typed form of a rule's configuration
#[derive(Clone, Debug)]
pub enum RuleCheck {
    FieldValidation {
        config: FieldValidationConfig,
        pattern: Option<Regex>,
    },
    CrossField(CrossFieldConfig),
    RangeCheck(RangeCheckConfig),
    /// Kept for the record; never evaluated in-process
    CustomSql,
}

impl RuleCheck {
    /// Parse and sanity-check `config` for `rule_type`
    pub fn parse(rule_type: RuleType, config: &Value) -> Result<Self, String> {
        match rule_type {
            RuleType::FieldValidation => {
                let config: FieldValidationConfig = from_config(config)?;
                require_field(&config.field)?;
                let has_check = config.not_empty
                    || config.pattern.is_some()
                    || config.allowed_values.is_some()
                    || config.min_length.is_some()
                    || config.max_length.is_some();
                if !has_check {
                    return Err(format!(
                        "field_validation rule on '{}' defines no checks",
                        config.field
                    ));
                }
                if let (Some(min), Some(max)) = (config.min_length, config.max_length) {
                    if min > max {
                        return Err(format!("min_length {} exceeds max_length {}", min, max));
                    }
                }
                let pattern = config
                    .pattern
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| format!("Invalid pattern: {}", e))?;
                Ok(RuleCheck::FieldValidation { config, pattern })
            }
            RuleType::CrossField => {
                let config: CrossFieldConfig = from_config(config)?;
                require_field(&config.field)?;
                require_field(&config.other_field)?;
                if config.field == config.other_field {
                    return Err("cross_field rule compares a field with itself".to_string());
                }
                Ok(RuleCheck::CrossField(config))
            }
            RuleType::RangeCheck => {
                let config: RangeCheckConfig = from_config(config)?;
                require_field(&config.field)?;
                match (config.min, config.max) {
                    (None, None) => {
                        return Err(format!(
                            "range_check rule on '{}' needs min or max",
                            config.field
                        ))
                    }
                    (Some(min), Some(max)) if min > max => {
                        return Err(format!("min {} exceeds max {}", min, max))
                    }
                    _ => {}
                }
                Ok(RuleCheck::RangeCheck(config))
            }
            RuleType::CustomSql => {
                if !config.is_object() {
                    return Err("custom_sql rule_config must be an object".to_string());
                }
                Ok(RuleCheck::CustomSql)
            }
        }
    }

    /// Field whose failures this rule reports; `None` for custom SQL
    pub fn target_field(&self) -> Option<&str> {
        match self {
            RuleCheck::FieldValidation { config, .. } => Some(&config.field),
            RuleCheck::CrossField(config) => Some(&config.field),
            RuleCheck::RangeCheck(config) => Some(&config.field),
            RuleCheck::CustomSql => None,
        }
    }

    /// Whether `row` passes this check
    pub fn passes(&self, row: &RowDocument) -> bool {
        match self {
            RuleCheck::FieldValidation { config, pattern } => {
                check_field(config, pattern.as_ref(), row.get(&config.field))
            }
            RuleCheck::CrossField(config) => {
                match (row.get(&config.field), row.get(&config.other_field)) {
                    (Some(left), Some(right)) if !left.is_missing() && !right.is_missing() => {
                        config.operator.holds(compare_values(left, right))
                    }
                    // Presence is the schema's concern
                    _ => true,
                }
            }
            RuleCheck::RangeCheck(config) => match row.get(&config.field) {
                Some(value) if !value.is_missing() => match value.as_number() {
                    Some(number) => {
                        config.min.map_or(true, |min| number >= min)
                            && config.max.map_or(true, |max| number <= max)
                    }
                    None => false,
                },
                _ => true,
            },
            RuleCheck::CustomSql => true,
        }
    }
}

fn from_config<T: for<'de> Deserialize<'de>>(config: &Value) -> Result<T, String> {
    serde_json::from_value(config.clone()).map_err(|e| format!("Invalid rule_config: {}", e))
}

fn require_field(field: &str) -> Result<(), String> {
    if field.trim().is_empty() {
        Err("Rule field name cannot be empty".to_string())
    } else {
        Ok(())
    }
}

fn check_field(
    config: &FieldValidationConfig,
    pattern: Option<&Regex>,
    value: Option<&FieldValue>,
) -> bool {
    let value = match value {
        Some(value) if !value.is_missing() => value,
        _ => return !config.not_empty,
    };

    let text = value.to_text();
    let length = text.chars().count();

    if let Some(pattern) = pattern {
        if !pattern.is_match(&text) {
            return false;
        }
    }
    if let Some(allowed) = &config.allowed_values {
        if !allowed.iter().any(|candidate| candidate == &text) {
            return false;
        }
    }
    if config.min_length.map_or(false, |min| length < min) {
        return false;
    }
    if config.max_length.map_or(false, |max| length > max) {
        return false;
    }
    true
}

/// Numbers first, then dates, then plain text
fn compare_values(left: &FieldValue, right: &FieldValue) -> Ordering {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    if let (Some(a), Some(b)) = (left.as_date(), right.as_date()) {
        return a.cmp(&b);
    }
    left.to_text().cmp(&right.to_text())
}

/// A stored rule ready for evaluation
#[derive(Clone, Debug)]
pub struct CompiledRule {
    pub id: i32,
    pub name: String,
    pub priority: i32,
    pub severity: Severity,
    pub error_message: String,
    pub check: RuleCheck,
}

impl CompiledRule {
    pub fn from_model(model: &business_rules::Model) -> Result<Self, String> {
        let rule_type = model
            .get_rule_type()
            .ok_or_else(|| format!("Unknown rule type '{}'", model.rule_type))?;
        let check = RuleCheck::parse(rule_type, &model.rule_config)?;
        Ok(Self {
            id: model.id,
            name: model.rule_name.clone(),
            priority: model.priority,
            severity: model.get_severity(),
            error_message: model.error_message.clone(),
            check,
        })
    }

    pub fn is_evaluable(&self) -> bool {
        !matches!(self.check, RuleCheck::CustomSql)
    }
}

/// Active rules of a dataset in evaluation order
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    skipped: usize,
}

impl RuleSet {
    /// Compile the active rules, ordered by priority then id.
    ///
    /// Custom SQL rules and rules with unusable configuration are counted as
    /// skipped.
    pub fn compile(models: &[business_rules::Model]) -> Self {
        let mut rules = Vec::new();
        let mut skipped = 0;

        for model in models.iter().filter(|model| model.is_active) {
            match CompiledRule::from_model(model) {
                Ok(rule) if rule.is_evaluable() => rules.push(rule),
                Ok(rule) => {
                    warn!("Skipping rule {} ({}): custom SQL is not evaluated", rule.id, rule.name);
                    skipped += 1;
                }
                Err(reason) => {
                    warn!("Skipping rule {} ({}): {}", model.id, model.rule_name, reason);
                    skipped += 1;
                }
            }
        }

        rules.sort_by_key(|rule| (rule.priority, rule.id));
        Self { rules, skipped }
    }

    pub fn evaluated_count(&self) -> usize {
        self.rules.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Evaluate against a normalized row.
    ///
    /// Fields in `failed_fields` are not evaluated; the first failing rule
    /// for a field adds it to `failed_fields`, which suppresses later rules
    /// targeting that field.
    pub fn evaluate(&self, row: &RowDocument, failed_fields: &mut HashSet<String>) -> Vec<RowIssue> {
        let mut issues = Vec::new();

        for rule in &self.rules {
            let Some(field) = rule.check.target_field() else {
                continue;
            };
            if failed_fields.contains(field) {
                continue;
            }
            if !rule.check.passes(row) {
                issues.push(RowIssue::rule(field, rule));
                failed_fields.insert(field.to_string());
            }
        }

        issues
    }
}
