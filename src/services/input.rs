use crate::errors::{WorkflowError, WorkflowResult};

const MAX_NAME_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Trim and check a display name (project, dataset, schema, rule)
pub fn validate_name(kind: &str, name: &str) -> WorkflowResult<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(WorkflowError::ValidationFailed(format!(
            "{} name cannot be empty",
            kind
        )));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(WorkflowError::ValidationFailed(format!(
            "{} name is too long (max {} characters)",
            kind, MAX_NAME_LENGTH
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(WorkflowError::ValidationFailed(format!(
            "{} name contains control characters",
            kind
        )));
    }

    Ok(trimmed.to_string())
}

/// Trim an optional description; blank descriptions become `None`
pub fn validate_description(description: Option<&str>) -> WorkflowResult<Option<String>> {
    let Some(description) = description.map(str::trim) else {
        return Ok(None);
    };

    if description.is_empty() {
        return Ok(None);
    }

    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(WorkflowError::ValidationFailed(format!(
            "Description is too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }

    Ok(Some(description.to_string()))
}

/// Field and column names: non-empty, no surrounding whitespace kept
pub fn validate_field_name(name: &str) -> WorkflowResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::ValidationFailed(
            "Field name cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(WorkflowError::ValidationFailed(format!(
            "Field name '{}' is too long",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}
