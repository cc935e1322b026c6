//! Caller identity
//!
//! Authentication happens upstream; requests arrive with a trusted user id
//! and role. Services only need to know who is acting and whether they may
//! review submissions.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::errors::{WorkflowError, WorkflowResult};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i32,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: i32) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn member(user_id: i32) -> Self {
        Self::new(user_id, Role::Member)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Forbidden` unless the caller is an admin
    pub fn require_admin(&self, action: &str) -> WorkflowResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(format!(
                "user {} must be an admin to {}",
                self.user_id, action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_require_admin() {
        assert!(Identity::admin(1).require_admin("review submissions").is_ok());

        let err = Identity::member(2)
            .require_admin("review submissions")
            .unwrap_err();
        assert_eq!(err.error_code(), "FORBIDDEN");
        assert_eq!(
            err.to_string(),
            "Forbidden: user 2 must be an admin to review submissions"
        );
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("member").unwrap(), Role::Member);
        assert!(Role::from_str("owner").is_err());
    }
}
