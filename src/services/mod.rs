pub mod business_rule_service;
pub mod dataset_service;
pub mod input;
pub mod project_service;
pub mod review_service;
pub mod schema_service;
pub mod submission_service;

pub use business_rule_service::{BusinessRuleService, BusinessRuleUpdate, NewBusinessRule};
pub use dataset_service::{DatasetRowView, DatasetService, RowPage, RowQuery};
pub use project_service::ProjectService;
pub use review_service::{ApplyReport, ReviewOutcome, ReviewService, ValidationReport};
pub use schema_service::{NewSchemaField, SchemaService, SchemaWithFields};
pub use submission_service::SubmissionService;
