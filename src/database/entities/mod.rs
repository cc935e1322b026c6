pub mod business_rules;
pub mod common_types;
pub mod data_submissions;
pub mod dataset_rows;
pub mod dataset_schemas;
pub mod datasets;
pub mod projects;
pub mod schema_fields;
pub mod staging_rows;
