pub mod datasets;
pub mod health;
pub mod projects;
pub mod rules;
pub mod schemas;
pub mod submissions;
