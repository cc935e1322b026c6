pub mod auth;
pub mod common;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod records;
pub mod storage;
pub mod validation;
pub mod workflow;

pub mod database;
pub mod services;

#[cfg(feature = "server")]
pub mod server;
