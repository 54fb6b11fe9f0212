//! Event ingestion service with an in-process recent-activity log and query cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
