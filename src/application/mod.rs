//! Application services: ingestion, cached queries and access checks.

pub mod auth;
pub mod error;
pub mod events;
pub mod repos;
