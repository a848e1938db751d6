//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// Public-ingestion API key model
pub mod api_key;
/// Contact entity and ingestion request/response types
pub mod contact;
/// User and session models
pub mod user;
