//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and complex operations.

pub mod api_keys;
pub mod dedup;
pub mod ingestion;
pub mod stats;
