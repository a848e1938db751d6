//! Application configuration management.
//!
//! Configuration comes from environment variables, deserialized with the
//! `envy` crate into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `SESSION_TTL_HOURS` (optional): session token lifetime, defaults to 168 (7 days)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Default session lifetime if SESSION_TTL_HOURS is not set.
fn default_session_ttl_hours() -> i64 {
    168
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Attempts to load a `.env` file first (optional), then deserializes
    /// the environment. Field names map to upper-case variable names:
    /// `database_url` -> `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot
    /// be parsed into the expected type.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }
}
