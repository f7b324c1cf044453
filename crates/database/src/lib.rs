//! Audioshelf Database Layer
//!
//! SQLite persistence for the audiobook catalog, built on sqlx. Slug columns
//! are unique at the schema level; association rows and audio file records
//! follow their owners through `ON DELETE CASCADE`.

pub mod connection;
pub mod migrations;
pub mod queries;

pub use connection::{connect, create_test_db, open_catalog, DatabaseConfig, DbPool};
pub use migrations::{applied_version, current_version, run_migrations, verify_integrity};
