//! Stashed local storage layer.
//!
//! SQLite is the extension's durable per-install storage — the place the
//! current session lives between browser restarts. Connection management
//! and schema migrations only; the actual record handling belongs to the
//! session store.
//!
//! # Usage
//!
//! ```no_run
//! use stashed::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("stashed.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
