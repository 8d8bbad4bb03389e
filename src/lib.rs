//! wiki-ssh - SSH into a server whose address lives in a Confluence table
//!
//! This crate looks a server name up in the tables of a Confluence page,
//! then runs `ssh` against the resolved address until a connection succeeds
//! and finally drops the user into an interactive shell.
//!
//! # Features
//!
//! - YAML configuration naming the page and the hostname/address columns
//! - Confluence REST retrieval with basic authentication
//! - Direct HTML table parsing; first matching row in document order wins
//! - Fixed-delay connection retries with Ctrl-C cancellation
//! - Addresses are validated and passed to `ssh` as a plain argument
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! export OKTA_USER=alice OKTA_PASSWORD=secret
//! wiki-ssh web01
//! wiki-ssh --print-only web01
//! ```
//!
//! # Configuration
//!
//! ```yaml
//! confluence:
//!   url: https://wiki.example.com
//!   page_id: 123456
//!   hostname_column_title: Hostname
//!   ip_column_title: IP Address
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod launch;
pub mod lookup;
pub mod resolver;

// Re-exports for convenience
pub use config::{Args, Config, ConfluenceSettings, Credentials};
pub use error::{Result, WikiSshError};
pub use fetch::{ConfluenceClient, DocumentSource};
pub use launch::{validate_address, RetryPolicy, SessionLauncher};
pub use lookup::lookup_address;
pub use resolver::{resolve, tables, Row, Table};
