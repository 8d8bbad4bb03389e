//! Error types for wiki-ssh

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for wiki-ssh
#[derive(Debug, Error)]
pub enum WikiSshError {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file does not exist
    #[error("{} file not found", .0.display())]
    ConfigNotFound(PathBuf),

    /// Configuration file is not valid YAML
    #[error("Error parsing {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// The `confluence` section is absent
    #[error("'{section}' section missing in {}", .path.display())]
    MissingSection { path: PathBuf, section: String },

    /// A required field of the `confluence` section is absent
    #[error("'{0}' missing in confluence configuration")]
    MissingField(String),

    /// Credentials were not supplied
    #[error("{0} environment variable not set")]
    MissingCredentials(String),

    /// The document store rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Page retrieval failed
    #[error("Error retrieving page content: {0}")]
    Fetch(String),

    /// Server name is not in any table of the page
    #[error("Server '{0}' not found")]
    NotFound(String),

    /// Resolved address is unsafe to hand to ssh
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The connection command or shell could not be started
    #[error("Launch failed: {0}")]
    Launch(String),

    /// Bounded retry loop gave up
    #[error("Connection failed after {0} attempts")]
    RetriesExhausted(u32),

    /// Interrupted by the user
    #[error("Connection loop cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using WikiSshError
pub type Result<T> = std::result::Result<T, WikiSshError>;

impl WikiSshError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        WikiSshError::Config(msg.into())
    }

    /// Create a parse error for the given config file
    pub fn config_parse(path: &Path, msg: impl Into<String>) -> Self {
        WikiSshError::ConfigParse {
            path: path.to_path_buf(),
            message: msg.into(),
        }
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        WikiSshError::Authentication(msg.into())
    }

    /// Create a fetch error from a string
    pub fn fetch(msg: impl Into<String>) -> Self {
        WikiSshError::Fetch(msg.into())
    }

    /// Create an invalid address error
    pub fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        WikiSshError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a launch error from a string
    pub fn launch(msg: impl Into<String>) -> Self {
        WikiSshError::Launch(msg.into())
    }
}
