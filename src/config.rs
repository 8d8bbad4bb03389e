//! Configuration and CLI argument parsing for wiki-ssh

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use url::Url;

use crate::error::{Result, WikiSshError};
use crate::launch::RetryPolicy;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Default delay between connection attempts in seconds
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// HTTP request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Name of the configuration section holding the page settings
pub const CONFLUENCE_SECTION: &str = "confluence";

/// Environment variable holding the document store username
pub const USER_ENV: &str = "OKTA_USER";

/// Environment variable holding the document store password
pub const PASSWORD_ENV: &str = "OKTA_PASSWORD";

/// wiki-ssh CLI Arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "wiki-ssh")]
#[command(version)]
#[command(about = "Look up a server's address in a Confluence table and SSH into it, retrying until it answers")]
pub struct Args {
    /// Server name to look up in the hostname column
    pub server_name: String,

    /// Path to the YAML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "WIKI_SSH_CONFIG")]
    pub config: PathBuf,

    /// Confluence username
    #[arg(long, env = USER_ENV)]
    pub user: Option<String>,

    /// Confluence password or API token
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,

    /// Seconds to wait between connection attempts
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay: u64,

    /// Give up after this many attempts (0 retries forever)
    #[arg(long, default_value_t = 0)]
    pub max_attempts: u32,

    /// ssh executable to run
    #[arg(long, default_value = "ssh")]
    pub ssh: String,

    /// Extra argument passed to ssh before the address (repeatable)
    #[arg(long = "ssh-arg", allow_hyphen_values = true)]
    pub ssh_args: Vec<String>,

    /// Exit after the session instead of starting an interactive shell
    #[arg(long, default_value = "false")]
    pub no_shell: bool,

    /// Print the resolved address and exit without connecting
    #[arg(long, default_value = "false")]
    pub print_only: bool,
}

/// Exit code for an argument parsing failure
///
/// Usage errors exit with 1 like every other failure; `--help` and
/// `--version` exit with 0.
pub fn usage_exit_code(error: &clap::Error) -> u8 {
    if error.use_stderr() {
        1
    } else {
        0
    }
}

/// Page location and column titles read from the configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfluenceSettings {
    /// Base URL of the Confluence instance
    pub url: Url,

    /// Page identifier
    pub page_id: String,

    /// Header of the column holding server names
    pub hostname_column: String,

    /// Header of the column holding addresses
    pub address_column: String,
}

/// Credentials for the document store
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server name to resolve
    pub server_name: String,

    /// Page settings from the configuration file
    pub confluence: ConfluenceSettings,

    /// Document store credentials
    pub credentials: Credentials,

    /// Delay and attempt bound of the connection loop
    pub retry: RetryPolicy,

    /// ssh executable
    pub ssh_program: String,

    /// Extra ssh arguments
    pub ssh_args: Vec<String>,

    /// Whether to start an interactive shell after the session
    pub interactive_shell: bool,

    /// Whether to stop after printing the address
    pub print_only: bool,
}

impl Config {
    /// Create Config from CLI Args
    ///
    /// Reads the configuration file and checks credentials; nothing here
    /// touches the network.
    pub fn from_args(args: Args) -> Result<Self> {
        if args.server_name.trim().is_empty() {
            return Err(WikiSshError::config("Server name cannot be empty"));
        }

        let confluence = load_settings(&args.config)?;
        let credentials = credentials(args.user, args.password)?;

        let retry = RetryPolicy::new(Duration::from_secs(args.retry_delay))
            .with_max_attempts((args.max_attempts > 0).then_some(args.max_attempts));

        Ok(Config {
            server_name: args.server_name.trim().to_string(),
            confluence,
            credentials,
            retry,
            ssh_program: args.ssh,
            ssh_args: args.ssh_args,
            interactive_shell: !args.no_shell,
            print_only: args.print_only,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    confluence: Option<RawSection>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSection {
    url: Option<String>,
    page_id: Option<RawPageId>,
    hostname_column_title: Option<String>,
    ip_column_title: Option<String>,
}

/// Page IDs are usually written as bare numbers in YAML
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPageId {
    Number(u64),
    Text(String),
}

impl RawPageId {
    fn into_string(self) -> String {
        match self {
            RawPageId::Number(n) => n.to_string(),
            RawPageId::Text(s) => s,
        }
    }
}

/// Read and validate the configuration file at `path`
pub fn load_settings(path: &Path) -> Result<ConfluenceSettings> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => WikiSshError::ConfigNotFound(path.to_path_buf()),
        _ => WikiSshError::config(format!("Cannot read {}: {}", path.display(), e)),
    })?;

    parse_settings(&text, path)
}

/// Parse configuration file contents; `path` is only used in messages
///
/// # Example
/// ```
/// use std::path::Path;
/// use wiki_ssh::config::parse_settings;
///
/// let yaml = "confluence:\n  url: https://wiki.example.com\n  page_id: 42\n  \
///             hostname_column_title: Hostname\n  ip_column_title: IP Address\n";
/// let settings = parse_settings(yaml, Path::new("config.yaml")).unwrap();
/// assert_eq!(settings.page_id, "42");
/// assert_eq!(settings.address_column, "IP Address");
/// ```
pub fn parse_settings(text: &str, path: &Path) -> Result<ConfluenceSettings> {
    let raw: RawFile = if text.trim().is_empty() {
        RawFile::default()
    } else {
        serde_yaml::from_str(text).map_err(|e| WikiSshError::config_parse(path, e.to_string()))?
    };

    let section = raw.confluence.ok_or_else(|| WikiSshError::MissingSection {
        path: path.to_path_buf(),
        section: CONFLUENCE_SECTION.to_string(),
    })?;

    let url = required("url", section.url)?;
    let page_id = required("page_id", section.page_id.map(RawPageId::into_string))?;
    let hostname_column = required("hostname_column_title", section.hostname_column_title)?;
    let address_column = required("ip_column_title", section.ip_column_title)?;

    Ok(ConfluenceSettings {
        url: parse_base_url(&url)?,
        page_id,
        hostname_column,
        address_column,
    })
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    let value = value.ok_or_else(|| WikiSshError::MissingField(field.to_string()))?;
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(WikiSshError::config(format!("'{}' cannot be empty", field)));
    }

    Ok(trimmed.to_string())
}

fn parse_base_url(value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| WikiSshError::config(format!("Invalid url '{}': {}", value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WikiSshError::config(format!(
            "Unsupported url scheme '{}' (expected http or https)",
            other
        ))),
    }
}

/// Build credentials, reporting which one is missing
fn credentials(user: Option<String>, password: Option<String>) -> Result<Credentials> {
    let user = sanitize_secret(user).ok_or_else(|| WikiSshError::MissingCredentials(USER_ENV.to_string()))?;
    let password = sanitize_secret(password)
        .ok_or_else(|| WikiSshError::MissingCredentials(PASSWORD_ENV.to_string()))?;

    Ok(Credentials::new(user, password))
}

/// Sanitize a credential: return None if empty
fn sanitize_secret(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
