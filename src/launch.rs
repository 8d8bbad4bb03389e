//! Retrying SSH session launcher
//!
//! Runs the external `ssh` executable against a resolved address until it
//! exits successfully, then hands the terminal over to an interactive shell.
//! The address comes from a wiki page and is treated as untrusted: it is
//! validated and passed as a single argv entry, never spliced into a shell
//! string.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_RETRY_DELAY_SECS;
use crate::error::{Result, WikiSshError};

/// Shell used when `$SHELL` is unset
pub const FALLBACK_SHELL: &str = "/bin/bash";

/// Fixed-delay retry policy for the connection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between failed attempts
    pub delay: Duration,

    /// Maximum number of attempts (None = retry until interrupted)
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Unbounded policy with the given delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Bound the number of attempts
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_RETRY_DELAY_SECS))
    }
}

/// Validate an address before it is handed to ssh
///
/// Accepts ASCII alphanumerics and `. : - _ [ ] % @`, which covers IPv4,
/// IPv6 (with brackets and zone IDs), hostnames and `user@host`. A leading
/// `-` is rejected so the value can never be read as an ssh option.
///
/// # Example
/// ```
/// use wiki_ssh::launch::validate_address;
///
/// assert_eq!(validate_address(" 10.0.0.5 ").unwrap(), "10.0.0.5");
/// assert!(validate_address("-oProxyCommand=sh").is_err());
/// assert!(validate_address("10.0.0.5; rm -rf ~").is_err());
/// ```
pub fn validate_address(address: &str) -> Result<&str> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err(WikiSshError::invalid_address(address, "address is empty"));
    }

    if trimmed.starts_with('-') {
        return Err(WikiSshError::invalid_address(
            address,
            "address cannot start with '-'",
        ));
    }

    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || ".:-_[]%@".contains(*c)))
    {
        return Err(WikiSshError::invalid_address(
            address,
            format!("unexpected character {:?}", bad),
        ));
    }

    Ok(trimmed)
}

/// `$SHELL`, or [`FALLBACK_SHELL`] when it is unset or empty
pub fn default_shell() -> PathBuf {
    std::env::var_os("SHELL")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_SHELL))
}

/// Launches the connection loop and the follow-up shell
#[derive(Debug, Clone)]
pub struct SessionLauncher {
    /// Connection program, normally `ssh`
    program: String,

    /// Arguments placed before the address
    args: Vec<String>,

    /// Retry policy
    policy: RetryPolicy,

    /// Interactive shell to start after the session (None = exit instead)
    shell: Option<PathBuf>,
}

impl SessionLauncher {
    /// Create a launcher for `program` with default policy and `$SHELL`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            policy: RetryPolicy::default(),
            shell: Some(default_shell()),
        }
    }

    /// Set extra arguments for the connection program
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the follow-up shell, or disable it with `None`
    pub fn with_shell(mut self, shell: Option<PathBuf>) -> Self {
        self.shell = shell;
        self
    }

    /// Build one connection attempt: `program [args...] -- address`
    pub fn ssh_command(&self, address: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg("--").arg(address);
        command
    }

    /// Run the connection program until it exits with status 0
    ///
    /// Returns the number of attempts made. Ctrl-C while an attempt is
    /// running or while waiting for the next one cancels the loop.
    pub async fn connect_until_success(&self, address: &str) -> Result<u32> {
        let address = validate_address(address)?;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "Running {} {}", self.program, address);

            let mut child = self.ssh_command(address).spawn().map_err(|e| {
                WikiSshError::launch(format!("Failed to start {}: {}", self.program, e))
            })?;

            let status = tokio::select! {
                status = child.wait() => Some(status?),
                _ = tokio::signal::ctrl_c() => None,
            };

            let Some(status) = status else {
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill {}: {}", self.program, e);
                }
                return Err(WikiSshError::Cancelled);
            };

            if status.success() {
                println!("Connection established.");
                info!(attempt, "Session to {} ended successfully", address);
                return Ok(attempt);
            }

            warn!(attempt, "{} exited with {}", self.program, status);

            if self.policy.exhausted(attempt) {
                return Err(WikiSshError::RetriesExhausted(attempt));
            }

            println!(
                "Connection failed, retrying in {} seconds...",
                self.policy.delay.as_secs()
            );

            tokio::select! {
                _ = tokio::time::sleep(self.policy.delay) => {}
                _ = tokio::signal::ctrl_c() => return Err(WikiSshError::Cancelled),
            }
        }
    }

    /// Connect, then hand over to the interactive shell if one is configured
    pub async fn run(&self, address: &str) -> Result<()> {
        self.connect_until_success(address).await?;

        match &self.shell {
            Some(shell) => hand_over_to_shell(shell),
            None => Ok(()),
        }
    }
}

/// Replace this process with an interactive shell
#[cfg(unix)]
fn hand_over_to_shell(shell: &std::path::Path) -> Result<()> {
    use std::os::unix::process::CommandExt;

    info!("Starting interactive shell {}", shell.display());
    let err = std::process::Command::new(shell).arg("-i").exec();

    // exec() only returns on error
    Err(WikiSshError::launch(format!(
        "Failed to exec {}: {}",
        shell.display(),
        err
    )))
}

/// Run an interactive shell and wait for it to exit
#[cfg(not(unix))]
fn hand_over_to_shell(shell: &std::path::Path) -> Result<()> {
    info!("Starting interactive shell {}", shell.display());
    let status = std::process::Command::new(shell).status()?;
    debug!("Shell exited with {}", status);
    Ok(())
}
