//! wiki-ssh - Entry point
//!
//! Parses CLI arguments, loads the configuration, resolves the server
//! address from the Confluence page and starts the retrying SSH session.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wiki_ssh::config::{usage_exit_code, Args, Config};
use wiki_ssh::error::Result;
use wiki_ssh::fetch::ConfluenceClient;
use wiki_ssh::launch::{default_shell, SessionLauncher};
use wiki_ssh::lookup::lookup_address;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the resolved address
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Usage errors exit with 1 like every other failure
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("{:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_args(args)?;

    info!("wiki-ssh v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Confluence URL: {}", config.confluence.url);
    info!("Page ID: {}", config.confluence.page_id);
    info!("Hostname Column: {}", config.confluence.hostname_column);
    info!("IP Column: {}", config.confluence.address_column);

    let client = ConfluenceClient::new(config.confluence.url.clone(), config.credentials.clone())?;
    let address = lookup_address(&client, &config.confluence, &config.server_name).await?;

    println!("IP Address for {}: {}", config.server_name, address);

    if config.print_only {
        return Ok(());
    }

    let launcher = SessionLauncher::new(config.ssh_program.as_str())
        .with_args(config.ssh_args.clone())
        .with_policy(config.retry)
        .with_shell(config.interactive_shell.then(default_shell));

    launcher.run(&address).await
}
