//! Command-line caller for the stella contract.
//!
//! Run with:
//!   cargo run --example say -- say Frederic "hello world"
//!   cargo run --example say -- welcome frederic
//!   cargo run --example say -- welcome-anonymous
//!   cargo run --example say -- contract

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stella::{Client, Config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Call a stella server")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `client.base_url` from the configuration.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GET /say/{command}
    Say { identity: String, command: String },
    /// GET /welcome
    Welcome { identity: String },
    /// GET /welcome-anonymous
    WelcomeAnonymous,
    /// Print the contract table as TOML.
    Contract,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, stella::Error> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = cli.base_url {
        config.client.base_url = base_url;
    }

    let client = || Client::new(&config.client);
    match cli.command {
        Command::Say { identity, command } => client()?.say(&identity, &command).await,
        Command::Welcome { identity } => client()?.welcome(&identity).await,
        Command::WelcomeAnonymous => client()?.welcome_anonymous().await,
        Command::Contract => Ok(stella::contract::table()
            .to_toml()
            .unwrap_or_else(|e| format!("# contract could not be rendered: {e}"))),
    }
}
