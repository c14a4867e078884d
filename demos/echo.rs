//! Echo server for the stella contract.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example echo [-- path/to/stella.toml]
//!
//! Try:
//!   curl -H 'Authorization: Frederic' http://localhost:8080/say/hello%20world
//!   curl -H 'Authorization: frederic' http://localhost:8080/welcome
//!   curl http://localhost:8080/welcome-anonymous

use stella::contract::{SAY, WELCOME, WELCOME_ANONYMOUS};
use stella::{Config, Router, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), stella::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    stella::contract::validate()?;

    let app = Router::new()
        .bind(&SAY, say)
        .bind(&WELCOME, welcome)
        .bind(&WELCOME_ANONYMOUS, |_, _| async { "Are you a new member?" });

    Server::bind(config.server.bind).await?.serve(app).await
}

// GET /say/{command}
async fn say(user: String, args: Vec<String>) -> String {
    let reply = format!("{user} just said {}", args[0]);
    info!("{reply}");
    reply
}

// GET /welcome
async fn welcome(user: String, _args: Vec<String>) -> String {
    format!("Welcome {user}")
}
