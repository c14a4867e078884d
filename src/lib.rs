//! # stella
//!
//! A typed remote-command contract shared verbatim by an HTTP client and an
//! HTTP server. No schema registry, no code generation.
//!
//! ## The contract
//!
//! Each operation is a `static` [`EndpointDescriptor`]: method, URL
//! template, path parameter names and the identity header. Both sides are
//! built from the same descriptors, so a path, parameter or header cannot
//! differ between them without a rebuild. A mismatch in the descriptors
//! themselves is caught by a self-check at startup.
//!
//! | Operation | Request | Reply |
//! |---|---|---|
//! | `say` | `GET /say/{command}` + `Authorization: <identity>` | `<identity> just said <command>` |
//! | `welcome` | `GET /welcome` + `Authorization: <identity>` | `Welcome <identity>` |
//! | `welcome-anonymous` | `GET /welcome-anonymous` | `Are you a new member?` |
//!
//! Bodies are `text/plain`, UTF-8, unframed. Path values are
//! percent-escaped by the client and unescaped before they reach a handler.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use stella::contract::{SAY, WELCOME, WELCOME_ANONYMOUS};
//! use stella::{Client, ClientConfig, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stella::Error> {
//!     let app = Router::new()
//!         .bind(&SAY, |user, args: Vec<String>| async move {
//!             format!("{user} just said {}", args[0])
//!         })
//!         .bind(&WELCOME, |user, _| async move { format!("Welcome {user}") })
//!         .bind(&WELCOME_ANONYMOUS, |_, _| async { "Are you a new member?" });
//!
//!     let server = Server::bind("127.0.0.1:8080".parse().unwrap()).await?;
//!     tokio::spawn(server.serve(app));
//!
//!     let client = Client::new(&ClientConfig::new("http://127.0.0.1:8080"))?;
//!     println!("{}", client.say("Frederic", "hello").await?);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod codec;
pub mod contract;

pub use client::{Client, PendingCall, RemoteCall};
pub use codec::{Codec, CodecRegistry, EncodedBody, MediaType, TextCodec};
pub use config::{ClientConfig, Config, ServerConfig};
pub use contract::EndpointDescriptor;
pub use error::{
    ArgumentError, BoxError, CodecError, ConfigError, ContractError, Error, MissingHeaderError,
    TransportError,
};
pub use handler::{Handler, IntoReply};
pub use method::Method;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
