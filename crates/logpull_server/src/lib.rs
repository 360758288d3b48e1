//! # logpull server
//!
//! Mutual-TLS HTTP front end for a [`logpull_core::FeedStore`].
//!
//! This crate provides:
//! - [`FeedService`] - the append, read and download operations, with
//!   parameter validation and error mapping
//! - [`routes::router`] - the `axum` routes over the service
//! - [`FeedServer`] - store, certificates and listener wired together
//! - [`ConfigFile`] - the operator-facing config file
//!
//! # Authentication
//!
//! Every connection must present a client certificate that chains to the
//! configured CA bundle; anything else is refused during the handshake and
//! never reaches a route. Any authenticated client may act on any feed.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
pub mod routes;
mod server;
pub mod tls;

pub use config::{ConfigFile, ConfigFileServer, ServerConfig, TlsConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{AppendRequest, Download, FeedFile, FeedService, ReadResponse};
pub use server::FeedServer;
