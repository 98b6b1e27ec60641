//! # preconnect
//!
//! Speculative DNS pre-resolution and TCP/TLS pre-connection, modeled on
//! Chromium's `PreconnectManager`.
//!
//! Given the origins a page is predicted to need, the scheduler resolves
//! them ahead of time and, where asked, opens sockets so the eventual
//! navigation skips those round trips.
//!
//! ## Features
//!
//! - **Bounded concurrency**: at most 3 resolves in flight (configurable),
//!   shared by every batch and hint
//! - **Batches**: one `start` per host, aggregated statistics, lazy
//!   cancellation
//! - **Priority hints**: standalone preresolve/preconnect requests jump the
//!   queue
//! - **Network context**: hickory-dns or getaddrinfo, TTL host cache, and a
//!   warm-socket pool over BoringSSL
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use preconnect::network::NetworkContext;
//! use preconnect::predictors::{
//!     completion_channel, PreconnectConfig, PreconnectManager, PreconnectRequest,
//!     PreconnectService,
//! };
//! use std::sync::Arc;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (completions_tx, completions_rx) = completion_channel();
//!     let mut manager = PreconnectManager::new(PreconnectConfig::default(), completions_tx);
//!     manager.set_network_gateway(Arc::new(NetworkContext::new()));
//!
//!     let handle = PreconnectService::spawn(manager, completions_rx);
//!     handle
//!         .start(
//!             Url::parse("https://example.com/").unwrap(),
//!             vec![PreconnectRequest::new(
//!                 Url::parse("https://cdn.example.com").unwrap(),
//!                 2,
//!                 true,
//!             )],
//!         )
//!         .unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error codes, load flags and origin helpers
//! - [`dns`] - Resolvers and the host cache
//! - [`network`] - The concrete network gateway
//! - [`predictors`] - The preconnect scheduler
//! - [`socket`] - Connect jobs and the warm-socket pool

pub mod base;
pub mod dns;
pub mod network;
pub mod predictors;
pub mod socket;
