//! # dohnet
//!
//! DNS-over-HTTPS resolution and race-to-first-success fetching.
//!
//! `dohnet` resolves hostnames by querying the JSON APIs of public DoH
//! providers instead of the operating system's resolver, and uses that
//! resolution to drive outbound connections. Everything races: a lookup
//! fans out to every configured endpoint and keeps the first valid
//! answer; a fetch runs the same request over many fresh connections and
//! keeps the first successful body. DoH stays an enhancement throughout:
//! when resolution fails, connections fall back to ordinary system
//! resolution rather than failing.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dohnet::Client;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new();
//!
//!     let addrs = client.lookup("example.com").await.unwrap();
//!     println!("resolved: {:?}", addrs);
//!
//!     let body = client.get("https://example.com/").send().await.unwrap();
//!     println!("fetched {} bytes", body.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core error type
//! - [`dns`] - dns-json queries, the provider registry, and the racing
//!   resolver
//! - [`socket`] - Connection establishment and the resolving dial hook
//! - [`http`] - One-shot HTTP execution and the fetch race
//! - [`client`] - High-level client API
//!
//! ## Design
//!
//! Connection reuse is disabled everywhere: every query and every fetch
//! attempt opens a fresh connection, so concurrent race participants
//! never contend for a pooled socket. Race losers are cancelled
//! cooperatively and can never block on reporting; no state persists
//! across lookups.

pub mod base;
pub mod client;
pub mod dns;
pub mod http;
pub mod socket;

pub use base::error::DohError;
pub use client::{Client, ClientBuilder, Request, RequestBuilder};
