//! ACME Den
//!
//! A delegated [RFC-8555][RFC-8555] [DNS-01] challenge responder. Clients
//! that can't (or won't) publish `_acme-challenge` TXT records in their
//! primary zone point a CNAME at a subdomain served here, register over the
//! [HTTP API][crate::api], and push challenge tokens to be answered by the
//! [authoritative DNS responder][crate::dns].
//!
//! Two challenge tokens per subdomain are servable concurrently, so
//! back-to-back issuances (renewal plus staging, base plus wildcard) never
//! race each other: each update lands in the older of the account's two TXT
//! slots.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod credentials;
pub mod db;
pub mod dns;
pub mod error;
pub mod validation;

pub use api::router;
pub use config::{Config, SharedConfig};
pub use db::{SharedStore, Store};
