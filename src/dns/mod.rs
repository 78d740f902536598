//! Authoritative DNS for the delegated challenge zone.
//!
//! # Dynamic records
//!
//! ACME Den answers queries for every account subdomain under the configured
//! [`general.domain`][crate::config::General::domain]. `TXT` answers come
//! from the account's two challenge slots (empty slots are skipped), `A` and
//! `AAAA` answers from the account's replaceable address sets. All dynamic
//! answers carry a TTL of one second so resolvers re-query after each
//! update.
//!
//! E.g. after a client `POST`s the [`/update` API endpoint][crate::api] with
//!
//! ```json
//! {"subdomain":"<40 chars>","txt":"LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo"}
//! ```
//!
//! a `TXT` query for `<subdomain>.auth.example.org.` returns that value (and
//! the previous one, if a second slot is populated):
//!
//! ```bash
//! ❯ dig @127.0.0.1 +short <subdomain>.auth.example.org TXT
//! "LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo"
//! ```
//!
//! # Static records
//!
//! [`general.records`][crate::config::General::records] lines are parsed once
//! at startup ([`zone`]) and served for their exact names. The apex `SOA` is
//! synthesized from [`general.nsname`][crate::config::General::nsname] and
//! [`general.nsadmin`][crate::config::General::nsadmin] when no static SOA
//! line is present.
//!
//! # The server's own challenge
//!
//! `TXT` queries for `_acme-challenge.<domain>` answer with the configured
//! [`own_challenge_key`][crate::config::General::own_challenge_key], letting
//! the server solve DNS-01 challenges for its own API certificate.
//!
//! Queries for names outside the apex (and outside any static-record name)
//! are `REFUSED`; authoritative names without records are `NXDOMAIN`.

pub mod handlers;
pub mod server;
mod zone;

pub use server::new;
