//! HTTP control plane for registering accounts and updating records.
//!
//! # API Endpoints
//!
//! ## `/health` (GET)
//!
//!   Returns HTTP 200 (OK) with an empty body when the service is
//!   operational.
//!
//! ## `/register` (POST)
//!
//!   Mints a new account. The body is optional; when present it must be of
//!   the form:
//!
//!   ```json
//!   { "allowfrom": ["192.0.2.0/24", "2001:db8::/32"] }
//!   ```
//!
//!   Every entry must parse as a CIDR network, or the whole request is
//!   rejected with HTTP 400 and `{"error":"invalid_allowfrom_cidr"}`. On
//!   success, returns HTTP 201 (Created) with the one and only copy of the
//!   plaintext credentials:
//!
//!   ```json
//!   {
//!     "username": "a097455b-52cc-4569-90c8-7a4b97c6eba8",
//!     "password": "<40 chars>",
//!     "fulldomain": "<subdomain>.auth.example.org",
//!     "subdomain": "<40 chars>",
//!     "allowfrom": ["192.0.2.0/24", "2001:db8::/32"]
//!   }
//!   ```
//!
//!   The client then delegates with a CNAME from `_acme-challenge.<their
//!   name>` to `fulldomain`. When `api.admin_registration` is set this
//!   endpoint additionally requires HTTP basic auth against the `admins`
//!   table; when `api.disable_registration` is set it is not routed at all.
//!
//! ## `/update` (POST)
//!
//!   Authenticates with the `X-Api-User` and `X-Api-Key` headers from
//!   registration and expects a JSON request body of the form:
//!
//!   ```json
//!   { "subdomain": "<40 chars>", "txt": "<43 chars>", "a": ["192.0.2.1"], "aaaa": ["2001:db8::1"] }
//!   ```
//!
//!   `txt`, `a` and `aaaa` are each optional but at least one must be
//!   present. The `txt` value must be a valid [RFC-8555][RFC-8555] [DNS-01]
//!   challenge response; it lands in the account's oldest challenge slot so
//!   the two most recent values stay servable concurrently. `a`/`aaaa`
//!   replace the whole address set for the subdomain. Returns HTTP 200 with
//!   the applied values, addresses space-joined:
//!
//!   ```json
//!   { "txt": "<43 chars>", "a": "192.0.2.1", "aaaa": "2001:db8::1" }
//!   ```
//!
//! All errors share the shape `{"error":"<tag>"}`.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

mod api_error;
mod auth;
mod model;
mod routes;
pub mod server;

pub use routes::router;
pub use server::new;
