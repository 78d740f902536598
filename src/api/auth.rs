//! Credential checks for the API endpoints.
//!
//! Every lookup miss still burns one bcrypt verification against
//! [`DUMMY_HASH`][crate::credentials::DUMMY_HASH], so an attacker cannot
//! distinguish "no such user" from "wrong password" by timing.

use crate::config::Config;
use crate::credentials::{dummy_verify, verify_password};
use crate::db::{Account, Store};
use crate::error::Error;
use crate::validation::{valid_api_key, valid_username};
use axum::headers::authorization::Basic;
use axum::headers::Authorization;
use axum::http::HeaderMap;
use std::net::IpAddr;

/// Gate for `POST /register`. A no-op unless `api.admin_registration` is set;
/// then HTTP basic credentials must verify against the `admins` table.
pub(super) async fn register_allowed(
    config: &Config,
    store: &Store,
    auth: Option<&Authorization<Basic>>,
) -> Result<(), Error> {
    if !config.api.admin_registration {
        return Ok(());
    }
    let Some(basic) = auth else {
        return Err(Error::Unauthorized);
    };
    match store.get_admin_hash(basic.username()).await? {
        Some(hash) if verify_password(basic.password(), &hash) => Ok(()),
        Some(_) => Err(Error::Unauthorized),
        None => {
            tracing::debug!(admin = basic.username(), "unknown admin");
            dummy_verify(basic.password());
            Err(Error::Unauthorized)
        }
    }
}

/// Gate for `POST /update`: resolves `X-Api-User` / `X-Api-Key` into the
/// authenticated [`Account`].
pub(super) async fn account_from_headers(
    store: &Store,
    headers: &HeaderMap,
) -> Result<Account, Error> {
    let username = header_str(headers, "X-Api-User").ok_or(Error::Unauthorized)?;
    let api_key = header_str(headers, "X-Api-Key").ok_or(Error::Unauthorized)?;
    let username = valid_username(username)?;
    if !valid_api_key(api_key) {
        return Err(Error::Unauthorized);
    }
    match store.get_account(username).await? {
        Some(account) if verify_password(api_key, &account.password_hash) => Ok(account),
        Some(account) => {
            tracing::debug!(user = %account.username, "wrong API key");
            Err(Error::Unauthorized)
        }
        None => {
            tracing::debug!(user = %username, "unknown user");
            dummy_verify(api_key);
            Err(Error::Unauthorized)
        }
    }
}

/// CIDR enforcement for an authenticated update. With `api.use_header` the
/// source addresses come from the configured header (comma-separated, e.g.
/// `X-Forwarded-For` as filled in by a trusted reverse proxy); otherwise the
/// peer address of the connection is checked.
pub(super) fn update_source_allowed(
    config: &Config,
    account: &Account,
    headers: &HeaderMap,
    peer: IpAddr,
) -> bool {
    if config.api.use_header {
        let ips = header_str(headers, &config.api.header_name)
            .map(header_ip_list)
            .unwrap_or_default();
        account.allowed_from_list(&ips)
    } else {
        account.allowed_from(&peer.to_string())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn header_ip_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .collect()
}
