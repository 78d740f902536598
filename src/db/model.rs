//! Persistent data model.

use crate::credentials;
use crate::validation::CidrList;
use uuid::Uuid;

/// A registered client as stored in the `records` table.
#[derive(Debug, Clone)]
pub struct Account {
    pub username: Uuid,
    pub password_hash: String,
    pub subdomain: String,
    /// CIDR networks the account may update from; empty allows any source.
    pub allow_from: CidrList,
}

impl Account {
    /// True iff `ip` is permitted by the account's allow-list. An IP that
    /// fails to parse is never permitted.
    pub fn allowed_from(&self, ip: &str) -> bool {
        self.allow_from.allows(ip)
    }

    /// True iff any element of `ips` is permitted.
    pub fn allowed_from_list(&self, ips: &[String]) -> bool {
        self.allow_from.allows_any(ips)
    }
}

/// A freshly registered account, carrying the plaintext password. This is the
/// only place the plaintext ever exists; it is returned to the client once
/// and only the bcrypt hash is stored.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: Uuid,
    pub password: String,
    pub subdomain: String,
    pub allow_from: CidrList,
}

impl NewAccount {
    /// Mints a new account: random UUID username, random 40-character
    /// password and subdomain label. Only the valid entries of `allow_from`
    /// are kept.
    pub fn generate(allow_from: &CidrList) -> Self {
        NewAccount {
            username: Uuid::new_v4(),
            password: credentials::generate_api_password(),
            subdomain: credentials::generate_subdomain(),
            allow_from: CidrList(allow_from.valid_entries()),
        }
    }
}

/// A validated update as applied to the store. The three record kinds are
/// independent; an empty value or list leaves that kind untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdatePost {
    pub subdomain: String,
    /// DNS-01 challenge value destined for the oldest TXT slot; empty means
    /// "no TXT update".
    pub value: String,
    pub a_values: Vec<String>,
    pub aaaa_values: Vec<String>,
}
