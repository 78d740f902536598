//! Input validation and sanitization.
//!
//! Everything a client can send — subdomain labels, DNS-01 challenge values,
//! API credentials, CIDR allow-lists — passes through here before it reaches
//! the [store][crate::db] or a DNS answer.

use crate::error::Error;
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

/// Length of the random subdomain label minted at registration.
pub const SUBDOMAIN_LEN: usize = 40;

/// Length of the random API key minted at registration.
pub const API_KEY_LEN: usize = 40;

/// Length of a DNS-01 challenge response value: the base64url encoding of a
/// 32 byte SHA-256 digest, unpadded.
pub const TXT_VALUE_LEN: usize = 43;

lazy_static! {
    static ref SANITIZE: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
    static ref SUBDOMAIN: Regex = Regex::new(r"^[a-z0-9]{40}$").unwrap();
    static ref TXT_VALUE: Regex = Regex::new(r"^[A-Za-z0-9_-]{43}$").unwrap();
    static ref API_KEY: Regex = Regex::new(r"^[A-Za-z0-9]{40}$").unwrap();
}

/// Strips every character outside `[A-Za-z0-9]`.
///
/// Applied to every label that enters a database query from the DNS side, so
/// stored keys only ever contain the alphabet registration mints.
pub fn sanitize(s: &str) -> String {
    SANITIZE.replace_all(s, "").into_owned()
}

/// True iff `s` is a well-formed account subdomain label.
pub fn valid_subdomain(s: &str) -> bool {
    SUBDOMAIN.is_match(s)
}

/// True iff `s` is a well-formed DNS-01 challenge response value.
pub fn valid_txt(s: &str) -> bool {
    TXT_VALUE.is_match(s)
}

/// Parses `s` as an account username (a canonical textual UUID).
pub fn valid_username(s: &str) -> Result<Uuid, Error> {
    // Uuid::parse_str accepts a handful of non-canonical forms (urn:, braces,
    // simple). Only the canonical hyphenated form authenticates.
    if s.len() != 36 {
        return Err(Error::Unauthorized);
    }
    Uuid::parse_str(s).map_err(|_| Error::Unauthorized)
}

/// True iff `s` is a well-formed API key.
pub fn valid_api_key(s: &str) -> bool {
    API_KEY.is_match(s)
}

/// An ordered list of CIDR networks an account may update from, as textual
/// entries. Empty means "allow from any source".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct CidrList(pub Vec<String>);

impl CidrList {
    /// Checks that every entry parses as a CIDR network. A single bad entry
    /// fails the whole list.
    pub fn is_valid(&self) -> Result<(), Error> {
        for entry in &self.0 {
            IpNetwork::from_str(entry.trim()).map_err(|_| Error::InvalidAllowFrom)?;
        }
        Ok(())
    }

    /// Returns the entries that parse as CIDR networks, preserving order and
    /// dropping textual duplicates.
    pub fn valid_entries(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::with_capacity(self.0.len());
        for entry in &self.0 {
            let entry = entry.trim();
            if IpNetwork::from_str(entry).is_ok() && !seen.iter().any(|e| e == entry) {
                seen.push(entry.to_string());
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True iff `ip` parses and falls inside one of the networks. An empty
    /// list allows any source.
    pub fn allows(&self, ip: &str) -> bool {
        if self.0.is_empty() {
            return true;
        }
        let ip: IpAddr = match ip.parse() {
            Ok(ip) => ip,
            Err(_) => return false,
        };
        self.0
            .iter()
            .filter_map(|entry| IpNetwork::from_str(entry.trim()).ok())
            .any(|network| network.contains(ip))
    }

    /// True iff any of `ips` is allowed. An empty `ips` (the trusted header
    /// was missing) only passes when the list itself is open.
    pub fn allows_any(&self, ips: &[String]) -> bool {
        if ips.is_empty() {
            return self.is_empty();
        }
        ips.iter().any(|ip| self.allows(ip))
    }

    /// The JSON encoding stored in the `records.AllowFrom` column.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.valid_entries()).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_non_alphanumerics() {
        for (input, expected) in [
            ("abcd!abcd", "abcdabcd"),
            (
                "ABCDEFGHIJKLMNOPQRSTUVXYZabcdefghijklmnopqrstuvwxyz0123456789",
                "ABCDEFGHIJKLMNOPQRSTUVXYZabcdefghijklmnopqrstuvwxyz0123456789",
            ),
            ("foo.bar.baz.", "foobarbaz"),
            ("under_score-dash=@", "underscoredash"),
        ] {
            assert_eq!(sanitize(input), expected);
        }
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("_acme-challenge.foo!");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn subdomain_format() {
        let good: String = std::iter::repeat('a').take(39).chain(['0']).collect();
        assert!(valid_subdomain(&good));
        assert!(!valid_subdomain(&good[..39]));
        assert!(!valid_subdomain(&format!("{good}a")));
        assert!(!valid_subdomain(&good.to_uppercase()));
        assert!(!valid_subdomain("a2d5ae63-0ad9-49e2-b9d1-0092ea15d632"));
    }

    #[test]
    fn txt_format() {
        assert!(valid_txt("___aaaa________aaaa________aaaa________aaa"));
        assert!(valid_txt("LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo"));
        assert!(!valid_txt("too-short"));
        assert!(!valid_txt("LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZ=")); // bad alphabet
        assert!(!valid_txt("LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZoo")); // 44 chars
    }

    #[test]
    fn username_must_be_canonical_uuid() {
        assert!(valid_username("a097455b-52cc-4569-90c8-7a4b97c6eba8").is_ok());
        assert!(valid_username("a097455b52cc456990c87a4b97c6eba8").is_err());
        assert!(valid_username("urn:uuid:a097455b-52cc-4569-90c8-7a4b97c6eba8").is_err());
        assert!(valid_username("not-a-uuid").is_err());
    }

    #[test]
    fn api_key_format() {
        let key: String = std::iter::repeat('K').take(40).collect();
        assert!(valid_api_key(&key));
        assert!(!valid_api_key(&key[..39]));
        assert!(!valid_api_key(&format!("{}!", &key[..39])));
    }

    #[test]
    fn cidr_list_validity() {
        assert!(CidrList(vec!["192.0.2.0/24".into(), "2001:db8::/32".into()])
            .is_valid()
            .is_ok());
        assert!(CidrList(vec!["192.0.2.0/24".into(), "300.0.0.0/8".into()])
            .is_valid()
            .is_err());
        assert!(CidrList::default().is_valid().is_ok());
    }

    #[test]
    fn cidr_valid_entries_keeps_order_and_dedupes() {
        let list = CidrList(vec![
            "192.0.2.0/24".into(),
            "not-a-cidr".into(),
            "10.0.0.0/8".into(),
            "192.0.2.0/24".into(),
        ]);
        assert_eq!(list.valid_entries(), vec!["192.0.2.0/24", "10.0.0.0/8"]);
    }

    #[test]
    fn cidr_json_round_trip() {
        let list = CidrList(vec!["192.0.2.0/24".into(), "bogus".into()]);
        let encoded = list.to_json();
        let decoded: CidrList = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.0, list.valid_entries());
    }

    #[test]
    fn empty_list_allows_any_source() {
        let list = CidrList::default();
        assert!(list.allows("198.51.100.7"));
        assert!(list.allows("2001:db8::1"));
    }

    #[test]
    fn non_empty_list_checks_containment() {
        let list = CidrList(vec!["192.0.2.0/24".into()]);
        assert!(list.allows("192.0.2.17"));
        assert!(!list.allows("198.51.100.1"));
        assert!(!list.allows("not an ip"));
        assert!(list.allows_any(&["198.51.100.1".into(), "192.0.2.3".into()]));
        assert!(!list.allows_any(&["198.51.100.1".into()]));
        // Missing source info only passes for an open list.
        assert!(!list.allows_any(&[]));
        assert!(CidrList::default().allows_any(&[]));
    }
}
