//! Error types.

use axum::extract::rejection::JsonRejection;
use trust_dns_server::proto::error::ProtoError;

/// Error enumerates the possible ACME Den error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when clients `POST` a request body that is not valid JSON.
    #[error("malformed_json_payload")]
    MalformedJson,

    /// Returned when `POST /register` carries an `allowfrom` list containing
    /// an entry that does not parse as a CIDR network.
    #[error("invalid_allowfrom_cidr")]
    InvalidAllowFrom,

    /// Returned when `POST /update` names a subdomain that is not a valid
    /// 40-character label.
    #[error("bad_subdomain")]
    BadSubdomain,

    /// Returned when `POST /update` carries a `txt` value that is not a valid
    /// [RFC-8555][RFC-8555] [DNS-01] challenge response value (43 characters
    /// of the base64url alphabet), or carries none of `txt`/`a`/`aaaa`.
    ///
    /// [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
    /// [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
    #[error("bad_txt")]
    BadTxt,

    /// Returned when `POST /update` carries an `a` entry that does not parse
    /// as an IPv4 address.
    #[error("bad_a")]
    BadA,

    /// Returned when `POST /update` carries an `aaaa` entry that does not
    /// parse as a (non-IPv4-mapped) IPv6 address.
    #[error("bad_aaaa")]
    BadAaaa,

    /// Returned when credentials are missing, malformed, or do not verify
    /// against the stored hash.
    #[error("unauthorized")]
    Unauthorized,

    /// Returned when an authenticated client is not permitted to perform the
    /// update: its source address is outside the account's `allowfrom`
    /// networks, or the posted subdomain is not the account's own.
    #[error("forbidden")]
    Forbidden,

    /// Returned when a stored value no longer parses as the expected shape
    /// (an address of the wrong family, a mangled username).
    #[error("stored value \"{0}\" is not a valid {1}")]
    CorruptValue(String, &'static str),

    /// Returned when a static record line in the configuration cannot be
    /// parsed.
    #[error("invalid static record line: \"{0}\"")]
    InvalidStaticRecord(String),

    /// Returned when the configured database engine string is not one of
    /// `sqlite3` or `postgres`.
    #[error("unknown database engine \"{0}\"")]
    UnknownEngine(String),

    /// Returned when clients `POST` invalid JSON through the axum extractor.
    #[error(transparent)]
    JsonExtractorRejection(#[from] JsonRejection),

    /// Returned when a database operation fails.
    #[error("db_error")]
    Db(#[from] sqlx::Error),

    /// Returned when password hashing fails.
    #[error("hash_error")]
    Hash(#[from] bcrypt::BcryptError),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    Io(#[from] std::io::Error),

    /// Returned when the configuration file is not valid TOML.
    #[error("invalid configuration")]
    InvalidConfig(#[from] toml::de::Error),

    /// Returned when serializing or deserializing JSON fails.
    #[error("invalid JSON")]
    InvalidJson(#[from] serde_json::Error),

    /// Returned when the DNS server encounters a generic protocol error.
    #[error("DNS error")]
    Dns(#[from] ProtoError),
}
