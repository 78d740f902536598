//! TOML configuration.

use crate::error::Error;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub database: Database,
    pub api: Api,
    pub logconfig: LogConfig,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct General {
    /// DNS listen address for both UDP and TCP.
    pub listen: SocketAddr,
    pub protocol: Protocol,
    /// The apex this server is authoritative for, e.g. `auth.example.org`.
    pub domain: String,
    /// Name of the authoritative nameserver, used in synthesized SOA records.
    pub nsname: String,
    /// Zone admin mailbox, used in synthesized SOA records.
    pub nsadmin: String,
    pub debug: bool,
    /// Static records as zone-file-style lines: `name [ttl] TYPE rdata...`.
    pub records: Vec<String>,
    /// TXT value served for `_acme-challenge.<domain>`, for solving the
    /// server's own DNS-01 challenges.
    pub own_challenge_key: Option<String>,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub dns_tcp_timeout: Duration,
}

impl Default for General {
    fn default() -> Self {
        General {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 53),
            protocol: Protocol::Both,
            domain: String::new(),
            nsname: String::new(),
            nsadmin: String::new(),
            debug: false,
            records: Vec::new(),
            own_challenge_key: None,
            dns_tcp_timeout: Duration::from_secs(5),
        }
    }
}

/// Which DNS transports to serve.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Both,
    Udp,
    Tcp,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Database {
    pub engine: Engine,
    pub connection: String,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            engine: Engine::Sqlite3,
            connection: "acmeden.db".to_string(),
        }
    }
}

/// Supported database backends.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    #[serde(rename = "sqlite3")]
    Sqlite3,
    #[serde(rename = "postgres")]
    Postgres,
}

impl std::str::FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite3" => Ok(Engine::Sqlite3),
            "postgres" => Ok(Engine::Postgres),
            other => Err(Error::UnknownEngine(other.to_string())),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Api {
    /// Hostname for the API when TLS certificates are provisioned for it.
    pub domain: String,
    pub ip: IpAddr,
    pub port: u16,
    pub tls: TlsProvider,
    pub disable_registration: bool,
    /// When true, `POST /register` requires HTTP basic auth against the
    /// `admins` table.
    pub admin_registration: bool,
    /// When true, the client source address for CIDR checks is read from
    /// [`header_name`][Api::header_name] instead of the peer address.
    pub use_header: bool,
    pub header_name: String,
    pub cors_origins: Vec<String>,
    pub notification_email: String,
    pub tls_cert_privkey: String,
    pub tls_cert_fullchain: String,
    pub acme_cache_dir: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for Api {
    fn default() -> Self {
        Api {
            domain: String::new(),
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            tls: TlsProvider::None,
            disable_registration: false,
            admin_registration: false,
            use_header: false,
            header_name: "X-Forwarded-For".to_string(),
            cors_origins: vec!["*".to_string()],
            notification_email: String::new(),
            tls_cert_privkey: String::new(),
            tls_cert_fullchain: String::new(),
            acme_cache_dir: "api-certs".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// TLS modes for the HTTP API. Certificate provisioning is handled outside
/// this crate; anything but `none` currently serves plain HTTP with a
/// warning.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TlsProvider {
    #[default]
    None,
    Cert,
    Letsencrypt,
    Letsencryptstaging,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LogConfig {
    #[serde(rename = "loglevel")]
    pub level: String,
    pub logtype: String,
    #[serde(rename = "logfile")]
    pub file: String,
    #[serde(rename = "logformat")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            logtype: "stdout".to_string(),
            file: String::new(),
            format: "text".to_string(),
        }
    }
}

const FALLBACK_PATHS: &[&str] = &["/etc/acmeden/config.toml", "./config.toml"];

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(p)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Loads configuration from `explicit` if given, otherwise from the first
    /// readable fallback path. Returns the config and the path it came from.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf), Error> {
        if let Some(path) = explicit {
            return Ok((Self::try_from_file(path)?, path.to_path_buf()));
        }
        let mut last_err = None;
        for candidate in FALLBACK_PATHS {
            match Self::try_from_file(candidate) {
                Ok(config) => return Ok((config, PathBuf::from(candidate))),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.expect("at least one fallback path"))
    }

    pub fn api_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.api.ip, self.api.port)
    }
}
