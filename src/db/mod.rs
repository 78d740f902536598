//! Credential and record store.
//!
//! All persistent state lives here: account registrations, the admin
//! credential table, the two-slot TXT table and the A/AAAA record sets.
//! Backends are the embedded sqlite3 engine and postgres, reached through one
//! [`sqlx::AnyPool`]; prepared statements are written in the postgres `$N`
//! placeholder dialect and rewritten to `?` for sqlite.
//!
//! Every public operation holds a single process-wide lock for its whole
//! duration. Correctness of the two-slot invariant trumps throughput here;
//! the serialized store keeps it trivially maintainable.

use crate::config::Engine;
use crate::credentials;
use crate::error::Error;
use crate::validation::{sanitize, CidrList};
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use std::borrow::Cow;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

pub mod migrations;
mod model;

pub use model::{Account, NewAccount, UpdatePost};

pub type SharedStore = Arc<Store>;

const ACME_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS acmedns(
        Name TEXT,
        Value TEXT
    )";

const ADMIN_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS admins(
        Username TEXT UNIQUE NOT NULL PRIMARY KEY,
        Password TEXT NOT NULL
    )";

const USER_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS records(
        Username TEXT UNIQUE NOT NULL PRIMARY KEY,
        Password TEXT NOT NULL,
        Subdomain TEXT UNIQUE NOT NULL,
        AllowFrom TEXT
    )";

// sqlite rows carry an implicit rowid; postgres needs an explicit stable row
// key for the oldest-slot UPDATE below.
const TXT_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS txt(
        Subdomain TEXT NOT NULL,
        Value TEXT NOT NULL DEFAULT '',
        LastUpdate INT
    )";

const TXT_TABLE_PG: &str = "
    CREATE TABLE IF NOT EXISTS txt(
        rowid SERIAL,
        Subdomain TEXT NOT NULL,
        Value TEXT NOT NULL DEFAULT '',
        LastUpdate INT
    )";

const A_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS a(
        Subdomain TEXT NOT NULL,
        Value TEXT NOT NULL,
        LastUpdate INT
    )";

const AAAA_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS aaaa(
        Subdomain TEXT NOT NULL,
        Value TEXT NOT NULL,
        LastUpdate INT
    )";

lazy_static! {
    static ref PG_PLACEHOLDER: Regex = Regex::new(r"\$[0-9]+").unwrap();
}

/// Rewrites postgres prepared-statement placeholders (`$1`, `$2`, ...) to the
/// sqlite variant `?`.
pub(crate) fn engine_stmt(engine: Engine, sql: &str) -> Cow<'_, str> {
    match engine {
        Engine::Sqlite3 => PG_PLACEHOLDER.replace_all(sql, "?"),
        Engine::Postgres => Cow::Borrowed(sql),
    }
}

fn connect_url(engine: Engine, connection: &str) -> String {
    match engine {
        Engine::Postgres => connection.to_string(),
        Engine::Sqlite3 => {
            if connection.starts_with("sqlite:") {
                connection.to_string()
            } else if connection == ":memory:" {
                "sqlite::memory:".to_string()
            } else {
                format!("sqlite://{connection}?mode=rwc")
            }
        }
    }
}

pub struct Store {
    engine: Engine,
    pool: AnyPool,
    lock: Mutex<()>,
}

impl Store {
    /// Opens the backend, creates missing tables, and brings the schema up to
    /// [`migrations::DB_VERSION`].
    pub async fn init(engine: Engine, connection: &str) -> Result<Store, Error> {
        static DRIVERS: std::sync::Once = std::sync::Once::new();
        DRIVERS.call_once(sqlx::any::install_default_drivers);

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&connect_url(engine, connection))
            .await?;
        let store = Store {
            engine,
            pool,
            lock: Mutex::new(()),
        };
        let _guard = store.lock.lock().await;

        // Read the version before touching the schema so that pre-versioning
        // databases are recognized. A missing table or row both read as "0".
        let version = sqlx::query("SELECT Value FROM acmedns WHERE Name='db_version'")
            .fetch_optional(&store.pool)
            .await
            .ok()
            .flatten()
            .and_then(|row| row.try_get::<String, _>(0).ok())
            .unwrap_or_else(|| "0".to_string());

        sqlx::query(ACME_TABLE).execute(&store.pool).await?;
        sqlx::query(ADMIN_TABLE).execute(&store.pool).await?;
        sqlx::query(USER_TABLE).execute(&store.pool).await?;
        let txt_table = match engine {
            Engine::Sqlite3 => TXT_TABLE,
            Engine::Postgres => TXT_TABLE_PG,
        };
        sqlx::query(txt_table).execute(&store.pool).await?;
        sqlx::query(A_TABLE).execute(&store.pool).await?;
        sqlx::query(AAAA_TABLE).execute(&store.pool).await?;

        migrations::upgrade(&store.pool, engine, &version).await?;
        drop(_guard);
        Ok(store)
    }

    /// Registers a new account in one transaction: the account row plus the
    /// two empty TXT slots for its subdomain. Returns the plaintext password
    /// exactly once.
    pub async fn register(&self, allow_from: &CidrList) -> Result<NewAccount, Error> {
        let _guard = self.lock.lock().await;
        let fresh = NewAccount::generate(allow_from);
        let password_hash = credentials::hash_password(&fresh.password)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(&engine_stmt(
            self.engine,
            "INSERT INTO records(Username, Password, Subdomain, AllowFrom) values($1, $2, $3, $4)",
        ))
        .bind(fresh.username.to_string())
        .bind(password_hash)
        .bind(&fresh.subdomain)
        .bind(fresh.allow_from.to_json())
        .execute(&mut *tx)
        .await?;
        migrations::new_txt_slots(&mut tx, self.engine, &fresh.subdomain).await?;
        tx.commit().await?;

        tracing::debug!(user = %fresh.username, "created new account");
        Ok(fresh)
    }

    /// Fetches an admin's stored password hash, or `None` when no such admin
    /// exists.
    pub async fn get_admin_hash(&self, username: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock().await;
        let row = sqlx::query(&engine_stmt(
            self.engine,
            "SELECT Password FROM admins WHERE Username=$1 LIMIT 1",
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(row) => Some(row.try_get(0)?),
            None => None,
        })
    }

    /// Fetches an account by username, or `None` when no such account exists.
    pub async fn get_account(&self, username: Uuid) -> Result<Option<Account>, Error> {
        let _guard = self.lock.lock().await;
        let row = sqlx::query(&engine_stmt(
            self.engine,
            "SELECT Username, Password, Subdomain, AllowFrom FROM records WHERE Username=$1 LIMIT 1",
        ))
        .bind(username.to_string())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };

        let stored: String = row.try_get(0)?;
        let username =
            Uuid::parse_str(&stored).map_err(|_| Error::CorruptValue(stored, "UUID"))?;
        let allow_from: String = row.try_get(3)?;
        Ok(Some(Account {
            username,
            password_hash: row.try_get(1)?,
            subdomain: row.try_get(2)?,
            allow_from: serde_json::from_str(&allow_from)?,
        }))
    }

    /// Returns the values of both TXT slots for `subdomain`, empties
    /// included. Filtering empty values is the DNS layer's concern.
    pub async fn get_txt(&self, subdomain: &str) -> Result<Vec<String>, Error> {
        let _guard = self.lock.lock().await;
        let subdomain = sanitize(subdomain);
        let rows = sqlx::query(&engine_stmt(
            self.engine,
            "SELECT Value FROM txt WHERE Subdomain=$1 LIMIT 2",
        ))
        .bind(subdomain)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    /// Returns the A record set for `subdomain`, capped at 255 entries. A
    /// stored value that no longer parses as IPv4 fails the whole read.
    pub async fn get_a(&self, subdomain: &str) -> Result<Vec<Ipv4Addr>, Error> {
        let _guard = self.lock.lock().await;
        let subdomain = sanitize(subdomain);
        let rows = sqlx::query(&engine_stmt(
            self.engine,
            "SELECT Value FROM a WHERE Subdomain=$1 LIMIT 255",
        ))
        .bind(subdomain)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let value: String = row.try_get(0)?;
                value
                    .parse()
                    .map_err(|_| Error::CorruptValue(value, "IPv4 address"))
            })
            .collect()
    }

    /// Returns the AAAA record set for `subdomain`, capped at 255 entries.
    pub async fn get_aaaa(&self, subdomain: &str) -> Result<Vec<Ipv6Addr>, Error> {
        let _guard = self.lock.lock().await;
        let subdomain = sanitize(subdomain);
        let rows = sqlx::query(&engine_stmt(
            self.engine,
            "SELECT Value FROM aaaa WHERE Subdomain=$1 LIMIT 255",
        ))
        .bind(subdomain)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let value: String = row.try_get(0)?;
                value
                    .parse()
                    .map_err(|_| Error::CorruptValue(value, "IPv6 address"))
            })
            .collect()
    }

    /// Counts the records present for `subdomain`: TXT slots holding a
    /// value, plus all A and AAAA rows. Used by the DNS layer to tell an
    /// empty answer (NOERROR) from a nonexistent name (NXDOMAIN).
    pub async fn count_records(&self, subdomain: &str) -> Result<i64, Error> {
        let _guard = self.lock.lock().await;
        let subdomain = sanitize(subdomain);
        let mut count: i64 = 0;
        for sql in [
            "SELECT COUNT(*) FROM txt WHERE Subdomain=$1 AND Value != ''",
            "SELECT COUNT(*) FROM a WHERE Subdomain=$1",
            "SELECT COUNT(*) FROM aaaa WHERE Subdomain=$1",
        ] {
            let row = sqlx::query(&engine_stmt(self.engine, sql))
                .bind(&subdomain)
                .fetch_one(&self.pool)
                .await?;
            count += row.try_get::<i64, _>(0)?;
        }
        Ok(count)
    }

    /// Applies a validated update. The TXT value overwrites the slot with the
    /// smaller `LastUpdate` (ties broken by lowest row key), preserving the
    /// other slot so two consecutive tokens stay servable. Non-empty A/AAAA
    /// lists replace the whole set for the subdomain. The three actions are
    /// independent statements, not one transaction.
    pub async fn update(&self, post: &UpdatePost) -> Result<(), Error> {
        let _guard = self.lock.lock().await;
        let now = OffsetDateTime::now_utc().unix_timestamp();

        if !post.value.is_empty() {
            sqlx::query(&engine_stmt(
                self.engine,
                "UPDATE txt SET Value=$1, LastUpdate=$2 WHERE rowid=(
                    SELECT rowid FROM txt WHERE Subdomain=$3 ORDER BY LastUpdate, rowid LIMIT 1)",
            ))
            .bind(&post.value)
            .bind(now)
            .bind(&post.subdomain)
            .execute(&self.pool)
            .await?;
        }

        if !post.a_values.is_empty() {
            sqlx::query(&engine_stmt(self.engine, "DELETE FROM a WHERE Subdomain=$1"))
                .bind(&post.subdomain)
                .execute(&self.pool)
                .await?;
            for value in &post.a_values {
                sqlx::query(&engine_stmt(
                    self.engine,
                    "INSERT INTO a(Subdomain, Value, LastUpdate) values($1, $2, $3)",
                ))
                .bind(&post.subdomain)
                .bind(value)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        if !post.aaaa_values.is_empty() {
            sqlx::query(&engine_stmt(
                self.engine,
                "DELETE FROM aaaa WHERE Subdomain=$1",
            ))
            .bind(&post.subdomain)
            .execute(&self.pool)
            .await?;
            for value in &post.aaaa_values {
                sqlx::query(&engine_stmt(
                    self.engine,
                    "INSERT INTO aaaa(Subdomain, Value, LastUpdate) values($1, $2, $3)",
                ))
                .bind(&post.subdomain)
                .bind(value)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    /// Releases the backend.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
