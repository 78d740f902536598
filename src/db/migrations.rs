//! Schema versioning and in-place upgrades.
//!
//! The schema version is persisted in the `acmedns` KV table under
//! `db_version`; a database without the row (or the table) is version 0.
//! Each upgrade runs in one transaction and the recorded version is only
//! advanced once the upgrade committed.

use super::engine_stmt;
use crate::config::Engine;
use crate::error::Error;
use sqlx::{Any, AnyPool, Row, Transaction};

/// The schema version this code uses.
pub const DB_VERSION: i32 = 1;

/// Brings a freshly opened database from `version` up to [`DB_VERSION`] and
/// records the current version.
pub(crate) async fn upgrade(pool: &AnyPool, engine: Engine, version: &str) -> Result<(), Error> {
    let version: i32 = version
        .trim()
        .parse()
        .map_err(|_| Error::CorruptValue(version.to_string(), "database version"))?;
    if version == DB_VERSION {
        return Ok(());
    }
    if version == 0 {
        upgrade_to_1(pool, engine).await?;
    }

    // Recorded last: the row is rewritten wholesale so that pre-versioning
    // databases and interrupted upgrades both converge on a single row.
    sqlx::query("DELETE FROM acmedns WHERE Name='db_version'")
        .execute(pool)
        .await?;
    sqlx::query(&engine_stmt(
        engine,
        "INSERT INTO acmedns (Name, Value) values('db_version', $1)",
    ))
    .bind(DB_VERSION.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// The pre-1 schema stored a single TXT value and a `LastActive` stamp on the
/// account row itself. Version 1 moves TXT storage to two slots per
/// subdomain in the `txt` table.
async fn upgrade_to_1(pool: &AnyPool, engine: Engine) -> Result<(), Error> {
    let rows = sqlx::query("SELECT Subdomain FROM records")
        .fetch_all(pool)
        .await?;
    let subdomains: Vec<String> = rows
        .iter()
        .map(|row| Ok(row.try_get(0)?))
        .collect::<Result<_, Error>>()?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM txt").execute(&mut *tx).await?;
    for subdomain in &subdomains {
        if !subdomain.is_empty() {
            new_txt_slots(&mut tx, engine, subdomain).await?;
        }
    }
    // sqlite doesn't support dropping columns; the obsolete ones stay behind
    // there and are simply never read again.
    if engine != Engine::Sqlite3 {
        sqlx::query("ALTER TABLE records DROP COLUMN IF EXISTS Value")
            .execute(&mut *tx)
            .await?;
        sqlx::query("ALTER TABLE records DROP COLUMN IF EXISTS LastActive")
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    tracing::info!(subdomains = subdomains.len(), "upgraded database schema to version 1");
    Ok(())
}

/// Inserts the two empty TXT slots for `subdomain`. Every registered
/// subdomain owns exactly two slot rows from the moment it exists.
pub(crate) async fn new_txt_slots(
    tx: &mut Transaction<'_, Any>,
    engine: Engine,
    subdomain: &str,
) -> Result<(), Error> {
    for _ in 0..2 {
        sqlx::query(&engine_stmt(
            engine,
            "INSERT INTO txt(Subdomain, Value, LastUpdate) values($1, '', 0)",
        ))
        .bind(subdomain)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
