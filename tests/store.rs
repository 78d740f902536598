//! Store behaviour against a real sqlite backend: registration, the two-slot
//! TXT discipline, address-set replacement, and the 0 -> 1 schema upgrade.

use acmeden::config::Engine;
use acmeden::credentials;
use acmeden::db::{Store, UpdatePost};
use acmeden::validation::CidrList;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};

async fn memory_store() -> Store {
    Store::init(Engine::Sqlite3, ":memory:").await.unwrap()
}

fn txt_update(subdomain: &str, value: &str) -> UpdatePost {
    UpdatePost {
        subdomain: subdomain.to_string(),
        value: value.to_string(),
        ..UpdatePost::default()
    }
}

#[tokio::test]
async fn register_creates_two_empty_slots() {
    let store = memory_store().await;
    let account = store.register(&CidrList::default()).await.unwrap();

    let values = store.get_txt(&account.subdomain).await.unwrap();
    assert_eq!(values, vec!["", ""]);
    // Empty slots don't count as records.
    assert_eq!(store.count_records(&account.subdomain).await.unwrap(), 0);
}

#[tokio::test]
async fn register_round_trips_credentials() {
    let store = memory_store().await;
    let fresh = store
        .register(&CidrList(vec![
            "192.0.2.0/24".to_string(),
            "not-a-cidr".to_string(),
        ]))
        .await
        .unwrap();
    assert_eq!(fresh.password.len(), 40);
    assert_eq!(fresh.subdomain.len(), 40);

    let account = store.get_account(fresh.username).await.unwrap().unwrap();
    assert_eq!(account.subdomain, fresh.subdomain);
    // Only the parsing entries survive into storage.
    assert_eq!(account.allow_from.0, vec!["192.0.2.0/24"]);
    assert!(credentials::verify_password(
        &fresh.password,
        &account.password_hash
    ));
    assert!(!credentials::verify_password("wrong", &account.password_hash));
}

#[tokio::test]
async fn lookup_misses_return_none() {
    let store = memory_store().await;
    assert!(store
        .get_account(uuid::Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
    assert!(store.get_admin_hash("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn txt_updates_rotate_the_oldest_slot() {
    let store = memory_store().await;
    let account = store.register(&CidrList::default()).await.unwrap();
    let subdomain = &account.subdomain;

    let (first, second, third) = ("a".repeat(43), "b".repeat(43), "c".repeat(43));

    store.update(&txt_update(subdomain, &first)).await.unwrap();
    let mut values = store.get_txt(subdomain).await.unwrap();
    values.sort();
    assert_eq!(values, vec!["".to_string(), first.clone()]);

    store.update(&txt_update(subdomain, &second)).await.unwrap();
    let mut values = store.get_txt(subdomain).await.unwrap();
    values.sort();
    assert_eq!(values, vec![first.clone(), second.clone()]);

    // The third token displaces the oldest of the two.
    store.update(&txt_update(subdomain, &third)).await.unwrap();
    let mut values = store.get_txt(subdomain).await.unwrap();
    values.sort();
    assert_eq!(values, vec![second, third]);

    assert_eq!(store.count_records(subdomain).await.unwrap(), 2);
}

#[tokio::test]
async fn address_updates_replace_the_whole_set() {
    let store = memory_store().await;
    let account = store.register(&CidrList::default()).await.unwrap();
    let subdomain = account.subdomain.clone();

    store
        .update(&UpdatePost {
            subdomain: subdomain.clone(),
            a_values: vec!["192.0.2.1".to_string(), "192.0.2.2".to_string()],
            aaaa_values: vec!["2001:db8::1".to_string()],
            ..UpdatePost::default()
        })
        .await
        .unwrap();

    let mut a: Vec<String> = store
        .get_a(&subdomain)
        .await
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    a.sort();
    assert_eq!(a, vec!["192.0.2.1", "192.0.2.2"]);
    assert_eq!(store.get_aaaa(&subdomain).await.unwrap().len(), 1);
    assert_eq!(store.count_records(&subdomain).await.unwrap(), 3);

    // A later A-only update replaces the A set and leaves AAAA alone.
    store
        .update(&UpdatePost {
            subdomain: subdomain.clone(),
            a_values: vec!["198.51.100.7".to_string()],
            ..UpdatePost::default()
        })
        .await
        .unwrap();
    let a = store.get_a(&subdomain).await.unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].to_string(), "198.51.100.7");
    assert_eq!(store.get_aaaa(&subdomain).await.unwrap().len(), 1);
}

#[tokio::test]
async fn updates_do_not_leak_across_subdomains() {
    let store = memory_store().await;
    let one = store.register(&CidrList::default()).await.unwrap();
    let two = store.register(&CidrList::default()).await.unwrap();

    store
        .update(&txt_update(&one.subdomain, &"x".repeat(43)))
        .await
        .unwrap();

    let mut values = store.get_txt(&two.subdomain).await.unwrap();
    values.sort();
    assert_eq!(values, vec!["", ""]);
}

async fn raw_sqlite(path: &std::path::Path) -> SqlitePool {
    SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn admin_hash_is_read_from_seeded_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("acmeden.db");

    // Admins are seeded out of band, straight into the table.
    {
        let store = Store::init(Engine::Sqlite3, path.to_str().unwrap())
            .await
            .unwrap();
        store.close().await;
        let pool = raw_sqlite(&path).await;
        let hash = credentials::hash_password("hunter2").unwrap();
        sqlx::query("INSERT INTO admins (Username, Password) values (?, ?)")
            .bind("admin")
            .bind(&hash)
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let store = Store::init(Engine::Sqlite3, path.to_str().unwrap())
        .await
        .unwrap();
    let hash = store.get_admin_hash("admin").await.unwrap().unwrap();
    assert!(credentials::verify_password("hunter2", &hash));
}

#[tokio::test]
async fn legacy_database_is_upgraded_to_two_slots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    // A version-0 database: single TXT value and LastActive stamp live on the
    // account row, txt rows are ad hoc, and there is no db_version entry.
    let subdomains = ["one", "two", "three"];
    {
        let pool = raw_sqlite(&path).await;
        sqlx::query("CREATE TABLE acmedns(Name TEXT, Value TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE records(
                Username TEXT UNIQUE NOT NULL PRIMARY KEY,
                Password TEXT NOT NULL,
                Subdomain TEXT UNIQUE NOT NULL,
                Value TEXT,
                LastActive INT,
                AllowFrom TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE txt(Subdomain TEXT NOT NULL, Value TEXT NOT NULL DEFAULT '', LastUpdate INT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for (i, subdomain) in subdomains.iter().enumerate() {
            sqlx::query(
                "INSERT INTO records (Username, Password, Subdomain, Value, LastActive, AllowFrom)
                 values (?, ?, ?, ?, 0, '[]')",
            )
            .bind(format!("user-{i}"))
            .bind("hash")
            .bind(subdomain)
            .bind("stale-challenge-value")
            .execute(&pool)
            .await
            .unwrap();
        }
        // A stray single-slot row that the upgrade must sweep away.
        sqlx::query("INSERT INTO txt (Subdomain, Value, LastUpdate) values ('one', 'stale', 5)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let store = Store::init(Engine::Sqlite3, path.to_str().unwrap())
        .await
        .unwrap();
    store.close().await;

    let pool = raw_sqlite(&path).await;
    let version: String = sqlx::query("SELECT Value FROM acmedns WHERE Name='db_version'")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get(0);
    assert_eq!(version, "1");

    for subdomain in subdomains {
        let rows = sqlx::query("SELECT Value FROM txt WHERE Subdomain=?")
            .bind(subdomain)
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2, "expected two slots for {subdomain}");
        for row in rows {
            assert_eq!(row.get::<String, _>(0), "");
        }
    }

    // A second init is a no-op: still exactly two slots each.
    let store = Store::init(Engine::Sqlite3, path.to_str().unwrap())
        .await
        .unwrap();
    store.close().await;
    let count: i64 = sqlx::query("SELECT COUNT(*) FROM txt")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 6);
}

#[tokio::test]
async fn corrupt_address_values_fail_the_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.db");
    let store = Store::init(Engine::Sqlite3, path.to_str().unwrap())
        .await
        .unwrap();
    let account = store.register(&CidrList::default()).await.unwrap();

    let pool = raw_sqlite(&path).await;
    sqlx::query("INSERT INTO a (Subdomain, Value, LastUpdate) values (?, 'not-an-ip', 0)")
        .bind(&account.subdomain)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    assert!(store.get_a(&account.subdomain).await.is_err());
}
