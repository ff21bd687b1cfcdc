//! Connecting through the driver registry

#![cfg(feature = "sqlite")]

use easysql_drivers::{ConnectionSettings, DriverRegistry, Value};

#[tokio::test]
async fn test_sqlite_through_registry() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("registry.db");
    let settings = ConnectionSettings::sqlite(path.to_str().expect("utf-8 path"))
        .with_user("u")
        .with_param("busy_timeout", 250);

    let registry = DriverRegistry::with_defaults();
    let driver = registry.resolve(&settings)?;
    assert_eq!(driver.display_name(), "SQLite");

    let conn = driver.connect(&settings).await?;
    conn.query("create table widgets (name text)", &[]).await?;
    conn.query("insert into widgets (name) values (?)", &[Value::from("foo")])
        .await?;

    let result = conn.query("select name from widgets", &[]).await?;
    assert_eq!(result.first().and_then(|r| r.get(0)), Some(&Value::from("foo")));

    conn.close().await?;
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_invalid_busy_timeout_is_rejected() {
    let registry = DriverRegistry::with_defaults();
    let settings = ConnectionSettings::sqlite(":memory:").with_param("busy_timeout", "soon");

    let driver = registry.resolve(&settings).expect("sqlite registered");
    let err = driver.connect(&settings).await.err().expect("bad timeout");
    assert!(err.to_string().contains("busy_timeout"));
}
