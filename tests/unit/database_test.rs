//! Unit tests for the local storage layer — connection and migrations.

use stashed::database::{migrations, Database};
use tempfile::TempDir;

#[test]
fn test_open_in_memory_runs_migrations() {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    let version = migrations::get_schema_version(&db.connection());
    assert_eq!(version, migrations::CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_session_table_exists() {
    let db = Database::open_in_memory().unwrap();
    let count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM session", [], |row| row.get(0))
        .expect("session table should exist");
    assert_eq!(count, 0);
}

#[test]
fn test_legacy_saved_items_table_dropped() {
    // v1 created the local item cache; v2 drops it — saves live remotely.
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    let result = conn.prepare("SELECT id FROM saved_items LIMIT 0");
    assert!(result.is_err());
}

#[test]
fn test_migrations_idempotent_across_reopens() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("stashed.db");

    {
        let db = Database::open(&path).unwrap();
        assert_eq!(
            migrations::get_schema_version(&db.connection()),
            migrations::CURRENT_SCHEMA_VERSION
        );
    }

    // Reopening runs run_all again; versions are recorded once.
    let db = Database::open(&path).unwrap();
    assert_eq!(
        migrations::get_schema_version(&db.connection()),
        migrations::CURRENT_SCHEMA_VERSION
    );
    let rows: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, migrations::CURRENT_SCHEMA_VERSION as i64);
}

#[test]
fn test_session_row_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("stashed.db");

    {
        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO session (id, ciphertext, iv, auth_tag, updated_at) \
                 VALUES ('current', X'00', X'00', X'00', 1)",
                [],
            )
            .unwrap();
    }

    let db = Database::open(&path).unwrap();
    let count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM session", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
