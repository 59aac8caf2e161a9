use harvest_core::db::migrations::{latest_version, pending_migrations, schema_version};
use harvest_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn fresh_database_gets_plantation_columns_and_defaults() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert!(pending_migrations(&conn).unwrap().is_empty());
    assert_eq!(
        column_names(&conn, "plantations"),
        vec![
            "id",
            "owner_id",
            "name",
            "is_public",
            "document",
            "created_at",
            "updated_at"
        ]
    );

    conn.execute(
        "INSERT INTO plantations (id, owner_id, name) VALUES ('p', 'u', 'Garden');",
        [],
    )
    .unwrap();
    let (is_public, document, created_at): (i64, String, i64) = conn
        .query_row(
            "SELECT is_public, document, created_at FROM plantations WHERE id = 'p';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(is_public, 0);
    assert_eq!(document, "{}");
    assert!(created_at > 0);
}

#[test]
fn owner_index_lists_recently_updated_first() {
    let conn = open_db_in_memory().unwrap();

    let mut stmt = conn
        .prepare("PRAGMA index_xinfo('idx_plantations_owner');")
        .unwrap();
    let keys = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(5)?,
            ))
        })
        .unwrap()
        .map(Result::unwrap)
        .filter(|(_, _, key)| *key == 1)
        .map(|(name, desc, _)| (name.unwrap_or_default(), desc))
        .collect::<Vec<_>>();

    assert_eq!(
        keys,
        vec![("owner_id".to_string(), 0), ("updated_at".to_string(), 1)]
    );
}

#[test]
fn reopening_keeps_rows_from_an_earlier_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO plantations (id, owner_id, name, is_public) VALUES ('p', 'u', 'Garden', 1);",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert!(pending_migrations(&conn).unwrap().is_empty());
    let (name, is_public): (String, bool) = conn
        .query_row(
            "SELECT name, is_public FROM plantations WHERE id = 'p';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(name, "Garden");
    assert!(is_public);
}

#[test]
fn database_from_a_newer_build_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE shared_plans (id TEXT); PRAGMA user_version = 7;")
        .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedSchemaVersion {
            db_version: 7,
            latest_supported
        } if latest_supported == latest_version()
    ));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 7);
    let plantations: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'plantations';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(plantations, 0);
}

#[test]
fn opening_creates_missing_data_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner").join("data").join("harvest.db");

    let conn = open_db(&path).unwrap();
    assert!(path.exists());
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
}

#[test]
fn visibility_column_rejects_non_boolean_values() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO plantations (id, owner_id, name, is_public) VALUES ('p', 'u', 'n', 2);",
        [],
    );
    assert!(result.is_err());
}

fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}
