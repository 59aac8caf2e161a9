//! Plantation schema steps.
//!
//! Steps run in version order, each in its own transaction together with
//! the `user_version` bump, so an interrupted upgrade resumes at the first
//! step that did not commit.
//!
//! Only table layout lives here. Legacy shapes inside the stored JSON
//! document are upgraded on load by [`crate::migration`].

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

/// One named schema step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStep {
    pub version: u32,
    pub name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "plantations",
        sql: include_str!("0001_plantations.sql"),
    },
    SchemaStep {
        version: 2,
        name: "owner_index",
        sql: include_str!("0002_owner_index.sql"),
    },
];

/// Schema version written by the last known step.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Steps not yet applied to `conn`, in the order they would run.
pub fn pending_migrations(conn: &Connection) -> DbResult<Vec<SchemaStep>> {
    let current = schema_version(conn)?;
    ensure_supported(current)?;
    Ok(STEPS
        .iter()
        .filter(|step| step.version > current)
        .copied()
        .collect())
}

/// Brings `conn` up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let pending = pending_migrations(conn)?;

    for step in &pending {
        if let Err(source) = apply_step(conn, step) {
            error!(
                "event=db_migrate module=db status=error version={} step={} error={}",
                step.version, step.name, source
            );
            return Err(DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            });
        }
        info!(
            "event=db_migrate module=db status=step version={} step={}",
            step.version, step.name
        );
    }

    if !pending.is_empty() {
        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={}",
            from_version,
            latest_version()
        );
    }
    Ok(())
}

/// Schema version stored in `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

fn apply_step(conn: &mut Connection, step: &SchemaStep) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", step.version)?;
    tx.commit()
}

fn ensure_supported(version: u32) -> DbResult<()> {
    let latest = latest_version();
    if version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: version,
            latest_supported: latest,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, pending_migrations, schema_version, STEPS};
    use rusqlite::Connection;

    #[test]
    fn step_versions_increase_by_one() {
        for (index, step) in STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
    }

    #[test]
    fn fresh_database_has_every_step_pending() {
        let conn = Connection::open_in_memory().unwrap();
        let pending = pending_migrations(&conn)
            .unwrap()
            .into_iter()
            .map(|step| step.name)
            .collect::<Vec<_>>();
        assert_eq!(pending, vec!["plantations", "owner_index"]);
    }

    #[test]
    fn partially_upgraded_database_resumes() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("0001_plantations.sql"))
            .unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        let pending = pending_migrations(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version, 2);

        apply_migrations(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        assert!(pending_migrations(&conn).unwrap().is_empty());
    }
}
