//! Connection bootstrap for planner databases.
//!
//! # Invariants
//! - File databases use WAL journaling and get their parent directory
//!   created on first open.
//! - Returned connections are at [`super::migrations::latest_version`].

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating when missing) a planner database file.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    let opened = prepare_parent(path)
        .and_then(|()| Connection::open(path).map_err(DbError::from))
        .and_then(|mut conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            bootstrap(&mut conn)?;
            Ok(conn)
        });
    log_open("file", started_at, &opened);
    opened
}

/// Opens a throwaway in-memory planner database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    let opened = Connection::open_in_memory()
        .map_err(DbError::from)
        .and_then(|mut conn| {
            bootstrap(&mut conn)?;
            Ok(conn)
        });
    log_open("memory", started_at, &opened);
    opened
}

fn prepare_parent(path: &Path) -> DbResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|source| DbError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

fn bootstrap(conn: &mut Connection) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}

fn log_open(mode: &str, started_at: Instant, opened: &DbResult<Connection>) {
    let duration_ms = started_at.elapsed().as_millis();
    match opened {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode, duration_ms
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={} duration_ms={} error={}",
            mode, duration_ms, err
        ),
    }
}
