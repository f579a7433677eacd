//! Graph store bootstrap.
//!
//! The whole conversation graph lives in one SQLite database:
//!
//! - `nodes` holds conversations and messages side by side, told apart by the
//!   `type` column. Messages also carry their text and, once the background
//!   worker has run, an `embedding` blob of little-endian `f32`s.
//! - `edges` holds directed, typed links (`HAS_MESSAGE` today). Both ends
//!   reference `nodes(id)` with `ON DELETE CASCADE`, so every connection must
//!   run with `foreign_keys` on or deleted nodes leave dangling edges.
//!
//! sqlite-vec is registered as an auto extension before any connection is
//! opened so that `vec_distance_cosine` can rank embedding blobs in plain SQL.

pub mod migrations;
pub mod schema;

use std::path::Path;
use std::sync::Once;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;

static VECTOR_FUNCTIONS: Once = Once::new();

/// Make sqlite-vec's SQL functions available on every connection opened from
/// now on. Idempotent.
pub fn register_vector_functions() {
    VECTOR_FUNCTIONS.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the graph store at `path`.
///
/// Missing parent directories are created. The file runs in WAL mode so the
/// API's readers are not blocked by the embedding worker's writes.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    register_vector_functions();
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open graph store at {}", path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let conn = ready(conn)?;
    let (nodes, edges) = graph_size(&conn)?;
    tracing::info!(path = %path.display(), nodes, edges, "graph store ready");
    Ok(conn)
}

/// A private, empty graph store that vanishes with the connection.
pub fn open_memory_database() -> Result<Connection> {
    register_vector_functions();
    let conn = Connection::open_in_memory().context("failed to open in-memory graph store")?;
    ready(conn)
}

/// Turn on edge cascades and bring the tables up to the current schema.
fn ready(conn: Connection) -> Result<Connection> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to create graph tables")?;
    migrations::run_migrations(&conn).context("failed to migrate graph store")?;
    Ok(conn)
}

/// Node and edge counts, for the startup log line.
fn graph_size(conn: &Connection) -> Result<(i64, i64)> {
    let size = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM nodes), (SELECT COUNT(*) FROM edges)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(size)
}
