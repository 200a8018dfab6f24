//! Ordered schema steps for the graph store.
//!
//! The schema version lives in `PRAGMA user_version`. Steps above the stored
//! version run in one transaction, and the version is bumped after each step.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// Schema step `version` brings the store from `version - 1` to `version`.
struct SchemaStep {
    version: u32,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    sql: include_str!("0001_graph.sql"),
}];

/// Schema version produced by running every step.
pub const SCHEMA_VERSION: u32 = 1;

/// Brings the store up to [`SCHEMA_VERSION`].
///
/// # Errors
/// - `SchemaTooNew` when the store is ahead of this build.
pub fn migrate(conn: &mut Connection) -> DbResult<()> {
    let found = stored_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(DbError::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    let mut pending = STEPS.iter().filter(|step| step.version > found).peekable();
    if pending.peek().is_none() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;
    Ok(())
}

/// Schema version recorded in the store.
pub fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
