//! Primary-key allocation
//!
//! Most tables draw keys from a named sequence before inserting; LIKES lets
//! the database generate the key and reads it back afterwards.

use rusqlite::{Connection, OptionalExtension};
use crate::{Error, Result};

/// How an entity type obtains a new primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Fetch the next value of the named sequence before the insert
    Sequence(&'static str),
    /// Let the insert generate the key, then read it back
    Generated,
}

impl KeyStrategy {
    /// Key to bind into the insert statement, if known up front
    pub fn allocate(&self, conn: &Connection) -> Result<Option<i64>> {
        match self {
            KeyStrategy::Sequence(name) => next_value(conn, name).map(Some),
            KeyStrategy::Generated => Ok(None),
        }
    }

    /// Final key of the row just inserted on `conn`
    pub fn resolve(&self, conn: &Connection, allocated: Option<i64>) -> i64 {
        match (self, allocated) {
            (KeyStrategy::Sequence(_), Some(id)) => id,
            _ => conn.last_insert_rowid(),
        }
    }
}

/// Advance a sequence and return its new value.
///
/// The increment belongs to the caller's transaction and is undone with it.
pub fn next_value(conn: &Connection, name: &'static str) -> Result<i64> {
    conn.query_row(
        "UPDATE SEQUENCES SET next_value = next_value + 1 WHERE name = ?1 RETURNING next_value",
        [name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(Error::UnknownSequence(name))
}
