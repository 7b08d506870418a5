//! Forward-only cursor over spatial index results.
//!
//! Keys come from a map scan; rows are only materialized when asked for, via
//! the table and the session that opened the cursor. The cursor is single pass:
//! query the index again to restart.

use crate::error::{Result, SpatialError};
use crate::key::SpatialKey;
use crate::map::KeyIter;
use crate::table::{Session, Table};
use crate::value::Row;

pub struct SpatialCursor<'a> {
    keys: KeyIter,
    current: Option<SpatialKey>,
    table: &'a dyn Table,
    session: &'a dyn Session,
}

impl<'a> SpatialCursor<'a> {
    pub fn new(keys: KeyIter, table: &'a dyn Table, session: &'a dyn Session) -> Self {
        Self {
            keys,
            current: None,
            table,
            session,
        }
    }

    /// Move to the next key. Returns `false` once exhausted.
    pub fn advance(&mut self) -> bool {
        self.current = self.keys.next();
        self.current.is_some()
    }

    /// Key the cursor is positioned on.
    pub fn current_key(&self) -> Option<&SpatialKey> {
        self.current.as_ref()
    }

    /// Row for the current key.
    pub fn current(&self) -> Result<Row> {
        let key = self.current.as_ref().ok_or_else(|| {
            SpatialError::integrity(format!(
                "cursor on {} is not positioned on a row",
                self.table.name()
            ))
        })?;
        self.table.get_row(self.session, key.row_id())
    }

    /// Same as [`current`](Self::current); rows double as search rows.
    pub fn search_row(&self) -> Result<Row> {
        self.current()
    }

    /// Backward iteration is not supported.
    pub fn previous(&mut self) -> bool {
        false
    }
}

impl Iterator for SpatialCursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            Some(self.current())
        } else {
            None
        }
    }
}

impl std::fmt::Debug for SpatialCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialCursor")
            .field("table", &self.table.name())
            .field("session", &self.session.id())
            .field("current", &self.current)
            .finish()
    }
}
