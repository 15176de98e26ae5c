//! SQLite-backed query source. Every vendor logbook handled here is a
//! SQLite file, opened read-only.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::error::ImportError;
use crate::source::{QuerySource, Row, Value};

/// Open a vendor logbook without ever writing to it.
pub fn open_logbook(path: impl AsRef<Path>) -> Result<Connection, ImportError> {
    let path = path.as_ref();
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|err| ImportError::Open {
        url: path.display().to_string(),
        message: err.to_string(),
    })
}

impl Row for rusqlite::Row<'_> {
    fn column_count(&self) -> usize {
        let stmt: &rusqlite::Statement<'_> = self.as_ref();
        stmt.column_count()
    }

    fn value(&self, index: usize) -> Value<'_> {
        match self.get_ref(index) {
            Ok(ValueRef::Null) | Err(_) => Value::Null,
            Ok(ValueRef::Integer(v)) => Value::Integer(v),
            Ok(ValueRef::Real(v)) => Value::Real(v),
            // Older logbooks store Latin-1 or Windows-1252 text.
            Ok(ValueRef::Text(bytes)) => Value::Text(String::from_utf8_lossy(bytes)),
            Ok(ValueRef::Blob(bytes)) => Value::Blob(bytes),
        }
    }
}

impl QuerySource for Connection {
    fn for_each_row(
        &self,
        sql: &str,
        on_row: &mut dyn FnMut(&dyn Row) -> Result<(), ImportError>,
    ) -> Result<(), ImportError> {
        let mut stmt = self.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            on_row(row)?;
        }
        Ok(())
    }
}

/// In-memory database created from `schema`, for tests.
#[cfg(test)]
pub(crate) fn memory_db(schema: &str) -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory database");
    conn.execute_batch(schema).expect("create test schema");
    conn
}
