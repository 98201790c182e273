//! Relational Store Facade (component 4): the single gate between this
//! crate's core and the embedded SQLite database. Nothing outside this
//! module speaks `rusqlite` directly except the table manager and node
//! store preparing statements through [`Store::connection`].

use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::types::TypeTag;

const DEFAULT_MAX_COLUMNS_PER_TABLE: i64 = 2000;
const MAX_BUSY_RETRIES: u32 = 8;

/// An opened SQLite session. Owns exactly one [`rusqlite::Connection`] and
/// is not safe to share across threads, matching the single-writer model
/// of the subsystems built on top of it.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open `path`. The literal string `":memory:"` opens an in-memory
    /// database; any other path has `.sqlite` appended if it carries no
    /// recognised extension already.
    pub fn open(path: &str) -> Result<Store> {
        let resolved = Self::resolve_path(path);
        debug!(target: "graphstore::db::store", path = %resolved, "opening store");
        let conn = Connection::open(&resolved).map_err(|e| {
            error!(target: "graphstore::db::store", error = %e, path = %resolved, "failed to open store");
            Error::Backend(e)
        })?;
        conn.extended_result_codes_on().map_err(Error::Backend)?;
        let store = Store { conn };
        store.set_utf8()?;
        store.set_wal_journal()?;
        store.set_auto_vacuum(false)?;
        Ok(store)
    }

    fn resolve_path(path: &str) -> String {
        if path == ":memory:" {
            return path.to_string();
        }
        let has_extension = Path::new(path).extension().is_some();
        if has_extension {
            path.to_string()
        } else {
            format!("{path}.sqlite")
        }
    }

    /// Direct access to the underlying connection for the table manager
    /// and node store, which need to prepare and bind statements that this
    /// facade does not itself need to know the shape of.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn begin(&self) -> Result<()> {
        self.execute_update("BEGIN")
    }

    pub fn commit(&self) -> Result<()> {
        self.execute_update("COMMIT")
    }

    pub fn rollback(&self) -> Result<()> {
        self.execute_update("ROLLBACK")
    }

    /// Prepare, step once to completion, and finalise. Intended for DDL and
    /// single-shot statements, not hot INSERT loops.
    pub fn execute_update(&self, sql: &str) -> Result<()> {
        Store::retry_on_busy(|| self.conn.execute_batch(sql)).map_err(|e| {
            error!(target: "graphstore::db::store", error = %e, sql, "execute_update failed");
            Error::Backend(e)
        })
    }

    fn is_busy(e: &rusqlite::Error) -> bool {
        matches!(e, rusqlite::Error::SqliteFailure(inner, _) if inner.code == rusqlite::ErrorCode::DatabaseBusy)
    }

    /// Retry `op` while it fails with `SQLITE_BUSY`, up to
    /// [`MAX_BUSY_RETRIES`] attempts, matching estuary-flow's `dbutil`
    /// retry-on-busy loop. Any other error, or exhausting the retry budget,
    /// is returned immediately.
    pub fn retry_on_busy<T>(mut op: impl FnMut() -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if Self::is_busy(&e) && attempt < MAX_BUSY_RETRIES => {
                    attempt += 1;
                    debug!(target: "graphstore::db::store", attempt, "SQLITE_BUSY, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table_name],
                |_row| Ok(()),
            )
            .optional()
            .map_err(Error::Backend)?
            .is_some();
        Ok(exists)
    }

    pub fn build_table_info_sql(table_name: &str) -> String {
        format!("PRAGMA table_info('{table_name}')")
    }

    pub fn set_auto_vacuum(&self, enabled: bool) -> Result<()> {
        let mode = if enabled { "FULL" } else { "NONE" };
        self.execute_update(&format!("PRAGMA auto_vacuum = {mode}"))
    }

    pub fn set_synchronous_normal_or_off(&self, normal: bool) -> Result<()> {
        let mode = if normal { "NORMAL" } else { "OFF" };
        self.execute_update(&format!("PRAGMA synchronous = {mode}"))
    }

    pub fn set_utf8(&self) -> Result<()> {
        self.execute_update("PRAGMA encoding = 'UTF-8'")
    }

    pub fn set_wal_journal(&self) -> Result<()> {
        self.execute_update("PRAGMA journal_mode = WAL")
    }

    pub fn vacuum(&self) -> Result<()> {
        self.execute_update("VACUUM")
    }

    pub fn max_columns_per_table(&self) -> i64 {
        DEFAULT_MAX_COLUMNS_PER_TABLE
    }

    /// Bind one positional parameter according to its declared type tag
    /// rather than a typed enum at every call site, because
    /// [`materialize_column`] needs the inverse operation for runtime-typed
    /// columns, and the two are easiest to reason about side by side.
    pub fn bind_text_by_tag(
        stmt: &mut rusqlite::Statement<'_>,
        index: usize,
        tag: TypeTag,
        value: Option<&str>,
    ) -> Result<()> {
        use rusqlite::types::ToSqlOutput;

        let Some(text) = value else {
            stmt.raw_bind_parameter(index, rusqlite::types::Null)
                .map_err(Error::Backend)?;
            return Ok(());
        };

        let bound: ToSqlOutput = match tag {
            TypeTag::Blob => ToSqlOutput::from(text.as_bytes().to_vec()),
            TypeTag::Bool => {
                let b = text.eq_ignore_ascii_case("true");
                ToSqlOutput::from(if b { 1i64 } else { 0i64 })
            }
            TypeTag::Char | TypeTag::Text | TypeTag::Varchar => ToSqlOutput::from(text.to_string()),
            TypeTag::Datetime | TypeTag::Numeric => {
                let v: i64 = text
                    .parse()
                    .map_err(|_| Error::InvalidArgument(format!("not an i64: {text}")))?;
                ToSqlOutput::from(v)
            }
            TypeTag::Integer => {
                let v: i32 = text
                    .parse()
                    .map_err(|_| Error::InvalidArgument(format!("not an i32: {text}")))?;
                ToSqlOutput::from(v)
            }
            TypeTag::Double | TypeTag::Float | TypeTag::Real => {
                let v: f64 = text
                    .parse()
                    .map_err(|_| Error::InvalidArgument(format!("not an f64: {text}")))?;
                ToSqlOutput::from(v)
            }
            TypeTag::Null => ToSqlOutput::from(rusqlite::types::Null),
            TypeTag::Error => return Err(Error::InvalidArgument("ERROR type tag".into())),
        };
        stmt.raw_bind_parameter(index, bound).map_err(Error::Backend)?;
        Ok(())
    }

    /// Render one SQLite column value to its textual form per the node
    /// store's `get_id_list` materialisation rule: integer/float become
    /// decimal strings, text passes through, blob is Base64-encoded, and
    /// null is represented as `None` (skipped by the caller).
    pub fn materialize_column(row: &rusqlite::Row, idx: usize) -> Result<Option<String>> {
        use rusqlite::types::ValueRef;
        let value = row.get_ref(idx).map_err(Error::Backend)?;
        Ok(match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(f) => Some(f.to_string()),
            ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                b,
            )),
        })
    }
}

use rusqlite::OptionalExtension;
