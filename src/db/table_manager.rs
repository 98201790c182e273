//! Table Manager (component 5): a sequence of table descriptors that can
//! idempotently issue `CREATE TABLE` for each one against a [`Store`].

use tracing::{debug, error};

use crate::db::column::ColumnList;
use crate::db::store::Store;
use crate::error::Result;

struct TableDescriptor {
    table_name: String,
    columns: ColumnList,
}

/// Owns the whole schema of a database as an ordered sequence of
/// `(table_name, column_list)` descriptors.
#[derive(Default)]
pub struct TableManager {
    tables: Vec<TableDescriptor>,
}

impl TableManager {
    pub fn new() -> TableManager {
        TableManager { tables: Vec::new() }
    }

    /// Register a table descriptor. Table names are not deduplicated here;
    /// callers that register the same name twice get two `CREATE TABLE`
    /// attempts, the second of which `create_all_tables` will skip once the
    /// first one exists.
    pub fn add_table(&mut self, table_name: impl Into<String>, columns: ColumnList) {
        self.tables.push(TableDescriptor {
            table_name: table_name.into(),
            columns,
        });
    }

    pub fn find_column_list(&self, table_name: &str) -> Option<&ColumnList> {
        self.tables
            .iter()
            .find(|t| t.table_name == table_name)
            .map(|t| &t.columns)
    }

    /// Walk the sequence from the head, issuing `CREATE TABLE` for every
    /// descriptor whose name does not already exist. A transaction is
    /// opened before the first `CREATE` issued by this call and committed
    /// once at the end, regardless of whether individual `CREATE`
    /// statements failed along the way (best-effort policy, see
    /// `DESIGN.md` open-question decision 2).
    pub fn create_all_tables(&self, store: &Store) -> Result<()> {
        let mut transaction_open = false;
        for table in &self.tables {
            if store.table_exists(&table.table_name)? {
                continue;
            }
            if !transaction_open {
                store.begin()?;
                transaction_open = true;
            }
            let sql = format!(
                "CREATE TABLE '{}' ({})",
                table.table_name,
                table.columns.to_sql_clause()
            );
            match store.execute_update(&sql) {
                Ok(()) => {
                    debug!(target: "graphstore::db::table_manager", table = %table.table_name, "created table");
                }
                Err(e) => {
                    error!(target: "graphstore::db::table_manager", table = %table.table_name, error = %e, "failed to create table, continuing");
                }
            }
        }
        if transaction_open {
            store.commit()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::column::ColumnDescriptor;
    use crate::types::TypeTag;

    fn sample_columns() -> ColumnList {
        let mut cols = ColumnList::new();
        cols.append(
            ColumnDescriptor::new("id", TypeTag::Integer)
                .unwrap()
                .set_primary_key(true)
                .set_nullable(false),
        );
        cols.append(ColumnDescriptor::new("name", TypeTag::Text).unwrap());
        cols
    }

    #[test]
    fn creates_missing_tables_and_is_idempotent() {
        let store = Store::open(":memory:").unwrap();
        let mut mgr = TableManager::new();
        mgr.add_table("widgets", sample_columns());

        mgr.create_all_tables(&store).unwrap();
        assert!(store.table_exists("widgets").unwrap());

        // Second call observes the table as existing and does nothing.
        mgr.create_all_tables(&store).unwrap();
        assert!(store.table_exists("widgets").unwrap());
    }

    #[test]
    fn find_column_list_is_exact_match() {
        let mut mgr = TableManager::new();
        mgr.add_table("widgets", sample_columns());
        assert!(mgr.find_column_list("widgets").is_some());
        assert!(mgr.find_column_list("gadgets").is_none());
    }
}
