//! Node Store (component 6): CRUD over the `m2m_node` table plus the
//! Nested Sets interval read/write path. This is the central core of the
//! graph engine; the graph facade is a thin shim over it.

use rusqlite::OptionalExtension;
use tracing::{debug, error};

use crate::db::store::Store;
use crate::error::{Error, Result};
use crate::graph::ident;

const TABLE_NAME: &str = "m2m_node";
const MAX_ID_COLLISION_RETRIES: u32 = 5;

/// A node's assigned Nested Sets interval, or `None` if unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub left: i64,
    pub right: i64,
}

fn ensure_table(store: &Store) -> Result<()> {
    if store.table_exists(TABLE_NAME)? {
        return Ok(());
    }
    store.begin()?;
    let result = store.execute_update(&format!(
        "CREATE TABLE {TABLE_NAME} (
            id       TEXT    PRIMARY KEY NOT NULL UNIQUE,
            name     TEXT,
            property TEXT,
            left     NUMERIC NOT NULL,
            right    NUMERIC NOT NULL
        )"
    ));
    match result {
        Ok(()) => {
            store.commit()?;
            debug!(target: "graphstore::graph::node_store", "bootstrapped m2m_node table");
            Ok(())
        }
        Err(e) => {
            store.rollback().ok();
            Err(e)
        }
    }
}

/// Create a new node with `name` (required, non-empty) and optional
/// `property`. Intervals start unassigned (`left = 0, right = 0`, the
/// sentinel the rest of this module and [`set_nested_sets_interval`]
/// recognise as "no interval"). Retries on a fresh random id up to
/// [`MAX_ID_COLLISION_RETRIES`] times if the id happens to collide.
pub fn add_node(store: &Store, name: &str, property: Option<&str>) -> Option<String> {
    if name.is_empty() {
        error!(target: "graphstore::graph::node_store", "add_node: name must not be empty");
        return None;
    }
    if let Err(e) = ensure_table(store) {
        error!(target: "graphstore::graph::node_store", error = %e, "add_node: failed to ensure table exists");
        return None;
    }

    for attempt in 0..=MAX_ID_COLLISION_RETRIES {
        let id = ident::generate();
        match try_insert(store, &id, name, property) {
            Ok(true) => return Some(id),
            Ok(false) => {
                debug!(target: "graphstore::graph::node_store", id, attempt, "id collision, retrying");
                continue;
            }
            Err(e) => {
                error!(target: "graphstore::graph::node_store", error = %e, "add_node: insert failed");
                return None;
            }
        }
    }
    error!(target: "graphstore::graph::node_store", "add_node: exhausted id collision retries");
    None
}

/// Returns `Ok(true)` on success, `Ok(false)` on a unique-constraint
/// collision (caller should retry with a new id), `Err` on any other
/// backend failure.
fn try_insert(store: &Store, id: &str, name: &str, property: Option<&str>) -> Result<bool> {
    store.begin()?;
    let outcome = Store::retry_on_busy(|| {
        store.connection().execute(
            "INSERT INTO m2m_node (id, name, property, left, right) VALUES (?1, ?2, ?3, 0, 0)",
            rusqlite::params![id, name, property],
        )
    });
    match outcome {
        Ok(_) => {
            store.commit()?;
            Ok(true)
        }
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            store.rollback().ok();
            Ok(false)
        }
        Err(e) => {
            store.rollback().ok();
            Err(Error::Backend(e))
        }
    }
}

pub fn delete_node(store: &Store, id: &str) -> Result<()> {
    Store::retry_on_busy(|| store.connection().execute("DELETE FROM m2m_node WHERE id = ?1", [id]))
        .map_err(Error::Backend)?;
    Ok(())
}

pub fn get_id(store: &Store, name: &str) -> Option<String> {
    store
        .connection()
        .query_row("SELECT id FROM m2m_node WHERE name = ?1", [name], |row| {
            row.get::<_, String>(0)
        })
        .optional()
        .ok()
        .flatten()
}

pub fn get_name(store: &Store, id: &str) -> Option<String> {
    store
        .connection()
        .query_row("SELECT name FROM m2m_node WHERE id = ?1", [id], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()
        .ok()
        .flatten()
        .flatten()
}

pub fn get_property(store: &Store, id: &str) -> Option<String> {
    store
        .connection()
        .query_row("SELECT property FROM m2m_node WHERE id = ?1", [id], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()
        .ok()
        .flatten()
        .flatten()
}

/// All node ids, ordered by name ascending, materialised per the runtime
/// type of the `id` column (always `TEXT` here, but the materialisation
/// rule is shared with any future caller of the store facade's generic
/// column reader).
pub fn get_id_list(store: &Store) -> Result<Vec<String>> {
    let conn = store.connection();
    let mut stmt = conn
        .prepare("SELECT id FROM m2m_node ORDER BY name ASC")
        .map_err(Error::Backend)?;
    let mut rows = stmt.query([]).map_err(Error::Backend)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(Error::Backend)? {
        if let Some(value) = Store::materialize_column(row, 0)? {
            out.push(value);
        }
    }
    Ok(out)
}

/// Read a node's current interval, or `None` if unassigned or the node
/// does not exist.
pub fn get_interval(store: &Store, id: &str) -> Option<Interval> {
    store
        .connection()
        .query_row(
            "SELECT left, right FROM m2m_node WHERE id = ?1",
            [id],
            |row| {
                let left: Option<i64> = row.get(0)?;
                let right: Option<i64> = row.get(1)?;
                Ok(match (left, right) {
                    (Some(left), Some(right)) if left != 0 || right != 0 => {
                        Some(Interval { left, right })
                    }
                    _ => None,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
        .flatten()
}

/// Write (or reset) a node's interval.
///
/// - `left > 0 && right > 0 && left != right`: assign the interval.
/// - `left == 0 && right == 0`: reset to unassigned.
/// - anything else: rejected, row untouched.
///
/// This function does **not** enforce the forest-wide disjoint/containment
/// invariant on the new endpoints — that is the caller's responsibility
/// (the graph facade's `connect`, which computes consistent endpoints
/// before calling this).
pub fn set_nested_sets_interval(
    store: &Store,
    id: &str,
    left: i64,
    right: i64,
) -> Option<String> {
    let valid_assign = left > 0 && right > 0 && left != right;
    let valid_reset = left == 0 && right == 0;
    if !valid_assign && !valid_reset {
        return None;
    }
    let updated = Store::retry_on_busy(|| {
        store.connection().execute(
            "UPDATE m2m_node SET left = ?1, right = ?2 WHERE id = ?3",
            rusqlite::params![left, right, id],
        )
    })
    .ok()?;
    if updated == 0 {
        return None;
    }
    Some(id.to_string())
}

/// Shift every row's `left`/`right` endpoint at or beyond `threshold` by
/// `delta`. Used by [`crate::graph::facade::connect`] to open or close a
/// gap in the Nested Sets encoding. Rows with a negative `left` (see
/// [`negate_subtree`]) are never matched, since `threshold` is always
/// positive in this module's call sites.
pub fn shift_intervals_at_or_after(store: &Store, threshold: i64, delta: i64) -> Result<()> {
    Store::retry_on_busy(|| {
        store.connection().execute(
            "UPDATE m2m_node SET left = left + ?1 WHERE left != 0 AND left >= ?2",
            rusqlite::params![delta, threshold],
        )
    })
    .map_err(Error::Backend)?;
    Store::retry_on_busy(|| {
        store.connection().execute(
            "UPDATE m2m_node SET right = right + ?1 WHERE right != 0 AND right >= ?2",
            rusqlite::params![delta, threshold],
        )
    })
    .map_err(Error::Backend)?;
    Ok(())
}

/// The largest `right` endpoint currently assigned, or `0` if no row has
/// an assigned interval. Used to allocate a disjoint range for a brand
/// new root when connecting two nodes that are both currently unrooted.
pub fn max_right(store: &Store) -> Result<i64> {
    let max: Option<i64> = store
        .connection()
        .query_row(
            "SELECT MAX(right) FROM m2m_node WHERE right != 0",
            [],
            |row| row.get(0),
        )
        .map_err(Error::Backend)?;
    Ok(max.unwrap_or(0))
}

/// Temporarily negate the interval of every row strictly within
/// `[left, right]` (the subtree rooted at an about-to-move node,
/// inclusive of the node itself) so that subsequent calls to
/// [`shift_intervals_at_or_after`] skip it while the surrounding forest is
/// rewritten. Paired with [`restore_subtree_at`].
pub fn negate_subtree(store: &Store, left: i64, right: i64) -> Result<()> {
    Store::retry_on_busy(|| {
        store.connection().execute(
            "UPDATE m2m_node SET left = -left, right = -right \
             WHERE left != 0 AND right != 0 AND left >= ?1 AND right <= ?2",
            rusqlite::params![left, right],
        )
    })
    .map_err(Error::Backend)?;
    Ok(())
}

/// Restore every negated row (see [`negate_subtree`]) to a positive
/// interval shifted by `offset`, completing a subtree move.
pub fn restore_subtree_at(store: &Store, offset: i64) -> Result<()> {
    Store::retry_on_busy(|| {
        store.connection().execute(
            "UPDATE m2m_node SET left = -left + ?1, right = -right + ?1 WHERE left < 0",
            rusqlite::params![offset],
        )
    })
    .map_err(Error::Backend)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open(":memory:").unwrap()
    }

    #[test]
    fn add_node_then_read_back() {
        let s = store();
        let id = add_node(&s, "root", None).unwrap();
        assert_eq!(id.len(), 8);
        assert_eq!(get_name(&s, &id).as_deref(), Some("root"));
        assert_eq!(get_property(&s, &id), None);
        assert_eq!(get_id(&s, "root").as_deref(), Some(id.as_str()));
    }

    #[test]
    fn add_node_rejects_empty_name() {
        let s = store();
        assert!(add_node(&s, "", None).is_none());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let s = store();
        ensure_table(&s).unwrap();
        ensure_table(&s).unwrap();
        assert!(s.table_exists("m2m_node").unwrap());
    }

    #[test]
    fn interval_assignment_and_reset() {
        let s = store();
        let id = add_node(&s, "a", Some("v1")).unwrap();
        assert_eq!(
            set_nested_sets_interval(&s, &id, 1, 4).as_deref(),
            Some(id.as_str())
        );
        assert_eq!(get_interval(&s, &id), Some(Interval { left: 1, right: 4 }));

        assert_eq!(
            set_nested_sets_interval(&s, &id, 0, 0).as_deref(),
            Some(id.as_str())
        );
        assert_eq!(get_interval(&s, &id), None);
    }

    #[test]
    fn interval_rejects_invalid_endpoints() {
        let s = store();
        let id = add_node(&s, "a", None).unwrap();
        for (l, r) in [(5, 5), (-1, 4), (4, -1), (0, 4), (4, 0)] {
            assert!(set_nested_sets_interval(&s, &id, l, r).is_none());
        }
        assert_eq!(get_interval(&s, &id), None);
    }

    #[test]
    fn get_id_list_orders_by_name() {
        let s = store();
        add_node(&s, "charlie", None).unwrap();
        add_node(&s, "alice", None).unwrap();
        add_node(&s, "bob", None).unwrap();
        let names: Vec<String> = get_id_list(&s)
            .unwrap()
            .iter()
            .map(|id| get_name(&s, id).unwrap())
            .collect();
        assert_eq!(names, vec!["alice", "bob", "charlie"]);
    }

    #[test]
    fn delete_node_removes_only_target_row() {
        let s = store();
        let a = add_node(&s, "a", None).unwrap();
        let b = add_node(&s, "b", None).unwrap();
        delete_node(&s, &a).unwrap();
        assert_eq!(get_name(&s, &a), None);
        assert_eq!(get_name(&s, &b).as_deref(), Some("b"));
    }
}
