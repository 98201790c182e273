//! Graph Facade (component 7): owns one database handle and exposes
//! `add_node`/`connect` over the node store.

use std::path::Path;
use tracing::{debug, error};

use crate::db::store::Store;
use crate::error::{Error, Result};
use crate::graph::node_store::{self, Interval};

/// Owns a path string and a lazily-opened database handle for the
/// lifetime of the facade. Construction validates the path but does not
/// open the database; [`GraphFacade::database`] opens-on-first-use.
pub struct GraphFacade {
    path: String,
    db: Option<Store>,
}

impl GraphFacade {
    pub fn new(path: &str) -> Option<GraphFacade> {
        if path.is_empty() {
            error!(target: "graphstore::graph::facade", "GraphFacade::new: path must not be empty");
            return None;
        }
        let resolved = if path == ":memory:" || Path::new(path).extension().is_some() {
            path.to_string()
        } else {
            format!("{path}.sqlite")
        };
        Some(GraphFacade { path: resolved, db: None })
    }

    /// Open-on-first-use; subsequent calls reuse the cached handle.
    pub fn database(&mut self) -> Result<&Store> {
        if self.db.is_none() {
            debug!(target: "graphstore::graph::facade", path = %self.path, "opening graph database");
            self.db = Some(Store::open(&self.path)?);
        }
        Ok(self.db.as_ref().unwrap())
    }

    /// Release the cached handle. Safe to call on a facade that never
    /// opened a database.
    pub fn close(&mut self) {
        self.db = None;
    }

    pub fn add_node(&mut self, name: &str, property: Option<&str>) -> Option<String> {
        let db = self.database().ok()?;
        node_store::add_node(db, name, property)
    }

    pub fn delete_node(&mut self, id: &str) -> Result<()> {
        let db = self.database()?;
        node_store::delete_node(db, id)
    }

    pub fn get_id(&mut self, name: &str) -> Option<String> {
        let db = self.database().ok()?;
        node_store::get_id(db, name)
    }

    pub fn get_name(&mut self, id: &str) -> Option<String> {
        let db = self.database().ok()?;
        node_store::get_name(db, id)
    }

    pub fn get_property(&mut self, id: &str) -> Option<String> {
        let db = self.database().ok()?;
        node_store::get_property(db, id)
    }

    /// Connect `one_id` (parent) and `other_id` (child) with an edge,
    /// maintaining the Nested Sets invariants for every other row with an
    /// assigned interval.
    ///
    /// Implements "insert at rightmost child": a gap the width of the
    /// incoming subtree is opened immediately before the parent's closing
    /// bound, every endpoint at or beyond the gap is shifted right to make
    /// room, and the subtree is assigned the freed range. If `other_id`
    /// already has an interval (re-parenting), its whole subtree — the
    /// node and every descendant nested inside it — is detached first:
    /// negated so the collapse below skips it, the gap it vacated is
    /// closed, and once the new gap is open the negated rows are restored
    /// shifted into their new coordinates, preserving every descendant's
    /// relative nesting. If `one_id` has no interval either, it is seeded
    /// as a fresh root in a range disjoint from every existing tree.
    pub fn connect(&mut self, one_id: &str, other_id: &str) -> Result<()> {
        let db = self.database()?;
        if one_id.is_empty() || other_id.is_empty() {
            return Err(Error::InvalidArgument("node ids must not be empty".into()));
        }
        if one_id == other_id {
            return Err(Error::InvalidArgument("cannot connect a node to itself".into()));
        }

        db.begin()?;
        let result = Self::connect_locked(db, one_id, other_id);
        match result {
            Ok(()) => {
                db.commit()?;
                Ok(())
            }
            Err(e) => {
                db.rollback().ok();
                Err(e)
            }
        }
    }

    fn connect_locked(db: &Store, one_id: &str, other_id: &str) -> Result<()> {
        let child_interval = node_store::get_interval(db, other_id);

        // Detach the child's existing subtree first, if it has one, so the
        // gap it frees does not overlap with the gap we are about to open
        // for its re-insertion. The subtree is negated rather than moved
        // outright so it is invisible to the collapse below, then restored
        // in one shifted pass once the new gap has been opened.
        let subtree_width = if let Some(old) = child_interval {
            let width = old.right - old.left + 1;
            node_store::negate_subtree(db, old.left, old.right)?;
            node_store::shift_intervals_at_or_after(db, old.right + 1, -width)?;
            width
        } else {
            2
        };

        let parent = match node_store::get_interval(db, one_id) {
            Some(interval) => interval,
            None => {
                // `one_id` has no interval yet: seed it as a fresh root in
                // a range past every currently assigned interval, so it
                // cannot overlap an existing tree in the forest.
                let base = node_store::max_right(db)?;
                node_store::set_nested_sets_interval(db, one_id, base + 1, base + 2)
                    .ok_or_else(|| Error::SchemaMismatch(format!("node {one_id} not found")))?;
                Interval { left: base + 1, right: base + 2 }
            }
        };

        let gap = parent.right;
        node_store::shift_intervals_at_or_after(db, gap, subtree_width)?;

        match child_interval {
            Some(old) => {
                let offset = gap - old.left;
                node_store::restore_subtree_at(db, offset)?;
            }
            None => {
                let child_left = gap;
                let child_right = gap + subtree_width - 1;
                node_store::set_nested_sets_interval(db, other_id, child_left, child_right)
                    .ok_or_else(|| Error::SchemaMismatch(format!("node {other_id} not found")))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_seeds_root_and_child() {
        let mut facade = GraphFacade::new(":memory:").unwrap();
        let a = facade.add_node("a", Some("v1")).unwrap();
        let b = facade.add_node("b", None).unwrap();

        facade.connect(&a, &b).unwrap();

        let db = facade.database().unwrap();
        let pa = node_store::get_interval(db, &a).unwrap();
        let pb = node_store::get_interval(db, &b).unwrap();
        assert!(pa.left < pb.left && pb.right < pa.right, "b must nest inside a");
    }

    #[test]
    fn connect_multiple_children_stay_disjoint_or_nested() {
        let mut facade = GraphFacade::new(":memory:").unwrap();
        let root = facade.add_node("root", None).unwrap();
        let c1 = facade.add_node("c1", None).unwrap();
        let c2 = facade.add_node("c2", None).unwrap();
        let c3 = facade.add_node("c3", None).unwrap();

        facade.connect(&root, &c1).unwrap();
        facade.connect(&root, &c2).unwrap();
        facade.connect(&c1, &c3).unwrap();

        let db = facade.database().unwrap();
        let ids = [&root, &c1, &c2, &c3];
        let intervals: Vec<Interval> = ids
            .iter()
            .map(|id| node_store::get_interval(db, id).unwrap())
            .collect();

        for i in 0..intervals.len() {
            for j in (i + 1)..intervals.len() {
                let a = intervals[i];
                let b = intervals[j];
                let disjoint = a.right < b.left || b.right < a.left;
                let nested = (a.left < b.left && b.right < a.right)
                    || (b.left < a.left && a.right < b.right);
                assert!(disjoint || nested, "{a:?} and {b:?} must be disjoint or nested");
            }
        }

        let pc3 = node_store::get_interval(db, &c3).unwrap();
        let pc1 = node_store::get_interval(db, &c1).unwrap();
        assert!(pc1.left < pc3.left && pc3.right < pc1.right);
    }

    #[test]
    fn reparenting_preserves_subtree_width() {
        let mut facade = GraphFacade::new(":memory:").unwrap();
        let root_a = facade.add_node("root_a", None).unwrap();
        let root_b = facade.add_node("root_b", None).unwrap();
        let child = facade.add_node("child", None).unwrap();
        let grandchild = facade.add_node("grandchild", None).unwrap();

        facade.connect(&root_a, &child).unwrap();
        facade.connect(&child, &grandchild).unwrap();

        // Re-parent `child` (with its grandchild still attached) under root_b.
        facade.connect(&root_b, &child).unwrap();

        let db = facade.database().unwrap();
        let pchild = node_store::get_interval(db, &child).unwrap();
        let pgrand = node_store::get_interval(db, &grandchild).unwrap();
        let proot_b = node_store::get_interval(db, &root_b).unwrap();

        assert!(proot_b.left < pchild.left && pchild.right < proot_b.right);
        assert!(pchild.left < pgrand.left && pgrand.right < pchild.right);
    }

    #[test]
    fn connect_rejects_empty_or_self_ids() {
        let mut facade = GraphFacade::new(":memory:").unwrap();
        let a = facade.add_node("a", None).unwrap();
        assert!(facade.connect("", &a).is_err());
        assert!(facade.connect(&a, &a).is_err());
    }
}
