//! Bookkeeping of the ties a model creates.
//!
//! A [`TieSet`] remembers every tie made through it, keyed by [`TieId`], and
//! removes exactly those ties on [`TieSet::untie_all`] or when dropped. A tie
//! that was already removed by someone else (for example the executive's
//! leaf sweep) or replaced by a newer tie is left alone.

use std::cell::Cell;
use std::rc::Rc;

use crate::tree::{Binding, PropertyNode, TieId};
use crate::PropertyError;

/// The set of ties owned by one model.
#[derive(Debug, Default)]
pub struct TieSet {
    ties: Vec<(PropertyNode, TieId)>,
}

impl TieSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tie `path` (relative to `base`) to an arbitrary binding.
    pub fn tie(
        &mut self,
        base: &PropertyNode,
        path: &str,
        binding: Binding,
    ) -> Result<PropertyNode, PropertyError> {
        let (node, id) = base.tie_at(path, binding)?;
        tracing::trace!(path = %node.fully_qualified_name(), "tied property");
        self.ties.push((node.clone(), id));
        Ok(node)
    }

    /// Tie to a shared numeric cell.
    pub fn tie_value(
        &mut self,
        base: &PropertyNode,
        path: &str,
        cell: &Rc<Cell<f64>>,
    ) -> Result<PropertyNode, PropertyError> {
        self.tie(base, path, Binding::Value(Rc::clone(cell)))
    }

    /// Tie to a boolean cell. Reads give `0.0`/`1.0`; any nonzero write is `true`.
    pub fn tie_flag(
        &mut self,
        base: &PropertyNode,
        path: &str,
        cell: &Rc<Cell<bool>>,
    ) -> Result<PropertyNode, PropertyError> {
        let get = Rc::clone(cell);
        let set = Rc::clone(cell);
        self.tie(
            base,
            path,
            Binding::accessors(
                move || if get.get() { 1.0 } else { 0.0 },
                move |v| set.set(v != 0.0),
            ),
        )
    }

    /// Tie to an integer cell. Writes truncate toward zero.
    pub fn tie_int(
        &mut self,
        base: &PropertyNode,
        path: &str,
        cell: &Rc<Cell<i32>>,
    ) -> Result<PropertyNode, PropertyError> {
        let get = Rc::clone(cell);
        let set = Rc::clone(cell);
        self.tie(
            base,
            path,
            Binding::accessors(move || f64::from(get.get()), move |v| set.set(v as i32)),
        )
    }

    /// Tie to a getter with no setter.
    pub fn tie_read_only(
        &mut self,
        base: &PropertyNode,
        path: &str,
        get: impl Fn() -> f64 + 'static,
    ) -> Result<PropertyNode, PropertyError> {
        self.tie(base, path, Binding::read_only(get))
    }

    /// Tie to a setter with no getter.
    pub fn tie_write_only(
        &mut self,
        base: &PropertyNode,
        path: &str,
        set: impl Fn(f64) + 'static,
    ) -> Result<PropertyNode, PropertyError> {
        self.tie(base, path, Binding::write_only(set))
    }

    pub fn tie_accessors(
        &mut self,
        base: &PropertyNode,
        path: &str,
        get: impl Fn() -> f64 + 'static,
        set: impl Fn(f64) + 'static,
    ) -> Result<PropertyNode, PropertyError> {
        self.tie(base, path, Binding::accessors(get, set))
    }

    /// Number of ties recorded (including ones already removed externally).
    pub fn len(&self) -> usize {
        self.ties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ties.is_empty()
    }

    /// Remove every tie this set still owns, newest first. Returns how many
    /// were actually removed.
    pub fn untie_all(&mut self) -> usize {
        let mut removed = 0;
        while let Some((node, id)) = self.ties.pop() {
            if node.untie_matching(id) {
                removed += 1;
            }
        }
        removed
    }
}

impl Drop for TieSet {
    fn drop(&mut self) {
        self.untie_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::PropertyManager;

    #[test]
    fn flag_and_int_conversions() {
        let root = PropertyManager::new().root();
        let flag = Rc::new(Cell::new(false));
        let count = Rc::new(Cell::new(3));
        let mut ties = TieSet::new();
        ties.tie_flag(&root, "sim/terminate", &flag).unwrap();
        ties.tie_int(&root, "sim/count", &count).unwrap();

        assert_eq!(root.get_double_at("sim/terminate"), Some(0.0));
        root.set_double_at("sim/terminate", 2.0).unwrap();
        assert!(flag.get());
        root.set_double_at("sim/count", 5.9).unwrap();
        assert_eq!(count.get(), 5);
        assert_eq!(root.get_double_at("sim/count"), Some(5.0));
    }

    #[test]
    fn untie_all_reports_only_live_ties() {
        let root = PropertyManager::new().root();
        let mut ties = TieSet::new();
        ties.tie_read_only(&root, "a", || 1.0).unwrap();
        ties.tie_read_only(&root, "b", || 2.0).unwrap();
        root.find("a").unwrap().untie().unwrap();
        assert_eq!(ties.untie_all(), 1);
        assert!(ties.is_empty());
    }

    #[test]
    fn drop_unties_and_preserves_values() {
        let root = PropertyManager::new().root();
        let cell = Rc::new(Cell::new(42.0));
        {
            let mut ties = TieSet::new();
            ties.tie_value(&root, "v", &cell).unwrap();
            assert!(root.find("v").unwrap().is_tied());
        }
        let node = root.find("v").unwrap();
        assert!(!node.is_tied());
        assert_eq!(node.get_double(), 42.0);
    }

    #[test]
    fn failed_tie_is_not_recorded() {
        let root = PropertyManager::new().root();
        let mut first = TieSet::new();
        first.tie_read_only(&root, "x", || 1.0).unwrap();
        let mut second = TieSet::new();
        assert!(second.tie_read_only(&root, "x", || 2.0).is_err());
        assert!(second.is_empty());
        drop(second);
        assert!(root.find("x").unwrap().is_tied());
    }
}
