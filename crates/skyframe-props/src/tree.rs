//! Arena-backed property tree and node handles.
//!
//! All nodes of one namespace live in a single arena owned by a
//! [`PropertyManager`]. A [`PropertyNode`] is a cheap handle (shared manager
//! plus node id) that resolves paths, reads and writes values, and manages
//! ties. The manager is shared via `Rc`, so the namespace lives exactly as
//! long as the last handle or executive referencing it.
//!
//! Path syntax: `/`-separated segments of the form `name` or `name[index]`.
//! A leading `/` resolves from the root, `.` stays on the current node and
//! `..` moves to its parent. Index `0` is implied when omitted.
//!
//! Accessor callbacks are always invoked after the internal borrow of the
//! arena has been released, so a getter or setter may itself read or write
//! other properties of the same namespace.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::PropertyError;

/// Index of a node inside its manager's arena.
pub type NodeId = usize;

/// Shared getter callback of an accessor tie.
pub type Getter = Rc<dyn Fn() -> f64>;

/// Shared setter callback of an accessor tie.
pub type Setter = Rc<dyn Fn(f64)>;

const ROOT: NodeId = 0;

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// The external storage a tied node redirects to.
#[derive(Clone)]
pub enum Binding {
    /// A model-owned numeric cell, readable and writable.
    Value(Rc<Cell<f64>>),
    /// A getter/setter pair. A missing getter reads as `0.0`; a missing setter
    /// makes the node read-only.
    Accessors {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

impl Binding {
    /// Getter-only binding.
    pub fn read_only(get: impl Fn() -> f64 + 'static) -> Self {
        Binding::Accessors {
            get: Some(Rc::new(get)),
            set: None,
        }
    }

    /// Setter-only binding (a "trigger" property).
    pub fn write_only(set: impl Fn(f64) + 'static) -> Self {
        Binding::Accessors {
            get: None,
            set: Some(Rc::new(set)),
        }
    }

    /// Getter and setter binding.
    pub fn accessors(get: impl Fn() -> f64 + 'static, set: impl Fn(f64) + 'static) -> Self {
        Binding::Accessors {
            get: Some(Rc::new(get)),
            set: Some(Rc::new(set)),
        }
    }

    fn read(&self) -> f64 {
        match self {
            Binding::Value(cell) => cell.get(),
            Binding::Accessors { get: Some(get), .. } => get(),
            Binding::Accessors { get: None, .. } => 0.0,
        }
    }

    fn write(&self, value: f64) -> bool {
        match self {
            Binding::Value(cell) => {
                cell.set(value);
                true
            }
            Binding::Accessors { set: Some(set), .. } => {
                set(value);
                true
            }
            Binding::Accessors { set: None, .. } => false,
        }
    }

    fn is_writable(&self) -> bool {
        !matches!(self, Binding::Accessors { set: None, .. })
    }

    fn is_readable(&self) -> bool {
        !matches!(self, Binding::Accessors { get: None, .. })
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(cell) => f.debug_tuple("Value").field(&cell.get()).finish(),
            Binding::Accessors { get, set } => f
                .debug_struct("Accessors")
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .finish(),
        }
    }
}

/// Identifies one tie operation, so that only its creator can remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TieId(u64);

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Slot {
    Value(f64),
    Tied { binding: Binding, id: TieId },
}

#[derive(Debug)]
struct NodeData {
    name: String,
    index: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    slot: Slot,
}

#[derive(Debug)]
struct PropertyTree {
    nodes: Vec<NodeData>,
    next_tie: u64,
}

enum Segment<'a> {
    Current,
    Parent,
    Child(&'a str, usize),
}

fn invalid(path: &str, reason: &str) -> PropertyError {
    PropertyError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Splits a path into its segments. Returns `(absolute, segments)`.
fn parse_path(path: &str) -> Result<(bool, Vec<Segment<'_>>), PropertyError> {
    let absolute = path.starts_with('/');
    let body = if absolute { &path[1..] } else { path };
    if body.is_empty() {
        return Ok((absolute, Vec::new()));
    }

    let mut segments = Vec::new();
    for raw in body.split('/') {
        let segment = match raw {
            "" => return Err(invalid(path, "empty segment")),
            "." => Segment::Current,
            ".." => Segment::Parent,
            _ => match raw.find('[') {
                Some(open) => {
                    let close = raw
                        .strip_suffix(']')
                        .ok_or_else(|| invalid(path, "unterminated index"))?;
                    let name = &raw[..open];
                    let index = close[open + 1..]
                        .parse::<usize>()
                        .map_err(|_| invalid(path, "index is not a non-negative integer"))?;
                    if !valid_name(name) {
                        return Err(invalid(path, "bad segment name"));
                    }
                    Segment::Child(name, index)
                }
                None => {
                    if !valid_name(raw) {
                        return Err(invalid(path, "bad segment name"));
                    }
                    Segment::Child(raw, 0)
                }
            },
        };
        segments.push(segment);
    }
    Ok((absolute, segments))
}

impl PropertyTree {
    fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                name: String::new(),
                index: 0,
                parent: None,
                children: Vec::new(),
                slot: Slot::Value(0.0),
            }],
            next_tie: 1,
        }
    }

    fn child(&self, parent: NodeId, name: &str, index: usize) -> Option<NodeId> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].index == index && self.nodes[c].name == name)
    }

    fn add_child(&mut self, parent: NodeId, name: &str, index: usize) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            name: name.to_string(),
            index,
            parent: Some(parent),
            children: Vec::new(),
            slot: Slot::Value(0.0),
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn resolve(
        &mut self,
        start: NodeId,
        path: &str,
        create: bool,
    ) -> Result<Option<NodeId>, PropertyError> {
        let (absolute, segments) = parse_path(path)?;
        let mut current = if absolute { ROOT } else { start };
        for segment in segments {
            current = match segment {
                Segment::Current => current,
                Segment::Parent => self.nodes[current]
                    .parent
                    .ok_or_else(|| invalid(path, "'..' above the root"))?,
                Segment::Child(name, index) => match self.child(current, name, index) {
                    Some(child) => child,
                    None if create => self.add_child(current, name, index),
                    None => return Ok(None),
                },
            };
        }
        Ok(Some(current))
    }

    fn display_name(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        if node.index == 0 {
            node.name.clone()
        } else {
            format!("{}[{}]", node.name, node.index)
        }
    }

    fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(n) = cursor {
            if n == ROOT {
                break;
            }
            parts.push(self.display_name(n));
            cursor = self.nodes[n].parent;
        }
        if parts.is_empty() {
            return "/".to_string();
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Depth-first, child-order list of leaf nodes below (and including) `id`.
    fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let children = &self.nodes[n].children;
            if children.is_empty() {
                out.push(n);
            } else {
                stack.extend(children.iter().rev().copied());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// PropertyManager
// ---------------------------------------------------------------------------

/// Owner of one property namespace.
///
/// Construct one per simulation (or share one between several executives)
/// and pass it around as `Rc<PropertyManager>`. Executives sharing a manager
/// acquire distinct instance indices from it so each gets its own private
/// subtree.
pub struct PropertyManager {
    tree: RefCell<PropertyTree>,
    instances: RefCell<BTreeSet<usize>>,
}

impl PropertyManager {
    /// Create an empty namespace containing only the root node.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            tree: RefCell::new(PropertyTree::new()),
            instances: RefCell::new(BTreeSet::new()),
        })
    }

    /// Handle to the root node.
    pub fn root(self: &Rc<Self>) -> PropertyNode {
        PropertyNode {
            manager: Rc::clone(self),
            id: ROOT,
        }
    }

    /// Total number of nodes ever created in this namespace.
    pub fn node_count(&self) -> usize {
        self.tree.borrow().nodes.len()
    }

    /// Reserve the smallest free instance index.
    pub fn acquire_instance(&self) -> usize {
        let mut instances = self.instances.borrow_mut();
        let mut index = 0;
        while instances.contains(&index) {
            index += 1;
        }
        instances.insert(index);
        index
    }

    /// Return an instance index to the pool. Returns `false` if it was not held.
    pub fn release_instance(&self, index: usize) -> bool {
        self.instances.borrow_mut().remove(&index)
    }

    /// Number of instance indices currently held.
    pub fn live_instances(&self) -> usize {
        self.instances.borrow().len()
    }
}

impl fmt::Debug for PropertyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyManager")
            .field("nodes", &self.node_count())
            .field("instances", &self.live_instances())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PropertyNode
// ---------------------------------------------------------------------------

/// Handle to one node of a property namespace.
#[derive(Clone)]
pub struct PropertyNode {
    manager: Rc<PropertyManager>,
    id: NodeId,
}

impl PartialEq for PropertyNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.manager, &other.manager) && self.id == other.id
    }
}

impl Eq for PropertyNode {}

impl fmt::Debug for PropertyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyNode")
            .field("path", &self.fully_qualified_name())
            .field("tied", &self.is_tied())
            .finish()
    }
}

impl PropertyNode {
    fn handle(&self, id: NodeId) -> PropertyNode {
        PropertyNode {
            manager: Rc::clone(&self.manager),
            id,
        }
    }

    /// The namespace this node belongs to.
    pub fn manager(&self) -> &Rc<PropertyManager> {
        &self.manager
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Segment name without index.
    pub fn name(&self) -> String {
        self.manager.tree.borrow().nodes[self.id].name.clone()
    }

    /// Sibling index (0 for the first or only instance).
    pub fn index(&self) -> usize {
        self.manager.tree.borrow().nodes[self.id].index
    }

    pub fn parent(&self) -> Option<PropertyNode> {
        let parent = self.manager.tree.borrow().nodes[self.id].parent;
        parent.map(|p| self.handle(p))
    }

    /// Children in creation order.
    pub fn children(&self) -> Vec<PropertyNode> {
        let ids = self.manager.tree.borrow().nodes[self.id].children.clone();
        ids.into_iter().map(|c| self.handle(c)).collect()
    }

    pub fn has_children(&self) -> bool {
        !self.manager.tree.borrow().nodes[self.id].children.is_empty()
    }

    /// Absolute path, with `[index]` appended only for nonzero indices.
    /// The root is `/`.
    pub fn fully_qualified_name(&self) -> String {
        self.manager.tree.borrow().path_of(self.id)
    }

    /// Path of this node relative to `base`, or the absolute path if `base`
    /// is not an ancestor.
    pub fn relative_name(&self, base: &PropertyNode) -> String {
        let full = self.fully_qualified_name();
        let prefix = base.fully_qualified_name();
        let prefix = prefix.trim_end_matches('/');
        match full.strip_prefix(prefix) {
            Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
            _ => full,
        }
    }

    /// Look a node up without creating anything. Malformed paths yield `None`.
    pub fn find(&self, path: &str) -> Option<PropertyNode> {
        let id = self
            .manager
            .tree
            .borrow_mut()
            .resolve(self.id, path, false)
            .ok()
            .flatten()?;
        Some(self.handle(id))
    }

    /// Look a node up, creating every missing segment.
    pub fn get_or_create(&self, path: &str) -> Result<PropertyNode, PropertyError> {
        let id = self.manager.tree.borrow_mut().resolve(self.id, path, true)?;
        match id {
            Some(id) => Ok(self.handle(id)),
            None => Err(PropertyError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    pub fn has(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Current value, read through the tie if there is one.
    pub fn get_double(&self) -> f64 {
        let binding = {
            let tree = self.manager.tree.borrow();
            match &tree.nodes[self.id].slot {
                Slot::Value(v) => return *v,
                Slot::Tied { binding, .. } => binding.clone(),
            }
        };
        binding.read()
    }

    /// Write a value, through the tie if there is one.
    pub fn set_double(&self, value: f64) -> Result<(), PropertyError> {
        let binding = {
            let mut tree = self.manager.tree.borrow_mut();
            match &mut tree.nodes[self.id].slot {
                Slot::Value(v) => {
                    *v = value;
                    return Ok(());
                }
                Slot::Tied { binding, .. } => binding.clone(),
            }
        };
        if binding.write(value) {
            Ok(())
        } else {
            Err(PropertyError::ReadOnly {
                path: self.fully_qualified_name(),
            })
        }
    }

    pub fn get_bool(&self) -> bool {
        self.get_double() != 0.0
    }

    /// Read the value at `path`, or `None` if no such node exists.
    pub fn get_double_at(&self, path: &str) -> Option<f64> {
        self.find(path).map(|n| n.get_double())
    }

    /// Write the value at `path`, creating the node if it does not exist.
    pub fn set_double_at(&self, path: &str, value: f64) -> Result<(), PropertyError> {
        self.get_or_create(path)?.set_double(value)
    }

    pub fn is_tied(&self) -> bool {
        matches!(
            self.manager.tree.borrow().nodes[self.id].slot,
            Slot::Tied { .. }
        )
    }

    /// `false` only for nodes tied to a getter without a setter.
    pub fn is_writable(&self) -> bool {
        match &self.manager.tree.borrow().nodes[self.id].slot {
            Slot::Value(_) => true,
            Slot::Tied { binding, .. } => binding.is_writable(),
        }
    }

    /// `false` only for trigger nodes tied to a setter without a getter.
    pub fn is_readable(&self) -> bool {
        match &self.manager.tree.borrow().nodes[self.id].slot {
            Slot::Value(_) => true,
            Slot::Tied { binding, .. } => binding.is_readable(),
        }
    }

    /// Redirect this node to `binding`. The node's own value is discarded.
    pub fn tie(&self, binding: Binding) -> Result<TieId, PropertyError> {
        if self.is_tied() {
            return Err(PropertyError::AlreadyTied {
                path: self.fully_qualified_name(),
            });
        }
        let mut tree = self.manager.tree.borrow_mut();
        let id = TieId(tree.next_tie);
        tree.next_tie += 1;
        tree.nodes[self.id].slot = Slot::Tied { binding, id };
        Ok(id)
    }

    /// Create (if needed) the node at `path` and tie it.
    pub fn tie_at(&self, path: &str, binding: Binding) -> Result<(PropertyNode, TieId), PropertyError> {
        let node = self.get_or_create(path)?;
        let id = node.tie(binding)?;
        Ok((node, id))
    }

    /// Remove the tie, keeping the last value read through it.
    pub fn untie(&self) -> Result<(), PropertyError> {
        let tied = {
            let tree = self.manager.tree.borrow();
            match &tree.nodes[self.id].slot {
                Slot::Tied { binding, id } => Some((binding.clone(), *id)),
                Slot::Value(_) => None,
            }
        };
        let (binding, id) = tied.ok_or_else(|| PropertyError::NotTied {
            path: self.fully_qualified_name(),
        })?;
        let last = binding.read();
        let mut tree = self.manager.tree.borrow_mut();
        if let Slot::Tied { id: current, .. } = tree.nodes[self.id].slot {
            if current == id {
                tree.nodes[self.id].slot = Slot::Value(last);
            }
        }
        Ok(())
    }

    /// Untie only if the current tie is `id`. Returns whether it was removed.
    pub fn untie_matching(&self, id: TieId) -> bool {
        let matches = matches!(
            self.manager.tree.borrow().nodes[self.id].slot,
            Slot::Tied { id: current, .. } if current == id
        );
        matches && self.untie().is_ok()
    }

    /// Every leaf below this node, depth-first in child order.
    pub fn leaves(&self) -> Vec<PropertyNode> {
        let ids = self.manager.tree.borrow().leaves(self.id);
        ids.into_iter().map(|id| self.handle(id)).collect()
    }

    /// Depth-first sweep removing the tie from every tied leaf below this
    /// node. Interior nodes are visited but never untied. Returns the number
    /// of ties removed.
    pub fn untie_all_leaves(&self) -> usize {
        let mut removed = 0;
        for leaf in self.leaves() {
            if leaf.is_tied() && leaf.untie().is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
