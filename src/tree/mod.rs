//! Hierarchical plugin records with nested-set bookkeeping.
//!
//! A [`ModelTree`] keeps records under a synthetic root that is never a
//! rendering step itself. Nodes are stored in an arena with parent pointers
//! and ordered child lists; after every mutation the nested-set bounds
//! (left, right, depth, tree id) and the records' sibling `ordering` are
//! recomputed, so they are always dense and consistent with the traversal
//! order. Storage layers that persist nested sets can load a tree with
//! [`ModelTree::from_nested_set`] and write it back with
//! [`ModelTree::nested_set_records`].

pub mod moves;

pub use moves::MoveAction;

use crate::core::error::{RecordId, TreeError, TreeResult};
use crate::core::model::{Finishing, PluginModel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tree of finishing records.
pub type FinishingTree = ModelTree<Finishing>;

/// Nested-set position of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NestedSet {
    pub lft: u32,
    pub rgt: u32,
    pub depth: u32,
    pub tree_id: u32,
}

impl NestedSet {
    /// Whether `other` lies strictly inside this node's range.
    pub fn contains(&self, other: &NestedSet) -> bool {
        self.tree_id == other.tree_id && self.lft < other.lft && other.rgt < self.rgt
    }

    /// Number of descendants.
    pub fn descendant_count(&self) -> u32 {
        (self.rgt - self.lft - 1) / 2
    }
}

#[derive(Debug, Clone)]
struct Node<M> {
    model: Option<M>,
    parent: Option<RecordId>,
    children: Vec<RecordId>,
    bounds: NestedSet,
}

/// Arena-backed tree of plugin records below a synthetic root.
#[derive(Debug, Clone)]
pub struct ModelTree<M: PluginModel> {
    tree_id: u32,
    root: RecordId,
    nodes: HashMap<RecordId, Node<M>>,
}

impl<M: PluginModel> Default for ModelTree<M> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<M: PluginModel> ModelTree<M> {
    /// Create an empty tree holding only the synthetic root.
    pub fn new(tree_id: u32) -> Self {
        let root = RecordId::new();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                model: None,
                parent: None,
                children: Vec::new(),
                bounds: NestedSet {
                    lft: 1,
                    rgt: 2,
                    depth: 0,
                    tree_id,
                },
            },
        );
        Self { tree_id, root, nodes }
    }

    /// Build a tree from records carrying stored nested-set positions.
    ///
    /// Records are placed by their left value; depth 1 records hang off the
    /// synthetic root. A record whose depth skips a level is rejected.
    pub fn from_nested_set(records: impl IntoIterator<Item = (M, NestedSet)>) -> TreeResult<Self> {
        let mut records: Vec<(M, NestedSet)> = records.into_iter().collect();
        records.sort_by_key(|(_, bounds)| bounds.lft);
        let tree_id = records.first().map_or(1, |(_, b)| b.tree_id);
        let mut tree = Self::new(tree_id);

        // path of open ancestors, root first
        let mut stack: Vec<(RecordId, u32)> = vec![(tree.root, 0)];
        for (model, bounds) in records {
            while stack.last().is_some_and(|(_, depth)| *depth >= bounds.depth) {
                stack.pop();
            }
            let Some(&(parent, parent_depth)) = stack.last() else {
                return Err(TreeError::InvalidMove {
                    node: model.id(),
                    reason: "record is outside of the root".to_string(),
                });
            };
            if bounds.depth != parent_depth + 1 {
                return Err(TreeError::InvalidMove {
                    node: model.id(),
                    reason: format!("depth {} below a node of depth {}", bounds.depth, parent_depth),
                });
            }
            let id = model.id();
            tree.attach(parent, model, None);
            stack.push((id, bounds.depth));
        }
        tree.renumber();
        Ok(tree)
    }

    /// Identity of the synthetic root.
    pub fn root_id(&self) -> RecordId {
        self.root
    }

    /// Tree identifier stamped on every node.
    pub fn tree_id(&self) -> u32 {
        self.tree_id
    }

    /// Number of records (the synthetic root not counted).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether the tree holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is a record of this tree.
    pub fn contains(&self, id: RecordId) -> bool {
        id != self.root && self.nodes.contains_key(&id)
    }

    /// Record by id.
    pub fn get(&self, id: RecordId) -> Option<&M> {
        self.nodes.get(&id).and_then(|n| n.model.as_ref())
    }

    /// Mutable record by id. Its `ordering` is managed by the tree and is
    /// overwritten on the next structural change.
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut M> {
        self.nodes.get_mut(&id).and_then(|n| n.model.as_mut())
    }

    /// Nested-set position of a node (the root included).
    pub fn bounds(&self, id: RecordId) -> TreeResult<NestedSet> {
        self.node(id).map(|n| n.bounds)
    }

    /// Parent of a node; `None` for the root.
    pub fn parent(&self, id: RecordId) -> TreeResult<Option<RecordId>> {
        self.node(id).map(|n| n.parent)
    }

    /// Children of a node in sibling order.
    pub fn children(&self, id: RecordId) -> TreeResult<&[RecordId]> {
        self.node(id).map(|n| n.children.as_slice())
    }

    fn node(&self, id: RecordId) -> TreeResult<&Node<M>> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: RecordId) -> TreeResult<&mut Node<M>> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn attach(&mut self, parent: RecordId, model: M, position: Option<usize>) {
        let id = model.id();
        self.nodes.insert(
            id,
            Node {
                model: Some(model),
                parent: Some(parent),
                children: Vec::new(),
                bounds: NestedSet::default(),
            },
        );
        if let Some(node) = self.nodes.get_mut(&parent) {
            let at = position.unwrap_or(node.children.len()).min(node.children.len());
            node.children.insert(at, id);
        }
    }

    /// Insert a record below `parent` (the root when `None`), at `position`
    /// among its siblings or last.
    pub fn insert(&mut self, parent: Option<RecordId>, model: M, position: Option<usize>) -> TreeResult<RecordId> {
        let parent = parent.unwrap_or(self.root);
        self.node(parent)?;
        let id = model.id();
        if self.nodes.contains_key(&id) {
            return Err(TreeError::InvalidMove {
                node: id,
                reason: "a node with this id already exists".to_string(),
            });
        }
        self.attach(parent, model, position);
        self.renumber();
        Ok(id)
    }

    /// Append a record as the last child of `parent` (the root when `None`).
    pub fn append(&mut self, parent: Option<RecordId>, model: M) -> TreeResult<RecordId> {
        self.insert(parent, model, None)
    }

    /// Remove a record and its whole subtree. Following siblings move up so
    /// ordering stays dense. Returns the removed records in preorder.
    pub fn remove(&mut self, id: RecordId) -> TreeResult<Vec<M>> {
        if id == self.root {
            return Err(TreeError::RootImmutable("deleted".to_string()));
        }
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|child| *child != id);
        }

        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children.iter().rev());
                removed.extend(node.model);
            }
        }
        self.renumber();
        Ok(removed)
    }

    /// Detach `id` from its parent, returning the parent and former index.
    fn detach(&mut self, id: RecordId) -> TreeResult<(RecordId, usize)> {
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| TreeError::RootImmutable("moved".to_string()))?;
        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|child| *child == id)
            .ok_or(TreeError::NodeNotFound(id))?;
        siblings.remove(index);
        Ok((parent, index))
    }

    /// Re-attach a detached node below `parent` at `index`.
    fn reattach(&mut self, id: RecordId, parent: RecordId, index: usize) -> TreeResult<()> {
        let siblings = &mut self.node_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        self.node_mut(id)?.parent = Some(parent);
        Ok(())
    }

    /// Whether `node` is `ancestor` or lies below it.
    pub fn is_in_subtree(&self, node: RecordId, ancestor: RecordId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Apply a move action. Returns `false` when the move is a no-op (e.g.
    /// moving the first sibling up).
    pub fn move_node(&mut self, id: RecordId, action: MoveAction) -> TreeResult<bool> {
        if id == self.root {
            return Err(TreeError::RootImmutable("moved".to_string()));
        }
        let parent = self.node(id)?.parent.unwrap_or(self.root);
        let index = self
            .node(parent)?
            .children
            .iter()
            .position(|child| *child == id)
            .ok_or(TreeError::NodeNotFound(id))?;
        let sibling_count = self.node(parent)?.children.len();

        let moved = match action {
            MoveAction::Up => {
                if index == 0 {
                    false
                } else {
                    self.node_mut(parent)?.children.swap(index, index - 1);
                    true
                }
            }
            MoveAction::Down => {
                if index + 1 >= sibling_count {
                    false
                } else {
                    self.node_mut(parent)?.children.swap(index, index + 1);
                    true
                }
            }
            MoveAction::UpOut => {
                let Some(grandparent) = self.node(parent)?.parent else {
                    return Ok(false);
                };
                let parent_index = self
                    .node(grandparent)?
                    .children
                    .iter()
                    .position(|child| *child == parent)
                    .ok_or(TreeError::NodeNotFound(parent))?;
                self.detach(id)?;
                self.reattach(id, grandparent, parent_index + 1)?;
                true
            }
            MoveAction::DownIn => {
                if index == 0 {
                    false
                } else {
                    let new_parent = self.node(parent)?.children[index - 1];
                    self.detach(id)?;
                    let end = self.node(new_parent)?.children.len();
                    self.reattach(id, new_parent, end)?;
                    true
                }
            }
            MoveAction::After(target) | MoveAction::Before(target) => {
                self.check_target(id, target)?;
                if target == self.root {
                    return Err(TreeError::InvalidMove {
                        node: id,
                        reason: "can not place a node next to the root".to_string(),
                    });
                }
                self.detach(id)?;
                let (target_parent, target_index) = self.detach(target)?;
                let at = if matches!(action, MoveAction::After(_)) {
                    target_index + 1
                } else {
                    target_index
                };
                self.reattach(target, target_parent, target_index)?;
                self.reattach(id, target_parent, at)?;
                true
            }
            MoveAction::FirstChild(target) => {
                self.check_target(id, target)?;
                self.detach(id)?;
                self.reattach(id, target, 0)?;
                true
            }
        };
        if moved {
            self.renumber();
        }
        Ok(moved)
    }

    fn check_target(&self, id: RecordId, target: RecordId) -> TreeResult<()> {
        self.node(target)?;
        if self.is_in_subtree(target, id) {
            return Err(TreeError::InvalidMove {
                node: id,
                reason: "target lies inside the moved subtree".to_string(),
            });
        }
        Ok(())
    }

    /// Recompute nested-set bounds and sibling ordering from the structure.
    fn renumber(&mut self) {
        let mut counter = 1;
        let root = self.root;
        self.number(root, 0, &mut counter);
    }

    fn number(&mut self, id: RecordId, depth: u32, counter: &mut u32) {
        let lft = *counter;
        *counter += 1;
        let children = self.nodes.get(&id).map(|n| n.children.clone()).unwrap_or_default();
        for (index, child) in children.iter().enumerate() {
            if let Some(model) = self.nodes.get_mut(child).and_then(|n| n.model.as_mut()) {
                model.set_ordering(index as i64);
            }
            self.number(*child, depth + 1, counter);
        }
        let rgt = *counter;
        *counter += 1;
        let tree_id = self.tree_id;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.bounds = NestedSet { lft, rgt, depth, tree_id };
        }
    }

    /// Preorder walk over every record with its depth (1 for top level).
    pub fn walk(&self) -> Vec<(RecordId, u32)> {
        let mut out = Vec::with_capacity(self.len());
        let mut pending: Vec<(RecordId, u32)> = self
            .nodes
            .get(&self.root)
            .map(|n| n.children.iter().rev().map(|c| (*c, 1)).collect())
            .unwrap_or_default();
        while let Some((id, depth)) = pending.pop() {
            out.push((id, depth));
            if let Some(node) = self.nodes.get(&id) {
                pending.extend(node.children.iter().rev().map(|c| (*c, depth + 1)));
            }
        }
        out
    }

    /// Every record in preorder.
    pub fn flatten(&self) -> Vec<&M> {
        self.walk().into_iter().filter_map(|(id, _)| self.get(id)).collect()
    }

    /// Own flag of the node and of each ancestor below the root.
    pub fn effective_enabled(&self, id: RecordId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                return true;
            }
            let Some(node) = self.nodes.get(&node_id) else {
                return false;
            };
            if !node.model.as_ref().is_some_and(|m| m.enabled()) {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Effectively enabled records in preorder; a disabled node hides its
    /// whole subtree.
    pub fn enabled(&self) -> Vec<&M> {
        self.walk()
            .into_iter()
            .filter(|(id, _)| self.effective_enabled(*id))
            .filter_map(|(id, _)| self.get(id))
            .collect()
    }

    /// Dot-separated sibling-index path of a record (`"0.1.0"`).
    pub fn path_of(&self, id: RecordId) -> TreeResult<String> {
        let mut parts = Vec::new();
        let mut current = id;
        while current != self.root {
            let parent = self.node(current)?.parent.ok_or(TreeError::NodeNotFound(current))?;
            let index = self
                .node(parent)?
                .children
                .iter()
                .position(|child| *child == current)
                .ok_or(TreeError::NodeNotFound(current))?;
            parts.push(index.to_string());
            current = parent;
        }
        parts.reverse();
        Ok(parts.join("."))
    }

    /// Map from path to record id in preorder.
    pub fn paths(&self) -> Vec<(String, RecordId)> {
        let mut out = Vec::with_capacity(self.len());
        self.collect_paths(self.root, "", &mut out);
        out
    }

    fn collect_paths(&self, id: RecordId, prefix: &str, out: &mut Vec<(String, RecordId)>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        for (index, child) in node.children.iter().enumerate() {
            let path = if prefix.is_empty() {
                index.to_string()
            } else {
                format!("{}.{}", prefix, index)
            };
            out.push((path.clone(), *child));
            self.collect_paths(*child, &path, out);
        }
    }

    /// Record at a path; the empty path addresses the root.
    pub fn node_at(&self, path: &str) -> Option<RecordId> {
        let mut current = self.root;
        if path.is_empty() {
            return Some(current);
        }
        for part in path.split('.') {
            let index: usize = part.parse().ok()?;
            current = *self.nodes.get(&current)?.children.get(index)?;
        }
        Some(current)
    }

    /// Records paired with their current nested-set bounds, in preorder.
    pub fn nested_set_records(&self) -> Vec<(&M, NestedSet)> {
        self.walk()
            .into_iter()
            .filter_map(|(id, _)| {
                let node = self.nodes.get(&id)?;
                Some((node.model.as_ref()?, node.bounds))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finishing(title: &str) -> Finishing {
        Finishing::new("group").with_title(title)
    }

    fn titles(tree: &FinishingTree) -> Vec<String> {
        tree.flatten().iter().map(|f| f.title.clone()).collect()
    }

    /// a, b(c, d), e
    fn sample() -> (FinishingTree, [RecordId; 5]) {
        let mut tree = FinishingTree::new(7);
        let a = tree.append(None, finishing("a")).unwrap();
        let b = tree.append(None, finishing("b")).unwrap();
        let c = tree.append(Some(b), finishing("c")).unwrap();
        let d = tree.append(Some(b), finishing("d")).unwrap();
        let e = tree.append(None, finishing("e")).unwrap();
        (tree, [a, b, c, d, e])
    }

    #[test]
    fn test_nested_set_bounds() {
        let (tree, [a, b, c, d, e]) = sample();
        let root = tree.bounds(tree.root_id()).unwrap();
        assert_eq!((root.lft, root.rgt, root.depth), (1, 12, 0));
        assert_eq!(tree.bounds(a).unwrap().lft, 2);
        let b_bounds = tree.bounds(b).unwrap();
        assert_eq!((b_bounds.lft, b_bounds.rgt, b_bounds.depth), (4, 9, 1));
        assert_eq!(b_bounds.descendant_count(), 2);
        assert!(b_bounds.contains(&tree.bounds(c).unwrap()));
        assert!(!b_bounds.contains(&tree.bounds(e).unwrap()));
        assert_eq!(tree.bounds(d).unwrap().depth, 2);
        assert_eq!(tree.bounds(e).unwrap().tree_id, 7);
    }

    #[test]
    fn test_flatten_and_ordering() {
        let (tree, [_, b, _, d, e]) = sample();
        assert_eq!(titles(&tree), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(tree.get(d).unwrap().ordering, 1);
        assert_eq!(tree.get(e).unwrap().ordering, 2);
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.children(b).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_subtree_compacts_ordering() {
        let (mut tree, [a, b, c, _, e]) = sample();
        let removed = tree.remove(b).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(!tree.contains(c));
        assert_eq!(tree.get(a).unwrap().ordering, 0);
        assert_eq!(tree.get(e).unwrap().ordering, 1);
        assert_eq!(tree.bounds(tree.root_id()).unwrap().rgt, 6);
        assert!(matches!(
            tree.remove(tree.root_id()),
            Err(TreeError::RootImmutable(_))
        ));
    }

    #[test]
    fn test_cascading_enablement() {
        let (mut tree, [_, b, c, _, _]) = sample();
        tree.get_mut(b).unwrap().enabled = false;
        assert!(tree.get(c).unwrap().enabled);
        assert!(!tree.effective_enabled(c));
        let enabled: Vec<&str> = tree.enabled().iter().map(|f| f.title.as_str()).collect();
        assert_eq!(enabled, vec!["a", "e"]);
    }

    #[test]
    fn test_paths() {
        let (tree, [_, b, c, d, _]) = sample();
        assert_eq!(tree.path_of(d).unwrap(), "1.1");
        let paths: Vec<String> = tree.paths().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["0", "1", "1.0", "1.1", "2"]);
        assert_eq!(tree.node_at("1.0"), Some(c));
        assert_eq!(tree.node_at("1"), Some(b));
        assert_eq!(tree.node_at(""), Some(tree.root_id()));
        assert_eq!(tree.node_at("3"), None);
    }

    #[test]
    fn test_move_up_down() {
        let (mut tree, [a, b, ..]) = sample();
        assert!(!tree.move_node(a, MoveAction::Up).unwrap());
        assert!(tree.move_node(a, MoveAction::Down).unwrap());
        assert_eq!(titles(&tree), vec!["b", "c", "d", "a", "e"]);
        assert_eq!(tree.get(b).unwrap().ordering, 0);
        assert_eq!(tree.get(a).unwrap().ordering, 1);
    }

    #[test]
    fn test_move_up_out_and_down_in() {
        let (mut tree, [a, b, c, ..]) = sample();
        assert!(tree.move_node(c, MoveAction::UpOut).unwrap());
        assert_eq!(titles(&tree), vec!["a", "b", "d", "c", "e"]);
        assert_eq!(tree.parent(c).unwrap(), Some(tree.root_id()));
        assert!(!tree.move_node(a, MoveAction::UpOut).unwrap());

        assert!(tree.move_node(b, MoveAction::DownIn).unwrap());
        assert_eq!(tree.parent(b).unwrap(), Some(a));
        assert_eq!(tree.path_of(b).unwrap(), "0.0");
    }

    #[test]
    fn test_move_relative_to_target() {
        let (mut tree, [a, b, c, d, e]) = sample();
        tree.move_node(e, MoveAction::Before(d)).unwrap();
        assert_eq!(titles(&tree), vec!["a", "b", "c", "e", "d"]);
        tree.move_node(a, MoveAction::After(c)).unwrap();
        assert_eq!(tree.path_of(a).unwrap(), "0.1");
        tree.move_node(d, MoveAction::FirstChild(tree.root_id())).unwrap();
        assert_eq!(tree.path_of(d).unwrap(), "0");

        assert!(matches!(
            tree.move_node(b, MoveAction::FirstChild(c)),
            Err(TreeError::InvalidMove { .. })
        ));
    }

    #[test]
    fn test_nested_set_round_trip() {
        let (tree, _) = sample();
        let records: Vec<(Finishing, NestedSet)> = tree
            .nested_set_records()
            .into_iter()
            .map(|(f, b)| (f.clone(), b))
            .rev()
            .collect();
        let loaded = FinishingTree::from_nested_set(records).unwrap();
        assert_eq!(titles(&loaded), titles(&tree));
        assert_eq!(loaded.tree_id(), 7);

        let orphan = (
            finishing("x"),
            NestedSet {
                lft: 2,
                rgt: 3,
                depth: 2,
                tree_id: 1,
            },
        );
        assert!(FinishingTree::from_nested_set(vec![orphan]).is_err());
    }
}
