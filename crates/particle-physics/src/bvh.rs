//! Flattened bounding volume hierarchy consumed by the broad-phase
//!
//! The tree is built outside the core every tick. Traversal assumes a
//! well-formed strict binary tree:
//! - every reachable leaf stores an object index `< object_count`
//! - every reachable internal node stores two child indices `< nodes.len()`
//! - no node is reachable twice (no cycles, no shared subtrees)
//!
//! None of this is checked while traversing. [`Bvh::validate`] performs the
//! check on demand for drivers and tests.

use crate::aabb::Aabb;
use crate::error::{PhysicsError, Result};
use crate::real::Vector;

/// Leaf or internal node payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf(u32),
    Internal { left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node<V: Vector> {
    pub aabb: Aabb<V>,
    pub kind: NodeKind,
}

impl<V: Vector> Node<V> {
    pub fn leaf(aabb: Aabb<V>, object_index: u32) -> Self {
        Self {
            aabb,
            kind: NodeKind::Leaf(object_index),
        }
    }

    pub fn internal(aabb: Aabb<V>, left: u32, right: u32) -> Self {
        Self {
            aabb,
            kind: NodeKind::Internal { left, right },
        }
    }
}

/// Flat node array plus the index of its root
#[derive(Debug, Clone, PartialEq)]
pub struct Bvh<V: Vector> {
    nodes: Vec<Node<V>>,
    root: u32,
}

impl<V: Vector> Default for Bvh<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V: Vector> Bvh<V> {
    /// Wrap an externally built node array; nodes are kept as given
    pub fn new(nodes: Vec<Node<V>>, root: u32) -> Self {
        Self { nodes, root }
    }

    /// Tree with no nodes; every query on it reports nothing
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: 0,
        }
    }

    pub fn nodes(&self) -> &[Node<V>] {
        &self.nodes
    }

    pub fn root(&self) -> u32 {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, index: u32) -> &Node<V> {
        &self.nodes[index as usize]
    }

    /// Longest root-to-leaf path, counted in nodes (0 for an empty tree)
    ///
    /// Only meaningful on a tree that passes [`Bvh::validate`].
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0;
        let mut pending = vec![(self.root, 1usize)];
        while let Some((index, depth)) = pending.pop() {
            max_depth = max_depth.max(depth);
            if let NodeKind::Internal { left, right } = self.node(index).kind {
                pending.push((left, depth + 1));
                pending.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Check the structural preconditions of traversal
    ///
    /// Every object in `0..object_count` must appear in exactly one reachable
    /// leaf, every index must be in range, and no node may be reachable twice.
    pub fn validate(&self, object_count: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return if object_count == 0 {
                Ok(())
            } else {
                Err(PhysicsError::MalformedTree(format!(
                    "empty tree for {object_count} objects"
                )))
            };
        }
        let node_count = self.nodes.len();
        if self.root as usize >= node_count {
            return Err(PhysicsError::MalformedTree(format!(
                "root {} out of range ({node_count} nodes)",
                self.root
            )));
        }

        let mut visited = vec![false; node_count];
        let mut seen_objects = vec![false; object_count];
        let mut pending = vec![self.root];
        while let Some(index) = pending.pop() {
            let slot = &mut visited[index as usize];
            if *slot {
                return Err(PhysicsError::MalformedTree(format!(
                    "node {index} is reachable more than once"
                )));
            }
            *slot = true;

            let node = self.node(index);
            if !node.aabb.is_valid() {
                return Err(PhysicsError::MalformedTree(format!(
                    "node {index} has an inverted bounding box"
                )));
            }
            match node.kind {
                NodeKind::Leaf(object_index) => {
                    let Some(seen) = seen_objects.get_mut(object_index as usize) else {
                        return Err(PhysicsError::MalformedTree(format!(
                            "leaf {index} references object {object_index} (only {object_count} objects)"
                        )));
                    };
                    if *seen {
                        return Err(PhysicsError::MalformedTree(format!(
                            "object {object_index} appears in more than one leaf"
                        )));
                    }
                    *seen = true;
                }
                NodeKind::Internal { left, right } => {
                    for child in [left, right] {
                        if child as usize >= node_count {
                            return Err(PhysicsError::MalformedTree(format!(
                                "node {index} has child {child} out of range ({node_count} nodes)"
                            )));
                        }
                        pending.push(child);
                    }
                }
            }
        }

        if let Some(missing) = seen_objects.iter().position(|seen| !seen) {
            return Err(PhysicsError::MalformedTree(format!(
                "object {missing} is not referenced by any leaf"
            )));
        }
        Ok(())
    }
}
