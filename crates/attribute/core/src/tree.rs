//! Tree connectivity.
//!
//! Entities form a multi-parent tree: a node may have any number of parents and
//! children, but following child links never leads back to the start.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use crate::entity::EntityId;
use crate::error::{AttributeSystemError, ErrorSeverity};

/// A directed parent/child link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub parent: EntityId,
    pub child: EntityId,
}

impl Edge {
    pub fn new(child: EntityId, parent: EntityId) -> Self {
        Self { parent, child }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.child, self.parent)
    }
}

/// Errors that can occur while creating or removing tree edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("entity {0} not found")]
    UnknownEntity(EntityId),

    #[error("entity {0} cannot be its own parent")]
    SelfEdge(EntityId),

    #[error("edge {0} already exists")]
    AlreadyConnected(Edge),

    #[error("edge {0} would create a cycle")]
    WouldCycle(Edge),

    #[error("edge {0} does not exist")]
    NotConnected(Edge),

    #[error("{} rejected {} by its accept filter", .0.parent, .0.child)]
    Rejected(Edge),
}

impl AttributeSystemError for ConnectError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Rejected(_) | Self::AlreadyConnected(_) | Self::NotConnected(_) => {
                ErrorSeverity::Recoverable
            }
            Self::UnknownEntity(_) | Self::SelfEdge(_) | Self::WouldCycle(_) => {
                ErrorSeverity::Validation
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownEntity(_) => "CONNECT_UNKNOWN_ENTITY",
            Self::SelfEdge(_) => "CONNECT_SELF_EDGE",
            Self::AlreadyConnected(_) => "CONNECT_ALREADY_CONNECTED",
            Self::WouldCycle(_) => "CONNECT_WOULD_CYCLE",
            Self::NotConnected(_) => "CONNECT_NOT_CONNECTED",
            Self::Rejected(_) => "CONNECT_REJECTED",
        }
    }
}

/// Structural parent/child bookkeeping used by the propagation engine.
pub trait TreeConnectivity {
    /// Creates the edge `child -> parent`.
    fn connect_to_parent(&mut self, child: EntityId, parent: EntityId) -> Result<Edge, ConnectError>;

    /// Removes the edge `child -> parent`. Returns false if it did not exist.
    fn disconnect_from_parent(&mut self, child: EntityId, parent: EntityId) -> bool;

    /// Removes every edge from `child` to its parents, returning the removed edges.
    fn disconnect_from_all_parents(&mut self, child: EntityId) -> Vec<Edge>;

    /// Parents of `node`, in connection order.
    fn parents(&self, node: EntityId) -> Vec<EntityId>;

    /// Children of `node`, in connection order.
    fn children(&self, node: EntityId) -> Vec<EntityId>;

    fn is_connected(&self, child: EntityId, parent: EntityId) -> bool {
        self.parents(child).contains(&parent)
    }
}

/// In-memory adjacency lists.
#[derive(Clone, Debug, Default)]
pub struct MultiParentTree {
    parents: BTreeMap<EntityId, Vec<EntityId>>,
    children: BTreeMap<EntityId, Vec<EntityId>>,
}

impl MultiParentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.parents.values().map(Vec::len).sum()
    }

    /// Returns true if `to` is reachable from `from` by following child links.
    fn descends_to(&self, from: EntityId, to: EntityId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(children) = self.children.get(&node) {
                queue.extend(children.iter().copied());
            }
        }
        false
    }

    fn unlink(&mut self, child: EntityId, parent: EntityId) -> bool {
        let removed = remove_from(&mut self.parents, child, parent);
        remove_from(&mut self.children, parent, child);
        removed
    }
}

fn remove_from(map: &mut BTreeMap<EntityId, Vec<EntityId>>, key: EntityId, value: EntityId) -> bool {
    let Some(list) = map.get_mut(&key) else {
        return false;
    };
    let Some(position) = list.iter().position(|&v| v == value) else {
        return false;
    };
    list.remove(position);
    if list.is_empty() {
        map.remove(&key);
    }
    true
}

impl TreeConnectivity for MultiParentTree {
    fn connect_to_parent(&mut self, child: EntityId, parent: EntityId) -> Result<Edge, ConnectError> {
        let edge = Edge::new(child, parent);
        if child == parent {
            return Err(ConnectError::SelfEdge(child));
        }
        if self.is_connected(child, parent) {
            return Err(ConnectError::AlreadyConnected(edge));
        }
        if self.descends_to(child, parent) {
            return Err(ConnectError::WouldCycle(edge));
        }

        self.parents.entry(child).or_default().push(parent);
        self.children.entry(parent).or_default().push(child);
        tracing::trace!(%edge, "connected");
        Ok(edge)
    }

    fn disconnect_from_parent(&mut self, child: EntityId, parent: EntityId) -> bool {
        let removed = self.unlink(child, parent);
        if removed {
            tracing::trace!(edge = %Edge::new(child, parent), "disconnected");
        }
        removed
    }

    fn disconnect_from_all_parents(&mut self, child: EntityId) -> Vec<Edge> {
        self.parents(child)
            .into_iter()
            .filter(|&parent| self.unlink(child, parent))
            .map(|parent| Edge::new(child, parent))
            .collect()
    }

    fn parents(&self, node: EntityId) -> Vec<EntityId> {
        self.parents.get(&node).cloned().unwrap_or_default()
    }

    fn children(&self, node: EntityId) -> Vec<EntityId> {
        self.children.get(&node).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);
    const C: EntityId = EntityId(3);

    #[test]
    fn nodes_may_have_several_parents() {
        let mut tree = MultiParentTree::new();
        tree.connect_to_parent(C, A).unwrap();
        tree.connect_to_parent(C, B).unwrap();

        assert_eq!(tree.parents(C), vec![A, B]);
        assert_eq!(tree.children(A), vec![C]);
        assert_eq!(tree.edge_count(), 2);
    }

    #[test]
    fn rejects_self_duplicate_and_cyclic_edges() {
        let mut tree = MultiParentTree::new();
        tree.connect_to_parent(B, A).unwrap();
        tree.connect_to_parent(C, B).unwrap();

        assert_eq!(tree.connect_to_parent(A, A), Err(ConnectError::SelfEdge(A)));
        assert_eq!(
            tree.connect_to_parent(B, A),
            Err(ConnectError::AlreadyConnected(Edge::new(B, A)))
        );
        assert_eq!(
            tree.connect_to_parent(A, C),
            Err(ConnectError::WouldCycle(Edge::new(A, C)))
        );
    }

    #[test]
    fn disconnect_all_parents_returns_removed_edges() {
        let mut tree = MultiParentTree::new();
        tree.connect_to_parent(C, A).unwrap();
        tree.connect_to_parent(C, B).unwrap();

        let removed = tree.disconnect_from_all_parents(C);

        assert_eq!(removed, vec![Edge::new(C, A), Edge::new(C, B)]);
        assert!(tree.parents(C).is_empty());
        assert!(tree.children(A).is_empty());
        assert!(!tree.disconnect_from_parent(C, A));
    }
}
