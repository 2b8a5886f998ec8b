//! Concurrent node and ownership-link tables
//!
//! Probes publish into the graph from their own background work, so the
//! tables are shared and internally synchronized.

use crate::graph::types::{Node, NodeId};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Graph {
    nodes: Arc<DashMap<NodeId, Node>>,
    /// child -> parent ownership links
    owners: Arc<DashMap<NodeId, NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn add_node(&self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).map(|r| r.clone())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Record `parent` as owner of `child`. Both nodes must exist.
    pub fn link(&self, parent: &NodeId, child: &NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            return false;
        }
        self.owners.insert(child.clone(), parent.clone());
        true
    }

    pub fn owner(&self, child: &NodeId) -> Option<NodeId> {
        self.owners.get(child).map(|r| r.clone())
    }

    pub fn children(&self, parent: &NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self
            .owners
            .iter()
            .filter(|r| r.value() == parent)
            .map(|r| r.key().clone())
            .collect();
        children.sort();
        children
    }

    /// Remove a node together with every link touching it.
    pub fn remove_node(&self, id: &NodeId) -> Option<Node> {
        self.owners.remove(id);
        self.owners.retain(|_, parent| parent != id);
        self.nodes.remove(id).map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.iter().map(|r| r.value().clone()).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("links", &self.owners.len())
            .finish()
    }
}
