//! Arena-backed expression tree.
//!
//! Nodes live in a flat `Vec`; [`NodeId`] is an index newtype. Children are
//! ordered id lists and the parent is an optional id, so upward traversal
//! for the coverage walk needs no owning back-pointers. Node ids are
//! strictly increasing within a tree.

use std::collections::VecDeque;
use std::fmt;

/// Operator and stage-marker vocabulary of the filter language.
pub mod op {
    pub const MATCH: &str = "$match";
    pub const PROJECT: &str = "$project";
    pub const AND: &str = "$and";
    pub const OR: &str = "$or";
    pub const EQ: &str = "=";
    pub const REGEX: &str = "$regex";
}

/// Index of a node within its owning [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single labeled tree node.
#[derive(Debug, Clone)]
pub struct Node {
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// String label: a field name, operator symbol, or literal.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Ordered child ids.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent id, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Expression tree owning its node arena.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Creates a tree holding only a root with the given label.
    pub fn new(root_value: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node {
                value: root_value.into(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Appends a child under `parent` and returns its id. Ids are handed
    /// out in strictly increasing order.
    pub fn add_child(&mut self, parent: NodeId, value: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            value: value.into(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn value(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].value
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for Tree {
    /// BFS adjacency dump, used in debug logging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut queue = VecDeque::from([self.root()]);
        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            write!(f, "[{id}:{}] ->", node.value())?;
            for &child in node.children() {
                write!(f, " [{child}:{}]", self.value(child))?;
                if !self.node(child).is_leaf() {
                    queue.push_back(child);
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
