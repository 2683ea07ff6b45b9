//! Pairwise decomposition of an expression tree into binary expressions.
//!
//! The decomposer linearizes the tree's logical structure for comparison:
//! an operator node with children `[A, B, C]` yields the adjacent pairs
//! `(A, op, B)` and `(B, op, C)`, not all combinations. The resulting
//! sequence is lazy, finite, and restartable (call [`decompose`] again).

use std::collections::VecDeque;

use crate::tree::{op, NodeId, Tree};

/// Classification of a binary expression by its operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    /// Field comparison: `=` or `$regex`.
    Simple,
    /// Conjunction or disjunction: `$and` or `$or`.
    Compound,
}

/// `(left, operator, right)` triple of node ids, derived from adjacent
/// siblings under the same operator node. Never stored.
#[derive(Debug, Clone, Copy)]
pub struct BinaryExpr {
    pub left: NodeId,
    pub op: NodeId,
    pub right: NodeId,
}

impl BinaryExpr {
    pub fn kind(&self, tree: &Tree) -> ExprKind {
        match tree.value(self.op) {
            op::AND | op::OR => ExprKind::Compound,
            _ => ExprKind::Simple,
        }
    }

    /// Pure syntactic equivalence: left, operator, and right labels all
    /// equal. No numeric or case normalization.
    pub fn is_equivalent_to(
        &self,
        tree: &Tree,
        other: &BinaryExpr,
        other_tree: &Tree,
    ) -> bool {
        tree.value(self.left) == other_tree.value(other.left)
            && tree.value(self.op) == other_tree.value(other.op)
            && tree.value(self.right) == other_tree.value(other.right)
    }

    /// Human-readable rendering for logging.
    pub fn render(&self, tree: &Tree) -> String {
        format!(
            "{} {} {}",
            tree.value(self.left),
            tree.value(self.op),
            tree.value(self.right)
        )
    }
}

/// Lazily flattens the tree below the synthetic `$match` root into
/// binary expressions, breadth first.
///
/// # Panics
///
/// Panics if the root is not the `$match` marker with exactly one child;
/// the parser only ever builds trees of that shape.
pub fn decompose(tree: &Tree) -> Decomposer<'_> {
    let root = tree.root();
    assert!(
        tree.value(root) == op::MATCH && tree.children(root).len() == 1,
        "decompose expects a $match root with exactly one child"
    );

    Decomposer {
        tree,
        queue: VecDeque::from([tree.children(root)[0]]),
        current: None,
    }
}

/// Iterator state for [`decompose`].
pub struct Decomposer<'a> {
    tree: &'a Tree,
    queue: VecDeque<NodeId>,
    /// Operator node currently being paired, plus the next pair index.
    current: Option<(NodeId, usize)>,
}

impl Iterator for Decomposer<'_> {
    type Item = BinaryExpr;

    fn next(&mut self) -> Option<BinaryExpr> {
        loop {
            if let Some((node, i)) = self.current {
                let children = self.tree.children(node);
                if i + 1 < children.len() {
                    let left = children[i];
                    let right = children[i + 1];

                    if !self.tree.node(left).is_leaf() {
                        self.queue.push_back(left);
                    }
                    // A right operand is scheduled only when it closes the
                    // final pair; earlier ones reappear as the next pair's
                    // left operand and would be enqueued twice otherwise.
                    if i + 2 == children.len() && !self.tree.node(right).is_leaf() {
                        self.queue.push_back(right);
                    }

                    self.current = Some((node, i + 1));
                    return Some(BinaryExpr {
                        left,
                        op: node,
                        right,
                    });
                }
                self.current = None;
            }

            let node = self.queue.pop_front()?;
            self.current = Some((node, 0));
        }
    }
}
