//! Filter-query model: expression trees, pairwise decomposition, the
//! pipeline parser, the coverage predicate, and document evaluation.

pub mod eval;
pub mod expr;
pub mod parser;
pub mod query;
pub mod tree;

pub use eval::{satisfies, DocumentFilter};
pub use expr::{decompose, BinaryExpr, Decomposer, ExprKind};
pub use parser::parse_query;
pub use query::Query;
pub use tree::{op, Node, NodeId, Tree};
