//! Query model and the coverage predicate.

use std::collections::HashSet;

use serde_json::Value;

use crate::expr::{decompose, BinaryExpr, ExprKind};
use crate::tree::{op, NodeId, Tree};

/// A parsed filter query: the match expression tree, the projected
/// attribute set, and the raw stage fragments passed through to the
/// remote source on a miss. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Query {
    tree: Tree,
    /// `None` means no projection stage was present, which we read as
    /// "every attribute is retrievable from this query's results".
    projection: Option<HashSet<String>>,
    match_stage: Value,
    project_stage: Option<Value>,
}

impl Query {
    pub(crate) fn new(
        tree: Tree,
        projection: Option<HashSet<String>>,
        match_stage: Value,
        project_stage: Option<Value>,
    ) -> Self {
        Self {
            tree,
            projection,
            match_stage,
            project_stage,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn projection(&self) -> Option<&HashSet<String>> {
        self.projection.as_ref()
    }

    /// Raw `$match` stage document, opaque to the cache.
    pub fn match_stage(&self) -> &Value {
        &self.match_stage
    }

    /// Raw `$project` stage document, when present.
    pub fn project_stage(&self) -> Option<&Value> {
        self.project_stage.as_ref()
    }

    /// The top-level operator node: the `$match` root's single child.
    pub fn top_operator(&self) -> NodeId {
        // the parser guarantees exactly one child under the root
        self.tree.children(self.tree.root())[0]
    }

    /// Decides whether this (cached) query's previously fetched results
    /// are guaranteed to be a superset of what `incoming` would fetch.
    ///
    /// Approximate structural containment: sound for the common cases,
    /// but it does not reason about De Morgan equivalences, value ranges,
    /// or redundant clauses.
    pub fn covers(&self, incoming: &Query) -> bool {
        if !self.projection_covers(incoming) {
            return false;
        }

        let mine: Vec<BinaryExpr> = decompose(&self.tree).collect();
        for expr in decompose(&incoming.tree) {
            if expr.kind(&incoming.tree) != ExprKind::Simple {
                continue;
            }
            let Some(found) = mine
                .iter()
                .find(|candidate| candidate.is_equivalent_to(&self.tree, &expr, &incoming.tree))
            else {
                return false;
            };
            if !self.structurally_consistent(found.op, &incoming.tree, expr.op) {
                return false;
            }
        }
        true
    }

    /// Every attribute `incoming` needs must already be retrievable from
    /// this query's result shape. An absent projection retrieves all
    /// attributes and therefore covers any requirement.
    fn projection_covers(&self, incoming: &Query) -> bool {
        match (&self.projection, &incoming.projection) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => theirs.is_subset(mine),
        }
    }

    /// Lockstep walk up both parent chains from the matched operator
    /// nodes. A conjunction the cached query actually enforced must be
    /// mirrored by the incoming structure.
    fn structurally_consistent(
        &self,
        cached_op: NodeId,
        incoming_tree: &Tree,
        incoming_op: NodeId,
    ) -> bool {
        let mut mine = self.tree.parent(cached_op);
        let mut theirs = incoming_tree.parent(incoming_op);

        while let (Some(m), Some(t)) = (mine, theirs) {
            let my_value = self.tree.value(m);
            let their_value = incoming_tree.value(t);

            if my_value != their_value && my_value == op::AND {
                return false;
            }
            if my_value != their_value
                && self.tree.children(m).len() != incoming_tree.children(t).len()
                && (my_value == op::AND || their_value == op::AND)
            {
                return false;
            }

            mine = self.tree.parent(m);
            theirs = incoming_tree.parent(t);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_query;

    #[test]
    fn coverage_is_reflexive() {
        let texts = [
            r#"[{"$match": {"property_type": "House"}}]"#,
            r#"[{"$match": {"$or": [{"name": {"$regex": "Beach"}}, {"property_type": "House"}]}},
               {"$project": {"name": 1, "property_type": 1}}]"#,
            r#"[{"$match": {"name": {"$regex": "Beach"}, "property_type": "House"}}]"#,
        ];
        for text in texts {
            let query = parse_query(text).unwrap();
            assert!(query.covers(&query), "query must cover itself: {text}");
        }
    }

    #[test]
    fn projection_superset_is_required() {
        let broad = parse_query(
            r#"[{"$match": {"a": 1}}, {"$project": {"name": 1, "beds": 1}}]"#,
        )
        .unwrap();
        let narrow =
            parse_query(r#"[{"$match": {"a": 1}}, {"$project": {"name": 1}}]"#).unwrap();

        assert!(broad.covers(&narrow));
        assert!(!narrow.covers(&broad));
    }

    #[test]
    fn absent_projection_covers_every_attribute_set() {
        let unprojected = parse_query(r#"[{"$match": {"a": 1}}]"#).unwrap();
        let projected =
            parse_query(r#"[{"$match": {"a": 1}}, {"$project": {"name": 1}}]"#).unwrap();

        assert!(unprojected.covers(&projected));
        assert!(!projected.covers(&unprojected));
    }

    #[test]
    fn differing_literals_do_not_cover() {
        let house = parse_query(r#"[{"$match": {"property_type": "House"}}]"#).unwrap();
        let condo = parse_query(r#"[{"$match": {"property_type": "Condo"}}]"#).unwrap();
        assert!(!house.covers(&condo));
    }
}
