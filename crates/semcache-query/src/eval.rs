//! Evaluation of an expression tree against a single document.
//!
//! Used on a cache hit to re-filter previously stored (possibly broader)
//! results against the incoming query before they are served. The filter
//! compiles every `$regex` pattern once up front so evaluating a stream
//! of documents never recompiles a pattern.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use semcache_core::{Error, Result};

use crate::parser::text_form;
use crate::tree::{op, NodeId, Tree};

/// A subtree compiled for repeated evaluation over documents.
#[derive(Debug)]
pub struct DocumentFilter<'a> {
    tree: &'a Tree,
    patterns: HashMap<NodeId, Regex>,
}

impl<'a> DocumentFilter<'a> {
    /// Compiles the subtree rooted at `root`, validating the operator
    /// vocabulary and building every `$regex` pattern once.
    pub fn compile(tree: &'a Tree, root: NodeId) -> Result<Self> {
        let mut patterns = HashMap::new();
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            match tree.value(node) {
                op::AND | op::OR => pending.extend(tree.children(node).iter().copied()),
                op::EQ => {}
                op::REGEX => {
                    let operand = tree.value(tree.children(node)[1]);
                    let pattern = Regex::new(operand).map_err(|e| {
                        Error::parse(format!("invalid $regex pattern `{operand}`: {e}"))
                    })?;
                    patterns.insert(node, pattern);
                }
                other => {
                    return Err(Error::Validation(format!(
                        "unrecognized operator `{other}` in expression tree"
                    )))
                }
            }
        }
        Ok(Self { tree, patterns })
    }

    /// Recursively evaluates the subtree rooted at `node` over `document`.
    ///
    /// `$and` requires all children, `$or` any child. A leaf comparison
    /// stringifies the document field and compares it with the literal
    /// operand (`=`) or matches it against the compiled pattern
    /// (`$regex`). A document missing the referenced field is a
    /// data-quality warning, not an error: it simply does not satisfy the
    /// condition.
    pub fn matches(&self, node: NodeId, document: &Value) -> Result<bool> {
        match self.tree.value(node) {
            op::AND => {
                for &child in self.tree.children(node) {
                    if !self.matches(child, document)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            op::OR => {
                for &child in self.tree.children(node) {
                    if self.matches(child, document)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            op::EQ | op::REGEX => {
                let children = self.tree.children(node);
                let field = self.tree.value(children[0]);

                let Some(value) = document.get(field) else {
                    warn!(field, "result document does not contain the filtered field");
                    return Ok(false);
                };
                let value = text_form(value);

                if self.tree.value(node) == op::EQ {
                    Ok(value == self.tree.value(children[1]))
                } else {
                    let pattern = self.patterns.get(&node).ok_or_else(|| {
                        Error::Validation(format!(
                            "node {node} lies outside the compiled subtree"
                        ))
                    })?;
                    Ok(pattern.is_match(&value))
                }
            }
            other => Err(Error::Validation(format!(
                "unrecognized operator `{other}` in expression tree"
            ))),
        }
    }
}

/// One-shot evaluation of the subtree rooted at `node` over `document`.
///
/// Callers filtering many documents should compile a [`DocumentFilter`]
/// once instead.
pub fn satisfies(tree: &Tree, node: NodeId, document: &Value) -> Result<bool> {
    DocumentFilter::compile(tree, node)?.matches(node, document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_query;
    use serde_json::json;

    fn check(query_text: &str, document: &Value) -> bool {
        let query = parse_query(query_text).unwrap();
        satisfies(query.tree(), query.top_operator(), document).unwrap()
    }

    #[test]
    fn equality_compares_string_forms() {
        let doc = json!({"property_type": "House", "bedrooms": 3});
        assert!(check(r#"[{"$match": {"property_type": "House"}}]"#, &doc));
        assert!(check(r#"[{"$match": {"bedrooms": 3}}]"#, &doc));
        assert!(!check(r#"[{"$match": {"bedrooms": 4}}]"#, &doc));
    }

    #[test]
    fn regex_matches_substring_patterns() {
        let doc = json!({"name": "Long Beach House"});
        assert!(check(r#"[{"$match": {"name": {"$regex": "Beach"}}}]"#, &doc));
        assert!(!check(r#"[{"$match": {"name": {"$regex": "^Beach"}}}]"#, &doc));
    }

    #[test]
    fn and_requires_all_children() {
        let doc = json!({"name": "Beach House", "property_type": "Condo"});
        assert!(!check(
            r#"[{"$match": {"$and": [
                {"name": {"$regex": "Beach"}},
                {"property_type": "House"}
            ]}}]"#,
            &doc
        ));
    }

    #[test]
    fn or_requires_any_child() {
        let doc = json!({"name": "Beach House", "property_type": "Condo"});
        assert!(check(
            r#"[{"$match": {"$or": [
                {"name": {"$regex": "Beach"}},
                {"property_type": "House"}
            ]}}]"#,
            &doc
        ));
    }

    #[test]
    fn missing_field_is_not_satisfied_and_not_an_error() {
        let doc = json!({"name": "Beach House"});
        assert!(!check(r#"[{"$match": {"property_type": "House"}}]"#, &doc));
    }

    #[test]
    fn compiled_filter_is_reused_across_documents() {
        let query = parse_query(
            r#"[{"$match": {"$and": [
                {"name": {"$regex": "Beach"}},
                {"property_type": "House"}
            ]}}]"#,
        )
        .unwrap();
        let top = query.top_operator();
        let filter = DocumentFilter::compile(query.tree(), top).unwrap();

        let hits: Vec<bool> = [
            json!({"name": "Long Beach House", "property_type": "House"}),
            json!({"name": "Beach Hut", "property_type": "Hut"}),
            json!({"name": "Beachfront Villa", "property_type": "House"}),
        ]
        .iter()
        .map(|doc| filter.matches(top, doc).unwrap())
        .collect();

        assert_eq!(hits, vec![true, false, true]);
    }

    #[test]
    fn invalid_pattern_fails_at_compile_time() {
        let query = parse_query(r#"[{"$match": {"name": {"$regex": "("}}}]"#).unwrap();
        let err = DocumentFilter::compile(query.tree(), query.top_operator()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let doc = json!({"name": "Beach"});
        let err = satisfies(query.tree(), query.top_operator(), &doc).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
