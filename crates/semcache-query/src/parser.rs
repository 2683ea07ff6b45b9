//! Parser turning a JSON aggregate pipeline into a [`Query`].
//!
//! A pipeline is an ordered array of stage documents. The stage whose sole
//! top-level key is `$match` is required; a `$project` stage is optional.
//! Only conjunctive/disjunctive equality and `$regex` constraints are
//! understood — everything else is a parse error.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use semcache_core::{Error, Result};

use crate::query::Query;
use crate::tree::{op, NodeId, Tree};

/// Maximum nesting depth allowed for `$and`/`$or` operands.
const MAX_MATCH_DEPTH: usize = 32;

/// Parses query text into an immutable [`Query`].
///
/// Fails with [`Error::Parse`] when the text is not a JSON array of stage
/// documents or when no `$match` stage is present.
pub fn parse_query(text: &str) -> Result<Query> {
    let stages: Vec<Value> = serde_json::from_str(text)
        .map_err(|e| Error::parse(format!("malformed query pipeline: {e}")))?;

    let match_stage = find_stage(&stages, op::MATCH)
        .ok_or_else(|| Error::parse("query has no $match stage"))?
        .clone();
    let project_stage = find_stage(&stages, op::PROJECT).cloned();

    let match_body = stage_body(&match_stage, op::MATCH)?;
    debug!(fields = match_body.len(), "parsing $match stage");

    let mut tree = Tree::new(op::MATCH);
    build_match(&mut tree, match_body)?;

    let projection = match &project_stage {
        Some(stage) => {
            let body = stage_body(stage, op::PROJECT)?;
            debug!(fields = body.len(), "recording projected attributes");
            // Inclusion (1) and exclusion (0) markers are both recorded as
            // "referenced"; the coverage check does not distinguish them.
            Some(body.keys().cloned().collect::<HashSet<String>>())
        }
        None => None,
    };

    Ok(Query::new(tree, projection, match_stage, project_stage))
}

/// Locates the stage whose sole top-level key is `marker`.
fn find_stage<'a>(stages: &'a [Value], marker: &str) -> Option<&'a Value> {
    stages.iter().find(|stage| {
        stage
            .as_object()
            .is_some_and(|obj| obj.len() == 1 && obj.contains_key(marker))
    })
}

fn stage_body<'a>(stage: &'a Value, marker: &str) -> Result<&'a Map<String, Value>> {
    stage
        .get(marker)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::parse(format!("{marker} stage expects an object body")))
}

fn build_match(tree: &mut Tree, body: &Map<String, Value>) -> Result<()> {
    let root = tree.root();

    if body.is_empty() {
        return Err(Error::parse("$match stage is empty"));
    }

    if body.len() == 1 {
        let (name, value) = body
            .iter()
            .next()
            .ok_or_else(|| Error::parse("$match stage is empty"))?;
        if name == op::AND || name == op::OR {
            build_compound(tree, root, name, value, 0)?;
        } else {
            build_simple(tree, root, name, value)?;
        }
        return Ok(());
    }

    // Multiple top-level fields: conjunction is implicit in the source
    // language, so synthesize the $and node it stands for.
    let and = tree.add_child(root, op::AND);
    for (name, value) in body {
        build_simple(tree, and, name, value)?;
    }
    Ok(())
}

/// Builds one simple field constraint: `=` for plain literals, `$regex`
/// for pattern objects. Literals are normalized to their string form.
fn build_simple(tree: &mut Tree, parent: NodeId, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(obj) if obj.len() == 1 && obj.contains_key(op::REGEX) => {
            let pattern = obj
                .get(op::REGEX)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::parse(format!("$regex pattern for field `{name}` must be a string"))
                })?;
            let node = tree.add_child(parent, op::REGEX);
            tree.add_child(node, name);
            tree.add_child(node, pattern);
        }
        Value::Object(_) | Value::Array(_) => {
            return Err(Error::parse(format!(
                "unsupported constraint for field `{name}`: {value}"
            )));
        }
        literal => {
            let node = tree.add_child(parent, op::EQ);
            tree.add_child(node, name);
            tree.add_child(node, text_form(literal));
        }
    }
    Ok(())
}

/// Builds a `$and`/`$or` subtree; each array element is either a nested
/// compound or a simple field constraint.
fn build_compound(
    tree: &mut Tree,
    parent: NodeId,
    name: &str,
    value: &Value,
    depth: usize,
) -> Result<()> {
    if depth > MAX_MATCH_DEPTH {
        return Err(Error::parse(format!(
            "match nesting exceeds maximum depth of {MAX_MATCH_DEPTH}"
        )));
    }

    let operands = value
        .as_array()
        .ok_or_else(|| Error::parse(format!("{name} expects an array of expressions")))?;

    let node = tree.add_child(parent, name);
    for operand in operands {
        let obj = operand
            .as_object()
            .ok_or_else(|| Error::parse(format!("{name} operand must be an object")))?;
        let (first_name, first_value) = obj
            .iter()
            .next()
            .ok_or_else(|| Error::parse(format!("{name} operand is empty")))?;
        if first_name == op::AND || first_name == op::OR {
            build_compound(tree, node, first_name, first_value, depth + 1)?;
        } else {
            build_simple(tree, node, first_name, first_value)?;
        }
    }
    Ok(())
}

/// String form of a literal: strings are taken verbatim, every other
/// scalar renders as its JSON text. Numeric/boolean distinctions are not
/// preserved structurally.
pub(crate) fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::decompose;

    #[test]
    fn missing_match_stage_is_fatal() {
        let err = parse_query(r#"[{"$project": {"name": 1}}]"#).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let err = parse_query("not json").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn single_simple_constraint_sits_under_the_root() {
        let query = parse_query(r#"[{"$match": {"property_type": "House"}}]"#).unwrap();
        let tree = query.tree();
        let rendered: Vec<String> = decompose(tree).map(|e| e.render(tree)).collect();
        assert_eq!(rendered, vec!["property_type = House"]);
    }

    #[test]
    fn numeric_literals_are_stringified() {
        let query =
            parse_query(r#"[{"$match": {"bedrooms": 3, "furnished": true}}]"#).unwrap();
        let tree = query.tree();
        let rendered: Vec<String> = decompose(tree).map(|e| e.render(tree)).collect();
        assert!(rendered.contains(&"bedrooms = 3".to_string()));
        assert!(rendered.contains(&"furnished = true".to_string()));
    }

    #[test]
    fn multiple_fields_synthesize_an_implicit_and() {
        let query = parse_query(
            r#"[{"$match": {"name": {"$regex": "Beach"}, "property_type": "House"}}]"#,
        )
        .unwrap();
        let tree = query.tree();
        let top = tree.children(tree.root())[0];
        assert_eq!(tree.value(top), op::AND);
        assert_eq!(tree.children(top).len(), 2);
    }

    #[test]
    fn nested_compounds_recurse() {
        let query = parse_query(
            r#"[{"$match": {"$and": [
                {"$or": [{"bedrooms": 3}, {"beds": 5}]},
                {"property_type": "House"}
            ]}}]"#,
        )
        .unwrap();
        let tree = query.tree();
        let and = tree.children(tree.root())[0];
        assert_eq!(tree.value(and), op::AND);
        let or = tree.children(and)[0];
        assert_eq!(tree.value(or), op::OR);
        assert_eq!(tree.children(or).len(), 2);
    }

    #[test]
    fn projection_records_every_named_field() {
        let query = parse_query(
            r#"[{"$match": {"a": 1}}, {"$project": {"_id": 0, "name": 1, "beds": 2}}]"#,
        )
        .unwrap();
        let projection = query.projection().unwrap();
        assert_eq!(projection.len(), 3);
        assert!(projection.contains("_id"));
        assert!(projection.contains("name"));
        assert!(projection.contains("beds"));
    }

    #[test]
    fn absent_projection_is_none() {
        let query = parse_query(r#"[{"$match": {"a": 1}}]"#).unwrap();
        assert!(query.projection().is_none());
    }

    #[test]
    fn non_string_regex_pattern_is_rejected() {
        let err = parse_query(r#"[{"$match": {"name": {"$regex": 5}}}]"#).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
