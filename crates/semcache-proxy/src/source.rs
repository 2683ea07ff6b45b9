//! In-memory document source, the test and demo double for the remote
//! collaborator.

use async_trait::async_trait;
use serde_json::{Map, Value};

use semcache_core::{DocumentSource, DocumentStream, Error, Result};
use semcache_query::{parse_query, DocumentFilter};

/// Document source evaluating pipelines over a seeded corpus.
///
/// Match semantics reuse the query parser and evaluator; the projection
/// applied here is inclusion-oriented (fields with a nonzero marker are
/// kept, `"_id": 0` drops `_id`), which is all the double needs.
pub struct MemoryDocumentSource {
    documents: Vec<Value>,
}

impl MemoryDocumentSource {
    pub fn new(documents: Vec<Value>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn execute(
        &self,
        match_stage: &Value,
        projection: Option<&Value>,
    ) -> Result<DocumentStream> {
        let mut stages = vec![match_stage.clone()];
        if let Some(projection) = projection {
            stages.push(projection.clone());
        }
        let pipeline = serde_json::to_string(&stages)
            .map_err(|e| Error::source(format!("unserializable pipeline: {e}")))?;
        let query = parse_query(&pipeline)
            .map_err(|e| Error::source(format!("pipeline rejected: {e}")))?;

        let top = query.top_operator();
        let filter = DocumentFilter::compile(query.tree(), top)?;
        let mut matches = Vec::new();
        for document in &self.documents {
            if filter.matches(top, document)? {
                matches.push(Ok(apply_projection(document, projection)));
            }
        }

        Ok(Box::pin(futures::stream::iter(matches)))
    }
}

/// Applies a `$project` stage body to one document.
fn apply_projection(document: &Value, projection: Option<&Value>) -> Value {
    let Some(body) = projection
        .and_then(|stage| stage.get("$project"))
        .and_then(Value::as_object)
    else {
        return document.clone();
    };
    let Some(fields) = document.as_object() else {
        return document.clone();
    };

    let included: Vec<&String> = body
        .iter()
        .filter(|(_, marker)| is_truthy(marker))
        .map(|(name, _)| name)
        .collect();

    let mut projected = Map::new();
    if included.is_empty() {
        // exclusion-only projection: start from the full document
        for (name, value) in fields {
            if !body.contains_key(name) {
                projected.insert(name.clone(), value.clone());
            }
        }
    } else {
        for name in included {
            if let Some(value) = fields.get(name) {
                projected.insert(name.clone(), value.clone());
            }
        }
        // _id rides along unless explicitly excluded
        if !body.contains_key("_id") {
            if let Some(id) = fields.get("_id") {
                projected.insert("_id".to_string(), id.clone());
            }
        }
    }

    Value::Object(projected)
}

fn is_truthy(marker: &Value) -> bool {
    match marker {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn corpus() -> Vec<Value> {
        vec![
            json!({"_id": 1, "name": "Long Beach House", "property_type": "House", "beds": 5}),
            json!({"_id": 2, "name": "City Flat", "property_type": "Apartment", "beds": 1}),
            json!({"_id": 3, "name": "Beachfront Villa", "property_type": "House", "beds": 4}),
        ]
    }

    #[tokio::test]
    async fn filters_and_projects() {
        let source = MemoryDocumentSource::new(corpus());
        let match_stage = json!({"$match": {"property_type": "House"}});
        let projection = json!({"$project": {"_id": 0, "name": 1}});

        let stream = source
            .execute(&match_stage, Some(&projection))
            .await
            .unwrap();
        let documents: Vec<Value> = stream.map(|item| item.unwrap()).collect().await;

        assert_eq!(
            documents,
            vec![
                json!({"name": "Long Beach House"}),
                json!({"name": "Beachfront Villa"}),
            ]
        );
    }

    #[tokio::test]
    async fn exclusion_only_projection_keeps_the_rest() {
        let source = MemoryDocumentSource::new(corpus());
        let match_stage = json!({"$match": {"beds": 1}});
        let projection = json!({"$project": {"_id": 0}});

        let stream = source
            .execute(&match_stage, Some(&projection))
            .await
            .unwrap();
        let documents: Vec<Value> = stream.map(|item| item.unwrap()).collect().await;

        assert_eq!(
            documents,
            vec![json!({"name": "City Flat", "property_type": "Apartment", "beds": 1})]
        );
    }

    #[tokio::test]
    async fn bad_pipeline_is_a_source_error() {
        let source = MemoryDocumentSource::new(corpus());
        let err = source
            .execute(&json!({"$match": []}), None)
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::Source(_)));
    }
}
