//! The caching orchestrator.
//!
//! Per incoming query: parse, probe the query cache, then either serve
//! filtered results from the result cache (hit) or run the pipeline
//! against the remote source while populating both caches (miss). Every
//! emitted document has been persisted before it is handed to the
//! consumer, and a consumer that stops pulling stops the producer at its
//! next send.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use semcache_cache::{QueryCache, ResultCache};
use semcache_core::{
    DocumentSource, Error, QueryRecord, RecordStore, Result, ResultRecord, ResultStream,
};
use semcache_query::{parse_query, DocumentFilter, Query};

use crate::config::ProxyConfig;

/// Semantic caching proxy in front of a [`DocumentSource`].
///
/// Single-flight by design: the two caches sit behind independent locks
/// and are only coupled by the cascading delete performed synchronously
/// inside the miss path.
pub struct CachingProxy {
    source: Arc<dyn DocumentSource>,
    queries: Arc<Mutex<QueryCache>>,
    results: Arc<Mutex<ResultCache>>,
}

impl CachingProxy {
    /// Opens the proxy over its collaborators, clearing both caches
    /// first when the configuration asks for a fresh session.
    pub async fn open(
        source: Arc<dyn DocumentSource>,
        query_store: Arc<dyn RecordStore<QueryRecord>>,
        result_store: Arc<dyn RecordStore<ResultRecord>>,
        config: &ProxyConfig,
    ) -> Result<Self> {
        let mut queries = QueryCache::open(query_store, config.query_capacity).await?;
        let mut results = ResultCache::open(result_store, config.result_capacity).await?;
        if config.clear_on_start {
            queries.clear().await?;
            results.clear().await?;
        }

        Ok(Self {
            source,
            queries: Arc::new(Mutex::new(queries)),
            results: Arc::new(Mutex::new(results)),
        })
    }

    /// Executes a query, serving it from cache when a previously answered
    /// query covers it. Fatal on malformed input or a missing `$match`
    /// stage; cache state is never corrupted by an input error.
    pub async fn exec_query(&self, query_text: &str) -> Result<ResultStream> {
        self.exec_query_tagged(query_text, None).await
    }

    /// Like [`exec_query`], recording the originating file name with the
    /// cached query text.
    ///
    /// [`exec_query`]: CachingProxy::exec_query
    pub async fn exec_query_tagged(
        &self,
        query_text: &str,
        source_file: Option<&str>,
    ) -> Result<ResultStream> {
        let incoming = parse_query(query_text)?;
        debug!(tree = %incoming.tree(), "parsed incoming query");

        let probe = self
            .queries
            .lock()
            .await
            .check_hit_or_miss(query_text, &incoming)
            .await?;
        match probe {
            Some(hit) => {
                info!(query_id = hit.id, "query cache hit");
                self.queries.lock().await.update_access_time(hit.id).await?;
                Ok(self.stream_from_cache(hit, incoming))
            }
            None => {
                info!("query cache miss");
                self.stream_from_source(query_text, source_file, incoming)
                    .await
            }
        }
    }

    /// Hit path: lazily re-filter the covering query's stored results
    /// against the incoming expression tree, refreshing recency per
    /// emitted document.
    fn stream_from_cache(&self, hit: QueryRecord, incoming: Query) -> ResultStream {
        let results = Arc::clone(&self.results);
        let (tx, rx) = mpsc::channel::<Result<String>>(1);

        tokio::spawn(async move {
            let records = match results.lock().await.load_for_query(hit.id).await {
                Ok(records) => records,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            let top = incoming.top_operator();
            let filter = match DocumentFilter::compile(incoming.tree(), top) {
                Ok(filter) => filter,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            for record in records {
                let document: Value = match serde_json::from_str(&record.document) {
                    Ok(document) => document,
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::Deserialization(format!(
                                "cached result {} is not valid JSON: {e}",
                                record.id
                            ))))
                            .await;
                        return;
                    }
                };

                match filter.matches(top, &document) {
                    Ok(true) => {
                        if let Err(e) = results.lock().await.update_access_time(record.id).await {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                        if tx.send(Ok(record.document)).await.is_err() {
                            debug!("consumer dropped; stopping cached result replay");
                            return;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// Miss path: run the pipeline remotely, cache the query (cascading
    /// away an evicted query's results), then store-then-emit each
    /// streamed document.
    async fn stream_from_source(
        &self,
        query_text: &str,
        source_file: Option<&str>,
        incoming: Query,
    ) -> Result<ResultStream> {
        let mut documents = self
            .source
            .execute(incoming.match_stage(), incoming.project_stage())
            .await?;

        let outcome = self
            .queries
            .lock()
            .await
            .store(query_text, source_file)
            .await?;
        // a zero-capacity query cache evicts the query it just stored; no
        // cached query would ever own those results, so none are written
        let cache_results = outcome.evicted != Some(outcome.id);
        if let Some(evicted_id) = outcome.evicted.filter(|&id| id != outcome.id) {
            let removed = self.results.lock().await.remove_for_query(evicted_id).await?;
            info!(evicted_id, removed, "evicted query and cascaded its results");
        }

        let query_id = outcome.id;
        let results = Arc::clone(&self.results);
        let (tx, rx) = mpsc::channel::<Result<String>>(1);

        tokio::spawn(async move {
            use futures::StreamExt;

            let mut evicted_results = 0usize;
            while let Some(item) = documents.next().await {
                let document = match item {
                    Ok(document) => document,
                    Err(e) => {
                        warn!("remote source failed mid-stream: {e}");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };
                let serialized = document.to_string();

                if cache_results {
                    match results.lock().await.store(&serialized, query_id).await {
                        Ok(outcome) => {
                            if outcome.evicted.is_some() {
                                evicted_results += 1;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }

                if tx.send(Ok(serialized)).await.is_err() {
                    debug!("consumer dropped; stopping remote pull");
                    return;
                }
            }

            if evicted_results > 0 {
                debug!(evicted_results, "results evicted while streaming");
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
