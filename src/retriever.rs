//! Query-time retrieval policies.
//!
//! Two variants share the store:
//! - `Retriever::search_best_collection` fans a query out across a registry
//!   of topic collections, probes each for its single best hit, and returns
//!   the full result set of the collection with the best scalar score.
//! - `search_with_threshold` queries one collection and drops hits below a
//!   minimum relevance score.
//!
//! The per-collection scalar is the score of the collection's best hit;
//! higher cosine similarity wins, and an exact tie keeps the first
//! collection encountered (registry order is sorted, so ties are
//! deterministic).

use serde::Serialize;

use crate::errors::ApiError;
use crate::llm::Embedder;
use crate::store::{ScoredChunk, VectorStore};

/// The winning collection's result set.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionHits {
    pub collection: String,
    pub hits: Vec<ScoredChunk>,
}

/// Fan-out retriever over an explicit registry of collection names.
pub struct Retriever {
    registry: Vec<String>,
}

impl Retriever {
    pub fn new(mut collections: Vec<String>) -> Self {
        collections.sort();
        collections.dedup();
        Self {
            registry: collections,
        }
    }

    pub fn registry(&self) -> &[String] {
        &self.registry
    }

    /// Searches every registered collection for its top hit and returns the
    /// best collection's results up to `limit`. Collections that do not
    /// exist or whose probe fails are skipped with a warning; `None` means
    /// every collection was skipped or empty.
    pub async fn search_best_collection(
        &self,
        query: &str,
        limit: usize,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
    ) -> Result<Option<CollectionHits>, ApiError> {
        let query_embedding = embed_query(embedder, query).await?;

        let mut best: Option<(String, f32)> = None;
        for name in &self.registry {
            match store.collection_exists(name).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("collection {} does not exist, skipping", name);
                    continue;
                }
                Err(err) => {
                    tracing::warn!("collection {} unavailable, skipping: {}", name, err);
                    continue;
                }
            }

            let probe = match store.search(name, &query_embedding, 1).await {
                Ok(probe) => probe,
                Err(err) => {
                    tracing::warn!("query against {} failed, skipping: {}", name, err);
                    continue;
                }
            };
            let Some(top) = probe.first() else {
                continue;
            };

            // Strictly-greater comparison: equal scores keep the earlier
            // collection.
            let replace = match &best {
                None => true,
                Some((_, score)) => top.score > *score,
            };
            if replace {
                best = Some((name.clone(), top.score));
            }
        }

        let Some((winner, score)) = best else {
            return Ok(None);
        };
        tracing::debug!("best collection {} (score {:.4})", winner, score);

        let hits = store.search(&winner, &query_embedding, limit).await?;
        Ok(Some(CollectionHits {
            collection: winner,
            hits,
        }))
    }
}

/// Single-collection search keeping only hits at or above `min_score`.
/// An empty or missing collection yields an empty result, not an error.
pub async fn search_with_threshold(
    collection: &str,
    query: &str,
    limit: usize,
    min_score: f32,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
) -> Result<Vec<ScoredChunk>, ApiError> {
    let query_embedding = embed_query(embedder, query).await?;
    let hits = store.search(collection, &query_embedding, limit).await?;
    Ok(hits.into_iter().filter(|h| h.score >= min_score).collect())
}

async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>, ApiError> {
    embedder
        .embed(&[query.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Upstream("embedder returned no vector for query".to_string()))
}
