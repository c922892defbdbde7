use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tracing::error;

use crate::docstore::{Document, DocumentsApi, Query};
use crate::models::{MediaItem, SearchHit, TrendingRecord};
use crate::tmdb::poster_url;

/// How many counters the trending carousel shows.
pub const CAROUSEL_LIMIT: u32 = 10;

/// Read-modify-write counters over a remote document collection keyed by
/// search term.
pub struct TrendingStore {
    docs: Arc<dyn DocumentsApi>,
    collection_id: String,
}

impl TrendingStore {
    pub fn new(docs: Arc<dyn DocumentsApi>, collection_id: String) -> Self {
        Self {
            docs,
            collection_id,
        }
    }

    pub fn from_env(docs: Arc<dyn DocumentsApi>) -> Result<Self> {
        let collection_id = env::var("APPWRITE_TRENDING_COLLECTION_ID")
            .context("APPWRITE_TRENDING_COLLECTION_ID not set")?;
        Ok(Self::new(docs, collection_id))
    }

    /// Record one observed search event for `term`, represented by the top
    /// result of the settled query. No-op on a blank term or when the top
    /// hit is absent or a person. Deliberately not idempotent: the same
    /// term and top result increment the counter again on every call.
    ///
    /// Failures are logged and swallowed; a missed counter bump never
    /// surfaces to the search flow.
    pub async fn record_search_hit(&self, term: &str, top: Option<&SearchHit>) {
        if term.trim().is_empty() {
            return;
        }
        let Some(media) = top.and_then(|hit| hit.as_media()) else {
            return;
        };
        if let Err(e) = self.upsert(term, media).await {
            error!("Trending counter upsert failed for '{}': {}", term, e);
        }
    }

    async fn upsert(&self, term: &str, media: &MediaItem) -> Result<()> {
        let existing = self
            .docs
            .list_documents(&self.collection_id, &[Query::equal("searchTerm", term)])
            .await?;
        if let Some(doc) = existing.first() {
            // Missing prior count reads as 0 before incrementing.
            let count = doc.i64_field("count").unwrap_or(0);
            self.docs
                .update_document(&self.collection_id, &doc.id, json!({ "count": count + 1 }))
                .await?;
        } else {
            let title = media.display_title.trim();
            let title = if title.is_empty() { "Untitled" } else { title };
            self.docs
                .create_document(
                    &self.collection_id,
                    json!({
                        "searchTerm": term,
                        "movie_id": media.id,
                        "count": 1,
                        "title": title,
                        "poster_url": poster_url(media.poster_path.as_deref()),
                        "vote_average": media.vote_average,
                        "media_type": media.kind.as_str(),
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Highest counters first. Errors degrade to an empty carousel.
    pub async fn top_trending(&self, limit: u32) -> Vec<TrendingRecord> {
        let queries = [Query::limit(limit), Query::order_desc("count")];
        match self.docs.list_documents(&self.collection_id, &queries).await {
            Ok(docs) => docs.iter().filter_map(record_from_doc).collect(),
            Err(e) => {
                error!("Trending fetch failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn record_from_doc(doc: &Document) -> Option<TrendingRecord> {
    Some(TrendingRecord {
        document_id: doc.id.clone(),
        search_term: doc.str_field("searchTerm")?.to_string(),
        movie_id: doc.i64_field("movie_id")?,
        count: doc.i64_field("count").unwrap_or(0),
        title: doc.str_field("title").unwrap_or("Untitled").to_string(),
        poster_url: doc.str_field("poster_url").unwrap_or_default().to_string(),
        vote_average: doc.f64_field("vote_average").unwrap_or(0.0),
        media_type: doc.str_field("media_type").unwrap_or("movie").to_string(),
    })
}

/// The weekly trending feed can surface the same item under several search
/// terms. Dedup by movie id keeping the last occurrence, with the output in
/// the order each id was first seen.
pub fn dedupe_last_wins(records: Vec<TrendingRecord>) -> Vec<TrendingRecord> {
    let mut order: Vec<i64> = Vec::new();
    let mut by_id: HashMap<i64, TrendingRecord> = HashMap::new();
    for record in records {
        if !by_id.contains_key(&record.movie_id) {
            order.push(record.movie_id);
        }
        by_id.insert(record.movie_id, record);
    }
    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}
