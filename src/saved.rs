use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use serde_json::json;
use std::env;
use std::sync::Arc;
use tracing::{error, warn};

use crate::docstore::{Document, DocumentsApi, Query};
use crate::models::{SaveInput, SavedRecord};

/// Presence-checked create/delete over a remote document collection keyed
/// by `(user, item)`. Uniqueness is enforced by the existence check, not by
/// a server-side index.
pub struct SavedStore {
    docs: Arc<dyn DocumentsApi>,
    collection_id: String,
}

impl SavedStore {
    pub fn new(docs: Arc<dyn DocumentsApi>, collection_id: String) -> Self {
        Self {
            docs,
            collection_id,
        }
    }

    pub fn from_env(docs: Arc<dyn DocumentsApi>) -> Result<Self> {
        let collection_id = env::var("APPWRITE_SAVED_COLLECTION_ID")
            .context("APPWRITE_SAVED_COLLECTION_ID not set")?;
        Ok(Self::new(docs, collection_id))
    }

    fn pair_queries(user_id: &str, movie_id: i64) -> [Query; 2] {
        [
            Query::equal("userId", user_id),
            Query::equal("movie_id", movie_id),
        ]
    }

    /// Save an item for a user. Already-saved pairs are a silent no-op.
    /// This is the one store operation that re-raises failures, so the
    /// caller can show a failure indication on the toggle.
    pub async fn save(&self, user_id: &str, item: &SaveInput) -> Result<()> {
        let existing = self
            .docs
            .list_documents(
                &self.collection_id,
                &Self::pair_queries(user_id, item.movie_id),
            )
            .await?;
        if !existing.is_empty() {
            return Ok(());
        }
        self.docs
            .create_document(
                &self.collection_id,
                json!({
                    "userId": user_id,
                    "movie_id": item.movie_id,
                    "title": item.title,
                    "poster_url": item.poster_url,
                    "vote_average": item.vote_average,
                    "release_date": normalize_release_date(&item.release_date),
                    "media_type": item.media_type.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    /// Delete the saved pair if present; an absent pair just logs. Failures
    /// are logged and swallowed.
    pub async fn remove(&self, user_id: &str, movie_id: i64) {
        let existing = match self
            .docs
            .list_documents(&self.collection_id, &Self::pair_queries(user_id, movie_id))
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                error!("Saved item lookup failed for {}: {}", movie_id, e);
                return;
            }
        };
        let Some(doc) = existing.first() else {
            warn!("No saved item found for id {}", movie_id);
            return;
        };
        if let Err(e) = self
            .docs
            .delete_document(&self.collection_id, &doc.id)
            .await
        {
            error!("Saved item delete failed for {}: {}", movie_id, e);
        }
    }

    /// All saved items for a user, newest saved first (ordered by document
    /// creation time, not release date). Errors degrade to an empty list.
    pub async fn list(&self, user_id: &str) -> Vec<SavedRecord> {
        let queries = [Query::equal("userId", user_id)];
        match self.docs.list_documents(&self.collection_id, &queries).await {
            Ok(docs) => {
                let mut records: Vec<SavedRecord> =
                    docs.iter().filter_map(record_from_doc).collect();
                sort_newest_first(&mut records);
                records
            }
            Err(e) => {
                error!("Saved list fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Existence check backing the save-toggle state; read fresh each time,
    /// never cached. Errors log and read as not saved.
    pub async fn is_saved(&self, user_id: &str, movie_id: i64) -> bool {
        match self
            .docs
            .list_documents(&self.collection_id, &Self::pair_queries(user_id, movie_id))
            .await
        {
            Ok(docs) => !docs.is_empty(),
            Err(e) => {
                error!("Saved check failed for {}: {}", movie_id, e);
                false
            }
        }
    }
}

fn record_from_doc(doc: &Document) -> Option<SavedRecord> {
    Some(SavedRecord {
        document_id: doc.id.clone(),
        created_at: doc.created_at.clone(),
        user_id: doc.str_field("userId")?.to_string(),
        movie_id: doc.i64_field("movie_id")?,
        title: doc.str_field("title").unwrap_or("Untitled").to_string(),
        poster_url: doc.str_field("poster_url").unwrap_or_default().to_string(),
        vote_average: doc.f64_field("vote_average").unwrap_or(0.0),
        release_date: doc
            .str_field("release_date")
            .unwrap_or_default()
            .to_string(),
        media_type: doc.str_field("media_type").unwrap_or("movie").to_string(),
    })
}

fn sort_newest_first(records: &mut [SavedRecord]) {
    records.sort_by_key(|r| {
        std::cmp::Reverse(
            DateTime::parse_from_rfc3339(&r.created_at)
                .map(|dt| dt.timestamp_millis())
                .unwrap_or(0),
        )
    });
}

/// Dates arrive as bare `YYYY-MM-DD` strings from the media API; stored
/// records carry a full ISO-8601 instant at UTC midnight. Inputs that are
/// already instants pass through re-normalized; anything unparseable is
/// stored as given.
fn normalize_release_date(raw: &str) -> String {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt
            .to_utc()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, created_at: &str) -> SavedRecord {
        SavedRecord {
            document_id: format!("doc-{id}"),
            created_at: created_at.to_string(),
            user_id: "u1".to_string(),
            movie_id: id,
            title: String::new(),
            poster_url: String::new(),
            vote_average: 0.0,
            release_date: String::new(),
            media_type: "movie".to_string(),
        }
    }

    #[test]
    fn bare_dates_normalize_to_utc_midnight() {
        assert_eq!(
            normalize_release_date("2024-03-15"),
            "2024-03-15T00:00:00.000Z"
        );
    }

    #[test]
    fn instants_renormalize_to_utc() {
        assert_eq!(
            normalize_release_date("2024-03-15T10:30:00+02:00"),
            "2024-03-15T08:30:00.000Z"
        );
    }

    #[test]
    fn unparseable_dates_pass_through() {
        assert_eq!(normalize_release_date("soon"), "soon");
        assert_eq!(normalize_release_date(""), "");
    }

    #[test]
    fn list_orders_by_creation_time_descending() {
        let mut records = vec![
            record(1, "2024-01-01T00:00:00.000+00:00"),
            record(2, "2024-06-01T00:00:00.000+00:00"),
            record(3, "not-a-date"),
        ];
        sort_newest_first(&mut records);
        let ids: Vec<i64> = records.iter().map(|r| r.movie_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
