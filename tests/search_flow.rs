use anyhow::Result;
use async_trait::async_trait;
use cinefeed::debounce::SearchFlow;
use cinefeed::docstore::{Document, DocumentsApi, Query};
use cinefeed::models::{MediaItem, MediaKind, MediaPage, PersonPage, PersonResult, SearchHit};
use cinefeed::tmdb::{CategoryList, KindFilter, TmdbApi};
use cinefeed::trending::TrendingStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct EchoTmdb;

#[async_trait]
impl TmdbApi for EchoTmdb {
    async fn search_or_trending(
        &self,
        query: &str,
        page: u32,
        _kind_filter: KindFilter,
    ) -> Result<MediaPage> {
        let results = vec![MediaItem {
            id: query.len() as i64,
            display_title: query.to_string(),
            poster_path: None,
            vote_average: 6.0,
            primary_date: None,
            kind: MediaKind::Movie,
        }];
        Ok(MediaPage {
            results,
            page,
            total_pages: 1,
        })
    }

    async fn search_persons(&self, query: &str, page: u32) -> Result<PersonPage> {
        Ok(PersonPage {
            results: vec![PersonResult {
                id: 1,
                name: query.to_string(),
                profile_path: None,
            }],
            page,
            total_pages: 1,
        })
    }

    async fn fetch_category_list(&self, _list: CategoryList, _page: u32) -> Result<Vec<MediaItem>> {
        Ok(Vec::new())
    }
}

/// Single-collection fake, enough for the trending upsert path.
struct CounterDocs {
    docs: Mutex<Vec<Value>>,
    next_id: AtomicU64,
}

impl CounterDocs {
    fn new() -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn stored(&self) -> Vec<Value> {
        self.docs.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentsApi for CounterDocs {
    async fn list_documents(
        &self,
        _collection_id: &str,
        queries: &[Query],
    ) -> Result<Vec<Document>> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .iter()
            .filter(|d| {
                queries.iter().all(|q| match q {
                    Query::Equal { attribute, value } => d.get(attribute) == Some(value),
                    _ => true,
                })
            })
            .cloned()
            .filter_map(Document::from_value)
            .collect())
    }

    async fn create_document(&self, _collection_id: &str, data: Value) -> Result<Document> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut doc = json!({
            "$id": format!("doc-{n}"),
            "$createdAt": "2024-01-01T00:00:00.000+00:00",
        });
        let map = doc.as_object_mut().unwrap();
        for (k, v) in data.as_object().cloned().unwrap_or_default() {
            map.insert(k, v);
        }
        self.docs.lock().unwrap().push(doc.clone());
        Ok(Document::from_value(doc).unwrap())
    }

    async fn update_document(
        &self,
        _collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .iter_mut()
            .find(|d| d.get("$id").and_then(|v| v.as_str()) == Some(document_id))
            .ok_or_else(|| anyhow::anyhow!("no such document"))?;
        let map = doc.as_object_mut().unwrap();
        for (k, v) in data.as_object().cloned().unwrap_or_default() {
            map.insert(k, v);
        }
        Ok(Document::from_value(doc.clone()).unwrap())
    }

    async fn delete_document(&self, _collection_id: &str, document_id: &str) -> Result<()> {
        self.docs
            .lock()
            .unwrap()
            .retain(|d| d.get("$id").and_then(|v| v.as_str()) != Some(document_id));
        Ok(())
    }
}

fn flow(delay: Duration) -> (Arc<CounterDocs>, SearchFlow) {
    let docs = Arc::new(CounterDocs::new());
    let trending = Arc::new(TrendingStore::new(docs.clone(), "trending".to_string()));
    let flow = SearchFlow::new(Arc::new(EchoTmdb), trending).with_delay(delay);
    (docs, flow)
}

#[tokio::test]
async fn settled_query_returns_hits_and_records_one_event() {
    let (docs, flow) = flow(Duration::from_millis(1));
    let hits = flow.submit("batman").await.unwrap().expect("should settle");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].display_title(), "batman");

    let stored = docs.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("searchTerm"), Some(&json!("batman")));
    assert_eq!(stored[0].get("count"), Some(&json!(1)));
}

#[tokio::test]
async fn superseded_keystroke_yields_nothing() {
    let (docs, flow) = flow(Duration::from_millis(40));
    let flow = Arc::new(flow);

    let early = flow.submit("bat");
    let late = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        flow.submit("batman").await
    };
    let (early, late) = tokio::join!(early, late);

    assert!(early.unwrap().is_none());
    let hits = late.unwrap().expect("latest keystroke should settle");
    assert_eq!(hits[0].display_title(), "batman");

    // Only the settled query recorded a trending hit.
    let stored = docs.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("searchTerm"), Some(&json!("batman")));
}

#[tokio::test]
async fn blank_query_settles_to_empty_results() {
    let (docs, flow) = flow(Duration::from_millis(1));
    let hits = flow.submit("   ").await.unwrap().expect("should settle");
    assert!(hits.is_empty());
    assert!(docs.stored().is_empty());
}

#[tokio::test]
async fn person_search_never_records_trending_hits() {
    let (docs, flow) = flow(Duration::from_millis(1));
    let hits = flow
        .submit_persons("bale")
        .await
        .unwrap()
        .expect("should settle");
    assert_eq!(hits.len(), 1);
    assert!(matches!(hits[0], SearchHit::Person(_)));
    assert!(docs.stored().is_empty());
}
