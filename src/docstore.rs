use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::env;

use crate::error::RemoteServiceError;

/// The query surface the stores need: equality, descending order, and a
/// result cap. Rendered in the document service's string syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal { attribute: String, value: Value },
    OrderDesc { attribute: String },
    Limit(u32),
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Query::Equal {
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    pub fn order_desc(attribute: &str) -> Self {
        Query::OrderDesc {
            attribute: attribute.to_string(),
        }
    }

    pub fn limit(n: u32) -> Self {
        Query::Limit(n)
    }

    pub fn render(&self) -> String {
        match self {
            Query::Equal { attribute, value } => {
                format!("equal(\"{attribute}\", [{value}])")
            }
            Query::OrderDesc { attribute } => format!("orderDesc(\"{attribute}\")"),
            Query::Limit(n) => format!("limit({n})"),
        }
    }
}

/// One remote document: server-assigned id and creation timestamp plus the
/// stored payload fields.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub created_at: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn from_value(value: Value) -> Option<Self> {
        let fields = match value {
            Value::Object(map) => map,
            _ => return None,
        };
        let id = fields.get("$id")?.as_str()?.to_string();
        let created_at = fields
            .get("$createdAt")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Some(Self {
            id,
            created_at,
            fields,
        })
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.fields
            .get(name)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
    }

    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|v| v.as_f64())
    }
}

/// The seam the trending and saved stores depend on; integration tests
/// substitute an in-memory fake.
#[async_trait]
pub trait DocumentsApi: Send + Sync {
    async fn list_documents(&self, collection_id: &str, queries: &[Query])
        -> Result<Vec<Document>>;
    async fn create_document(&self, collection_id: &str, data: Value) -> Result<Document>;
    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document>;
    async fn delete_document(&self, collection_id: &str, document_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct AppwriteClient {
    client: Client,
    endpoint: String,
    project_id: String,
    api_key: String,
    database_id: String,
}

impl AppwriteClient {
    pub fn new(endpoint: String, project_id: String, api_key: String, database_id: String) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id,
            api_key,
            database_id,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            env::var("APPWRITE_ENDPOINT").context("APPWRITE_ENDPOINT not set")?,
            env::var("APPWRITE_PROJECT_ID").context("APPWRITE_PROJECT_ID not set")?,
            env::var("APPWRITE_API_KEY").context("APPWRITE_API_KEY not set")?,
            env::var("APPWRITE_DATABASE_ID").context("APPWRITE_DATABASE_ID not set")?,
        ))
    }

    fn documents_url(&self, collection_id: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database_id, collection_id
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
    }

    async fn send_json(&self, req: RequestBuilder) -> Result<Value> {
        let res = req
            .send()
            .await
            .map_err(|e| RemoteServiceError(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(RemoteServiceError(status.to_string()).into());
        }
        let value = res.json().await.context("document response parse failed")?;
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    documents: Vec<Value>,
}

#[async_trait]
impl DocumentsApi for AppwriteClient {
    async fn list_documents(
        &self,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<Vec<Document>> {
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", q.render()))
            .collect();
        let req = self
            .request(Method::GET, &self.documents_url(collection_id))
            .query(&params);
        let value = self.send_json(req).await?;
        let envelope: ListEnvelope =
            serde_json::from_value(value).context("document list parse failed")?;
        Ok(envelope
            .documents
            .into_iter()
            .filter_map(Document::from_value)
            .collect())
    }

    async fn create_document(&self, collection_id: &str, data: Value) -> Result<Document> {
        let req = self
            .request(Method::POST, &self.documents_url(collection_id))
            .json(&json!({ "documentId": "unique()", "data": data }));
        let value = self.send_json(req).await?;
        Document::from_value(value).context("created document missing $id")
    }

    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        data: Value,
    ) -> Result<Document> {
        let url = format!("{}/{document_id}", self.documents_url(collection_id));
        let req = self
            .request(Method::PATCH, &url)
            .json(&json!({ "data": data }));
        let value = self.send_json(req).await?;
        Document::from_value(value).context("updated document missing $id")
    }

    async fn delete_document(&self, collection_id: &str, document_id: &str) -> Result<()> {
        let url = format!("{}/{document_id}", self.documents_url(collection_id));
        let res = self
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| RemoteServiceError(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(RemoteServiceError(status.to_string()).into());
        }
        Ok(())
    }
}
