//! Chroma v2 HTTP vector store.
//!
//! The collection id is resolved by name on first use and cached for the
//! lifetime of the store.

use std::time::Duration;

use once_cell::sync::OnceCell;
use ragq_core::RetrievalError;
use ragq_core::config::{Credentials, VectorStoreConfig};
use ragq_core::model::{Metadata, WhereFilter};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::http::{HttpError, agent, normalize_base_url};
use super::{StoreRecord, VectorStore};

const TOKEN_HEADER: &str = "x-chroma-token";

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

/// Column-oriented query response, one row per query embedding.
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    documents: Option<Vec<Option<Vec<Option<String>>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Vec<Option<Metadata>>>>>,
    #[serde(default)]
    distances: Option<Vec<Option<Vec<Value>>>>,
}

pub struct ChromaStore {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    tenant: String,
    database: String,
    collection: String,
    collection_id: OnceCell<String>,
}

impl std::fmt::Debug for ChromaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromaStore")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl ChromaStore {
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] when the store URL is not http(s)
    /// or the collection name is blank.
    pub fn new(
        config: &VectorStoreConfig,
        credentials: &Credentials,
        connect_timeout: Duration,
    ) -> Result<Self, RetrievalError> {
        let base_url = normalize_base_url(&config.url)
            .map_err(|e| RetrievalError::Config(format!("vector_store.url: {e}")))?;
        if config.collection.trim().is_empty() {
            return Err(RetrievalError::Config(
                "vector_store.collection must not be empty".into(),
            ));
        }

        Ok(Self {
            agent: agent(connect_timeout),
            base_url,
            api_key: credentials.store_api_key.clone(),
            tenant: credentials.tenant.clone(),
            database: credentials.database.clone(),
            collection: config.collection.clone(),
            collection_id: OnceCell::new(),
        })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    fn collection_id(&self, timeout: Duration) -> Result<&str, HttpError> {
        self.collection_id
            .get_or_try_init(|| {
                let url = format!("{}/{}", self.collections_url(), self.collection);
                let info: CollectionInfo = self
                    .agent
                    .get(&url)
                    .set(TOKEN_HEADER, &self.api_key)
                    .timeout(timeout)
                    .call()
                    .map_err(|e| HttpError::from_ureq(&url, e))?
                    .into_json()
                    .map_err(|e| HttpError::decode(&url, e))?;
                debug!(collection = %self.collection, id = %info.id, "resolved collection");
                Ok::<_, HttpError>(info.id)
            })
            .map(String::as_str)
    }

    fn request(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
        timeout: Duration,
    ) -> Result<Vec<StoreRecord>, HttpError> {
        let id = self.collection_id(timeout)?;
        let url = format!("{}/{id}/query", self.collections_url());

        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(clause) = filter.and_then(WhereFilter::to_store_clause) {
            body["where"] = clause;
        }

        let response: QueryResponse = self
            .agent
            .post(&url)
            .set(TOKEN_HEADER, &self.api_key)
            .timeout(timeout)
            .send_json(body)
            .map_err(|e| HttpError::from_ureq(&url, e))?
            .into_json()
            .map_err(|e| HttpError::decode(&url, e))?;

        Ok(records_from_response(response))
    }
}

impl VectorStore for ChromaStore {
    #[instrument(skip_all, fields(collection = %self.collection, n_results = n_results))]
    fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
        timeout: Duration,
    ) -> Result<Vec<StoreRecord>, RetrievalError> {
        self.request(embedding, n_results, filter, timeout)
            .map_err(RetrievalError::vector_store)
    }
}

/// Zip the first row of each column into records, tolerating missing columns.
fn records_from_response(response: QueryResponse) -> Vec<StoreRecord> {
    let documents = column_row(response.documents);
    let metadatas = first_row(response.metadatas);
    let distances = first_row(response.distances);

    // One record per returned document; ids only size the result when the
    // store sent no documents column.
    let len = documents.as_ref().map_or_else(
        || {
            response
                .ids
                .and_then(|rows| rows.into_iter().next())
                .map_or(0, |row| row.len())
        },
        Vec::len,
    );
    let documents = documents.unwrap_or_default();

    (0..len)
        .map(|i| StoreRecord {
            text: documents.get(i).cloned().flatten(),
            metadata: metadatas.get(i).cloned().flatten(),
            distance: distances.get(i).and_then(parse_distance),
        })
        .collect()
}

fn column_row<T>(column: Option<Vec<Option<Vec<T>>>>) -> Option<Vec<T>> {
    column.and_then(|rows| rows.into_iter().next()).flatten()
}

fn first_row<T>(column: Option<Vec<Option<Vec<T>>>>) -> Vec<T> {
    column_row(column).unwrap_or_default()
}

fn parse_distance(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        other => {
            warn!(value = %other, "non-numeric distance from vector store, treating as missing");
            None
        }
    }
}
