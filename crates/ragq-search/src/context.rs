//! Process-wide retrieval state: client handles and the per-filter retriever cache.
//!
//! A [`RetrievalContext`] is created once from [`Settings`]. Credentials are
//! checked at construction so a misconfigured process fails before its first
//! query. The HTTP clients are built on first use and shared read-only by
//! every concurrent request.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use ragq_core::config::{Credentials, Settings};
use ragq_core::model::{Document, RankedChunk, WhereFilter};
use ragq_core::{Deadline, RetrievalError};
use tracing::{debug, info};

use crate::dense::{ChromaStore, DenseSearchClient, Embedder, OpenAiEmbedder, VectorStore};
use crate::retriever::{FilteredRetriever, HybridParams, HybridRetriever, Retriever, format_context};

pub struct RetrievalContext {
    settings: Settings,
    credentials: Option<Credentials>,
    embedder: OnceCell<Arc<dyn Embedder>>,
    store: OnceCell<Arc<dyn VectorStore>>,
    retrievers: RwLock<HashMap<String, Arc<FilteredRetriever>>>,
}

impl std::fmt::Debug for RetrievalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalContext")
            .field("settings", &self.settings.redacted())
            .field("cached_retrievers", &self.cached_retrievers())
            .finish_non_exhaustive()
    }
}

impl RetrievalContext {
    /// Context backed by the HTTP embedding and vector-store clients.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if settings are out of range or any
    /// credential is missing.
    pub fn new(settings: Settings) -> Result<Self, RetrievalError> {
        settings.validate()?;
        let credentials = settings.require_credentials()?;
        info!(
            service = %settings.service.name,
            collection = %settings.vector_store.collection,
            "retrieval context ready"
        );
        Ok(Self {
            settings,
            credentials: Some(credentials),
            embedder: OnceCell::new(),
            store: OnceCell::new(),
            retrievers: RwLock::new(HashMap::new()),
        })
    }

    /// Context over caller-supplied clients. No credentials are required.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if settings are out of range.
    pub fn with_clients(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, RetrievalError> {
        settings.validate()?;
        Ok(Self {
            settings,
            credentials: None,
            embedder: OnceCell::with_value(embedder),
            store: OnceCell::with_value(store),
            retrievers: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    fn credentials(&self) -> Result<&Credentials, RetrievalError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| RetrievalError::Config("no credentials configured".into()))
    }

    fn embedder(&self) -> Result<Arc<dyn Embedder>, RetrievalError> {
        self.embedder
            .get_or_try_init(|| {
                let embedder = OpenAiEmbedder::new(
                    &self.settings.embedding,
                    self.credentials()?.embedding_api_key.clone(),
                    self.settings.retrieval.timeout(),
                )?;
                debug!(?embedder, "embedding client initialised");
                Ok::<_, RetrievalError>(Arc::new(embedder) as Arc<dyn Embedder>)
            })
            .cloned()
    }

    fn store(&self) -> Result<Arc<dyn VectorStore>, RetrievalError> {
        self.store
            .get_or_try_init(|| {
                let store = ChromaStore::new(
                    &self.settings.vector_store,
                    self.credentials()?,
                    self.settings.retrieval.timeout(),
                )?;
                debug!(?store, "vector store client initialised");
                Ok::<_, RetrievalError>(Arc::new(store) as Arc<dyn VectorStore>)
            })
            .cloned()
    }

    /// Unbound hybrid retriever with the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if a client cannot be built.
    pub fn hybrid(&self) -> Result<HybridRetriever, RetrievalError> {
        let dense = DenseSearchClient::new(self.embedder()?, self.store()?)
            .with_io_ceiling(self.settings.retrieval.timeout());
        Ok(HybridRetriever::new(
            dense,
            HybridParams::from(&self.settings.retrieval),
        ))
    }

    /// Cached retriever for `filter`, with `k = retrieval_k * 2`.
    ///
    /// Retrievers are keyed by [`WhereFilter::cache_key_for`]; distinct
    /// filters never share one.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if a client cannot be built.
    pub fn retriever_for(
        &self,
        filter: Option<&WhereFilter>,
    ) -> Result<Arc<FilteredRetriever>, RetrievalError> {
        let key = WhereFilter::cache_key_for(filter);

        if let Some(existing) = self
            .retrievers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(existing));
        }

        let fresh = Arc::new(FilteredRetriever::new(
            self.hybrid()?,
            self.settings.retrieval.overfetch_k(),
            filter.cloned(),
        ));
        let mut cache = self
            .retrievers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = cache.entry(key).or_insert_with(|| {
            debug!("cached new filtered retriever");
            fresh
        });
        Ok(Arc::clone(entry))
    }

    /// Number of distinct filters with a cached retriever.
    #[must_use]
    pub fn cached_retrievers(&self) -> usize {
        self.retrievers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Ranked chunks for debugging and UI consumers.
    ///
    /// `k` defaults to `retrieval_k * 2`.
    ///
    /// # Errors
    ///
    /// Propagates validation and dense-recall failures.
    pub fn retrieve_ranked_chunks(
        &self,
        query: &str,
        k: Option<usize>,
        filter: Option<&WhereFilter>,
        deadline: &Deadline,
    ) -> Result<Vec<RankedChunk>, RetrievalError> {
        let k = k.unwrap_or_else(|| self.settings.retrieval.overfetch_k());
        let request = ragq_core::model::RetrievalRequest::new(query, k).with_filter(filter.cloned());
        self.hybrid()?.retrieve(&request, deadline)
    }

    /// Documents from the cached retriever for `filter`.
    ///
    /// # Errors
    ///
    /// Propagates validation and dense-recall failures.
    pub fn relevant_documents(
        &self,
        query: &str,
        filter: Option<&WhereFilter>,
        deadline: &Deadline,
    ) -> Result<Vec<Document>, RetrievalError> {
        self.retriever_for(filter)?.relevant_documents(query, deadline)
    }

    /// Prompt context: the first `retrieval_k` documents joined by the separator.
    #[must_use]
    pub fn format_context(&self, docs: &[Document]) -> String {
        format_context(docs, self.settings.retrieval.retrieval_k)
    }
}
