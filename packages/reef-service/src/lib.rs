pub mod corpus;
pub mod retrieve;
pub mod search;

mod error;

pub use corpus::{CorpusSnapshot, CorpusStats, CorpusStore};
pub use error::{Error, Result};
pub use retrieve::{RankedResult, RetrieveRequest, RetrieveResponse};
pub use search::{
	CandidateResult, RetrievalQuery, RetrievalSource, RetrievalStrategy, Strategies,
	ranking::{ComponentScores, DiversityDecision, FusedResult, FusionPolicy},
};

use std::{future::Future, pin::Pin, sync::Arc};

use reef_config::Config;
use reef_domain::Document;
use reef_storage::{elastic::ElasticStore, models::SearchHit, qdrant::QdrantStore};

use crate::search::Bm25Params;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	/// `Ok(None)` means the text has no embedding; the vector strategy is skipped.
	fn embed<'a>(
		&'a self,
		text: &'a str,
		dimensions: u32,
	) -> BoxFuture<'a, Result<Option<Vec<f32>>>>;
}

pub trait LexicalBackend
where
	Self: Send + Sync,
{
	fn search_lexical<'a>(
		&'a self,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

pub trait VectorBackend
where
	Self: Send + Sync,
{
	fn search_vector<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

/// Remote collaborators. A missing entry disables the strategy that needs it.
#[derive(Clone, Default)]
pub struct Backends {
	pub embedding: Option<Arc<dyn EmbeddingProvider>>,
	pub lexical: Option<Arc<dyn LexicalBackend>>,
	pub vector: Option<Arc<dyn VectorBackend>>,
}
impl Backends {
	/// Builds the HTTP and Qdrant clients for every enabled backend.
	///
	/// A backend that cannot be constructed is logged and left out.
	pub fn from_config(cfg: &Config) -> Self {
		let mut backends = Self::default();

		if cfg.remote.lexical.enabled {
			match ElasticStore::new(&cfg.remote.lexical) {
				Ok(store) => backends.lexical = Some(Arc::new(store)),
				Err(err) => tracing::warn!(
					error = %err,
					"Remote lexical backend is unavailable. Continuing without it."
				),
			}
		}
		if cfg.vector_search_active() {
			match QdrantStore::new(&cfg.remote.vector) {
				Ok(store) => {
					backends.vector = Some(Arc::new(store));
					backends.embedding =
						Some(Arc::new(HttpEmbedding { cfg: cfg.embedding.clone() }));
				},
				Err(err) => tracing::warn!(
					error = %err,
					"Remote vector backend is unavailable. Continuing without it."
				),
			}
		}

		backends
	}
}

/// Embedding provider speaking the OpenAI-compatible HTTP protocol.
pub struct HttpEmbedding {
	pub cfg: reef_config::Embedding,
}
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(
		&'a self,
		text: &'a str,
		dimensions: u32,
	) -> BoxFuture<'a, Result<Option<Vec<f32>>>> {
		Box::pin(async move {
			Ok(reef_providers::embedding::embed(&self.cfg, text, dimensions).await?)
		})
	}
}

impl LexicalBackend for ElasticStore {
	fn search_lexical<'a>(
		&'a self,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move { Ok(self.search(query, limit).await?) })
	}
}

impl VectorBackend for QdrantStore {
	fn search_vector<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move { Ok(self.search_nearest(vector, limit).await?) })
	}
}

pub struct ReefService {
	pub cfg: Config,
	pub corpus: CorpusStore,
	pub strategies: Strategies,
}
impl ReefService {
	pub fn new(cfg: Config, documents: Vec<Document>) -> Self {
		let backends = Backends::from_config(&cfg);

		Self::with_backends(cfg, documents, backends)
	}

	pub fn with_backends(cfg: Config, documents: Vec<Document>, backends: Backends) -> Self {
		let strategies = Strategies::from_backends(&cfg, &backends);

		Self::with_strategies(cfg, documents, strategies)
	}

	pub fn with_strategies(cfg: Config, documents: Vec<Document>, strategies: Strategies) -> Self {
		let corpus = CorpusStore::new(documents, Bm25Params::from(&cfg.lexical));
		let stats = corpus.snapshot().stats();

		tracing::info!(
			documents = stats.documents,
			indexed_terms = stats.indexed_terms,
			"Corpus loaded."
		);

		Self { cfg, corpus, strategies }
	}

	/// Rebuilds the index for `documents` and swaps it in. Calls already running keep the
	/// snapshot they started with.
	pub fn reload_corpus(&self, documents: Vec<Document>) -> CorpusStats {
		let stats = self.corpus.replace(documents);

		tracing::info!(
			documents = stats.documents,
			indexed_terms = stats.indexed_terms,
			"Corpus replaced."
		);

		stats
	}

	/// Re-reads `corpus.path` and swaps the result in.
	pub fn reload_corpus_from_config(&self) -> Result<CorpusStats> {
		let Some(path) = self.cfg.corpus.path.as_deref() else {
			return Err(Error::InvalidRequest {
				message: "corpus.path is not configured.".to_string(),
			});
		};
		let documents = reef_domain::corpus::load_json(std::path::Path::new(path))?;

		Ok(self.reload_corpus(documents))
	}
}
