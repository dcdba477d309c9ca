use std::{sync::Arc, time::Duration};

use reef_storage::models::SearchHit;

use crate::{
	BoxFuture, EmbeddingProvider, LexicalBackend, Result, VectorBackend,
	search::{CandidateResult, RetrievalQuery, RetrievalSource, RetrievalStrategy},
};

/// Multi-field match against the remote lexical backend.
pub struct RemoteLexicalStrategy {
	backend: Arc<dyn LexicalBackend>,
	timeout: Duration,
}
impl RemoteLexicalStrategy {
	pub fn new(backend: Arc<dyn LexicalBackend>, timeout: Duration) -> Self {
		Self { backend, timeout }
	}
}
impl RetrievalStrategy for RemoteLexicalStrategy {
	fn source(&self) -> RetrievalSource {
		RetrievalSource::RemoteLexical
	}

	fn timeout(&self) -> Option<Duration> {
		Some(self.timeout)
	}

	fn search<'a>(
		&'a self,
		query: &'a RetrievalQuery,
	) -> BoxFuture<'a, Result<Vec<CandidateResult>>> {
		Box::pin(async move {
			let hits = self.backend.search_lexical(&query.text, query.limit).await?;

			Ok(hits_to_candidates(RetrievalSource::RemoteLexical, hits, query))
		})
	}
}

/// Embeds the query, then runs k-NN against the remote vector backend.
///
/// A query the embedding provider cannot embed yields no candidates.
pub struct VectorStrategy {
	embedding: Arc<dyn EmbeddingProvider>,
	backend: Arc<dyn VectorBackend>,
	dimensions: u32,
	timeout: Duration,
}
impl VectorStrategy {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		backend: Arc<dyn VectorBackend>,
		dimensions: u32,
		timeout: Duration,
	) -> Self {
		Self { embedding, backend, dimensions, timeout }
	}
}
impl RetrievalStrategy for VectorStrategy {
	fn source(&self) -> RetrievalSource {
		RetrievalSource::Vector
	}

	fn timeout(&self) -> Option<Duration> {
		Some(self.timeout)
	}

	fn search<'a>(
		&'a self,
		query: &'a RetrievalQuery,
	) -> BoxFuture<'a, Result<Vec<CandidateResult>>> {
		Box::pin(async move {
			let Some(vector) = self.embedding.embed(&query.text, self.dimensions).await? else {
				tracing::debug!("No query embedding available. Skipping vector retrieval.");

				return Ok(Vec::new());
			};
			let hits = self.backend.search_vector(vector, query.limit).await?;

			Ok(hits_to_candidates(RetrievalSource::Vector, hits, query))
		})
	}
}

fn hits_to_candidates(
	source: RetrievalSource,
	hits: Vec<SearchHit>,
	query: &RetrievalQuery,
) -> Vec<CandidateResult> {
	hits.into_iter()
		.take(query.limit as usize)
		.filter_map(|hit| {
			let snippet = query.snippet_for(&hit.content);

			CandidateResult::new(source, hit.title, hit.url, snippet, hit.score)
		})
		.collect()
}
