pub mod keyword;
pub mod lexical_index;
pub mod ranking;
pub mod remote;

pub use lexical_index::{Bm25Params, LexicalIndex};
pub use remote::{RemoteLexicalStrategy, VectorStrategy};

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use reef_config::Config;
use reef_domain::{
	Document, document_key,
	snippet::{self, SnippetPolicy},
};

use crate::{Backends, BoxFuture, Result, corpus::CorpusSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
	Bm25,
	RemoteLexical,
	Vector,
	Keyword,
}
impl RetrievalSource {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Bm25 => "bm25",
			Self::RemoteLexical => "remote_lexical",
			Self::Vector => "vector",
			Self::Keyword => "keyword",
		}
	}
}

/// One document reported by one retrieval strategy, with that strategy's raw score.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateResult {
	pub document_key: String,
	pub title: String,
	pub url: String,
	pub snippet: String,
	pub source: RetrievalSource,
	pub score: f32,
}
impl CandidateResult {
	/// Returns `None` when the document has neither a URL nor a title to key it by.
	pub fn new(
		source: RetrievalSource,
		title: String,
		url: String,
		snippet: String,
		score: f32,
	) -> Option<Self> {
		let Some(key) = document_key(&url, &title).map(str::to_string) else {
			tracing::debug!(source = source.as_str(), "Dropping candidate without url or title.");

			return None;
		};
		let score = if score.is_finite() { score.max(0.0) } else { 0.0 };

		Some(Self { document_key: key, title, url, snippet, source, score })
	}
}

/// Per-call query state shared by every strategy.
pub struct RetrievalQuery {
	pub text: String,
	/// Unique normalized query tokens in first-seen order.
	pub terms: Vec<String>,
	/// Maximum candidates each strategy may return.
	pub limit: u32,
	pub corpus: Arc<CorpusSnapshot>,
	pub snippet: SnippetPolicy,
}
impl RetrievalQuery {
	pub fn snippet_for(&self, content: &str) -> String {
		snippet::build_snippet(content, &self.terms, &self.snippet)
	}

	fn document_candidate(
		&self,
		source: RetrievalSource,
		document: &Document,
		score: f32,
	) -> Option<CandidateResult> {
		CandidateResult::new(
			source,
			document.title.clone(),
			document.url.clone(),
			self.snippet_for(&document.content),
			score,
		)
	}
}

pub trait RetrievalStrategy
where
	Self: Send + Sync,
{
	fn source(&self) -> RetrievalSource;

	/// Time budget for one search. `None` runs unbounded.
	fn timeout(&self) -> Option<Duration> {
		None
	}

	fn search<'a>(
		&'a self,
		query: &'a RetrievalQuery,
	) -> BoxFuture<'a, Result<Vec<CandidateResult>>>;
}

/// In-process BM25 over the corpus snapshot of the query.
pub struct Bm25Strategy;
impl RetrievalStrategy for Bm25Strategy {
	fn source(&self) -> RetrievalSource {
		RetrievalSource::Bm25
	}

	fn search<'a>(
		&'a self,
		query: &'a RetrievalQuery,
	) -> BoxFuture<'a, Result<Vec<CandidateResult>>> {
		Box::pin(async move {
			let hits = query.corpus.index.search(&query.terms, query.limit as usize);

			Ok(hits
				.into_iter()
				.filter_map(|(idx, score)| {
					query.document_candidate(
						RetrievalSource::Bm25,
						&query.corpus.documents[idx],
						score,
					)
				})
				.collect())
		})
	}
}

/// Token-overlap fallback that only needs the raw corpus.
pub struct KeywordStrategy {
	pub frequency_bonus: f32,
}
impl RetrievalStrategy for KeywordStrategy {
	fn source(&self) -> RetrievalSource {
		RetrievalSource::Keyword
	}

	fn search<'a>(
		&'a self,
		query: &'a RetrievalQuery,
	) -> BoxFuture<'a, Result<Vec<CandidateResult>>> {
		Box::pin(async move {
			let hits = keyword::keyword_scores(
				&query.corpus.documents,
				&query.terms,
				self.frequency_bonus,
				query.limit as usize,
			);

			Ok(hits
				.into_iter()
				.filter_map(|(idx, score)| {
					query.document_candidate(
						RetrievalSource::Keyword,
						&query.corpus.documents[idx],
						score,
					)
				})
				.collect())
		})
	}
}

/// The four strategy slots the coordinator runs. An empty slot contributes nothing.
#[derive(Clone, Default)]
pub struct Strategies {
	pub bm25: Option<Arc<dyn RetrievalStrategy>>,
	pub remote_lexical: Option<Arc<dyn RetrievalStrategy>>,
	pub vector: Option<Arc<dyn RetrievalStrategy>>,
	pub keyword: Option<Arc<dyn RetrievalStrategy>>,
}
impl Strategies {
	/// BM25 and keyword always run. Remote lexical runs when its backend is present. Vector runs
	/// when the vector-search flag is on and both the embedding provider and vector backend are
	/// present.
	pub fn from_backends(cfg: &Config, backends: &Backends) -> Self {
		let remote_lexical = backends.lexical.clone().map(|backend| {
			Arc::new(RemoteLexicalStrategy::new(
				backend,
				Duration::from_millis(cfg.remote.lexical.timeout_ms),
			)) as Arc<dyn RetrievalStrategy>
		});
		let vector = match (&backends.embedding, &backends.vector) {
			(Some(embedding), Some(vector)) if cfg.retrieval.vector_search =>
				Some(Arc::new(VectorStrategy::new(
					embedding.clone(),
					vector.clone(),
					cfg.remote.vector.vector_dim,
					Duration::from_millis(
						cfg.embedding.timeout_ms.saturating_add(cfg.remote.vector.timeout_ms),
					),
				)) as Arc<dyn RetrievalStrategy>),
			_ => None,
		};

		Self {
			bm25: Some(Arc::new(Bm25Strategy)),
			remote_lexical,
			vector,
			keyword: Some(Arc::new(KeywordStrategy {
				frequency_bonus: cfg.keyword.frequency_bonus,
			})),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn candidate_requires_url_or_title() {
		let candidate = CandidateResult::new(
			RetrievalSource::Vector,
			String::new(),
			" ".to_string(),
			"snippet".to_string(),
			0.5,
		);

		assert!(candidate.is_none());
	}

	#[test]
	fn candidate_score_is_clamped_to_non_negative() {
		let candidate = CandidateResult::new(
			RetrievalSource::Vector,
			"Sea ice".to_string(),
			String::new(),
			String::new(),
			-0.25,
		)
		.expect("Title must key the candidate.");

		assert_eq!(candidate.document_key, "Sea ice");
		assert_eq!(candidate.score, 0.0);
	}
}
