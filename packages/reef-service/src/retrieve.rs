use std::{sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reef_domain::{snippet::SnippetPolicy, text};

use crate::{
	Error, ReefService,
	search::{
		CandidateResult, RetrievalQuery, RetrievalStrategy,
		ranking::{self, ComponentScores, DiversityDecision, FusionPolicy},
	},
};

#[derive(Clone, Debug, Deserialize)]
pub struct RetrieveRequest {
	pub query: String,
	/// Defaults to `retrieval.default_top_k`; clamped to `retrieval.max_top_k`.
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RetrieveResponse {
	pub trace_id: Uuid,
	/// True when the vector strategy contributed candidates and hybrid weights were used.
	pub vector_used: bool,
	pub items: Vec<RankedResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RankedResult {
	pub rank: u32,
	pub document_key: String,
	pub title: String,
	pub url: String,
	pub snippet: String,
	pub score: f32,
	pub scores: ComponentScores,
	pub diversity: DiversityDecision,
}

impl ReefService {
	/// Runs every configured strategy concurrently, fuses their scores and returns a
	/// diversity-ranked list.
	///
	/// Never fails: a strategy that errors or times out contributes nothing. Dropping the
	/// returned future cancels in-flight remote calls.
	pub async fn retrieve(&self, req: RetrieveRequest) -> RetrieveResponse {
		let trace_id = Uuid::new_v4();
		let started = Instant::now();
		let corpus = self.corpus.snapshot();
		let top_k = self.resolve_top_k(req.top_k);
		let empty = RetrieveResponse { trace_id, vector_used: false, items: Vec::new() };

		if corpus.is_empty() {
			tracing::debug!(%trace_id, "No corpus loaded. Returning no results.");

			return empty;
		}
		if top_k == 0 || req.query.trim().is_empty() {
			return empty;
		}

		let query = RetrievalQuery {
			terms: text::query_terms(&req.query),
			text: req.query,
			limit: self.cfg.retrieval.candidate_limit(top_k),
			corpus: Arc::clone(&corpus),
			snippet: SnippetPolicy {
				window_chars: self.cfg.snippet.window_chars as usize,
				stride_chars: self.cfg.snippet.stride_chars as usize,
				passthrough_chars: self.cfg.snippet.passthrough_chars as usize,
			},
		};
		let (bm25, remote_lexical, vector, keyword) = tokio::join!(
			run_strategy(self.strategies.bm25.as_deref(), &query, trace_id),
			run_strategy(self.strategies.remote_lexical.as_deref(), &query, trace_id),
			run_strategy(self.strategies.vector.as_deref(), &query, trace_id),
			run_strategy(self.strategies.keyword.as_deref(), &query, trace_id),
		);
		let vector_used = !vector.is_empty();
		let policy = FusionPolicy::select(&self.cfg.fusion, vector_used);
		let mut fused = ranking::merge_candidates([bm25, remote_lexical, vector, keyword]);

		ranking::apply_fusion(&mut fused, &policy);

		let candidate_count = fused.len();
		let selected = ranking::select_diverse_results(
			fused,
			top_k as usize,
			self.cfg.diversity.mmr_lambda,
		);
		let items: Vec<RankedResult> = selected
			.into_iter()
			.enumerate()
			.map(|(idx, (result, diversity))| RankedResult {
				rank: idx as u32 + 1,
				document_key: result.document_key,
				title: result.title,
				url: result.url,
				snippet: result.snippet,
				score: result.fused_score,
				scores: result.scores,
				diversity,
			})
			.collect();

		tracing::info!(
			%trace_id,
			query = %query.text,
			vector_used,
			fusion = policy.mode(),
			top_k,
			candidates = candidate_count,
			top_score = items.first().map(|item| item.score).unwrap_or(0.0),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Retrieval completed."
		);

		RetrieveResponse { trace_id, vector_used, items }
	}

	fn resolve_top_k(&self, requested: Option<u32>) -> u32 {
		requested.unwrap_or(self.cfg.retrieval.default_top_k).min(self.cfg.retrieval.max_top_k)
	}
}

async fn run_strategy(
	strategy: Option<&dyn RetrievalStrategy>,
	query: &RetrievalQuery,
	trace_id: Uuid,
) -> Vec<CandidateResult> {
	let Some(strategy) = strategy else {
		return Vec::new();
	};
	let source = strategy.source();
	let result = match strategy.timeout() {
		Some(budget) => match tokio::time::timeout(budget, strategy.search(query)).await {
			Ok(result) => result,
			Err(_) => Err(Error::Timeout {
				strategy: source.as_str(),
				timeout_ms: budget.as_millis(),
			}),
		},
		None => strategy.search(query).await,
	};

	match result {
		Ok(mut candidates) => {
			candidates.truncate(query.limit as usize);

			candidates
		},
		Err(err) => {
			tracing::warn!(
				%trace_id,
				source = source.as_str(),
				error = %err,
				"Retrieval strategy failed. Continuing without it."
			);

			Vec::new()
		},
	}
}
