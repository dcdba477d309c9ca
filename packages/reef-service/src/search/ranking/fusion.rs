use std::collections::HashMap;

use serde::Serialize;

use crate::search::{CandidateResult, RetrievalSource};

/// Raw per-source scores of one document. Sources that did not match stay at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ComponentScores {
	pub bm25: f32,
	pub remote_lexical: f32,
	pub vector: f32,
	pub keyword: f32,
}
impl ComponentScores {
	/// Records a score for `source`, keeping the highest when a source reports a document twice.
	pub fn record(&mut self, source: RetrievalSource, score: f32) {
		let slot = match source {
			RetrievalSource::Bm25 => &mut self.bm25,
			RetrievalSource::RemoteLexical => &mut self.remote_lexical,
			RetrievalSource::Vector => &mut self.vector,
			RetrievalSource::Keyword => &mut self.keyword,
		};

		*slot = slot.max(score);
	}
}

/// Weighting applied to component scores. Selected per query by whether vector results exist.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FusionPolicy {
	/// `alpha * bm25 + (1 - alpha) * vector + beta * keyword`. Remote lexical is ignored.
	Hybrid { alpha: f32, beta: f32 },
	/// `alpha * bm25 + gamma * remote_lexical + beta * keyword`.
	Lexical { alpha: f32, gamma: f32, beta: f32 },
}
impl FusionPolicy {
	pub fn select(cfg: &reef_config::Fusion, vector_present: bool) -> Self {
		if vector_present {
			Self::Hybrid { alpha: cfg.alpha, beta: cfg.beta }
		} else {
			Self::Lexical { alpha: cfg.lexical_alpha, gamma: cfg.gamma, beta: cfg.beta }
		}
	}

	pub fn mode(&self) -> &'static str {
		match self {
			Self::Hybrid { .. } => "hybrid",
			Self::Lexical { .. } => "lexical",
		}
	}

	pub fn score(&self, scores: &ComponentScores) -> f32 {
		match *self {
			Self::Hybrid { alpha, beta } =>
				alpha * scores.bm25 + (1.0 - alpha) * scores.vector + beta * scores.keyword,
			Self::Lexical { alpha, gamma, beta } =>
				alpha * scores.bm25 + gamma * scores.remote_lexical + beta * scores.keyword,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct FusedResult {
	pub document_key: String,
	pub title: String,
	pub url: String,
	pub snippet: String,
	pub scores: ComponentScores,
	pub fused_score: f32,
}
impl FusedResult {
	fn new(document_key: String) -> Self {
		Self {
			document_key,
			title: String::new(),
			url: String::new(),
			snippet: String::new(),
			scores: ComponentScores::default(),
			fused_score: 0.0,
		}
	}
}

/// Merges candidate lists into one result per document key, in first-seen order.
///
/// Display fields come from the first source that reported the document; later sources only
/// fill fields that are still empty.
pub fn merge_candidates<I>(lists: I) -> Vec<FusedResult>
where
	I: IntoIterator<Item = Vec<CandidateResult>>,
{
	let mut out: Vec<FusedResult> = Vec::new();
	let mut positions: HashMap<String, usize> = HashMap::new();

	for candidate in lists.into_iter().flatten() {
		let CandidateResult { document_key, title, url, snippet, source, score } = candidate;
		let idx = *positions.entry(document_key.clone()).or_insert_with(|| {
			out.push(FusedResult::new(document_key));

			out.len() - 1
		});
		let fused = &mut out[idx];

		fill_if_empty(&mut fused.title, title);
		fill_if_empty(&mut fused.url, url);
		fill_if_empty(&mut fused.snippet, snippet);

		fused.scores.record(source, score);
	}

	out
}

pub fn apply_fusion(results: &mut [FusedResult], policy: &FusionPolicy) {
	for result in results {
		result.fused_score = policy.score(&result.scores);
	}
}

fn fill_if_empty(slot: &mut String, value: String) {
	if slot.is_empty() && !value.is_empty() {
		*slot = value;
	}
}
