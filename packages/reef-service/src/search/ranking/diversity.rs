use std::collections::HashSet;

use serde::Serialize;

use reef_domain::text;

use crate::search::ranking::{self, FusedResult};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiversityDecision {
	/// `top_relevance` for the first pick, `mmr` for every later one.
	pub selected_reason: String,
	pub mmr_score: f32,
	pub nearest_selected_key: Option<String>,
	pub similarity: Option<f32>,
}

#[derive(Clone, Copy)]
struct DiversityPick {
	remaining_pos: usize,
	mmr_score: f32,
	nearest: Option<usize>,
	similarity: Option<f32>,
	relevance_rank: usize,
}
impl DiversityPick {
	fn better_than(self, other: &Self) -> bool {
		self.mmr_score > other.mmr_score
			|| (self.mmr_score == other.mmr_score && self.relevance_rank < other.relevance_rank)
	}
}

/// Jaccard similarity of two token sets. Two empty sets are identical; one empty set shares
/// nothing with a non-empty one.
pub fn jaccard_similarity(lhs: &HashSet<String>, rhs: &HashSet<String>) -> f32 {
	if lhs.is_empty() && rhs.is_empty() {
		return 1.0;
	}
	if lhs.is_empty() || rhs.is_empty() {
		return 0.0;
	}

	let intersection = lhs.intersection(rhs).count();
	let union = lhs.len() + rhs.len() - intersection;

	intersection as f32 / union as f32
}

/// Greedy maximal-marginal-relevance selection of `min(top_k, candidates.len())` results.
///
/// The highest fused score is picked first. Each later pick maximizes
/// `lambda * fused_score - (1 - lambda) * max_similarity`, where similarity is the Jaccard
/// similarity of snippet tokens against already selected results. Ties go to the candidate
/// with the higher fused score, then to the earlier one.
pub fn select_diverse_results(
	mut candidates: Vec<FusedResult>,
	top_k: usize,
	lambda: f32,
) -> Vec<(FusedResult, DiversityDecision)> {
	if candidates.is_empty() || top_k == 0 {
		return Vec::new();
	}

	candidates.sort_by(|a, b| ranking::cmp_f32_desc(a.fused_score, b.fused_score));

	let token_sets: Vec<HashSet<String>> =
		candidates.iter().map(|candidate| text::token_set(&candidate.snippet)).collect();
	let mut remaining: Vec<usize> = (1..candidates.len()).collect();
	let mut selected: Vec<(usize, DiversityDecision)> = vec![(0, DiversityDecision {
		selected_reason: "top_relevance".to_string(),
		mmr_score: candidates[0].fused_score,
		nearest_selected_key: None,
		similarity: None,
	})];

	while selected.len() < top_k && !remaining.is_empty() {
		let mut best: Option<DiversityPick> = None;

		for (remaining_pos, candidate_idx) in remaining.iter().copied().enumerate() {
			let (similarity, nearest) = nearest_selected(candidate_idx, &selected, &token_sets);
			let mmr_score = lambda * candidates[candidate_idx].fused_score
				- (1.0 - lambda) * similarity.unwrap_or(0.0);
			let pick = DiversityPick {
				remaining_pos,
				mmr_score,
				nearest,
				similarity,
				relevance_rank: candidate_idx,
			};

			if best.as_ref().map(|current| pick.better_than(current)).unwrap_or(true) {
				best = Some(pick);
			}
		}

		let Some(pick) = best else {
			break;
		};
		let picked_idx = remaining.remove(pick.remaining_pos);

		selected.push((picked_idx, DiversityDecision {
			selected_reason: "mmr".to_string(),
			mmr_score: pick.mmr_score,
			nearest_selected_key: pick.nearest.map(|idx| candidates[idx].document_key.clone()),
			similarity: pick.similarity,
		}));
	}

	let mut slots: Vec<Option<FusedResult>> = candidates.into_iter().map(Some).collect();

	selected
		.into_iter()
		.filter_map(|(idx, decision)| slots[idx].take().map(|result| (result, decision)))
		.collect()
}

fn nearest_selected(
	candidate_idx: usize,
	selected: &[(usize, DiversityDecision)],
	token_sets: &[HashSet<String>],
) -> (Option<f32>, Option<usize>) {
	let mut best_similarity: Option<f32> = None;
	let mut nearest: Option<usize> = None;

	for (selected_idx, _) in selected {
		let similarity = jaccard_similarity(&token_sets[candidate_idx], &token_sets[*selected_idx]);

		if best_similarity.map(|value| similarity > value).unwrap_or(true) {
			best_similarity = Some(similarity);
			nearest = Some(*selected_idx);
		}
	}

	(best_similarity, nearest)
}
