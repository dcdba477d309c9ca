pub mod diversity;
pub mod fusion;

pub use diversity::{DiversityDecision, jaccard_similarity, select_diverse_results};
pub use fusion::{ComponentScores, FusedResult, FusionPolicy, apply_fusion, merge_candidates};

use std::cmp::Ordering;

/// Descending order for scores with NaN sorted last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
