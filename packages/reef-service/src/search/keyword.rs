use std::collections::HashSet;

use reef_domain::{Document, text};

use crate::search::ranking;

/// Token-overlap scoring over raw document content.
///
/// A document scores `overlap + frequency_bonus * occurrences`, where `overlap` counts distinct
/// query terms present in the content and `occurrences` counts every content token that is a
/// query term. Documents without overlap are excluded.
pub fn keyword_scores(
	documents: &[Document],
	terms: &[String],
	frequency_bonus: f32,
	limit: usize,
) -> Vec<(usize, f32)> {
	if terms.is_empty() || limit == 0 {
		return Vec::new();
	}

	let query: HashSet<&str> = terms.iter().map(String::as_str).collect();
	let mut out = Vec::new();

	for (idx, document) in documents.iter().enumerate() {
		let tokens = text::tokenize(&document.content);

		if tokens.is_empty() {
			continue;
		}

		let present: HashSet<&str> = tokens.iter().map(String::as_str).collect();
		let overlap = query.iter().filter(|term| present.contains(*term)).count();

		if overlap == 0 {
			continue;
		}

		let occurrences = tokens.iter().filter(|token| query.contains(token.as_str())).count();

		out.push((idx, overlap as f32 + frequency_bonus * occurrences as f32));
	}

	out.sort_by(|a, b| ranking::cmp_f32_desc(a.1, b.1).then(a.0.cmp(&b.0)));
	out.truncate(limit);

	out
}
