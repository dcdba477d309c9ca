use std::collections::{HashMap, HashSet};

use reef_domain::{Document, text};

use crate::search::ranking;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
	/// Multiplier applied to title-field scores.
	pub title_boost: f32,
}
impl From<&reef_config::Lexical> for Bm25Params {
	fn from(cfg: &reef_config::Lexical) -> Self {
		Self { k1: cfg.k1, b: cfg.b, title_boost: cfg.title_boost }
	}
}
impl Default for Bm25Params {
	fn default() -> Self {
		Self::from(&reef_config::Lexical::default())
	}
}

#[derive(Debug)]
struct Posting {
	doc: u32,
	term_frequency: u32,
}

#[derive(Debug, Default)]
struct FieldIndex {
	postings: HashMap<String, Vec<Posting>>,
	doc_lengths: Vec<u32>,
	total_length: u64,
}
impl FieldIndex {
	fn add(&mut self, doc: u32, tokens: &[String]) {
		let mut frequencies: HashMap<&str, u32> = HashMap::new();

		for token in tokens {
			*frequencies.entry(token.as_str()).or_insert(0) += 1;
		}

		self.doc_lengths.push(tokens.len() as u32);
		self.total_length += tokens.len() as u64;

		for (term, term_frequency) in frequencies {
			self.postings
				.entry(term.to_string())
				.or_default()
				.push(Posting { doc, term_frequency });
		}
	}

	fn average_length(&self) -> f32 {
		if self.doc_lengths.is_empty() {
			return 0.0;
		}

		self.total_length as f32 / self.doc_lengths.len() as f32
	}

	fn accumulate(&self, term: &str, params: &Bm25Params, weight: f32, scores: &mut [Option<f32>]) {
		let Some(postings) = self.postings.get(term) else {
			return;
		};
		let avgdl = self.average_length();

		if avgdl <= 0.0 {
			return;
		}

		let n = self.doc_lengths.len() as f32;
		let df = postings.len() as f32;
		let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

		for posting in postings {
			let dl = self.doc_lengths[posting.doc as usize] as f32;
			let tf = posting.term_frequency as f32;
			let tf_norm =
				(tf * (params.k1 + 1.0)) / (tf + params.k1 * (1.0 - params.b + params.b * dl / avgdl));
			let slot = &mut scores[posting.doc as usize];

			*slot = Some(slot.unwrap_or(0.0) + weight * idf * tf_norm);
		}
	}
}

/// In-memory BM25 index over document bodies plus a boosted title field.
///
/// Built once per corpus load and read-only afterwards.
#[derive(Debug)]
pub struct LexicalIndex {
	params: Bm25Params,
	title: FieldIndex,
	body: FieldIndex,
	doc_count: u32,
}
impl LexicalIndex {
	pub fn build(documents: &[Document], params: Bm25Params) -> Self {
		let mut title = FieldIndex::default();
		let mut body = FieldIndex::default();

		for (idx, document) in documents.iter().enumerate() {
			let doc = idx as u32;

			title.add(doc, &text::tokenize(&document.title));
			body.add(doc, &text::tokenize(&document.body_text()));
		}

		Self { params, title, body, doc_count: documents.len() as u32 }
	}

	pub fn len(&self) -> usize {
		self.doc_count as usize
	}

	pub fn is_empty(&self) -> bool {
		self.doc_count == 0
	}

	/// Number of distinct terms across both fields.
	pub fn term_count(&self) -> usize {
		let terms: HashSet<&str> =
			self.title.postings.keys().chain(self.body.postings.keys()).map(String::as_str).collect();

		terms.len()
	}

	/// Scores every document matching at least one of `terms`.
	///
	/// Returns `(document index, score)` pairs, highest score first, ties by corpus order, at
	/// most `limit` long.
	pub fn search(&self, terms: &[String], limit: usize) -> Vec<(usize, f32)> {
		if self.is_empty() || terms.is_empty() || limit == 0 {
			return Vec::new();
		}

		let mut scores: Vec<Option<f32>> = vec![None; self.len()];

		for term in terms {
			self.body.accumulate(term, &self.params, 1.0, &mut scores);
			self.title.accumulate(term, &self.params, self.params.title_boost, &mut scores);
		}

		let mut out: Vec<(usize, f32)> = scores
			.into_iter()
			.enumerate()
			.filter_map(|(idx, score)| score.map(|score| (idx, score)))
			.collect();

		out.sort_by(|a, b| ranking::cmp_f32_desc(a.1, b.1).then(a.0.cmp(&b.0)));
		out.truncate(limit);

		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(title: &str, content: &str) -> Document {
		Document {
			title: title.to_string(),
			url: format!("https://docs.example/{}", title.to_lowercase().replace(' ', "-")),
			content: content.to_string(),
			..Default::default()
		}
	}

	fn terms(query: &str) -> Vec<String> {
		text::query_terms(query)
	}

	#[test]
	fn empty_index_returns_nothing() {
		let index = LexicalIndex::build(&[], Bm25Params::default());

		assert!(index.is_empty());
		assert!(index.search(&terms("ocean"), 10).is_empty());
	}

	#[test]
	fn only_matching_documents_are_scored() {
		let docs = vec![
			doc("Acidification", "ocean ph acidification trends"),
			doc("Chlorophyll", "satellite chlorophyll retrieval"),
		];
		let index = LexicalIndex::build(&docs, Bm25Params::default());
		let hits = index.search(&terms("acidification"), 10);

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].0, 0);
		assert!(hits[0].1 > 0.0);
	}

	#[test]
	fn higher_term_frequency_ranks_first() {
		let docs = vec![
			doc("One", "kelp grows in cold water near rocky shores"),
			doc("Two", "kelp kelp kelp forests"),
		];
		let index = LexicalIndex::build(&docs, Bm25Params::default());
		let hits = index.search(&terms("kelp"), 10);

		assert_eq!(hits.iter().map(|hit| hit.0).collect::<Vec<_>>(), vec![1, 0]);
	}

	#[test]
	fn title_match_is_boosted() {
		let docs = vec![doc("Tides", "moon gravity oceans"), doc("Moon", "tides gravity oceans")];
		let index = LexicalIndex::build(&docs, Bm25Params::default());
		let hits = index.search(&terms("tides"), 10);

		assert_eq!(hits[0].0, 0, "Title match should outrank the body-only match.");

		let unboosted =
			LexicalIndex::build(&docs, Bm25Params { title_boost: 0.0, ..Default::default() });
		let hits = unboosted.search(&terms("tides"), 10);

		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].0, 1, "Without a boost the body match should lead.");
	}

	#[test]
	fn rare_terms_weigh_more_than_common_terms() {
		let docs = vec![
			doc("A", "ocean salinity"),
			doc("B", "ocean temperature"),
			doc("C", "ocean currents"),
		];
		let index = LexicalIndex::build(&docs, Bm25Params::default());
		let hits = index.search(&terms("ocean salinity"), 10);

		assert_eq!(hits[0].0, 0);
		assert!(hits[0].1 > hits[1].1);
	}

	#[test]
	fn ties_keep_corpus_order_and_limit_applies() {
		let docs = vec![doc("A", "reef survey"), doc("B", "reef survey"), doc("C", "reef survey")];
		let index = LexicalIndex::build(&docs, Bm25Params { title_boost: 0.0, ..Default::default() });
		let hits = index.search(&terms("reef"), 2);

		assert_eq!(hits.iter().map(|hit| hit.0).collect::<Vec<_>>(), vec![0, 1]);
	}

	#[test]
	fn tags_are_indexed_with_the_body() {
		let mut tagged = doc("Buoys", "sensor network");

		tagged.tags = vec!["telemetry".to_string()];

		let index = LexicalIndex::build(&[tagged], Bm25Params::default());

		assert_eq!(index.search(&terms("telemetry"), 5).len(), 1);
		assert!(index.term_count() >= 4);
	}
}
