use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use reef_domain::Document;

use crate::search::{Bm25Params, LexicalIndex};

/// Immutable corpus plus the BM25 index built from it.
#[derive(Debug)]
pub struct CorpusSnapshot {
	pub documents: Vec<Document>,
	pub index: LexicalIndex,
}
impl CorpusSnapshot {
	pub fn build(documents: Vec<Document>, params: Bm25Params) -> Self {
		let index = LexicalIndex::build(&documents, params);

		Self { documents, index }
	}

	pub fn is_empty(&self) -> bool {
		self.documents.is_empty()
	}

	pub fn stats(&self) -> CorpusStats {
		CorpusStats { documents: self.documents.len(), indexed_terms: self.index.term_count() }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
	pub documents: usize,
	pub indexed_terms: usize,
}

/// Holds the current snapshot. Readers clone the `Arc`; replacement builds the new snapshot
/// before taking the write lock, so no reader ever sees a partial index.
#[derive(Debug)]
pub struct CorpusStore {
	params: Bm25Params,
	current: RwLock<Arc<CorpusSnapshot>>,
}
impl CorpusStore {
	pub fn new(documents: Vec<Document>, params: Bm25Params) -> Self {
		let snapshot = CorpusSnapshot::build(documents, params);

		Self { params, current: RwLock::new(Arc::new(snapshot)) }
	}

	pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
		self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	pub fn replace(&self, documents: Vec<Document>) -> CorpusStats {
		let snapshot = Arc::new(CorpusSnapshot::build(documents, self.params));
		let stats = snapshot.stats();

		*self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;

		stats
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(url: &str, content: &str) -> Document {
		Document { url: url.to_string(), content: content.to_string(), ..Default::default() }
	}

	#[test]
	fn replace_swaps_without_touching_held_snapshots() {
		let store = CorpusStore::new(vec![doc("a", "tide pools")], Bm25Params::default());
		let before = store.snapshot();
		let stats = store.replace(vec![doc("b", "kelp"), doc("c", "coral reef")]);
		let after = store.snapshot();

		assert_eq!(before.documents.len(), 1);
		assert_eq!(before.index.len(), 1);
		assert_eq!(stats, CorpusStats { documents: 2, indexed_terms: 3 });
		assert_eq!(after.index.len(), 2);
	}

	#[test]
	fn empty_store_is_valid() {
		let store = CorpusStore::new(Vec::new(), Bm25Params::default());

		assert!(store.snapshot().is_empty());
		assert_eq!(store.snapshot().stats().indexed_terms, 0);
	}
}
