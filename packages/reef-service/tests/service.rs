use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use reef_config::Config;
use reef_domain::Document;
use reef_service::{
	Backends, BoxFuture, CandidateResult, EmbeddingProvider, Error, LexicalBackend, RankedResult,
	ReefService, Result, RetrievalQuery, RetrievalSource, RetrievalStrategy, RetrieveRequest,
	Strategies, VectorBackend, search::Bm25Strategy,
};
use reef_storage::models::SearchHit;

const EPSILON: f32 = 1e-5;

struct ScriptedLexical {
	hits: Vec<SearchHit>,
	calls: Arc<AtomicUsize>,
}
impl ScriptedLexical {
	fn new(hits: Vec<SearchHit>) -> Self {
		Self { hits, calls: Arc::new(AtomicUsize::new(0)) }
	}
}
impl LexicalBackend for ScriptedLexical {
	fn search_lexical<'a>(
		&'a self,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let hits = self.hits.clone();

		Box::pin(async move { Ok(hits) })
	}
}

struct FailingLexical;
impl LexicalBackend for FailingLexical {
	fn search_lexical<'a>(
		&'a self,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move {
			Err(Error::Backend { message: "connection refused".to_string() })
		})
	}
}

/// Sleeps far past any test timeout and records whether its future was dropped early.
struct SlowLexical {
	cancelled: Arc<AtomicBool>,
}
impl LexicalBackend for SlowLexical {
	fn search_lexical<'a>(
		&'a self,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		let guard = CancelGuard { cancelled: self.cancelled.clone(), finished: false };

		Box::pin(async move {
			let mut guard = guard;

			tokio::time::sleep(Duration::from_secs(30)).await;

			guard.finished = true;

			Ok(Vec::new())
		})
	}
}

struct CancelGuard {
	cancelled: Arc<AtomicBool>,
	finished: bool,
}
impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.finished {
			self.cancelled.store(true, Ordering::SeqCst);
		}
	}
}

struct ScriptedEmbedding {
	vector: Option<Vec<f32>>,
}
impl EmbeddingProvider for ScriptedEmbedding {
	fn embed<'a>(
		&'a self,
		_text: &'a str,
		_dimensions: u32,
	) -> BoxFuture<'a, Result<Option<Vec<f32>>>> {
		let vector = self.vector.clone();

		Box::pin(async move { Ok(vector) })
	}
}

struct ScriptedVector {
	hits: Vec<SearchHit>,
	calls: Arc<AtomicUsize>,
}
impl ScriptedVector {
	fn new(hits: Vec<SearchHit>) -> Self {
		Self { hits, calls: Arc::new(AtomicUsize::new(0)) }
	}
}
impl VectorBackend for ScriptedVector {
	fn search_vector<'a>(
		&'a self,
		_vector: Vec<f32>,
		_limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let hits = self.hits.clone();

		Box::pin(async move { Ok(hits) })
	}
}

struct FailingVector;
impl VectorBackend for FailingVector {
	fn search_vector<'a>(
		&'a self,
		_vector: Vec<f32>,
		_limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move { Err(Error::Backend { message: "vector index offline".to_string() }) })
	}
}

/// Reports fixed candidates under the BM25 source, ignoring the corpus.
struct FixedStrategy {
	candidates: Vec<(&'static str, &'static str, f32)>,
}
impl RetrievalStrategy for FixedStrategy {
	fn source(&self) -> RetrievalSource {
		RetrievalSource::Bm25
	}

	fn search<'a>(
		&'a self,
		_query: &'a RetrievalQuery,
	) -> BoxFuture<'a, Result<Vec<CandidateResult>>> {
		let candidates = self
			.candidates
			.iter()
			.filter_map(|(url, snippet, score)| {
				CandidateResult::new(
					RetrievalSource::Bm25,
					url.to_string(),
					url.to_string(),
					snippet.to_string(),
					*score,
				)
			})
			.collect();

		Box::pin(async move { Ok(candidates) })
	}
}

fn test_config() -> Config {
	Config {
		service: reef_config::Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		corpus: Default::default(),
		retrieval: Default::default(),
		lexical: Default::default(),
		keyword: Default::default(),
		snippet: Default::default(),
		remote: Default::default(),
		embedding: Default::default(),
		fusion: Default::default(),
		diversity: Default::default(),
	}
}

fn vector_config() -> Config {
	let mut cfg = test_config();

	cfg.retrieval.vector_search = true;

	cfg
}

fn doc(url: &str, title: &str, content: &str) -> Document {
	Document {
		id: url.to_string(),
		title: title.to_string(),
		url: url.to_string(),
		tags: Vec::new(),
		content: content.to_string(),
	}
}

fn hit(url: &str, content: &str, score: f32) -> SearchHit {
	SearchHit {
		title: format!("Remote {url}"),
		url: url.to_string(),
		content: content.to_string(),
		score,
	}
}

fn ocean_corpus() -> Vec<Document> {
	vec![
		doc("https://docs.example/a", "Trends", "ocean pH acidification trends"),
		doc("https://docs.example/b", "Drivers", "ocean pH acidification drivers"),
		doc("https://docs.example/c", "Chlorophyll", "satellite chlorophyll retrieval"),
		doc("https://docs.example/d", "Buoys", "ocean buoy network measures pH hourly"),
	]
}

fn request(query: &str, top_k: u32) -> RetrieveRequest {
	RetrieveRequest { query: query.to_string(), top_k: Some(top_k) }
}

fn keys(items: &[RankedResult]) -> Vec<&str> {
	items.iter().map(|item| item.document_key.as_str()).collect()
}

fn assert_close(actual: f32, expected: f32) {
	assert!((actual - expected).abs() < EPSILON, "Expected {expected}, got {actual}.");
}

#[tokio::test]
async fn empty_corpus_returns_nothing() {
	let lexical = ScriptedLexical::new(vec![hit("https://remote.example/x", "ocean", 5.0)]);
	let calls = lexical.calls.clone();
	let backends = Backends { lexical: Some(Arc::new(lexical)), ..Default::default() };
	let service = ReefService::with_backends(test_config(), Vec::new(), backends);

	for query in ["ocean pH", "", "anything at all"] {
		assert!(service.retrieve(request(query, 5)).await.items.is_empty());
	}

	assert_eq!(calls.load(Ordering::SeqCst), 0, "Backends must not be queried without a corpus.");
}

#[tokio::test]
async fn blank_query_and_zero_top_k_return_nothing() {
	let service = ReefService::with_backends(test_config(), ocean_corpus(), Backends::default());

	assert!(service.retrieve(request("   ", 5)).await.items.is_empty());
	assert!(service.retrieve(request("ocean", 0)).await.items.is_empty());
}

#[tokio::test]
async fn fused_candidates_have_unique_keys() {
	let lexical = ScriptedLexical::new(vec![
		hit("https://docs.example/a", "ocean pH acidification trends", 9.0),
		hit("https://docs.example/a", "ocean pH acidification trends", 8.0),
		hit("https://docs.example/b", "ocean pH acidification drivers", 7.0),
	]);
	let backends = Backends { lexical: Some(Arc::new(lexical)), ..Default::default() };
	let service = ReefService::with_backends(test_config(), ocean_corpus(), backends);
	let response = service.retrieve(request("ocean pH acidification", 10)).await;
	let mut seen = keys(&response.items);

	seen.sort_unstable();
	seen.dedup();

	assert_eq!(seen.len(), response.items.len());
	assert_eq!(response.items.len(), 3);

	let a = response
		.items
		.iter()
		.find(|item| item.document_key == "https://docs.example/a")
		.expect("Document a must be ranked.");

	assert_eq!(a.title, "Trends", "BM25 is merged first, so its title wins.");
	assert_eq!(a.scores.remote_lexical, 9.0);
	assert!(a.scores.bm25 > 0.0);
}

#[tokio::test]
async fn lexical_fusion_formula_without_vector() {
	let lexical = ScriptedLexical::new(vec![hit("https://docs.example/d", "buoy network", 4.0)]);
	let backends = Backends { lexical: Some(Arc::new(lexical)), ..Default::default() };
	let service = ReefService::with_backends(test_config(), ocean_corpus(), backends);
	let response = service.retrieve(request("ocean pH", 10)).await;

	assert!(!response.vector_used);
	assert!(!response.items.is_empty());

	for item in &response.items {
		let expected = 0.55 * item.scores.bm25 + 0.30 * item.scores.remote_lexical
			+ 0.15 * item.scores.keyword;

		assert_eq!(item.scores.vector, 0.0);
		assert_close(item.score, expected);
	}
}

#[tokio::test]
async fn bm25_and_keyword_only_fusion() {
	let service = ReefService::with_backends(test_config(), ocean_corpus(), Backends::default());
	let response = service.retrieve(request("pH acidification", 10)).await;

	assert_eq!(response.items.len(), 3);

	for item in &response.items {
		assert_eq!(item.scores.remote_lexical, 0.0);
		assert_close(item.score, 0.55 * item.scores.bm25 + 0.15 * item.scores.keyword);
	}
}

#[tokio::test]
async fn hybrid_fusion_formula_with_vector() {
	let lexical = ScriptedLexical::new(vec![hit("https://docs.example/c", "chlorophyll", 50.0)]);
	let vector = ScriptedVector::new(vec![
		hit("https://docs.example/c", "satellite chlorophyll retrieval", 0.9),
		hit("https://docs.example/a", "ocean pH acidification trends", 0.5),
	]);
	let backends = Backends {
		embedding: Some(Arc::new(ScriptedEmbedding { vector: Some(vec![0.1, 0.2, 0.3]) })),
		lexical: Some(Arc::new(lexical)),
		vector: Some(Arc::new(vector)),
	};
	let service = ReefService::with_backends(vector_config(), ocean_corpus(), backends);
	let response = service.retrieve(request("ocean pH", 10)).await;

	assert!(response.vector_used);

	for item in &response.items {
		let expected =
			0.6 * item.scores.bm25 + (1.0 - 0.6) * item.scores.vector + 0.15 * item.scores.keyword;

		assert_close(item.score, expected);
	}

	let c = response
		.items
		.iter()
		.find(|item| item.document_key == "https://docs.example/c")
		.expect("Vector-only document must be ranked.");

	assert_eq!(c.scores.remote_lexical, 50.0);
	assert_close(c.score, 0.4 * 0.9);
}

#[tokio::test]
async fn missing_embedding_skips_vector_strategy() {
	let vector = ScriptedVector::new(vec![hit("https://docs.example/c", "chlorophyll", 0.9)]);
	let calls = vector.calls.clone();
	let backends = Backends {
		embedding: Some(Arc::new(ScriptedEmbedding { vector: None })),
		lexical: None,
		vector: Some(Arc::new(vector)),
	};
	let service = ReefService::with_backends(vector_config(), ocean_corpus(), backends);
	let response = service.retrieve(request("ocean pH", 10)).await;

	assert!(!response.vector_used);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	assert!(response.items.iter().all(|item| item.scores.vector == 0.0));
}

#[tokio::test]
async fn vector_flag_off_ignores_vector_backend() {
	let vector = ScriptedVector::new(vec![hit("https://docs.example/c", "chlorophyll", 0.9)]);
	let calls = vector.calls.clone();
	let backends = Backends {
		embedding: Some(Arc::new(ScriptedEmbedding { vector: Some(vec![1.0]) })),
		lexical: None,
		vector: Some(Arc::new(vector)),
	};
	let service = ReefService::with_backends(test_config(), ocean_corpus(), backends);
	let response = service.retrieve(request("ocean pH", 10)).await;

	assert!(!response.vector_used);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn first_result_has_max_fused_score() {
	let service = ReefService::with_backends(test_config(), ocean_corpus(), Backends::default());
	let response = service.retrieve(request("ocean pH acidification buoy", 10)).await;
	let max = response.items.iter().map(|item| item.score).fold(f32::MIN, f32::max);

	assert!(response.items.len() >= 2);
	assert_eq!(response.items[0].score, max);
	assert_eq!(response.items[0].diversity.selected_reason, "top_relevance");
	assert!(response.items[1..].iter().all(|item| item.diversity.selected_reason == "mmr"));
}

#[tokio::test]
async fn result_size_is_min_of_top_k_and_candidates() {
	let service = ReefService::with_backends(test_config(), ocean_corpus(), Backends::default());

	assert_eq!(service.retrieve(request("pH", 2)).await.items.len(), 2);
	assert_eq!(service.retrieve(request("pH", 10)).await.items.len(), 3);
	assert_eq!(service.retrieve(request("satellite", 10)).await.items.len(), 1);
	assert!(service.retrieve(request("zooplankton", 10)).await.items.is_empty());
}

#[tokio::test]
async fn top_k_defaults_and_clamps() {
	let mut cfg = test_config();

	cfg.retrieval.default_top_k = 1;
	cfg.retrieval.max_top_k = 2;

	let service = ReefService::with_backends(cfg, ocean_corpus(), Backends::default());
	let default_k = RetrieveRequest { query: "pH".to_string(), top_k: None };

	assert_eq!(service.retrieve(default_k).await.items.len(), 1);
	assert_eq!(service.retrieve(request("pH", 1_000)).await.items.len(), 2);
}

#[tokio::test]
async fn near_duplicates_are_diversified() {
	let strategies = Strategies {
		bm25: Some(Arc::new(FixedStrategy {
			candidates: vec![
				("https://docs.example/a", "ocean ph acidification trends", 1.00),
				("https://docs.example/b", "ocean ph acidification trends", 0.98),
				("https://docs.example/c", "satellite chlorophyll retrieval", 0.80),
			],
		})),
		..Default::default()
	};
	let service = ReefService::with_strategies(test_config(), ocean_corpus(), strategies.clone());
	let response = service.retrieve(request("ocean pH", 2)).await;

	assert_eq!(keys(&response.items), vec!["https://docs.example/a", "https://docs.example/c"]);
	assert_eq!(
		response.items[1].diversity.nearest_selected_key.as_deref(),
		Some("https://docs.example/a")
	);

	let mut relevance_only = test_config();

	relevance_only.diversity.mmr_lambda = 1.0;

	let service = ReefService::with_strategies(relevance_only, ocean_corpus(), strategies);
	let response = service.retrieve(request("ocean pH", 2)).await;

	assert_eq!(keys(&response.items), vec!["https://docs.example/a", "https://docs.example/b"]);
}

#[tokio::test]
async fn failing_remotes_degrade_to_local_results() {
	let backends = Backends {
		embedding: Some(Arc::new(ScriptedEmbedding { vector: Some(vec![0.5]) })),
		lexical: Some(Arc::new(FailingLexical)),
		vector: Some(Arc::new(FailingVector)),
	};
	let service = ReefService::with_backends(vector_config(), ocean_corpus(), backends);
	let response = service.retrieve(request("pH acidification", 5)).await;

	assert!(!response.vector_used);
	assert_eq!(response.items.len(), 3);
	assert!(response.items.iter().all(|item| item.scores.bm25 > 0.0 || item.scores.keyword > 0.0));
	assert!(response.items.iter().all(|item| item.scores.remote_lexical == 0.0));
}

#[tokio::test]
async fn slow_remote_times_out_without_blocking() {
	let mut cfg = test_config();

	cfg.remote.lexical.timeout_ms = 50;

	let cancelled = Arc::new(AtomicBool::new(false));
	let backends = Backends {
		lexical: Some(Arc::new(SlowLexical { cancelled: cancelled.clone() })),
		..Default::default()
	};
	let service = ReefService::with_backends(cfg, ocean_corpus(), backends);
	let started = tokio::time::Instant::now();
	let response = service.retrieve(request("pH acidification", 5)).await;

	assert!(started.elapsed() < Duration::from_secs(5));
	assert_eq!(response.items.len(), 3);
	assert!(cancelled.load(Ordering::SeqCst), "Timed-out call must be dropped.");
}

#[tokio::test]
async fn dropping_retrieve_cancels_remote_calls() {
	let mut cfg = test_config();

	cfg.remote.lexical.timeout_ms = 60_000;

	let cancelled = Arc::new(AtomicBool::new(false));
	let backends = Backends {
		lexical: Some(Arc::new(SlowLexical { cancelled: cancelled.clone() })),
		..Default::default()
	};
	let service = ReefService::with_backends(cfg, ocean_corpus(), backends);
	let outcome =
		tokio::time::timeout(Duration::from_millis(50), service.retrieve(request("pH", 5))).await;

	assert!(outcome.is_err(), "The caller deadline should fire first.");
	assert!(cancelled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn repeated_calls_are_deterministic() {
	let service = ReefService::with_backends(test_config(), ocean_corpus(), Backends::default());
	let first = service.retrieve(request("ocean pH acidification", 4)).await;
	let second = service.retrieve(request("ocean pH acidification", 4)).await;
	let summary = |items: &[RankedResult]| {
		items
			.iter()
			.map(|item| (item.document_key.clone(), item.score.to_bits(), item.snippet.clone()))
			.collect::<Vec<_>>()
	};

	assert_ne!(first.trace_id, second.trace_id);
	assert_eq!(summary(&first.items), summary(&second.items));
}

#[tokio::test]
async fn example_corpus_ranks_only_matching_documents() {
	let corpus = vec![
		doc("https://docs.example/a", "", "ocean pH acidification trends"),
		doc("https://docs.example/b", "", "ocean pH acidification drivers"),
		doc("https://docs.example/c", "", "satellite chlorophyll retrieval"),
	];
	let service = ReefService::with_backends(test_config(), corpus, Backends::default());
	let response = service.retrieve(request("pH acidification", 2)).await;

	assert_eq!(keys(&response.items), vec!["https://docs.example/a", "https://docs.example/b"]);
	assert_eq!(response.items[0].score, response.items[1].score);
}

#[tokio::test]
async fn reload_swaps_corpus() {
	let service = ReefService::with_strategies(test_config(), Vec::new(), Strategies {
		bm25: Some(Arc::new(Bm25Strategy)),
		..Default::default()
	});

	assert!(service.retrieve(request("pH", 5)).await.items.is_empty());

	let stats = service.reload_corpus(ocean_corpus());

	assert_eq!(stats.documents, 4);
	assert_eq!(service.retrieve(request("pH", 5)).await.items.len(), 3);
}

#[test]
fn reload_from_config_requires_path() {
	let service = ReefService::with_backends(test_config(), Vec::new(), Backends::default());
	let err = service.reload_corpus_from_config().expect_err("Expected missing path error.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err:?}");
}
