use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub corpus: Corpus,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub lexical: Lexical,
	#[serde(default)]
	pub keyword: Keyword,
	#[serde(default)]
	pub snippet: Snippet,
	#[serde(default)]
	pub remote: Remote,
	#[serde(default)]
	pub embedding: Embedding,
	#[serde(default)]
	pub fusion: Fusion,
	#[serde(default)]
	pub diversity: Diversity,
}
impl Config {
	/// True when the remote vector strategy may run at all: the vector-search flag is on and
	/// the vector backend is enabled.
	pub fn vector_search_active(&self) -> bool {
		self.retrieval.vector_search && self.remote.vector.enabled
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Corpus {
	/// Optional. JSON array of `{id, title, url, tags, content}` records.
	pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub default_top_k: u32,
	pub max_top_k: u32,
	/// Lower bound of the per-strategy candidate limit.
	pub min_candidates: u32,
	/// Per-strategy candidate limit is `max(min_candidates, top_k * candidate_multiplier)`.
	pub candidate_multiplier: u32,
	pub vector_search: bool,
}
impl Retrieval {
	pub fn candidate_limit(&self, top_k: u32) -> u32 {
		self.min_candidates.max(top_k.saturating_mul(self.candidate_multiplier))
	}
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			default_top_k: 5,
			max_top_k: 50,
			min_candidates: 5,
			candidate_multiplier: 2,
			vector_search: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Lexical {
	pub k1: f32,
	pub b: f32,
	pub title_boost: f32,
}
impl Default for Lexical {
	fn default() -> Self {
		Self { k1: 1.2, b: 0.75, title_boost: 2.0 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Keyword {
	pub frequency_bonus: f32,
}
impl Default for Keyword {
	fn default() -> Self {
		Self { frequency_bonus: 0.2 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Snippet {
	pub window_chars: u32,
	pub stride_chars: u32,
	/// Content shorter than this is returned as the snippet unmodified.
	pub passthrough_chars: u32,
}
impl Default for Snippet {
	fn default() -> Self {
		Self { window_chars: 150, stride_chars: 50, passthrough_chars: 200 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Remote {
	pub lexical: RemoteLexical,
	pub vector: RemoteVector,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteLexical {
	pub enabled: bool,
	pub url: String,
	pub index: String,
	pub title_boost: f32,
	pub timeout_ms: u64,
}
impl Default for RemoteLexical {
	fn default() -> Self {
		Self {
			enabled: false,
			url: "http://127.0.0.1:9200".to_string(),
			index: "reef_corpus".to_string(),
			title_boost: 2.0,
			timeout_ms: 2_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteVector {
	pub enabled: bool,
	pub url: String,
	pub collection: String,
	/// Name of the dense-vector field queried with k-NN.
	pub vector_name: String,
	pub vector_dim: u32,
	pub timeout_ms: u64,
}
impl Default for RemoteVector {
	fn default() -> Self {
		Self {
			enabled: false,
			url: "http://127.0.0.1:6334".to_string(),
			collection: "reef_corpus".to_string(),
			vector_name: "embedding".to_string(),
			vector_dim: 768,
			timeout_ms: 2_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Embedding {
	pub api_base: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub api_key: Option<String>,
	pub default_headers: Map<String, Value>,
}
impl Embedding {
	pub fn endpoint(&self) -> String {
		format!("{}{}", self.api_base, self.path)
	}
}
impl Default for Embedding {
	fn default() -> Self {
		Self {
			api_base: String::new(),
			path: "/v1/embeddings".to_string(),
			model: String::new(),
			dimensions: 768,
			timeout_ms: 4_000,
			api_key: None,
			default_headers: Map::new(),
		}
	}
}

/// Weights of the score fusion. These are hand-tuned defaults, not a fixed contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Fusion {
	/// BM25 weight when vector results exist; the vector weight is `1 - alpha`.
	pub alpha: f32,
	/// BM25 weight when no vector results exist.
	pub lexical_alpha: f32,
	/// Remote lexical weight when no vector results exist.
	pub gamma: f32,
	/// Keyword overlap weight in both modes.
	pub beta: f32,
}
impl Default for Fusion {
	fn default() -> Self {
		Self { alpha: 0.6, lexical_alpha: 0.55, gamma: 0.30, beta: 0.15 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Diversity {
	pub mmr_lambda: f32,
}
impl Default for Diversity {
	fn default() -> Self {
		Self { mmr_lambda: 0.7 }
	}
}
