mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Corpus, Diversity, Embedding, Fusion, Keyword, Lexical, Remote, RemoteLexical,
	RemoteVector, Retrieval, Service, Snippet,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.retrieval.default_top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.max_top_k < cfg.retrieval.default_top_k {
		return Err(Error::Validation {
			message: "retrieval.max_top_k must be greater than or equal to retrieval.default_top_k."
				.to_string(),
		});
	}
	if cfg.retrieval.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if !cfg.lexical.k1.is_finite() || cfg.lexical.k1 <= 0.0 {
		return Err(Error::Validation {
			message: "lexical.k1 must be a finite number greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("lexical.b", cfg.lexical.b),
		("fusion.alpha", cfg.fusion.alpha),
		("diversity.mmr_lambda", cfg.diversity.mmr_lambda),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}
	for (label, value) in [
		("lexical.title_boost", cfg.lexical.title_boost),
		("keyword.frequency_bonus", cfg.keyword.frequency_bonus),
		("remote.lexical.title_boost", cfg.remote.lexical.title_boost),
		("fusion.lexical_alpha", cfg.fusion.lexical_alpha),
		("fusion.gamma", cfg.fusion.gamma),
		("fusion.beta", cfg.fusion.beta),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if cfg.snippet.window_chars == 0 {
		return Err(Error::Validation {
			message: "snippet.window_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.snippet.stride_chars == 0 {
		return Err(Error::Validation {
			message: "snippet.stride_chars must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("remote.lexical.timeout_ms", cfg.remote.lexical.timeout_ms),
		("remote.vector.timeout_ms", cfg.remote.vector.timeout_ms),
		("embedding.timeout_ms", cfg.embedding.timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.remote.lexical.enabled {
		for (label, value) in [
			("remote.lexical.url", &cfg.remote.lexical.url),
			("remote.lexical.index", &cfg.remote.lexical.index),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation {
					message: format!(
						"{label} must be non-empty when remote.lexical.enabled is true."
					),
				});
			}
		}
	}
	if cfg.remote.vector.enabled {
		for (label, value) in [
			("remote.vector.url", &cfg.remote.vector.url),
			("remote.vector.collection", &cfg.remote.vector.collection),
			("remote.vector.vector_name", &cfg.remote.vector.vector_name),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation {
					message: format!(
						"{label} must be non-empty when remote.vector.enabled is true."
					),
				});
			}
		}

		if cfg.remote.vector.vector_dim == 0 {
			return Err(Error::Validation {
				message: "remote.vector.vector_dim must be greater than zero.".to_string(),
			});
		}
	}
	if cfg.vector_search_active() {
		if cfg.embedding.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "embedding.api_base must be non-empty when vector search is active."
					.to_string(),
			});
		}
		if cfg.embedding.dimensions != cfg.remote.vector.vector_dim {
			return Err(Error::Validation {
				message: "embedding.dimensions must match remote.vector.vector_dim.".to_string(),
			});
		}
	}

	for (key, value) in &cfg.embedding.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("embedding.default_headers.{key} must be a string."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.corpus.path.as_deref().map(|path| path.trim().is_empty()).unwrap_or(false) {
		cfg.corpus.path = None;
	}
	if cfg.embedding.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.embedding.api_key = None;
	}

	cfg.remote.lexical.url = cfg.remote.lexical.url.trim_end_matches('/').to_string();
	cfg.embedding.api_base = cfg.embedding.api_base.trim_end_matches('/').to_string();
}
