use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Embeds one query text into a vector of `dimensions` values.
///
/// Returns `Ok(None)` for blank text without issuing a request, and when the provider answers
/// with an empty vector.
pub async fn embed(
	cfg: &reef_config::Embedding,
	text: &str,
	dimensions: u32,
) -> Result<Option<Vec<f32>>> {
	if text.trim().is_empty() {
		return Ok(None);
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"model": cfg.model,
		"input": [text],
		"dimensions": dimensions,
	});
	let res = client
		.post(cfg.endpoint())
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vector = parse_embedding_response(&json)?;

	if vector.is_empty() {
		return Ok(None);
	}
	if vector.len() != dimensions as usize {
		return Err(Error::InvalidResponse {
			message: format!("Embedding has {} dimensions; expected {dimensions}.", vector.len()),
		});
	}

	Ok(Some(vector))
}

/// Reads the first embedding out of an OpenAI-style `data[]` array, or a flat `vector` or
/// `embedding` field.
pub fn parse_embedding_response(json: &Value) -> Result<Vec<f32>> {
	if let Some(data) = json.get("data").and_then(Value::as_array) {
		let first = data
			.iter()
			.enumerate()
			.min_by_key(|(fallback_index, item)| {
				item.get("index").and_then(Value::as_u64).unwrap_or(*fallback_index as u64)
			})
			.map(|(_, item)| item);
		let Some(item) = first else {
			return Ok(Vec::new());
		};
		let embedding = item.get("embedding").ok_or_else(|| Error::InvalidResponse {
			message: "Embedding item is missing the embedding array.".to_string(),
		})?;

		return parse_vector(embedding);
	}

	for key in ["vector", "embedding"] {
		if let Some(value) = json.get(key) {
			return parse_vector(value);
		}
	}

	Err(Error::InvalidResponse {
		message: "Embedding response has no data, vector or embedding field.".to_string(),
	})
}

fn parse_vector(value: &Value) -> Result<Vec<f32>> {
	let items = value.as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Embedding must be an array.".to_string(),
	})?;
	let mut vec = Vec::with_capacity(items.len());

	for item in items {
		let number = item.as_f64().ok_or_else(|| Error::InvalidResponse {
			message: "Embedding value must be numeric.".to_string(),
		})?;

		vec.push(number as f32);
	}

	Ok(vec)
}
