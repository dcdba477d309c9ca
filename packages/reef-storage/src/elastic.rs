use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result, models::SearchHit};

/// Lexical search against an Elasticsearch-compatible `_search` endpoint.
pub struct ElasticStore {
	client: Client,
	search_url: String,
	title_boost: f32,
}
impl ElasticStore {
	pub fn new(cfg: &reef_config::RemoteLexical) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let search_url = format!("{}/{}/_search", cfg.url.trim_end_matches('/'), cfg.index);

		Ok(Self { client, search_url, title_boost: cfg.title_boost })
	}

	pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
		let body = multi_match_body(query, limit, self.title_boost);
		let res = self.client.post(&self.search_url).json(&body).send().await?;
		let status = res.status();
		let text = res.text().await?;

		if !status.is_success() {
			return Err(Error::Status { status: status.as_u16(), body: text });
		}

		parse_search_response(&text)
	}
}

#[derive(Deserialize)]
struct SearchResponse {
	hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
	#[serde(default)]
	hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
	#[serde(rename = "_score")]
	score: Option<f32>,
	#[serde(rename = "_source", default)]
	source: HitSource,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct HitSource {
	title: String,
	url: String,
	content: String,
}

/// Multi-field match over title, content and tags with the title weighted by `title_boost`.
pub fn multi_match_body(query: &str, limit: u32, title_boost: f32) -> Value {
	serde_json::json!({
		"size": limit,
		"query": {
			"multi_match": {
				"query": query,
				"fields": [format!("title^{title_boost}"), "content", "tags"],
			}
		}
	})
}

fn parse_search_response(text: &str) -> Result<Vec<SearchHit>> {
	let parsed: SearchResponse =
		serde_json::from_str(text).map_err(|err| Error::InvalidResponse(err.to_string()))?;

	Ok(parsed
		.hits
		.hits
		.into_iter()
		.map(|hit| SearchHit {
			title: hit.source.title,
			url: hit.source.url,
			content: hit.source.content,
			score: hit.score.unwrap_or(0.0),
		})
		.collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn body_boosts_title_field() {
		let body = multi_match_body("ocean ph", 10, 2.0);

		assert_eq!(body["size"], 10);
		assert_eq!(body["query"]["multi_match"]["query"], "ocean ph");
		assert_eq!(
			body["query"]["multi_match"]["fields"],
			serde_json::json!(["title^2", "content", "tags"])
		);
	}

	#[test]
	fn missing_score_maps_to_zero() {
		let hits = parse_search_response(
			r#"{"hits":{"hits":[{"_score":null,"_source":{"title":"Tides"}}]}}"#,
		)
		.expect("parse failed");

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].score, 0.0);
		assert_eq!(hits[0].url, "");
	}
}
