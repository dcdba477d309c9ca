use std::collections::HashMap;

use qdrant_client::qdrant::{Query, QueryPointsBuilder, ScoredPoint, Value, value::Kind};

use crate::{Error, Result, models::SearchHit};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_name: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &reef_config::RemoteVector) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_name: cfg.vector_name.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	/// k-NN query over the configured named vector.
	pub async fn search_nearest(&self, vector: Vec<f32>, limit: u32) -> Result<Vec<SearchHit>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions; collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.using(self.vector_name.as_str())
			.limit(limit as u64)
			.with_payload(true);
		let response = self.client.query(search).await?;

		Ok(response.result.iter().map(scored_point_to_hit).collect())
	}
}

pub fn scored_point_to_hit(point: &ScoredPoint) -> SearchHit {
	SearchHit {
		title: payload_string(&point.payload, "title").unwrap_or_default(),
		url: payload_string(&point.payload, "url").unwrap_or_default(),
		content: payload_string(&point.payload, "content").unwrap_or_default(),
		score: point.score,
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn string_value(text: &str) -> Value {
		Value { kind: Some(Kind::StringValue(text.to_string())) }
	}

	#[test]
	fn maps_payload_fields() {
		let mut payload = HashMap::new();

		payload.insert("title".to_string(), string_value("Sea ice"));
		payload.insert("url".to_string(), string_value("https://docs.example/sea-ice"));
		payload.insert("chunk".to_string(), Value { kind: Some(Kind::IntegerValue(3)) });

		let point = ScoredPoint { payload, score: 0.82, ..Default::default() };
		let hit = scored_point_to_hit(&point);

		assert_eq!(hit.title, "Sea ice");
		assert_eq!(hit.url, "https://docs.example/sea-ice");
		assert_eq!(hit.content, "");
		assert_eq!(hit.score, 0.82);
	}

	#[test]
	fn non_string_payload_is_ignored() {
		let mut payload = HashMap::new();

		payload.insert("title".to_string(), Value { kind: Some(Kind::DoubleValue(1.0)) });

		assert_eq!(payload_string(&payload, "title"), None);
		assert_eq!(payload_string(&payload, "url"), None);
	}
}
