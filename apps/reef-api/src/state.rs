use std::{path::Path, sync::Arc};

use reef_domain::{Document, corpus};
use reef_service::ReefService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ReefService>,
}
impl AppState {
	/// Loads the configured corpus and builds the service. An unreadable corpus starts the
	/// service empty.
	pub fn new(config: reef_config::Config) -> Self {
		let documents = load_corpus(&config);
		let service = ReefService::new(config, documents);

		Self::from_service(service)
	}

	pub fn from_service(service: ReefService) -> Self {
		Self { service: Arc::new(service) }
	}
}

fn load_corpus(config: &reef_config::Config) -> Vec<Document> {
	let Some(path) = config.corpus.path.as_deref() else {
		tracing::warn!("corpus.path is not configured. Starting with an empty corpus.");

		return Vec::new();
	};

	match corpus::load_json(Path::new(path)) {
		Ok(documents) => documents,
		Err(err) => {
			tracing::warn!(error = %err, path, "Failed to load corpus. Starting with an empty corpus.");

			Vec::new()
		},
	}
}
