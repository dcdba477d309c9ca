pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Backend error: {message}")]
	Backend { message: String },
	#[error("{strategy} retrieval timed out after {timeout_ms} ms.")]
	Timeout { strategy: &'static str, timeout_ms: u128 },
	#[error(transparent)]
	Corpus(#[from] reef_domain::Error),
}
impl From<reef_providers::Error> for Error {
	fn from(err: reef_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<reef_storage::Error> for Error {
	fn from(err: reef_storage::Error) -> Self {
		Self::Backend { message: err.to_string() }
	}
}
