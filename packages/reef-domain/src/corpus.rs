use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One immutable corpus record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
	pub id: String,
	pub title: String,
	pub url: String,
	pub tags: Vec<String>,
	pub content: String,
}
impl Document {
	pub fn key(&self) -> Option<&str> {
		document_key(&self.url, &self.title)
	}

	/// Body text indexed for lexical matching: tags followed by the content.
	pub fn body_text(&self) -> String {
		let mut out = String::with_capacity(self.content.len() + 16 * self.tags.len());

		for tag in &self.tags {
			out.push_str(tag);
			out.push(' ');
		}

		out.push_str(&self.content);

		out
	}
}

/// Identity used to merge candidates across retrieval strategies: the URL when non-empty,
/// otherwise the title. Returns `None` when both are blank.
pub fn document_key<'a>(url: &'a str, title: &'a str) -> Option<&'a str> {
	let url = url.trim();

	if !url.is_empty() {
		return Some(url);
	}

	let title = title.trim();

	if title.is_empty() { None } else { Some(title) }
}

pub fn load_json(path: &Path) -> Result<Vec<Document>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadCorpus { path: path.to_path_buf(), source: err })?;

	parse_json(&raw)
}

pub fn parse_json(raw: &str) -> Result<Vec<Document>> {
	serde_json::from_str(raw).map_err(|err| Error::ParseCorpus { source: err })
}
