/// One scored hit from a remote backend, mapped to the corpus record shape.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
	pub title: String,
	pub url: String,
	pub content: String,
	pub score: f32,
}
