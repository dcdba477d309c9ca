pub mod corpus;
pub mod snippet;
pub mod text;

mod error;

pub use corpus::{Document, document_key};
pub use error::{Error, Result};
