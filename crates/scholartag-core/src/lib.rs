pub mod error;
pub mod publication;
pub mod schema;
pub mod synonyms;

pub use error::SchemaError;
pub use publication::{ClassifiedPublication, Publication, TAG_DELIMITER, UNCERTAIN};
pub use synonyms::{SynonymError, SynonymMap};
