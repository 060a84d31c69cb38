//! Fetch layer: publication listings and abstracts from a scholarly profile service.

mod profile;
pub use profile::{PublicationRef, PublicationSource, fetch_profile, normalise_abstract};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{FetchError, ScholarClient};
