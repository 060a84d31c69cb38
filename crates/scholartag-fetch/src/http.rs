//! HTTP client for the Semantic Scholar Graph API.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{PublicationRef, PublicationSource};

/// Page size for author paper listings (the API maximum).
const PAGE_LIMIT: usize = 1000;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client for a researcher's Semantic Scholar author profile.
pub struct ScholarClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PapersPage {
    #[serde(default)]
    next: Option<usize>,
    #[serde(default)]
    data: Vec<PaperListing>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperListing {
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct PaperAbstract {
    #[serde(default)]
    r#abstract: Option<String>,
}

impl ScholarClient {
    /// `base_url` should be like `https://api.semanticscholar.org` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(FetchError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn papers_url(&self, profile_id: &str, offset: usize) -> String {
        format!(
            "{}/graph/v1/author/{profile_id}/papers?fields=title&offset={offset}&limit={PAGE_LIMIT}",
            self.base_url
        )
    }

    fn abstract_url(&self, publication_id: &str) -> String {
        format!(
            "{}/graph/v1/paper/{publication_id}?fields=abstract",
            self.base_url
        )
    }
}

#[async_trait]
impl PublicationSource for ScholarClient {
    type Error = FetchError;

    /// Every paper on the author profile, following `next` offsets until exhausted.
    async fn list_publications(&self, profile_id: &str) -> Result<Vec<PublicationRef>, FetchError> {
        let mut refs = Vec::new();
        let mut offset = 0;

        loop {
            let url = self.papers_url(profile_id, offset);
            info!(url = %url, "listing author papers");
            let page: PapersPage = serde_json::from_str(&self.get_json(&url).await?)?;
            refs.extend(page.data.into_iter().map(listing_to_ref));

            match page.next {
                Some(next) if next > offset => offset = next,
                _ => break,
            }
        }

        Ok(refs)
    }

    async fn fetch_abstract(&self, publication_id: &str) -> Result<String, FetchError> {
        let url = self.abstract_url(publication_id);
        let paper: PaperAbstract = serde_json::from_str(&self.get_json(&url).await?)?;
        Ok(paper.r#abstract.unwrap_or_default())
    }
}

fn listing_to_ref(p: PaperListing) -> PublicationRef {
    PublicationRef {
        id: p.paper_id,
        title: p.title.unwrap_or_default(),
    }
}
