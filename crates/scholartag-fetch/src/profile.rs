use anyhow::Context;
use async_trait::async_trait;
use scholartag_core::Publication;
use tracing::{debug, info};

/// A listed publication before its abstract has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationRef {
    pub id: String,
    pub title: String,
}

/// A scholarly profile service: one listing call per profile, one abstract call per paper.
#[async_trait]
pub trait PublicationSource {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn list_publications(&self, profile_id: &str) -> Result<Vec<PublicationRef>, Self::Error>;

    /// Abstract text for one publication; empty when the service has none.
    async fn fetch_abstract(&self, publication_id: &str) -> Result<String, Self::Error>;
}

/// List a profile's publications and fetch every abstract, one request at a time.
///
/// Any failed request aborts the whole fetch.
pub async fn fetch_profile<S>(source: &S, profile_id: &str) -> anyhow::Result<Vec<Publication>>
where
    S: PublicationSource + Sync,
{
    let refs = source
        .list_publications(profile_id)
        .await
        .with_context(|| format!("listing publications for profile {profile_id}"))?;
    info!(profile = profile_id, count = refs.len(), "listed publications");

    let total = refs.len();
    let mut publications = Vec::with_capacity(total);
    for (i, r) in refs.into_iter().enumerate() {
        let text = source
            .fetch_abstract(&r.id)
            .await
            .with_context(|| format!("fetching abstract for {}", r.id))?;
        debug!(id = %r.id, chars = text.len(), "fetched abstract");

        publications.push(Publication {
            id: r.id,
            title: r.title,
            r#abstract: normalise_abstract(&text),
        });
        eprint!("\r  Fetched {}/{total} abstracts", i + 1);
    }
    if total > 0 {
        eprintln!();
    }

    Ok(publications)
}

/// Trim each paragraph, drop blank ones, and join with `\n`.
pub fn normalise_abstract(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("fake source failure: {0}")]
    struct FakeError(String);

    struct FakeSource {
        listing: Vec<PublicationRef>,
        abstracts: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(papers: &[(&str, &str, &str)]) -> Self {
            Self {
                listing: papers
                    .iter()
                    .map(|(id, title, _)| PublicationRef {
                        id: id.to_string(),
                        title: title.to_string(),
                    })
                    .collect(),
                abstracts: papers
                    .iter()
                    .map(|(id, _, abs)| (id.to_string(), abs.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PublicationSource for FakeSource {
        type Error = FakeError;

        async fn list_publications(&self, profile_id: &str) -> Result<Vec<PublicationRef>, FakeError> {
            self.calls.lock().unwrap().push(format!("list:{profile_id}"));
            Ok(self.listing.clone())
        }

        async fn fetch_abstract(&self, publication_id: &str) -> Result<String, FakeError> {
            self.calls.lock().unwrap().push(format!("abstract:{publication_id}"));
            self.abstracts
                .get(publication_id)
                .cloned()
                .ok_or_else(|| FakeError(publication_id.to_string()))
        }
    }

    #[tokio::test]
    async fn fetches_each_abstract_in_listing_order() {
        let source = FakeSource::new(&[
            ("p1", "Stigma", "One."),
            ("p2", "Peer support", "Two.\n\n  Three.  "),
        ]);

        let pubs = fetch_profile(&source, "author-1").await.unwrap();
        assert_eq!(pubs.len(), 2);
        assert_eq!(pubs[0].title, "Stigma");
        assert_eq!(pubs[1].r#abstract, "Two.\nThree.");

        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["list:author-1", "abstract:p1", "abstract:p2"]);
    }

    #[tokio::test]
    async fn abstract_failure_is_fatal() {
        let mut source = FakeSource::new(&[("p1", "A", "x"), ("p2", "B", "y")]);
        source.abstracts.remove("p2");

        let err = fetch_profile(&source, "author-1").await.unwrap_err();
        assert!(err.to_string().contains("p2"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn empty_profile() {
        let source = FakeSource::new(&[]);
        let pubs = fetch_profile(&source, "author-1").await.unwrap();
        assert!(pubs.is_empty());
    }

    #[test]
    fn normalise_abstract_joins_paragraphs() {
        assert_eq!(normalise_abstract("a\r\n\r\nb\n"), "a\nb");
        assert_eq!(normalise_abstract(""), "");
    }
}
