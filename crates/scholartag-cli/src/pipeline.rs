//! Pipeline stages: fetch → classify → tidy → cluster.
//!
//! Fetch and classify results are memoised to Parquet snapshots in the cache
//! directory; everything downstream is recomputed from them on every run.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use arrow::record_batch::RecordBatch;
use scholartag_ai::{Classifier, OllamaClient, TextGenerator};
use scholartag_analysis::{
    Dendrogram, IncidenceMatrix, RenderOptions, TagCount, TidyOptions, binary_distances,
    render_svg, tag_frequencies, tidy_tags, ward_linkage,
};
use scholartag_core::publication::{
    classifications_to_batch, publications_from_batches, publications_to_batch,
};
use scholartag_fetch::{ScholarClient, fetch_profile};
use scholartag_store::{ParquetSnapshot, SnapshotCache};
use tracing::info;

pub const PUBLICATIONS_FILE: &str = "publications.parquet";
pub const CLASSIFICATIONS_FILE: &str = "classifications.parquet";
pub const DENDROGRAM_FILE: &str = "dendrogram.svg";

pub struct Pipeline {
    pub cache_dir: PathBuf,
    pub out_dir: PathBuf,
    pub scholar_url: String,
    pub model: String,
    pub tidy: TidyOptions,
    pub label_width: usize,
    /// Discard existing snapshots before each cached stage.
    pub refresh: bool,
}

/// Everything the cluster stage produces.
pub struct Clustering {
    pub matrix: IncidenceMatrix,
    pub tree: Dendrogram,
}

impl Pipeline {
    pub fn publications_cache(&self) -> SnapshotCache<ParquetSnapshot> {
        SnapshotCache::new(self.cache_dir.join(PUBLICATIONS_FILE), ParquetSnapshot)
    }

    pub fn classifications_cache(&self) -> SnapshotCache<ParquetSnapshot> {
        SnapshotCache::new(self.cache_dir.join(CLASSIFICATIONS_FILE), ParquetSnapshot)
    }

    /// Publications for `profile`, from cache or the metadata service.
    pub async fn fetch(&self, profile: &str) -> anyhow::Result<RecordBatch> {
        let client = ScholarClient::new(self.scholar_url.clone());
        self.fetch_with(profile, &client).await
    }

    pub async fn fetch_with<S>(&self, profile: &str, source: &S) -> anyhow::Result<RecordBatch>
    where
        S: scholartag_fetch::PublicationSource + Sync,
    {
        let cache = self.publications_cache();
        if self.refresh {
            cache.invalidate()?;
        }
        let batch = cache
            .load_or_compute(|| async {
                let publications = fetch_profile(source, profile).await?;
                eprintln!("  Fetched {} publications", publications.len());
                Ok::<_, anyhow::Error>(publications_to_batch(&publications)?)
            })
            .await
            .with_context(|| format!("fetch stage ({})", cache.path().display()))?;
        info!(rows = batch.num_rows(), "publications ready");
        Ok(batch)
    }

    /// Fail unless the inference server answers its health check.
    pub async fn check_inference_server(&self, ollama: &OllamaClient) -> anyhow::Result<()> {
        ollama.ensure_running().await.with_context(|| {
            format!(
                "inference server at {} is not available; start it with `ollama serve`",
                ollama.base_url()
            )
        })
    }

    /// Classification results, from cache or by running the model over every
    /// cached publication. The model is installed first when missing.
    pub async fn classify(&self, ollama: &OllamaClient) -> anyhow::Result<RecordBatch> {
        if self.refresh {
            self.classifications_cache().invalidate()?;
        }
        if !self.classifications_cache().exists() {
            self.require_publications()?;
            let pulled = ollama
                .ensure_model(&self.model)
                .await
                .with_context(|| format!("installing model {}", self.model))?;
            if pulled {
                eprintln!("  Installed model {}", self.model);
                bell();
            }
        }
        let classifier = Classifier::new(ollama.clone(), self.model.as_str());
        self.classify_with(&classifier).await
    }

    pub async fn classify_with<G: TextGenerator>(
        &self,
        classifier: &Classifier<G>,
    ) -> anyhow::Result<RecordBatch> {
        let cache = self.classifications_cache();
        let cached = cache.exists();
        let batch = cache
            .load_or_compute(|| async {
                let publications = self.load_publications()?;
                let (classified, stats) = classifier.classify_all(&publications).await?;
                eprintln!(
                    "  Classified {} publications in {:.1}s",
                    stats.total, stats.elapsed_secs
                );
                Ok::<_, anyhow::Error>(classifications_to_batch(&classified)?)
            })
            .await
            .with_context(|| format!("classify stage ({})", cache.path().display()))?;
        if !cached {
            bell();
        }
        info!(rows = batch.num_rows(), "classifications ready");
        Ok(batch)
    }

    /// Cached classifications; an error when the classify stage has not run.
    pub fn load_classifications(&self) -> anyhow::Result<RecordBatch> {
        let cache = self.classifications_cache();
        if !cache.exists() {
            bail!(
                "no cached classifications at {}; run `scholartag classify` first",
                cache.path().display()
            );
        }
        Ok(cache.load()?)
    }

    fn require_publications(&self) -> anyhow::Result<SnapshotCache<ParquetSnapshot>> {
        let cache = self.publications_cache();
        if !cache.exists() {
            bail!(
                "no cached publications at {}; run `scholartag fetch <profile>` first",
                cache.path().display()
            );
        }
        Ok(cache)
    }

    fn load_publications(&self) -> anyhow::Result<Vec<scholartag_core::Publication>> {
        let batch = self.require_publications()?.load()?;
        Ok(publications_from_batches(std::slice::from_ref(&batch))?)
    }

    /// Canonical tag assignments and their frequencies.
    pub fn tags(&self, classifications: &RecordBatch) -> anyhow::Result<(RecordBatch, Vec<TagCount>)> {
        let assignments = tidy_tags(classifications, &self.tidy).context("tidying labels")?;
        let counts = tag_frequencies(&assignments)?;
        info!(
            assignments = assignments.num_rows(),
            distinct = counts.len(),
            "tag assignments ready"
        );
        Ok((assignments, counts))
    }

    pub fn cluster(&self, assignments: &RecordBatch) -> anyhow::Result<Clustering> {
        let matrix = IncidenceMatrix::from_assignments(assignments)?;
        let distances = binary_distances(&matrix);
        let tree = ward_linkage(&distances, matrix.papers().to_vec());
        info!(
            papers = matrix.n_papers(),
            tags = matrix.n_tags(),
            merges = tree.merges.len(),
            "clustered papers"
        );
        Ok(Clustering { matrix, tree })
    }

    /// Write the dendrogram SVG into the output directory.
    pub fn write_dendrogram(&self, tree: &Dendrogram) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating {}", self.out_dir.display()))?;
        let path = self.out_dir.join(DENDROGRAM_FILE);
        let options = RenderOptions {
            label_width: self.label_width,
            title: Some(format!(
                "Ward clustering of {} papers by discipline tag",
                tree.n_leaves()
            )),
            ..RenderOptions::default()
        };
        write_file(&path, &render_svg(tree, &options))?;
        info!(path = %path.display(), "wrote dendrogram");
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

/// Terminal bell on stderr.
fn bell() {
    eprint!("\x07");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scholartag_ai::InferenceError;
    use scholartag_core::Publication;
    use scholartag_core::publication::classifications_from_batches;
    use scholartag_fetch::{PublicationRef, PublicationSource};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedSource;

    #[async_trait]
    impl PublicationSource for FixedSource {
        type Error = std::io::Error;

        async fn list_publications(&self, _profile_id: &str) -> Result<Vec<PublicationRef>, Self::Error> {
            Ok(["Peer support", "Crisis teams", "Ward ethics"]
                .iter()
                .enumerate()
                .map(|(i, title)| PublicationRef {
                    id: format!("p{i}"),
                    title: title.to_string(),
                })
                .collect())
        }

        async fn fetch_abstract(&self, publication_id: &str) -> Result<String, Self::Error> {
            Ok(format!("Abstract for {publication_id}."))
        }
    }

    /// Tags by title keyword and counts calls.
    struct KeywordGenerator {
        calls: Arc<AtomicUsize>,
    }

    fn classifier() -> (Classifier<KeywordGenerator>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = KeywordGenerator {
            calls: Arc::clone(&calls),
        };
        (Classifier::new(generator, "test-model"), calls)
    }

    #[async_trait]
    impl TextGenerator for KeywordGenerator {
        async fn generate(&self, _model: &str, prompt: &str) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let label = if prompt.contains("Title: Peer support") {
                "Psychiatry|MHC"
            } else if prompt.contains("Title: Crisis teams") {
                "psychiatry|mental healthcare|nursing"
            } else {
                "NA"
            };
            Ok(label.to_string())
        }
    }

    fn pipeline(dir: &TempDir) -> Pipeline {
        Pipeline {
            cache_dir: dir.path().join("cache"),
            out_dir: dir.path().join("out"),
            scholar_url: "http://unused".into(),
            model: "test-model".into(),
            tidy: TidyOptions::default(),
            label_width: 40,
            refresh: false,
        }
    }

    #[tokio::test]
    async fn end_to_end_with_fakes() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);

        let publications = pipeline.fetch_with("author-1", &FixedSource).await.unwrap();
        assert_eq!(publications.num_rows(), 3);
        assert!(dir.path().join("cache").join(PUBLICATIONS_FILE).exists());

        let (classifier, calls) = classifier();
        let classifications = pipeline.classify_with(&classifier).await.unwrap();
        let classified = classifications_from_batches(&[classifications.clone()]).unwrap();
        assert_eq!(classified.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(classified[2].label.as_deref(), Some("NA"));

        let (assignments, counts) = pipeline.tags(&classifications).unwrap();
        assert_eq!(assignments.num_rows(), 5);
        assert_eq!(
            counts[0],
            TagCount {
                tag: "mental health care".into(),
                count: 2
            }
        );

        let clustering = pipeline.cluster(&assignments).unwrap();
        // The NA-labelled paper has no tags and drops out.
        assert_eq!(clustering.matrix.n_papers(), 2);
        assert_eq!(clustering.tree.merges.len(), 1);

        let svg_path = pipeline.write_dendrogram(&clustering.tree).unwrap();
        let svg = std::fs::read_to_string(svg_path).unwrap();
        assert!(svg.contains("Peer support"));
    }

    #[tokio::test]
    async fn cached_classifications_skip_the_model() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        pipeline.fetch_with("author-1", &FixedSource).await.unwrap();

        let (classifier, calls) = classifier();
        let first = pipeline.classify_with(&classifier).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let second = pipeline.classify_with(&classifier).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            classifications_from_batches(&[first]).unwrap(),
            classifications_from_batches(&[second]).unwrap()
        );
    }

    #[tokio::test]
    async fn classify_requires_fetched_publications() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let (classifier, calls) = classifier();
        let err = pipeline.classify_with(&classifier).await.unwrap_err();
        assert!(format!("{err:#}").contains("scholartag fetch"), "{err:#}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!pipeline.classifications_cache().exists());
    }

    #[tokio::test]
    async fn classify_checks_publications_before_touching_the_model() {
        use wiremock::matchers::any;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"models": []}"#))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        let ollama = OllamaClient::new(server.uri());
        let err = pipeline.classify(&ollama).await.unwrap_err();
        assert!(format!("{err:#}").contains("scholartag fetch"), "{err:#}");
        assert!(!pipeline.classifications_cache().exists());
    }

    #[test]
    fn load_classifications_without_cache() {
        let dir = TempDir::new().unwrap();
        let err = pipeline(&dir).load_classifications().unwrap_err();
        assert!(err.to_string().contains("scholartag classify"));
    }

    #[tokio::test]
    async fn refresh_discards_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir);
        let cache = pipeline.publications_cache();
        cache
            .store(
                &publications_to_batch(&[Publication {
                    id: "stale".into(),
                    title: "Stale".into(),
                    r#abstract: String::new(),
                }])
                .unwrap(),
            )
            .unwrap();

        pipeline.refresh = true;
        let batch = pipeline.fetch_with("author-1", &FixedSource).await.unwrap();
        assert_eq!(batch.num_rows(), 3);
    }
}
